//! Uniform values, reflected uniform slots and their CPU-side storage.
//!
//! A linked program exposes a flat table of named slots. Each slot lives in a
//! uniform block (one `@group/@binding` resource) at a byte offset. Devices keep
//! the block contents in a `UniformStorage` and upload dirty blocks before drawing.

use std::fmt;

/// Value written to a uniform.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum UniformValue {
    /// Written as integer 0/1.
    Bool(bool),
    Int(i32),
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    /// Column-major 4x4 matrix.
    Mat4([f32; 16]),
}

impl UniformValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            UniformValue::Bool(_) => "bool",
            UniformValue::Int(_) => "i32",
            UniformValue::Float(_) => "f32",
            UniformValue::Vec2(_) => "vec2<f32>",
            UniformValue::Vec3(_) => "vec3<f32>",
            UniformValue::Vec4(_) => "vec4<f32>",
            UniformValue::Mat4(_) => "mat4x4<f32>",
        }
    }
}

impl From<bool> for UniformValue {
    fn from(v: bool) -> Self {
        UniformValue::Bool(v)
    }
}

impl From<i32> for UniformValue {
    fn from(v: i32) -> Self {
        UniformValue::Int(v)
    }
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        UniformValue::Float(v)
    }
}

impl From<[f32; 2]> for UniformValue {
    fn from(v: [f32; 2]) -> Self {
        UniformValue::Vec2(v)
    }
}

impl From<[f32; 3]> for UniformValue {
    fn from(v: [f32; 3]) -> Self {
        UniformValue::Vec3(v)
    }
}

impl From<[f32; 4]> for UniformValue {
    fn from(v: [f32; 4]) -> Self {
        UniformValue::Vec4(v)
    }
}

impl From<[f32; 16]> for UniformValue {
    fn from(v: [f32; 16]) -> Self {
        UniformValue::Mat4(v)
    }
}

/// Declared type of a uniform slot, as reflected from shader source.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum UniformKind {
    Int,
    Uint,
    Float,
    Vec2,
    Vec3,
    Vec4,
    Mat4,
    /// Declared with a type the setter interface cannot write (arrays, nested structs, ...).
    Other,
}

impl UniformKind {
    pub fn byte_size(self) -> u32 {
        match self {
            UniformKind::Int | UniformKind::Uint | UniformKind::Float => 4,
            UniformKind::Vec2 => 8,
            UniformKind::Vec3 => 12,
            UniformKind::Vec4 => 16,
            UniformKind::Mat4 => 64,
            UniformKind::Other => 0,
        }
    }
}

impl fmt::Display for UniformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UniformKind::Int => "i32",
            UniformKind::Uint => "u32",
            UniformKind::Float => "f32",
            UniformKind::Vec2 => "vec2<f32>",
            UniformKind::Vec3 => "vec3<f32>",
            UniformKind::Vec4 => "vec4<f32>",
            UniformKind::Mat4 => "mat4x4<f32>",
            UniformKind::Other => "<unsupported>",
        };
        f.write_str(s)
    }
}

/// Encodes `value` for a slot of type `kind`, little-endian.
///
/// `bool` and non-negative `i32` values are accepted for unsigned slots.
/// Returns `None` when the value cannot be written to that slot.
pub fn encode(kind: UniformKind, value: UniformValue) -> Option<Vec<u8>> {
    fn floats(v: &[f32]) -> Vec<u8> {
        v.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    match (kind, value) {
        (UniformKind::Int, UniformValue::Bool(b)) => Some((b as i32).to_le_bytes().to_vec()),
        (UniformKind::Int, UniformValue::Int(i)) => Some(i.to_le_bytes().to_vec()),
        (UniformKind::Uint, UniformValue::Bool(b)) => Some((b as u32).to_le_bytes().to_vec()),
        (UniformKind::Uint, UniformValue::Int(i)) if i >= 0 => {
            Some((i as u32).to_le_bytes().to_vec())
        }
        (UniformKind::Float, UniformValue::Float(f)) => Some(f.to_le_bytes().to_vec()),
        (UniformKind::Vec2, UniformValue::Vec2(v)) => Some(floats(&v)),
        (UniformKind::Vec3, UniformValue::Vec3(v)) => Some(floats(&v)),
        (UniformKind::Vec4, UniformValue::Vec4(v)) => Some(floats(&v)),
        (UniformKind::Mat4, UniformValue::Mat4(v)) => Some(floats(&v)),
        _ => None,
    }
}

/// One named, writable location inside a uniform block.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformSlot {
    /// Variable name (top-level uniform) or member name (uniform block).
    pub name: String,
    /// Name of the enclosing block variable, when the slot is a block member.
    pub block: Option<String>,
    pub group: u32,
    pub binding: u32,
    /// Byte offset inside the block.
    pub offset: u32,
    pub kind: UniformKind,
}

impl UniformSlot {
    /// True when `name` refers to this slot, either bare or as `block.member`.
    pub fn answers_to(&self, name: &str) -> bool {
        if self.name == name {
            return true;
        }
        match &self.block {
            Some(block) => name
                .strip_prefix(block.as_str())
                .and_then(|rest| rest.strip_prefix('.'))
                .is_some_and(|member| member == self.name),
            None => false,
        }
    }
}

/// One uniform resource (`@group(g) @binding(b)`) and its byte size.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformBlock {
    pub group: u32,
    pub binding: u32,
    pub size: u32,
    pub name: Option<String>,
}

/// Reflected uniform interface of a linked program.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UniformTable {
    pub slots: Vec<UniformSlot>,
    pub blocks: Vec<UniformBlock>,
}

impl UniformTable {
    /// Index of the slot answering to `name`.
    ///
    /// A bare member name shared by several blocks answers to none of them;
    /// those members are only reachable as `block.member`.
    pub fn find(&self, name: &str) -> Option<usize> {
        let mut hits = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.answers_to(name))
            .map(|(i, _)| i);
        let first = hits.next()?;
        match hits.next() {
            Some(_) => None,
            None => Some(first),
        }
    }

    /// Bare names that more than one slot answers to.
    pub fn ambiguous_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for (i, slot) in self.slots.iter().enumerate() {
            let name = slot.name.as_str();
            let shared = self.slots[i + 1..].iter().any(|s| s.name == name);
            if shared && !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    pub fn block_index(&self, group: u32, binding: u32) -> Option<usize> {
        self.blocks
            .iter()
            .position(|b| b.group == group && b.binding == binding)
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Why a uniform write was rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum UniformWriteError {
    /// Location does not belong to the program's slot table.
    InvalidSlot(u32),
    /// Value type does not match the declared type.
    TypeMismatch {
        name: String,
        expected: UniformKind,
        found: &'static str,
    },
}

impl fmt::Display for UniformWriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UniformWriteError::InvalidSlot(slot) => write!(f, "invalid uniform slot {slot}"),
            UniformWriteError::TypeMismatch { name, expected, found } => write!(
                f,
                "uniform '{name}' is declared as {expected} but a {found} value was written"
            ),
        }
    }
}

impl std::error::Error for UniformWriteError {}

/// CPU copy of every uniform block of one program.
#[derive(Debug, Clone)]
pub struct UniformStorage {
    table: UniformTable,
    data: Vec<Vec<u8>>,
    dirty: Vec<bool>,
}

impl UniformStorage {
    /// Zero-initialized storage, every block marked dirty.
    pub fn new(table: UniformTable) -> Self {
        let data: Vec<Vec<u8>> = table
            .blocks
            .iter()
            .map(|b| vec![0u8; b.size as usize])
            .collect();
        let dirty = vec![true; data.len()];
        Self { table, data, dirty }
    }

    pub fn table(&self) -> &UniformTable {
        &self.table
    }

    pub fn write(&mut self, slot: u32, value: UniformValue) -> Result<(), UniformWriteError> {
        let s = self
            .table
            .slots
            .get(slot as usize)
            .ok_or(UniformWriteError::InvalidSlot(slot))?;

        let bytes = encode(s.kind, value).ok_or_else(|| UniformWriteError::TypeMismatch {
            name: s.name.clone(),
            expected: s.kind,
            found: value.type_name(),
        })?;

        let block = self
            .table
            .block_index(s.group, s.binding)
            .ok_or(UniformWriteError::InvalidSlot(slot))?;

        let start = s.offset as usize;
        let end = start + bytes.len();
        let buf = &mut self.data[block];
        if end > buf.len() {
            return Err(UniformWriteError::InvalidSlot(slot));
        }
        buf[start..end].copy_from_slice(&bytes);
        self.dirty[block] = true;
        Ok(())
    }

    pub fn block_bytes(&self, block: usize) -> &[u8] {
        &self.data[block]
    }

    /// Returns and clears the dirty flag of `block`.
    pub fn take_dirty(&mut self, block: usize) -> bool {
        std::mem::replace(&mut self.dirty[block], false)
    }

    /// Reads `count` consecutive `f32`s from a block.
    pub fn read_f32s(&self, group: u32, binding: u32, offset: u32, count: usize) -> Option<Vec<f32>> {
        let block = self.table.block_index(group, binding)?;
        let buf = &self.data[block];
        let start = offset as usize;
        let end = start + count * 4;
        if end > buf.len() {
            return None;
        }
        Some(
            buf[start..end]
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
        )
    }
}

/// What `set_uniform` does with names that do not resolve.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum UniformPolicy {
    /// Unknown names and mismatched types are ignored (logged only).
    #[default]
    Permissive,
    /// Unknown names and mismatched types are reported as errors.
    Strict,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> UniformTable {
        UniformTable {
            slots: vec![
                UniformSlot {
                    name: "tint".into(),
                    block: Some("params".into()),
                    group: 0,
                    binding: 0,
                    offset: 0,
                    kind: UniformKind::Vec4,
                },
                UniformSlot {
                    name: "enabled".into(),
                    block: Some("params".into()),
                    group: 0,
                    binding: 0,
                    offset: 16,
                    kind: UniformKind::Int,
                },
                UniformSlot {
                    name: "scale".into(),
                    block: None,
                    group: 0,
                    binding: 1,
                    offset: 0,
                    kind: UniformKind::Float,
                },
            ],
            blocks: vec![
                UniformBlock { group: 0, binding: 0, size: 32, name: Some("params".into()) },
                UniformBlock { group: 0, binding: 1, size: 4, name: Some("scale".into()) },
            ],
        }
    }

    #[test]
    fn slots_answer_to_bare_and_qualified_names() {
        let t = table();
        assert_eq!(t.find("tint"), Some(0));
        assert_eq!(t.find("params.tint"), Some(0));
        assert_eq!(t.find("scale"), Some(2));
        assert_eq!(t.find("params.scale"), None);
        assert_eq!(t.find("paramstint"), None);
        assert_eq!(t.find("missing"), None);
    }

    #[test]
    fn bare_name_shared_by_two_blocks_is_ambiguous() {
        let mut t = table();
        t.slots.push(UniformSlot {
            name: "tint".into(),
            block: Some("overlay".into()),
            group: 0,
            binding: 2,
            offset: 0,
            kind: UniformKind::Vec4,
        });
        assert_eq!(t.find("tint"), None);
        assert_eq!(t.find("params.tint"), Some(0));
        assert_eq!(t.find("overlay.tint"), Some(3));
        assert_eq!(t.ambiguous_names(), vec!["tint"]);
        assert!(table().ambiguous_names().is_empty());
    }

    #[test]
    fn bool_is_written_as_integer() {
        let mut s = UniformStorage::new(table());
        s.write(1, UniformValue::Bool(true)).unwrap();
        assert_eq!(&s.block_bytes(0)[16..20], &1i32.to_le_bytes());
        s.write(1, UniformValue::Bool(false)).unwrap();
        assert_eq!(&s.block_bytes(0)[16..20], &0i32.to_le_bytes());
    }

    #[test]
    fn vec4_round_trips_through_read() {
        let mut s = UniformStorage::new(table());
        s.write(0, UniformValue::Vec4([0.0, 0.5, 0.0, 1.0])).unwrap();
        assert_eq!(s.read_f32s(0, 0, 0, 4), Some(vec![0.0, 0.5, 0.0, 1.0]));
    }

    #[test]
    fn mismatched_type_is_rejected_and_storage_untouched() {
        let mut s = UniformStorage::new(table());
        let err = s.write(2, UniformValue::Int(3)).unwrap_err();
        assert_eq!(
            err,
            UniformWriteError::TypeMismatch {
                name: "scale".into(),
                expected: UniformKind::Float,
                found: "i32",
            }
        );
        assert_eq!(s.block_bytes(1), &[0, 0, 0, 0]);
    }

    #[test]
    fn dirty_flag_is_consumed() {
        let mut s = UniformStorage::new(table());
        assert!(s.take_dirty(1));
        assert!(!s.take_dirty(1));
        s.write(2, UniformValue::Float(2.0)).unwrap();
        assert!(s.take_dirty(1));
    }

    #[test]
    fn negative_int_cannot_fill_unsigned_slot() {
        assert!(encode(UniformKind::Uint, UniformValue::Int(-1)).is_none());
        assert!(encode(UniformKind::Uint, UniformValue::Int(7)).is_some());
    }

    #[test]
    fn out_of_range_slot_is_invalid() {
        let mut s = UniformStorage::new(table());
        assert_eq!(s.write(9, UniformValue::Float(1.0)), Err(UniformWriteError::InvalidSlot(9)));
    }
}
