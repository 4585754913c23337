//! Stage interface reflection and the link step.
//!
//! Linking checks what a driver would check for a vertex/fragment pair:
//! - the vertex stage writes a clip-space position
//! - every fragment input location is written by the vertex stage with the same type
//! - the fragment stage writes at least one color output
//! - uniform resources shared by both stages agree on their layout
//! - no texture or sampler bindings are declared (neither backend binds them)

use std::fmt;

use naga::{Binding, BuiltIn, Handle, ScalarKind, Type, TypeInner, VectorSize};

use super::{CompiledStage, UniformBlock, UniformKind, UniformSlot, UniformTable};

/// Scalar class of a stage input/output.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum IoScalar {
    Float,
    Sint,
    Uint,
    Bool,
}

/// Type of a stage input/output: scalar class and component count (1..=4).
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct IoType {
    pub scalar: IoScalar,
    pub components: u32,
}

impl fmt::Display for IoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self.scalar {
            IoScalar::Float => "f32",
            IoScalar::Sint => "i32",
            IoScalar::Uint => "u32",
            IoScalar::Bool => "bool",
        };
        if self.components == 1 {
            f.write_str(s)
        } else {
            write!(f, "vec{}<{s}>", self.components)
        }
    }
}

/// A user-defined vertex stage input.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexInput {
    pub location: u32,
    pub name: Option<String>,
    /// `None` for types that cannot be fed from a vertex buffer.
    pub ty: Option<IoType>,
}

/// Reflected interface of a linked program.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgramInterface {
    /// Sorted by location.
    pub vertex_inputs: Vec<VertexInput>,
    pub uniforms: UniformTable,
}

#[derive(Debug, Clone)]
struct IoSlot {
    location: u32,
    name: Option<String>,
    ty: Option<IoType>,
}

#[derive(Debug, Default)]
struct StageIo {
    inputs: Vec<IoSlot>,
    outputs: Vec<IoSlot>,
    writes_position: bool,
}

/// Links a vertex and a fragment stage. `Err` holds the link log.
pub fn link(vertex: &CompiledStage, fragment: &CompiledStage) -> Result<ProgramInterface, String> {
    let mut errors = Vec::new();

    let vs_io = stage_io(vertex).ok_or("vertex stage has no entry point")?;
    let fs_io = stage_io(fragment).ok_or("fragment stage has no entry point")?;

    if !vs_io.writes_position {
        errors.push("vertex stage does not write a clip-space position".to_string());
    }

    for input in &fs_io.inputs {
        match vs_io.outputs.iter().find(|o| o.location == input.location) {
            None => errors.push(format!(
                "fragment input {} at location {} is not written by the vertex stage",
                display_name(&input.name),
                input.location
            )),
            Some(output) if output.ty != input.ty => errors.push(format!(
                "location {}: vertex output is {} but fragment input {} is {}",
                input.location,
                display_type(output.ty),
                display_name(&input.name),
                display_type(input.ty)
            )),
            Some(_) => {}
        }
    }

    if fs_io.outputs.is_empty() {
        errors.push("fragment stage writes no color output".to_string());
    }

    for stage in [vertex, fragment] {
        for name in opaque_resources(&stage.module) {
            errors.push(format!(
                "{} stage declares texture/sampler binding '{name}'; \
                 textures and samplers are not supported",
                stage.stage
            ));
        }
    }

    let mut uniforms = reflect_uniforms(&vertex.module);
    merge_uniforms(&mut uniforms, reflect_uniforms(&fragment.module), &mut errors);
    for name in uniforms.ambiguous_names() {
        log::warn!(
            "uniform member '{name}' is declared in several blocks; set it as 'block.{name}'"
        );
    }

    if !errors.is_empty() {
        return Err(errors
            .iter()
            .map(|e| format!("error: {e}"))
            .collect::<Vec<_>>()
            .join("\n"));
    }

    let mut vertex_inputs: Vec<VertexInput> = vs_io
        .inputs
        .into_iter()
        .map(|s| VertexInput {
            location: s.location,
            name: s.name,
            ty: s.ty,
        })
        .collect();
    vertex_inputs.sort_by_key(|i| i.location);

    Ok(ProgramInterface {
        vertex_inputs,
        uniforms,
    })
}

fn display_name(name: &Option<String>) -> String {
    match name {
        Some(n) => format!("'{n}'"),
        None => "<unnamed>".to_string(),
    }
}

fn display_type(ty: Option<IoType>) -> String {
    match ty {
        Some(t) => t.to_string(),
        None => "<unsupported type>".to_string(),
    }
}

fn stage_io(stage: &CompiledStage) -> Option<StageIo> {
    let ep = stage.entry()?;
    let module = &stage.module;
    let mut io = StageIo::default();

    // Builtins read by a stage are not outputs; only the result can write position.
    let mut reads_position = false;
    for arg in &ep.function.arguments {
        collect_io(
            module,
            arg.ty,
            arg.binding.as_ref(),
            arg.name.as_ref(),
            &mut io.inputs,
            &mut reads_position,
        );
    }

    if let Some(result) = &ep.function.result {
        collect_io(
            module,
            result.ty,
            result.binding.as_ref(),
            None,
            &mut io.outputs,
            &mut io.writes_position,
        );
    }

    Some(io)
}

fn collect_io(
    module: &naga::Module,
    ty: Handle<Type>,
    binding: Option<&Binding>,
    name: Option<&String>,
    out: &mut Vec<IoSlot>,
    position: &mut bool,
) {
    match binding {
        Some(Binding::Location { location, .. }) => out.push(IoSlot {
            location: *location,
            name: name.cloned(),
            ty: io_type(module, ty),
        }),
        Some(Binding::BuiltIn(BuiltIn::Position { .. })) => *position = true,
        Some(Binding::BuiltIn(_)) => {}
        None => {
            if let TypeInner::Struct { members, .. } = &module.types[ty].inner {
                for m in members {
                    collect_io(module, m.ty, m.binding.as_ref(), m.name.as_ref(), out, position);
                }
            }
        }
    }
}

fn io_type(module: &naga::Module, ty: Handle<Type>) -> Option<IoType> {
    let (kind, components) = match &module.types[ty].inner {
        TypeInner::Scalar(s) => (s.kind, 1),
        TypeInner::Vector { size, scalar } => (scalar.kind, vector_len(*size)),
        _ => return None,
    };
    let scalar = match kind {
        ScalarKind::Float => IoScalar::Float,
        ScalarKind::Sint => IoScalar::Sint,
        ScalarKind::Uint => IoScalar::Uint,
        ScalarKind::Bool => IoScalar::Bool,
        _ => return None,
    };
    Some(IoType { scalar, components })
}

fn vector_len(size: VectorSize) -> u32 {
    match size {
        VectorSize::Bi => 2,
        VectorSize::Tri => 3,
        VectorSize::Quad => 4,
    }
}

/// Maps a naga type onto the kinds the uniform setters can write.
pub(crate) fn uniform_kind(module: &naga::Module, ty: Handle<Type>) -> UniformKind {
    match &module.types[ty].inner {
        TypeInner::Scalar(s) if s.width == 4 => match s.kind {
            ScalarKind::Sint => UniformKind::Int,
            ScalarKind::Uint => UniformKind::Uint,
            ScalarKind::Float => UniformKind::Float,
            _ => UniformKind::Other,
        },
        TypeInner::Vector { size, scalar } if scalar.kind == ScalarKind::Float && scalar.width == 4 => {
            match size {
                VectorSize::Bi => UniformKind::Vec2,
                VectorSize::Tri => UniformKind::Vec3,
                VectorSize::Quad => UniformKind::Vec4,
            }
        }
        TypeInner::Matrix {
            columns: VectorSize::Quad,
            rows: VectorSize::Quad,
            scalar,
        } if scalar.kind == ScalarKind::Float && scalar.width == 4 => UniformKind::Mat4,
        _ => UniformKind::Other,
    }
}

/// Every `var<uniform>` of a module: one block per resource, one slot per
/// member (struct) or per variable (plain value).
/// Names of image and sampler globals.
fn opaque_resources(module: &naga::Module) -> Vec<String> {
    module
        .global_variables
        .iter()
        .filter(|(_, var)| var.space == naga::AddressSpace::Handle)
        .map(|(_, var)| var.name.clone().unwrap_or_else(|| "<unnamed>".to_string()))
        .collect()
}

pub(crate) fn reflect_uniforms(module: &naga::Module) -> UniformTable {
    let mut table = UniformTable::default();

    for (_, var) in module.global_variables.iter() {
        if var.space != naga::AddressSpace::Uniform {
            continue;
        }
        let Some(res) = var.binding.as_ref() else {
            continue;
        };

        let inner = &module.types[var.ty].inner;
        match inner {
            TypeInner::Struct { members, .. } => {
                for m in members {
                    let Some(name) = &m.name else { continue };
                    table.slots.push(UniformSlot {
                        name: name.clone(),
                        block: var.name.clone(),
                        group: res.group,
                        binding: res.binding,
                        offset: m.offset,
                        kind: uniform_kind(module, m.ty),
                    });
                }
            }
            _ => {
                if let Some(name) = &var.name {
                    table.slots.push(UniformSlot {
                        name: name.clone(),
                        block: None,
                        group: res.group,
                        binding: res.binding,
                        offset: 0,
                        kind: uniform_kind(module, var.ty),
                    });
                }
            }
        }

        table.blocks.push(UniformBlock {
            group: res.group,
            binding: res.binding,
            size: inner.size(module.to_ctx()),
            name: var.name.clone(),
        });
    }

    table
}

fn merge_uniforms(into: &mut UniformTable, other: UniformTable, errors: &mut Vec<String>) {
    for block in other.blocks {
        match into.block_index(block.group, block.binding) {
            Some(i) => {
                let existing = &into.blocks[i];
                if existing.size != block.size {
                    errors.push(format!(
                        "uniform binding (group {}, binding {}) is declared with different sizes ({} and {} bytes)",
                        block.group, block.binding, existing.size, block.size
                    ));
                }
            }
            None => into.blocks.push(block),
        }
    }

    for slot in other.slots {
        let same_place = into.slots.iter().find(|s| {
            s.group == slot.group && s.binding == slot.binding && s.offset == slot.offset
        });
        match same_place {
            Some(existing) if existing.kind != slot.kind => errors.push(format!(
                "uniform '{}' is {} in one stage and {} in the other",
                slot.name, existing.kind, slot.kind
            )),
            Some(_) => {}
            None => into.slots.push(slot),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::{ShaderStage, compile_stage};

    fn pair(vs: &str, fs: &str) -> (CompiledStage, CompiledStage) {
        (
            compile_stage(ShaderStage::Vertex, vs).unwrap(),
            compile_stage(ShaderStage::Fragment, fs).unwrap(),
        )
    }

    const VS_POSITION: &str = r#"
@vertex
fn vs_main(@location(0) pos: vec3<f32>) -> @builtin(position) vec4<f32> {
    return vec4<f32>(pos, 1.0);
}
"#;

    const VS_COLOR: &str = r#"
struct VsOut {
    @builtin(position) pos: vec4<f32>,
    @location(0) color: vec3<f32>,
};

@vertex
fn vs_main(@location(0) pos: vec3<f32>, @location(1) color: vec3<f32>) -> VsOut {
    var out: VsOut;
    out.pos = vec4<f32>(pos, 1.0);
    out.color = color;
    return out;
}
"#;

    #[test]
    fn matching_interface_links() {
        let fs = r#"
@fragment
fn fs_main(@location(0) color: vec3<f32>) -> @location(0) vec4<f32> {
    return vec4<f32>(color, 1.0);
}
"#;
        let (v, f) = pair(VS_COLOR, fs);
        let iface = link(&v, &f).unwrap();
        let locations: Vec<u32> = iface.vertex_inputs.iter().map(|i| i.location).collect();
        assert_eq!(locations, vec![0, 1]);
        assert_eq!(
            iface.vertex_inputs[0].ty,
            Some(IoType { scalar: IoScalar::Float, components: 3 })
        );
    }

    #[test]
    fn missing_vertex_output_fails_link() {
        let fs = r#"
@fragment
fn fs_main(@location(3) uv: vec2<f32>) -> @location(0) vec4<f32> {
    return vec4<f32>(uv, 0.0, 1.0);
}
"#;
        let (v, f) = pair(VS_COLOR, fs);
        let log = link(&v, &f).unwrap_err();
        assert!(log.contains("location 3"), "{log}");
    }

    #[test]
    fn mismatched_io_type_fails_link() {
        let fs = r#"
@fragment
fn fs_main(@location(0) color: vec4<f32>) -> @location(0) vec4<f32> {
    return color;
}
"#;
        let (v, f) = pair(VS_COLOR, fs);
        let log = link(&v, &f).unwrap_err();
        assert!(log.contains("vec3<f32>") && log.contains("vec4<f32>"), "{log}");
    }

    #[test]
    fn uniform_variable_and_block_members_are_reflected() {
        let src = r#"
struct Params {
    tint: vec4<f32>,
    scale: f32,
};

@group(0) @binding(0) var<uniform> ourColor: vec4<f32>;
@group(0) @binding(1) var<uniform> params: Params;

@vertex
fn vs_main(@location(0) pos: vec3<f32>) -> @builtin(position) vec4<f32> {
    return vec4<f32>(pos * params.scale, 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return ourColor * params.tint;
}
"#;
        let (v, f) = pair(src, src);
        let iface = link(&v, &f).unwrap();
        let table = &iface.uniforms;
        assert_eq!(table.blocks.len(), 2);

        let color = &table.slots[table.find("ourColor").unwrap()];
        assert_eq!(color.kind, UniformKind::Vec4);
        assert_eq!(color.block, None);

        let scale = &table.slots[table.find("params.scale").unwrap()];
        assert_eq!(scale.kind, UniformKind::Float);
        assert_eq!(scale.offset, 16);
        assert_eq!(table.find("scale"), table.find("params.scale"));
    }

    #[test]
    fn texture_bindings_fail_link() {
        let fs = r#"
@group(0) @binding(1) var texture1: texture_2d<f32>;
@group(0) @binding(2) var sampler1: sampler;
@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return textureSample(texture1, sampler1, vec2<f32>(0.5, 0.5));
}
"#;
        let (v, f) = pair(VS_POSITION, fs);
        let log = link(&v, &f).unwrap_err();
        assert!(log.contains("'texture1'"), "{log}");
        assert!(log.contains("'sampler1'"), "{log}");
    }

    #[test]
    fn shared_member_name_needs_block_prefix() {
        let src = r#"
struct A {
    color: vec4<f32>,
};
struct B {
    color: vec4<f32>,
};

@group(0) @binding(0) var<uniform> a: A;
@group(0) @binding(1) var<uniform> b: B;

@vertex
fn vs_main(@location(0) pos: vec3<f32>) -> @builtin(position) vec4<f32> {
    return vec4<f32>(pos, 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return a.color + b.color;
}
"#;
        let (v, f) = pair(src, src);
        let table = link(&v, &f).unwrap().uniforms;
        assert_eq!(table.find("color"), None);
        assert_eq!(table.ambiguous_names(), vec!["color"]);
        let a = table.find("a.color").unwrap();
        let b = table.find("b.color").unwrap();
        assert_ne!(table.slots[a].binding, table.slots[b].binding);
    }

    #[test]
    fn conflicting_uniform_types_fail_link() {
        let vs = r#"
@group(0) @binding(0) var<uniform> k: f32;
@vertex
fn vs_main(@location(0) pos: vec3<f32>) -> @builtin(position) vec4<f32> {
    return vec4<f32>(pos * k, 1.0);
}
"#;
        let fs = r#"
@group(0) @binding(0) var<uniform> k: vec4<f32>;
@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return k;
}
"#;
        let (v, f) = pair(vs, fs);
        assert!(link(&v, &f).is_err());
    }
}
