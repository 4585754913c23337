//! Stage and program object tables shared by every device backend.
//!
//! Mirrors the driver-side object model: stages are compiled on their own,
//! attached to programs, and stay alive while attached even after deletion
//! was requested. `P` carries backend-specific state for linked programs.

use std::collections::HashMap;

use crate::shader::{
    self, CompiledStage, ProgramInterface, ShaderStage, UniformStorage, UniformValue, VertexInput,
};

use super::{
    BoundProgram, BuildStatus, DeviceError, DeviceResult, ProgramHandle, StageHandle,
    UniformLocation,
};

pub(crate) struct StageObject {
    pub stage: ShaderStage,
    pub compiled: Option<CompiledStage>,
    pub log: String,
    ref_count: u32,
    delete_pending: bool,
}

/// A successfully linked program: private copies of both stages plus the
/// reflected interface and uniform contents.
pub(crate) struct LinkedProgram {
    pub vertex: CompiledStage,
    pub fragment: CompiledStage,
    pub interface: ProgramInterface,
    pub uniforms: UniformStorage,
}

pub(crate) struct ProgramObject<P> {
    pub attached: Vec<StageHandle>,
    pub linked: Option<LinkedProgram>,
    pub log: String,
    pub backend: Option<P>,
}

pub(crate) struct ObjectTable<P = ()> {
    next_id: u32,
    stages: HashMap<u32, StageObject>,
    programs: HashMap<u32, ProgramObject<P>>,
    active: Option<ProgramHandle>,
}

impl<P> Default for ObjectTable<P> {
    fn default() -> Self {
        Self {
            next_id: 1,
            stages: HashMap::new(),
            programs: HashMap::new(),
            active: None,
        }
    }
}

impl<P> ObjectTable<P> {
    fn next(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    // ── stages ──────────────────────────────────────────────────────────

    pub fn create_stage(&mut self, stage: ShaderStage) -> StageHandle {
        let id = self.next();
        self.stages.insert(
            id,
            StageObject {
                stage,
                compiled: None,
                log: String::new(),
                ref_count: 0,
                delete_pending: false,
            },
        );
        StageHandle(id)
    }

    pub fn stage(&self, h: StageHandle) -> DeviceResult<&StageObject> {
        self.stages.get(&h.0).ok_or(DeviceError::InvalidHandle {
            kind: "stage",
            id: h.0,
        })
    }

    pub fn compile_stage(&mut self, h: StageHandle, source: &str) -> DeviceResult<BuildStatus> {
        let obj = self.stages.get_mut(&h.0).ok_or(DeviceError::InvalidHandle {
            kind: "stage",
            id: h.0,
        })?;

        match shader::compile_stage(obj.stage, source) {
            Ok(compiled) => {
                obj.compiled = Some(compiled);
                obj.log.clear();
                Ok(BuildStatus::Success)
            }
            Err(log) => {
                obj.compiled = None;
                obj.log = log.clone();
                Ok(BuildStatus::Failed(log))
            }
        }
    }

    pub fn delete_stage(&mut self, h: StageHandle) {
        match self.stages.get_mut(&h.0) {
            Some(obj) if obj.ref_count > 0 => obj.delete_pending = true,
            Some(_) => {
                self.stages.remove(&h.0);
            }
            None => log::debug!("delete of unknown stage {}", h.0),
        }
    }

    pub fn live_stages(&self) -> usize {
        self.stages.len()
    }

    // ── programs ────────────────────────────────────────────────────────

    pub fn create_program(&mut self) -> ProgramHandle {
        let id = self.next();
        self.programs.insert(
            id,
            ProgramObject {
                attached: Vec::new(),
                linked: None,
                log: String::new(),
                backend: None,
            },
        );
        ProgramHandle(id)
    }

    pub fn program(&self, h: ProgramHandle) -> DeviceResult<&ProgramObject<P>> {
        self.programs.get(&h.0).ok_or(DeviceError::InvalidHandle {
            kind: "program",
            id: h.0,
        })
    }

    pub fn program_mut(&mut self, h: ProgramHandle) -> DeviceResult<&mut ProgramObject<P>> {
        self.programs.get_mut(&h.0).ok_or(DeviceError::InvalidHandle {
            kind: "program",
            id: h.0,
        })
    }

    pub fn attach_stage(&mut self, p: ProgramHandle, s: StageHandle) -> DeviceResult<()> {
        let kind = self.stage(s)?.stage;
        let already = {
            let program = self.program(p)?;
            program.attached.iter().any(|a| {
                *a == s || self.stages.get(&a.0).is_some_and(|o| o.stage == kind)
            })
        };
        if already {
            return Err(DeviceError::InvalidOperation(format!(
                "program {} already has a {kind} stage attached",
                p.0
            )));
        }

        self.program_mut(p)?.attached.push(s);
        if let Some(obj) = self.stages.get_mut(&s.0) {
            obj.ref_count += 1;
        }
        Ok(())
    }

    pub fn detach_stage(&mut self, p: ProgramHandle, s: StageHandle) -> DeviceResult<()> {
        let program = self.program_mut(p)?;
        let Some(pos) = program.attached.iter().position(|a| *a == s) else {
            return Err(DeviceError::InvalidOperation(format!(
                "stage {} is not attached to program {}",
                s.0, p.0
            )));
        };
        program.attached.remove(pos);
        self.release_stage_ref(s);
        Ok(())
    }

    fn release_stage_ref(&mut self, s: StageHandle) {
        if let Some(obj) = self.stages.get_mut(&s.0) {
            obj.ref_count = obj.ref_count.saturating_sub(1);
            if obj.ref_count == 0 && obj.delete_pending {
                self.stages.remove(&s.0);
            }
        }
    }

    /// Links the attached stages. Backend state of a previous link is dropped.
    pub fn link_program(&mut self, p: ProgramHandle) -> DeviceResult<BuildStatus> {
        let attached = self.program(p)?.attached.clone();

        let mut vertex = None;
        let mut fragment = None;
        let mut errors = Vec::new();
        for s in attached {
            let obj = self.stage(s)?;
            match (&obj.compiled, obj.stage) {
                (Some(c), ShaderStage::Vertex) => vertex = Some(c.clone()),
                (Some(c), ShaderStage::Fragment) => fragment = Some(c.clone()),
                (None, stage) => errors.push(format!("error: attached {stage} stage is not compiled")),
            }
        }

        let linked = match (vertex, fragment) {
            (Some(v), Some(f)) if errors.is_empty() => match shader::link(&v, &f) {
                Ok(interface) => Ok(LinkedProgram {
                    uniforms: UniformStorage::new(interface.uniforms.clone()),
                    vertex: v,
                    fragment: f,
                    interface,
                }),
                Err(log) => Err(log),
            },
            (v, f) => {
                if v.is_none() && errors.is_empty() {
                    errors.push("error: no vertex stage attached".to_string());
                }
                if f.is_none() && errors.is_empty() {
                    errors.push("error: no fragment stage attached".to_string());
                }
                Err(errors.join("\n"))
            }
        };

        let program = self.program_mut(p)?;
        program.backend = None;
        match linked {
            Ok(l) => {
                program.linked = Some(l);
                program.log.clear();
                Ok(BuildStatus::Success)
            }
            Err(log) => {
                program.linked = None;
                program.log = log.clone();
                Ok(BuildStatus::Failed(log))
            }
        }
    }

    pub fn delete_program(&mut self, p: ProgramHandle) {
        let Some(program) = self.programs.remove(&p.0) else {
            log::debug!("delete of unknown program {}", p.0);
            return;
        };
        for s in program.attached {
            self.release_stage_ref(s);
        }
        if self.active == Some(p) {
            self.active = None;
        }
    }

    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    pub fn linked(&self, p: ProgramHandle) -> DeviceResult<&LinkedProgram> {
        self.program(p)?
            .linked
            .as_ref()
            .ok_or_else(|| DeviceError::InvalidOperation(format!("program {} is not linked", p.0)))
    }

    pub fn linked_mut(&mut self, p: ProgramHandle) -> DeviceResult<&mut LinkedProgram> {
        self.program_mut(p)?
            .linked
            .as_mut()
            .ok_or_else(|| DeviceError::InvalidOperation(format!("program {} is not linked", p.0)))
    }

    pub fn use_program(&mut self, p: ProgramHandle) -> DeviceResult<BoundProgram> {
        self.linked(p)?;
        self.active = Some(p);
        Ok(BoundProgram { program: p })
    }

    pub fn active(&self) -> Option<ProgramHandle> {
        self.active
    }

    // ── uniforms ────────────────────────────────────────────────────────

    pub fn uniform_location(&self, p: ProgramHandle, name: &str) -> Option<UniformLocation> {
        let linked = self.linked(p).ok()?;
        let slot = linked.interface.uniforms.find(name)?;
        Some(UniformLocation {
            program: p,
            slot: slot as u32,
        })
    }

    pub fn set_uniform(&mut self, loc: UniformLocation, value: UniformValue) -> DeviceResult<()> {
        self.linked_mut(loc.program)?
            .uniforms
            .write(loc.slot, value)
            .map_err(DeviceError::from)
    }

    pub fn vertex_inputs(&self, p: ProgramHandle) -> DeviceResult<Vec<VertexInput>> {
        Ok(self.linked(p)?.interface.vertex_inputs.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VS: &str = "@vertex fn vs_main(@location(0) p: vec3<f32>) -> @builtin(position) vec4<f32> { return vec4<f32>(p, 1.0); }";
    const FS: &str = "@fragment fn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }";

    fn compiled(t: &mut ObjectTable, stage: ShaderStage, src: &str) -> StageHandle {
        let s = t.create_stage(stage);
        assert!(t.compile_stage(s, src).unwrap().is_success());
        s
    }

    #[test]
    fn attached_stage_survives_delete_until_detached() {
        let mut t = ObjectTable::<()>::default();
        let vs = compiled(&mut t, ShaderStage::Vertex, VS);
        let p = t.create_program();
        t.attach_stage(p, vs).unwrap();

        t.delete_stage(vs);
        assert_eq!(t.live_stages(), 1);

        t.detach_stage(p, vs).unwrap();
        assert_eq!(t.live_stages(), 0);
    }

    #[test]
    fn deleting_program_releases_pending_stages() {
        let mut t = ObjectTable::<()>::default();
        let vs = compiled(&mut t, ShaderStage::Vertex, VS);
        let p = t.create_program();
        t.attach_stage(p, vs).unwrap();
        t.delete_stage(vs);
        t.delete_program(p);
        assert_eq!(t.live_stages(), 0);
        assert_eq!(t.live_programs(), 0);
    }

    #[test]
    fn second_stage_of_same_kind_is_rejected() {
        let mut t = ObjectTable::<()>::default();
        let a = compiled(&mut t, ShaderStage::Vertex, VS);
        let b = compiled(&mut t, ShaderStage::Vertex, VS);
        let p = t.create_program();
        t.attach_stage(p, a).unwrap();
        assert!(matches!(
            t.attach_stage(p, b),
            Err(DeviceError::InvalidOperation(_))
        ));
    }

    #[test]
    fn link_without_fragment_fails_with_log() {
        let mut t = ObjectTable::<()>::default();
        let vs = compiled(&mut t, ShaderStage::Vertex, VS);
        let p = t.create_program();
        t.attach_stage(p, vs).unwrap();
        match t.link_program(p).unwrap() {
            BuildStatus::Failed(log) => assert!(log.contains("fragment")),
            BuildStatus::Success => panic!("link should fail"),
        }
        assert!(t.use_program(p).is_err());
    }

    #[test]
    fn linked_program_can_be_used() {
        let mut t = ObjectTable::<()>::default();
        let vs = compiled(&mut t, ShaderStage::Vertex, VS);
        let fs = compiled(&mut t, ShaderStage::Fragment, FS);
        let p = t.create_program();
        t.attach_stage(p, vs).unwrap();
        t.attach_stage(p, fs).unwrap();
        assert_eq!(t.link_program(p).unwrap(), BuildStatus::Success);

        let bound = t.use_program(p).unwrap();
        assert_eq!(bound.handle(), p);
        assert_eq!(t.active(), Some(p));
        assert_eq!(t.vertex_inputs(p).unwrap().len(), 1);
    }

    #[test]
    fn unknown_handles_are_reported() {
        let mut t = ObjectTable::<()>::default();
        assert_eq!(
            t.compile_stage(StageHandle(42), VS),
            Err(DeviceError::InvalidHandle { kind: "stage", id: 42 })
        );
        assert!(t.link_program(ProgramHandle(7)).is_err());
    }
}
