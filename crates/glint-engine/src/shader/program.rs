use std::collections::HashMap;

use crate::device::{
    BoundProgram, BuildStatus, DeviceError, GraphicsDevice, ProgramHandle, StageHandle,
    UniformLocation,
};

use super::{
    ShaderError, ShaderSources, ShaderStage, UniformPolicy, UniformValue, UniformWriteError,
    VertexInput,
};

/// Lifecycle state of a `ShaderProgram`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ProgramStatus {
    /// Both stages compiled and the program linked; usable.
    Linked,
    /// Compilation or linking failed; diagnostics are retained.
    Failed,
    /// The device object was freed.
    Released,
}

/// One compiled + linked program on a device.
///
/// Construction never fails outright: a program that did not build is kept in
/// the `Failed` state with its diagnostics, and every use reports `NotLinked`.
/// The intermediate stage objects are deleted on every construction path.
pub struct ShaderProgram {
    handle: Option<ProgramHandle>,
    status: ProgramStatus,

    vertex_log: String,
    fragment_log: String,
    link_log: String,
    errors: Vec<ShaderError>,

    policy: UniformPolicy,
    /// Resolved uniform locations, including misses.
    locations: HashMap<String, Option<UniformLocation>>,
}

impl ShaderProgram {
    /// Compiles both stages and links them into a program on `device`.
    pub fn new(
        device: &mut dyn GraphicsDevice,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Self {
        let mut program = Self {
            handle: None,
            status: ProgramStatus::Failed,
            vertex_log: String::new(),
            fragment_log: String::new(),
            link_log: String::new(),
            errors: Vec::new(),
            policy: UniformPolicy::default(),
            locations: HashMap::new(),
        };

        // Both stages are compiled even if the first fails, so both logs exist.
        let mut stages = Vec::with_capacity(2);
        for (stage, source) in [
            (ShaderStage::Vertex, vertex_source),
            (ShaderStage::Fragment, fragment_source),
        ] {
            match compile(device, stage, source) {
                Ok((handle, status)) => {
                    stages.push(handle);
                    if let BuildStatus::Failed(log) = status {
                        log::error!("{stage} shader failed to compile:\n{log}");
                        match stage {
                            ShaderStage::Vertex => program.vertex_log = log.clone(),
                            ShaderStage::Fragment => program.fragment_log = log.clone(),
                        }
                        program.errors.push(ShaderError::Compile { stage, log });
                    }
                }
                Err(e) => {
                    log::error!("{stage} shader could not be created: {e}");
                    program.errors.push(e.into());
                }
            }
        }

        if program.errors.is_empty() {
            match link(device, &stages) {
                Ok(handle) => {
                    program.handle = Some(handle);
                    program.status = ProgramStatus::Linked;
                    log::debug!(
                        "linked shader program {} on {}",
                        handle.id(),
                        device.backend_name()
                    );
                }
                Err(e) => {
                    if let ShaderError::Link { log } = &e {
                        program.link_log = log.clone();
                    }
                    program.errors.push(e);
                }
            }
        }

        for stage in stages {
            device.delete_stage(stage);
        }

        program
    }

    pub fn from_sources(device: &mut dyn GraphicsDevice, sources: &ShaderSources) -> Self {
        Self::new(device, &sources.vertex, &sources.fragment)
    }

    /// Like `new`, but returns the first failure instead of a `Failed` program.
    pub fn build(
        device: &mut dyn GraphicsDevice,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<Self, ShaderError> {
        let program = Self::new(device, vertex_source, fragment_source);
        match program.status {
            ProgramStatus::Linked => Ok(program),
            _ => Err(program
                .errors
                .first()
                .cloned()
                .unwrap_or(ShaderError::NotLinked)),
        }
    }

    pub fn with_policy(mut self, policy: UniformPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn status(&self) -> ProgramStatus {
        self.status
    }

    pub fn is_linked(&self) -> bool {
        self.status == ProgramStatus::Linked
    }

    pub fn policy(&self) -> UniformPolicy {
        self.policy
    }

    /// Device handle, present only while linked.
    pub fn handle(&self) -> Option<ProgramHandle> {
        self.handle
    }

    /// Every failure recorded during construction, in stage order.
    pub fn errors(&self) -> &[ShaderError] {
        &self.errors
    }

    /// Empty when the vertex stage compiled.
    pub fn vertex_log(&self) -> &str {
        &self.vertex_log
    }

    pub fn fragment_log(&self) -> &str {
        &self.fragment_log
    }

    pub fn link_log(&self) -> &str {
        &self.link_log
    }

    fn linked_handle(&self) -> Result<ProgramHandle, ShaderError> {
        match (self.status, self.handle) {
            (ProgramStatus::Linked, Some(handle)) => Ok(handle),
            (ProgramStatus::Released, _) => Err(ShaderError::Released),
            _ => Err(ShaderError::NotLinked),
        }
    }

    /// Makes this program current on `device`.
    pub fn use_program(
        &self,
        device: &mut dyn GraphicsDevice,
    ) -> Result<BoundProgram, ShaderError> {
        let handle = self.linked_handle()?;
        Ok(device.use_program(handle)?)
    }

    /// Writes a uniform by name.
    ///
    /// Names resolve against top-level uniforms and uniform block members
    /// (`member` or `block.member`). Under the permissive policy an unknown
    /// name, a mismatched value type or an unlinked program is a logged no-op.
    pub fn set_uniform(
        &mut self,
        device: &mut dyn GraphicsDevice,
        name: &str,
        value: impl Into<UniformValue>,
    ) -> Result<(), ShaderError> {
        let value = value.into();
        let strict = self.policy == UniformPolicy::Strict;

        let handle = match self.linked_handle() {
            Ok(handle) => handle,
            Err(e) if strict => return Err(e),
            Err(e) => {
                log::warn!("ignoring uniform '{name}': {e}");
                return Ok(());
            }
        };

        let location = match self.locations.get(name) {
            Some(location) => *location,
            None => {
                let location = device.uniform_location(handle, name);
                if location.is_none() && !strict {
                    log::debug!(
                        "program {} has no uniform '{name}'; writes to it are ignored",
                        handle.id()
                    );
                }
                self.locations.insert(name.to_string(), location);
                location
            }
        };

        let Some(location) = location else {
            if strict {
                return Err(ShaderError::UnknownUniform {
                    name: name.to_string(),
                });
            }
            return Ok(());
        };

        match device.set_uniform(location, value) {
            Ok(()) => Ok(()),
            Err(DeviceError::Uniform(UniformWriteError::TypeMismatch {
                expected, found, ..
            })) => {
                if strict {
                    return Err(ShaderError::UniformType {
                        name: name.to_string(),
                        expected,
                        found,
                    });
                }
                log::warn!("uniform '{name}' expects {expected}, got {found}; value ignored");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// User-defined vertex inputs, sorted by location.
    pub fn vertex_inputs(
        &self,
        device: &dyn GraphicsDevice,
    ) -> Result<Vec<VertexInput>, ShaderError> {
        let handle = self.linked_handle()?;
        Ok(device.vertex_inputs(handle)?)
    }

    /// Frees the device program. Later use reports `Released`.
    pub fn release(&mut self, device: &mut dyn GraphicsDevice) {
        if let Some(handle) = self.handle.take() {
            device.delete_program(handle);
            log::debug!("released shader program {}", handle.id());
        }
        self.status = ProgramStatus::Released;
        self.locations.clear();
    }
}

impl Drop for ShaderProgram {
    fn drop(&mut self) {
        if let (ProgramStatus::Linked, Some(handle)) = (self.status, self.handle) {
            log::warn!(
                "shader program {} dropped without release; its device object leaks",
                handle.id()
            );
        }
    }
}

/// Creates and compiles one stage. The stage object is returned even when
/// compilation failed so the caller can delete it.
fn compile(
    device: &mut dyn GraphicsDevice,
    stage: ShaderStage,
    source: &str,
) -> Result<(StageHandle, BuildStatus), ShaderError> {
    let handle = device.create_stage(stage)?;
    match device.compile_stage(handle, source) {
        Ok(status) => Ok((handle, status)),
        Err(e) => {
            device.delete_stage(handle);
            Err(e.into())
        }
    }
}

/// Links compiled stages. On failure the program object is deleted again.
fn link(
    device: &mut dyn GraphicsDevice,
    stages: &[StageHandle],
) -> Result<ProgramHandle, ShaderError> {
    let program = device.create_program()?;

    let mut attached = Vec::with_capacity(stages.len());
    let mut result = Ok(BuildStatus::Success);
    for &stage in stages {
        match device.attach_stage(program, stage) {
            Ok(()) => attached.push(stage),
            Err(e) => {
                result = Err(e);
                break;
            }
        }
    }
    if result.is_ok() {
        result = device.link_program(program);
    }

    for stage in attached {
        if let Err(e) = device.detach_stage(program, stage) {
            log::debug!("detach of stage {} failed: {e}", stage.id());
        }
    }

    match result {
        Ok(BuildStatus::Success) => Ok(program),
        Ok(BuildStatus::Failed(log)) => {
            log::error!("shader program failed to link:\n{log}");
            device.delete_program(program);
            Err(ShaderError::Link { log })
        }
        Err(e) => {
            log::error!("shader program could not be linked: {e}");
            device.delete_program(program);
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::SoftwareDevice;
    use crate::shader::UniformKind;

    const VS: &str = "@vertex fn vs_main(@location(0) pos: vec3<f32>) -> @builtin(position) vec4<f32> {
    return vec4<f32>(pos, 1.0);
}";

    const FS: &str = "struct Params {
    color: vec4<f32>,
    enabled: i32,
}
@group(0) @binding(0) var<uniform> params: Params;

@fragment fn fs_main() -> @location(0) vec4<f32> {
    return params.color;
}";

    const BROKEN: &str = "@vertex fn vs_main( -> {";

    fn device() -> SoftwareDevice {
        SoftwareDevice::new(16, 16)
    }

    #[test]
    fn valid_pair_links_and_binds() {
        let mut dev = device();
        let mut program = ShaderProgram::new(&mut dev, VS, FS);

        assert_eq!(program.status(), ProgramStatus::Linked);
        assert!(program.errors().is_empty());
        assert!(program.use_program(&mut dev).is_ok());
        assert_eq!(dev.live_stages(), 0);
        assert_eq!(dev.live_programs(), 1);

        program.release(&mut dev);
        assert_eq!(dev.live_programs(), 0);
    }

    #[test]
    fn vertex_syntax_error_fails_with_vertex_log() {
        let mut dev = device();
        let program = ShaderProgram::new(&mut dev, BROKEN, FS);

        assert_eq!(program.status(), ProgramStatus::Failed);
        assert!(!program.vertex_log().is_empty());
        assert!(program.fragment_log().is_empty());
        assert!(matches!(
            program.errors(),
            [ShaderError::Compile { stage: ShaderStage::Vertex, .. }]
        ));
        assert_eq!(program.use_program(&mut dev).err(), Some(ShaderError::NotLinked));
        assert_eq!(dev.live_stages(), 0);
        assert_eq!(dev.live_programs(), 0);
    }

    #[test]
    fn both_stage_failures_are_reported() {
        let mut dev = device();
        let program = ShaderProgram::new(&mut dev, BROKEN, "@fragment fn fs_main( {");

        assert_eq!(program.errors().len(), 2);
        assert!(!program.vertex_log().is_empty());
        assert!(!program.fragment_log().is_empty());
        assert_eq!(dev.live_stages(), 0);
    }

    #[test]
    fn interface_mismatch_fails_to_link() {
        let mut dev = device();
        let fs = "@fragment fn fs_main(@location(1) v: vec3<f32>) -> @location(0) vec4<f32> {
    return vec4<f32>(v, 1.0);
}";
        let program = ShaderProgram::new(&mut dev, VS, fs);

        assert_eq!(program.status(), ProgramStatus::Failed);
        assert!(program.vertex_log().is_empty());
        assert!(!program.link_log().is_empty());
        assert!(program.handle().is_none());
        assert_eq!(dev.live_programs(), 0);
        assert_eq!(dev.live_stages(), 0);
    }

    #[test]
    fn build_returns_first_failure() {
        let mut dev = device();
        let err = ShaderProgram::build(&mut dev, BROKEN, FS).err();
        assert!(matches!(
            err,
            Some(ShaderError::Compile { stage: ShaderStage::Vertex, .. })
        ));
    }

    #[test]
    fn released_program_reports_released() {
        let mut dev = device();
        let mut program = ShaderProgram::new(&mut dev, VS, FS);
        program.release(&mut dev);

        assert_eq!(program.status(), ProgramStatus::Released);
        assert_eq!(program.use_program(&mut dev).err(), Some(ShaderError::Released));
        assert!(program.set_uniform(&mut dev, "color", [1.0f32; 4]).is_ok());
    }

    #[test]
    fn uniforms_resolve_by_member_and_qualified_name() {
        let mut dev = device();
        let mut program = ShaderProgram::new(&mut dev, VS, FS).with_policy(UniformPolicy::Strict);

        program.set_uniform(&mut dev, "color", [0.0f32, 1.0, 0.0, 1.0]).unwrap();
        program.set_uniform(&mut dev, "params.color", [0.0f32, 0.0, 1.0, 1.0]).unwrap();
        program.set_uniform(&mut dev, "enabled", true).unwrap();

        program.release(&mut dev);
    }

    #[test]
    fn unknown_uniform_depends_on_policy() {
        let mut dev = device();
        let mut program = ShaderProgram::new(&mut dev, VS, FS);
        assert!(program.set_uniform(&mut dev, "missing", 1.0f32).is_ok());
        assert!(program.set_uniform(&mut dev, "missing", 2.0f32).is_ok());

        let mut program = program.with_policy(UniformPolicy::Strict);
        assert_eq!(
            program.set_uniform(&mut dev, "missing", 1.0f32),
            Err(ShaderError::UnknownUniform {
                name: "missing".to_string()
            })
        );
        program.release(&mut dev);
    }

    #[test]
    fn mismatched_type_is_rejected_in_strict_mode() {
        let mut dev = device();
        let mut program = ShaderProgram::new(&mut dev, VS, FS);
        assert!(program.set_uniform(&mut dev, "color", 1.0f32).is_ok());

        let mut program = program.with_policy(UniformPolicy::Strict);
        assert_eq!(
            program.set_uniform(&mut dev, "color", 1.0f32),
            Err(ShaderError::UniformType {
                name: "color".to_string(),
                expected: UniformKind::Vec4,
                found: "f32",
            })
        );
        program.release(&mut dev);
    }

    #[test]
    fn vertex_inputs_come_from_the_linked_program() {
        let mut dev = device();
        let mut program = ShaderProgram::new(&mut dev, VS, FS);
        let inputs = program.vertex_inputs(&dev).unwrap();
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].location, 0);
        program.release(&mut dev);
    }
}
