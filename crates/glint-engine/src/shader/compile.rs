//! Per-stage compilation: parse WGSL or GLSL into naga IR and validate it.

use naga::valid::{Capabilities, FunctionInfo, ModuleInfo, ValidationFlags, Validator};

use super::{ShaderLanguage, ShaderStage};

/// A stage that parsed and validated successfully.
#[derive(Debug, Clone)]
pub struct CompiledStage {
    pub stage: ShaderStage,
    pub language: ShaderLanguage,
    /// Name of the entry point used for `stage`.
    pub entry_point: String,
    pub module: naga::Module,
    /// Validator output; carries the resolved type of every expression.
    pub info: ModuleInfo,
}

impl CompiledStage {
    /// Entry point record for this stage.
    pub(crate) fn entry(&self) -> Option<&naga::EntryPoint> {
        self.module
            .entry_points
            .iter()
            .find(|ep| ep.stage == self.stage.to_naga() && ep.name == self.entry_point)
    }

    /// Analysis of the entry point function returned by `entry`.
    pub(crate) fn entry_info(&self) -> Option<&FunctionInfo> {
        self.module
            .entry_points
            .iter()
            .position(|ep| ep.stage == self.stage.to_naga() && ep.name == self.entry_point)
            .map(|i| self.info.get_entry_point(i))
    }
}

/// Compiles `source` for `stage`. `Err` holds a human readable diagnostic log.
pub fn compile_stage(stage: ShaderStage, source: &str) -> Result<CompiledStage, String> {
    if source.trim().is_empty() {
        return Err(format!("{stage} shader source is empty"));
    }

    let language = ShaderLanguage::detect(source);
    let module = match language {
        ShaderLanguage::Wgsl => {
            naga::front::wgsl::parse_str(source).map_err(|e| e.emit_to_string(source))?
        }
        ShaderLanguage::Glsl => {
            let options = naga::front::glsl::Options::from(stage.to_naga());
            naga::front::glsl::Frontend::default()
                .parse(&options, source)
                .map_err(|e| e.emit_to_string(source))?
        }
    };

    let mut validator = Validator::new(ValidationFlags::all(), Capabilities::default());
    let info = validator
        .validate(&module)
        .map_err(|e| e.emit_to_string(source))?;

    let entry_point = module
        .entry_points
        .iter()
        .find(|ep| ep.stage == stage.to_naga())
        .map(|ep| ep.name.clone())
        .ok_or_else(|| format!("no {stage} entry point found in {language} source"))?;

    log::debug!("compiled {stage} stage ({language}, entry point `{entry_point}`)");

    Ok(CompiledStage {
        stage,
        language,
        entry_point,
        module,
        info,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRIANGLE: &str = r#"
@vertex
fn vs_main(@location(0) pos: vec3<f32>) -> @builtin(position) vec4<f32> {
    return vec4<f32>(pos, 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return vec4<f32>(1.0, 0.5, 0.2, 1.0);
}
"#;

    #[test]
    fn wgsl_stages_pick_matching_entry_point() {
        let vs = compile_stage(ShaderStage::Vertex, TRIANGLE).unwrap();
        let fs = compile_stage(ShaderStage::Fragment, TRIANGLE).unwrap();
        assert_eq!(vs.entry_point, "vs_main");
        assert_eq!(fs.entry_point, "fs_main");
        assert_eq!(vs.language, ShaderLanguage::Wgsl);
        assert!(vs.entry().is_some());
        assert!(fs.entry_info().is_some());
    }

    #[test]
    fn syntax_error_produces_log() {
        let log = compile_stage(ShaderStage::Vertex, "@vertex fn vs_main( {").unwrap_err();
        assert!(!log.is_empty());
    }

    #[test]
    fn type_error_is_caught_by_validation_or_parse() {
        let src = r#"
@fragment
fn fs_main() -> @location(0) vec4<f32> {
    let x: f32 = 1;
    return vec4<f32>(x, x, x, true);
}
"#;
        assert!(compile_stage(ShaderStage::Fragment, src).is_err());
    }

    #[test]
    fn missing_entry_point_is_reported() {
        let src = "@fragment fn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }";
        let log = compile_stage(ShaderStage::Vertex, src).unwrap_err();
        assert!(log.contains("no vertex entry point"), "{log}");
    }

    #[test]
    fn empty_source_is_rejected() {
        assert!(compile_stage(ShaderStage::Fragment, "   \n").is_err());
    }

    #[test]
    fn glsl_450_vertex_compiles() {
        let src = r#"#version 450
layout(location = 0) in vec3 aPos;
void main() {
    gl_Position = vec4(aPos, 1.0);
}
"#;
        let vs = compile_stage(ShaderStage::Vertex, src).unwrap();
        assert_eq!(vs.language, ShaderLanguage::Glsl);
        assert_eq!(vs.entry_point, "main");
    }
}
