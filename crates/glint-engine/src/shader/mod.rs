//! Shader programs: stage compilation, linking, uniform reflection and the
//! `ShaderProgram` lifecycle built on top of a `GraphicsDevice`.
//!
//! Stages are compiled to naga IR (WGSL, or GLSL when the source starts with a
//! `#version` directive) and validated before any backend sees them.

mod compile;
mod error;
mod interface;
mod program;
mod stage;
mod uniform;

pub use compile::{CompiledStage, compile_stage};
pub use error::ShaderError;
pub use interface::{IoScalar, IoType, ProgramInterface, VertexInput, link};
pub use program::{ProgramStatus, ShaderProgram};
pub use stage::{ShaderLanguage, ShaderSources, ShaderStage};
pub use uniform::{
    UniformBlock, UniformKind, UniformPolicy, UniformSlot, UniformStorage, UniformTable,
    UniformValue, UniformWriteError, encode,
};
