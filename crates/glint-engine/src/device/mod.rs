//! Device contract + backends.
//!
//! `GraphicsDevice` is the handle-based API the shader and render-loop layers
//! talk to. Two implementations are provided:
//! - `WgpuDevice`: window surface, wgpu device/queue, pipelines built on demand
//! - `SoftwareDevice`: CPU framebuffer with a triangle rasterizer, used headless
//!   and in tests

mod error;
mod handle;
pub(crate) mod objects;
pub mod software;
pub mod gpu;

pub use error::{DeviceError, DeviceResult};
pub use handle::{
    BoundProgram, BoundVertices, BufferHandle, BufferUsage, BuildStatus, FrameStats,
    PresentStatus, ProgramHandle, StageHandle, UniformLocation,
};
pub use software::SoftwareDevice;
pub use gpu::{GpuInit, WgpuDevice};

use crate::coords::{Color, Viewport};
use crate::shader::{ShaderStage, UniformValue, VertexInput};
use crate::vertex::VertexLayoutBinding;

/// Handle-based graphics API.
///
/// Objects are addressed through opaque handles. Compile and link report
/// their outcome as a `BuildStatus` so diagnostics can be inspected; a
/// `DeviceError` means the call itself was invalid.
pub trait GraphicsDevice {
    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str;

    // ── shader stages ───────────────────────────────────────────────────

    fn create_stage(&mut self, stage: ShaderStage) -> DeviceResult<StageHandle>;
    fn compile_stage(&mut self, stage: StageHandle, source: &str) -> DeviceResult<BuildStatus>;
    /// Deferred while the stage is attached to a program.
    fn delete_stage(&mut self, stage: StageHandle);

    // ── programs ────────────────────────────────────────────────────────

    fn create_program(&mut self) -> DeviceResult<ProgramHandle>;
    fn attach_stage(&mut self, program: ProgramHandle, stage: StageHandle) -> DeviceResult<()>;
    fn detach_stage(&mut self, program: ProgramHandle, stage: StageHandle) -> DeviceResult<()>;
    fn link_program(&mut self, program: ProgramHandle) -> DeviceResult<BuildStatus>;
    fn delete_program(&mut self, program: ProgramHandle);
    /// Makes a linked program current for subsequent draws.
    fn use_program(&mut self, program: ProgramHandle) -> DeviceResult<BoundProgram>;
    /// User-defined vertex inputs of a linked program, sorted by location.
    fn vertex_inputs(&self, program: ProgramHandle) -> DeviceResult<Vec<VertexInput>>;

    // ── uniforms ────────────────────────────────────────────────────────

    /// `None` when the linked program has no uniform answering to `name`.
    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation>;
    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue) -> DeviceResult<()>;

    // ── buffers ─────────────────────────────────────────────────────────

    fn create_buffer(&mut self, usage: BufferUsage, data: &[u8]) -> DeviceResult<BufferHandle>;
    fn delete_buffer(&mut self, buffer: BufferHandle);
    /// Makes a vertex binding current for subsequent draws.
    fn bind_vertices<'a>(
        &mut self,
        binding: &'a VertexLayoutBinding,
    ) -> DeviceResult<BoundVertices<'a>>;

    // ── frame ───────────────────────────────────────────────────────────

    /// Resizes the render target (physical pixels).
    fn resize(&mut self, width: u32, height: u32);
    fn surface_size(&self) -> (u32, u32);
    fn set_viewport(&mut self, viewport: Viewport);
    fn viewport(&self) -> Viewport;
    fn clear(&mut self, color: Color);
    /// Draws the full vertex (or index) range of `vertices` with `program`.
    fn draw(&mut self, program: &BoundProgram, vertices: &BoundVertices<'_>) -> DeviceResult<()>;
    fn present(&mut self) -> DeviceResult<PresentStatus>;
    /// Counters of the last presented frame.
    fn frame_stats(&self) -> FrameStats;
}
