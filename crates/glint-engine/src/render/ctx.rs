use crate::coords::Viewport;
use crate::device::GraphicsDevice;
use crate::input::{InputState, Key};
use crate::shader::{ShaderError, ShaderProgram, UniformValue};
use crate::time::FrameTime;

/// Control directive returned by loop hooks.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LoopControl {
    Continue,
    /// Finish the current frame, then stop.
    Exit,
}

/// Per-frame context passed to loop hooks.
pub struct FrameCtx<'a> {
    pub device: &'a mut dyn GraphicsDevice,
    pub program: &'a mut ShaderProgram,
    pub input: &'a InputState,
    pub time: FrameTime,
    pub viewport: Viewport,
}

impl FrameCtx<'_> {
    /// Shorthand for `program.set_uniform(device, ..)`.
    pub fn set_uniform(
        &mut self,
        name: &str,
        value: impl Into<UniformValue>,
    ) -> Result<(), ShaderError> {
        self.program.set_uniform(&mut *self.device, name, value)
    }

    pub fn key_down(&self, key: Key) -> bool {
        self.input.key_down(key)
    }

    pub fn key_pressed(&self, key: Key) -> bool {
        self.input.key_pressed(key)
    }
}
