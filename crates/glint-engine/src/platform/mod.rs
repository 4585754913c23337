//! Platform contract: the window/context/input side of the render loop.
//!
//! `WinitPlatform` (see `crate::window`) drives a real window. `HeadlessPlatform`
//! replays a script of resizes, key presses and close requests, one step per
//! frame, for tests and offscreen runs.

mod error;
mod headless;

pub use error::PlatformError;
pub use headless::HeadlessPlatform;

use crate::input::InputState;

/// Callback receiving new drawable sizes in physical pixels.
pub type ResizeHandler = Box<dyn FnMut(u32, u32)>;

pub trait Platform {
    /// Current drawable size in physical pixels.
    fn drawable_size(&self) -> (u32, u32);

    /// Input state accumulated by the last `pump_events`.
    fn poll_input(&mut self) -> &InputState;

    /// True once a close was requested by the user, the window system or the loop.
    fn should_close(&self) -> bool;

    fn set_should_close(&mut self, close: bool);

    /// Installs the resize handler, replacing any previous one.
    fn set_resize_handler(&mut self, handler: ResizeHandler);

    /// Called right before the device presents a frame.
    fn pre_present(&self) {}

    /// Processes pending window system events. Resize notifications are
    /// delivered to the handler from inside this call.
    fn pump_events(&mut self);
}
