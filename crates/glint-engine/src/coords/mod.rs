//! Color and viewport types shared by devices and the render loop.

mod color;
mod viewport;

pub use color::Color;
pub use viewport::Viewport;
