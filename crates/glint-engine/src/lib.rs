//! Glint engine crate.
//!
//! Shader-program lifecycle and a render loop over two seams: a `Platform`
//! (window, input, events) and a `GraphicsDevice` (wgpu or software).

pub mod coords;
pub mod device;
pub mod input;
pub mod logging;
pub mod platform;
pub mod render;
pub mod shader;
pub mod time;
pub mod vertex;
pub mod window;
