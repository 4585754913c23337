//! Render loop.
//!
//! Drives one program over one vertex binding until a stop condition:
//! poll input, apply resize, clear, run hooks, draw, present, pump events.
//!
//! Convention:
//! - Viewport and surface sizes are physical pixels.
//! - Hooks run after the clear and before the draw, so uniforms they set are
//!   visible in the same frame.

mod ctx;
mod error;
mod render_loop;
mod tracker;

pub use ctx::{FrameCtx, LoopControl};
pub use error::RenderError;
pub use render_loop::{FrameHook, LoopSummary, RenderLoop, StopReason};
pub use tracker::ViewportTracker;
