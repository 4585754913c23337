//! Frame timing.
//!
//! One `FrameClock` per render loop; `tick()` once per iteration.

mod frame_clock;

pub use frame_clock::{FrameClock, FrameTime};
