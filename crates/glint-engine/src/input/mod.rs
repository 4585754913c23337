//! Input subsystem.
//!
//! The public API does not expose winit types; platforms translate their events
//! into `InputEvent`s and apply them to an `InputState`.

mod state;
mod types;
pub(crate) mod winit_keys;

pub use state::InputState;
pub use types::{InputEvent, Key, KeyState};
