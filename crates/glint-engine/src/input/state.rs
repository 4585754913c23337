use std::collections::HashSet;

use super::types::{InputEvent, Key, KeyState};

/// Current input state for one window.
///
/// Holds "is down" information plus the keys that went down since the last
/// `begin_frame`.
#[derive(Debug, Default)]
pub struct InputState {
    /// Whether the window is focused.
    pub focused: bool,

    /// Keys currently held.
    pub keys_down: HashSet<Key>,

    /// Keys that transitioned to pressed during the current frame.
    pub keys_pressed: HashSet<Key>,
}

impl InputState {
    /// Applies a platform-agnostic input event.
    pub fn apply_event(&mut self, ev: &InputEvent) {
        match ev {
            InputEvent::Focused(focused) => {
                self.focused = *focused;
                if !*focused {
                    // Avoid stuck keys when focus changes mid-press.
                    self.keys_down.clear();
                }
            }

            InputEvent::Key { key, state, .. } => match state {
                KeyState::Pressed => {
                    if self.keys_down.insert(*key) {
                        self.keys_pressed.insert(*key);
                    }
                }
                KeyState::Released => {
                    self.keys_down.remove(key);
                }
            },
        }
    }

    /// Clears per-frame transitions; called once per loop iteration.
    pub fn begin_frame(&mut self) {
        self.keys_pressed.clear();
    }

    pub fn key_down(&self, key: Key) -> bool {
        self.keys_down.contains(&key)
    }

    pub fn key_pressed(&self, key: Key) -> bool {
        self.keys_pressed.contains(&key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(key: Key) -> InputEvent {
        InputEvent::Key { key, state: KeyState::Pressed, repeat: false }
    }

    fn release(key: Key) -> InputEvent {
        InputEvent::Key { key, state: KeyState::Released, repeat: false }
    }

    #[test]
    fn press_and_release_tracks_down_set() {
        let mut input = InputState::default();
        input.apply_event(&press(Key::Escape));
        assert!(input.key_down(Key::Escape));
        assert!(input.key_pressed(Key::Escape));

        input.apply_event(&release(Key::Escape));
        assert!(!input.key_down(Key::Escape));
    }

    #[test]
    fn repeat_press_is_not_a_new_transition() {
        let mut input = InputState::default();
        input.apply_event(&press(Key::W));
        input.begin_frame();
        input.apply_event(&press(Key::W));
        assert!(input.key_down(Key::W));
        assert!(!input.key_pressed(Key::W));
    }

    #[test]
    fn focus_loss_clears_held_keys() {
        let mut input = InputState::default();
        input.apply_event(&InputEvent::Focused(true));
        input.apply_event(&press(Key::A));
        input.apply_event(&InputEvent::Focused(false));
        assert!(!input.focused);
        assert!(input.keys_down.is_empty());
    }
}
