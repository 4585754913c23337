use crate::input::{InputEvent, InputState, Key, KeyState};

use super::{Platform, ResizeHandler};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Scripted {
    Resize(u32, u32),
    Press(Key),
    Release(Key),
    Close,
}

/// Platform without a window.
///
/// Events are scheduled "after frame N": they are delivered by the `N`-th call
/// to `pump_events`, which the render loop makes at the end of frame `N`.
pub struct HeadlessPlatform {
    size: (u32, u32),
    input: InputState,
    close: bool,
    pumps: u64,
    script: Vec<(u64, Scripted)>,
    resize_handler: Option<ResizeHandler>,
}

impl HeadlessPlatform {
    pub fn new(width: u32, height: u32) -> Self {
        let input = InputState {
            focused: true,
            ..InputState::default()
        };
        Self {
            size: (width, height),
            input,
            close: false,
            pumps: 0,
            script: Vec::new(),
            resize_handler: None,
        }
    }

    fn schedule(mut self, frame: u64, event: Scripted) -> Self {
        self.script.push((frame, event));
        self
    }

    pub fn resize_after(self, frame: u64, width: u32, height: u32) -> Self {
        self.schedule(frame, Scripted::Resize(width, height))
    }

    /// The key goes down after `frame` and stays held until released.
    pub fn press_after(self, frame: u64, key: Key) -> Self {
        self.schedule(frame, Scripted::Press(key))
    }

    pub fn release_after(self, frame: u64, key: Key) -> Self {
        self.schedule(frame, Scripted::Release(key))
    }

    pub fn close_after(self, frame: u64) -> Self {
        self.schedule(frame, Scripted::Close)
    }

    /// Number of `pump_events` calls so far.
    pub fn pumps(&self) -> u64 {
        self.pumps
    }

    fn deliver(&mut self, event: Scripted) {
        match event {
            Scripted::Resize(w, h) => {
                self.size = (w, h);
                if let Some(handler) = self.resize_handler.as_mut() {
                    handler(w, h);
                }
            }
            Scripted::Press(key) => self.input.apply_event(&InputEvent::Key {
                key,
                state: KeyState::Pressed,
                repeat: false,
            }),
            Scripted::Release(key) => self.input.apply_event(&InputEvent::Key {
                key,
                state: KeyState::Released,
                repeat: false,
            }),
            Scripted::Close => self.close = true,
        }
    }
}

impl Platform for HeadlessPlatform {
    fn drawable_size(&self) -> (u32, u32) {
        self.size
    }

    fn poll_input(&mut self) -> &InputState {
        &self.input
    }

    fn should_close(&self) -> bool {
        self.close
    }

    fn set_should_close(&mut self, close: bool) {
        self.close = close;
    }

    fn set_resize_handler(&mut self, handler: ResizeHandler) {
        self.resize_handler = Some(handler);
    }

    fn pump_events(&mut self) {
        self.pumps += 1;
        self.input.begin_frame();

        let now = self.pumps;
        let due: Vec<Scripted> = self
            .script
            .iter()
            .filter(|(frame, _)| *frame == now)
            .map(|(_, e)| *e)
            .collect();
        self.script.retain(|(frame, _)| *frame > now);

        for event in due {
            log::trace!("headless event after frame {now}: {event:?}");
            self.deliver(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn events_fire_on_their_frame() {
        let mut p = HeadlessPlatform::new(100, 50)
            .press_after(1, Key::Escape)
            .close_after(2);

        assert!(!p.poll_input().key_down(Key::Escape));
        p.pump_events();
        assert!(p.poll_input().key_down(Key::Escape));
        assert!(p.poll_input().key_pressed(Key::Escape));
        assert!(!p.should_close());

        p.pump_events();
        assert!(p.poll_input().key_down(Key::Escape));
        assert!(!p.poll_input().key_pressed(Key::Escape));
        assert!(p.should_close());
    }

    #[test]
    fn resize_reaches_handler_and_size() {
        let seen = Rc::new(Cell::new((0, 0)));
        let sink = Rc::clone(&seen);

        let mut p = HeadlessPlatform::new(100, 50).resize_after(1, 320, 240);
        p.set_resize_handler(Box::new(move |w, h| sink.set((w, h))));
        p.pump_events();

        assert_eq!(seen.get(), (320, 240));
        assert_eq!(p.drawable_size(), (320, 240));
    }

    #[test]
    fn release_lets_key_go() {
        let mut p = HeadlessPlatform::new(1, 1)
            .press_after(1, Key::Space)
            .release_after(2, Key::Space);
        p.pump_events();
        p.pump_events();
        assert!(!p.poll_input().key_down(Key::Space));
    }
}
