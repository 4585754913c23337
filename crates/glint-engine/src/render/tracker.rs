use std::cell::Cell;
use std::rc::Rc;

/// Latest drawable size reported by the platform, not yet applied.
///
/// Cloned into the platform's resize handler; the loop takes the pending size
/// before each clear. Only the newest size is kept.
#[derive(Debug, Clone, Default)]
pub struct ViewportTracker {
    pending: Rc<Cell<Option<(u32, u32)>>>,
}

impl ViewportTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notify(&self, width: u32, height: u32) {
        self.pending.set(Some((width, height)));
    }

    pub fn take(&self) -> Option<(u32, u32)> {
        self.pending.take()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.get().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_only_latest_size() {
        let tracker = ViewportTracker::new();
        let handler = tracker.clone();
        handler.notify(10, 10);
        handler.notify(20, 30);

        assert!(tracker.is_pending());
        assert_eq!(tracker.take(), Some((20, 30)));
        assert_eq!(tracker.take(), None);
    }
}
