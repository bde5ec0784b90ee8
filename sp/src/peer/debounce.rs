//! Debounce - collapse rapid repeated edits into one

use std::time::Duration;

use tokio::time::Instant;

/// Cancel-and-replace single-shot debouncer
///
/// Each observation replaces the pending value and pushes the deadline out
/// by the quiet window, so a burst of per-keystroke events collapses into
/// one emission per pause in typing.
#[derive(Debug)]
pub struct Debouncer {
    quiet: Duration,
    pending: Option<String>,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            pending: None,
            deadline: None,
        }
    }

    /// Record an observation, resetting the pending deadline
    pub fn observe(&mut self, text: String) {
        self.pending = Some(text);
        self.deadline = Some(Instant::now() + self.quiet);
    }

    /// Deadline of the pending emission, if one is armed
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Take the pending value and disarm
    pub fn fire(&mut self) -> Option<String> {
        self.deadline = None;
        self.pending.take()
    }

    /// Drop any pending value without emitting
    pub fn cancel(&mut self) {
        self.pending = None;
        self.deadline = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_disarmed() {
        let mut debouncer = Debouncer::new(Duration::from_millis(80));
        assert!(!debouncer.is_armed());
        assert!(debouncer.deadline().is_none());
        assert!(debouncer.fire().is_none());
    }

    #[test]
    fn test_observe_replaces_pending_value() {
        let mut debouncer = Debouncer::new(Duration::from_millis(80));
        debouncer.observe("h".to_string());
        debouncer.observe("he".to_string());
        debouncer.observe("hel".to_string());

        assert_eq!(debouncer.fire(), Some("hel".to_string()));
        assert!(!debouncer.is_armed());
    }

    #[test]
    fn test_observe_pushes_deadline_forward() {
        let mut debouncer = Debouncer::new(Duration::from_millis(80));
        debouncer.observe("a".to_string());
        let first = debouncer.deadline().unwrap();

        std::thread::sleep(Duration::from_millis(5));
        debouncer.observe("ab".to_string());
        let second = debouncer.deadline().unwrap();

        assert!(second > first);
    }

    #[test]
    fn test_fire_drains_once() {
        let mut debouncer = Debouncer::new(Duration::from_millis(80));
        debouncer.observe("text".to_string());

        assert_eq!(debouncer.fire(), Some("text".to_string()));
        assert!(debouncer.fire().is_none());
    }

    #[test]
    fn test_cancel_discards_pending() {
        let mut debouncer = Debouncer::new(Duration::from_millis(80));
        debouncer.observe("text".to_string());
        debouncer.cancel();

        assert!(!debouncer.is_armed());
        assert!(debouncer.fire().is_none());
    }
}
