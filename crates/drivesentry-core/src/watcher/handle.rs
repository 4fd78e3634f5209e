//! Cross-thread view of a watcher: the shutdown flag and lifecycle state.
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

/// Lifecycle of a watcher.
///
/// `Idle → Subscribed → Polling → Subscribed → … → ShuttingDown → Stopped`.
/// A failed subscription goes straight from `Idle` to `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WatcherState {
    Idle = 0,
    Subscribed = 1,
    Polling = 2,
    ShuttingDown = 3,
    Stopped = 4,
}

impl WatcherState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Idle,
            1 => Self::Subscribed,
            2 => Self::Polling,
            3 => Self::ShuttingDown,
            _ => Self::Stopped,
        }
    }
}

#[derive(Debug)]
pub(crate) struct Shared {
    shutdown: AtomicBool,
    state: AtomicU8,
}

impl Shared {
    pub(crate) fn new() -> Self {
        Self {
            shutdown: AtomicBool::new(false),
            state: AtomicU8::new(WatcherState::Idle as u8),
        }
    }

    pub(crate) fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    pub(crate) fn state(&self) -> WatcherState {
        WatcherState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn set_state(&self, state: WatcherState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

/// Cloneable handle used to stop a watcher from another thread and to
/// observe its lifecycle.
///
/// Call [`WatcherHandle::destroy`] to request shutdown. The watcher checks
/// the flag once per loop iteration, so it reaches
/// [`WatcherState::Stopped`] within one poll timeout.
#[derive(Debug, Clone)]
pub struct WatcherHandle {
    name: Arc<str>,
    pub(crate) shared: Arc<Shared>,
}

impl WatcherHandle {
    pub(crate) fn new(name: Arc<str>, shared: Arc<Shared>) -> Self {
        Self { name, shared }
    }

    /// Request shutdown. Non-blocking and idempotent.
    pub fn destroy(&self) {
        self.shared.shutdown.store(true, Ordering::Release);
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shared.shutdown_requested()
    }

    pub fn state(&self) -> WatcherState {
        self.shared.state()
    }

    pub fn is_stopped(&self) -> bool {
        self.state() == WatcherState::Stopped
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_round_trips_through_atomic() {
        let shared = Shared::new();
        for state in [
            WatcherState::Idle,
            WatcherState::Subscribed,
            WatcherState::Polling,
            WatcherState::ShuttingDown,
            WatcherState::Stopped,
        ] {
            shared.set_state(state);
            assert_eq!(shared.state(), state);
        }
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let handle = WatcherHandle::new(Arc::from("logical-disk/create"), Arc::new(Shared::new()));
        assert!(!handle.is_shutdown_requested());
        handle.destroy();
        handle.destroy();
        assert!(handle.is_shutdown_requested());
        assert_eq!(handle.state(), WatcherState::Idle);
    }
}
