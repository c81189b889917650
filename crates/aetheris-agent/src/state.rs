//! Agent-wide state shared between the scheduler and the command-handling
//! task: the `emergency_stopped` flag and a shutdown request (§4.A).

use std::sync::atomic::{AtomicBool, Ordering};

/// `emergency_stopped` is exited only by `resume` or `shutdown` (§4.A). Both
/// flags are read far more often than written, so plain atomics are enough
/// — there is no compound invariant between them that needs a lock.
#[derive(Default)]
pub struct AgentState {
    emergency_stopped: AtomicBool,
    shutting_down: AtomicBool,
}

impl AgentState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_emergency_stopped(&self) -> bool {
        self.emergency_stopped.load(Ordering::SeqCst)
    }

    pub fn set_emergency_stopped(&self, value: bool) {
        self.emergency_stopped.store(value, Ordering::SeqCst);
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    pub fn request_shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_in_normal_running_state() {
        let state = AgentState::new();
        assert!(!state.is_emergency_stopped());
        assert!(!state.is_shutting_down());
    }

    #[test]
    fn emergency_stop_and_resume_round_trip() {
        let state = AgentState::new();
        state.set_emergency_stopped(true);
        assert!(state.is_emergency_stopped());
        state.set_emergency_stopped(false);
        assert!(!state.is_emergency_stopped());
    }
}
