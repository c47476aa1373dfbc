//! Session teardown coordination.
//!
//! Signing out is the one global transition (authenticated → unauthenticated)
//! that concurrently dispatched actions must not race. The coordinator owns
//! an explicit three-state value; callers go through `begin` / `complete` /
//! `fail` and readers only see `is_tearing_down`. The flag is raised
//! synchronously, before any asynchronous teardown work starts, so an action
//! dispatched in the same tick already observes the teardown window.

use log::warn;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownPhase {
    Idle,
    InProgress,
    /// Teardown failed; the phase stays visible for a grace delay so the
    /// failure can be surfaced before the flag clears.
    Failing,
}

pub struct TeardownCoordinator {
    phase: Mutex<TeardownPhase>,
    failure_grace: Duration,
}

impl TeardownCoordinator {
    pub fn new(failure_grace: Duration) -> Arc<Self> {
        Arc::new(Self {
            phase: Mutex::new(TeardownPhase::Idle),
            failure_grace,
        })
    }

    pub fn phase(&self) -> TeardownPhase {
        *self.phase.lock().unwrap()
    }

    pub fn is_tearing_down(&self) -> bool {
        self.phase() != TeardownPhase::Idle
    }

    /// Raise the teardown flag. Returns `None` when a teardown is already
    /// underway; the caller must not start a second one.
    pub fn begin(self: &Arc<Self>) -> Option<TeardownTicket> {
        let mut phase = self.phase.lock().unwrap();
        if *phase != TeardownPhase::Idle {
            return None;
        }
        *phase = TeardownPhase::InProgress;
        Some(TeardownTicket {
            coordinator: Arc::clone(self),
            armed: true,
        })
    }

    fn set_phase(&self, next: TeardownPhase) {
        *self.phase.lock().unwrap() = next;
    }

    fn clear_failing(&self) {
        let mut phase = self.phase.lock().unwrap();
        if *phase == TeardownPhase::Failing {
            *phase = TeardownPhase::Idle;
        }
    }
}

/// Witness of an in-progress teardown. Must be resolved with `complete` or
/// `fail`; dropping it unresolved (a cancelled teardown task) lowers the
/// flag immediately so the process cannot wedge in the teardown window.
pub struct TeardownTicket {
    coordinator: Arc<TeardownCoordinator>,
    armed: bool,
}

impl TeardownTicket {
    /// Confirmed successful teardown: the flag clears at once.
    pub fn complete(mut self) {
        self.armed = false;
        self.coordinator.set_phase(TeardownPhase::Idle);
    }

    /// Confirmed failed teardown: the phase moves to `Failing` and clears
    /// after the configured grace delay.
    pub fn fail(mut self) {
        self.armed = false;
        self.coordinator.set_phase(TeardownPhase::Failing);
        let coordinator = Arc::clone(&self.coordinator);
        tokio::spawn(async move {
            tokio::time::sleep(coordinator.failure_grace).await;
            coordinator.clear_failing();
        });
    }
}

impl Drop for TeardownTicket {
    fn drop(&mut self) {
        if self.armed {
            warn!("teardown ticket dropped unresolved; lowering flag");
            self.coordinator.set_phase(TeardownPhase::Idle);
        }
    }
}
