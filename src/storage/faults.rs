use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::core::{Result, TransportError};

#[derive(Debug, Default)]
struct FaultState {
    queued: VecDeque<TransportError>,
    persistent: Option<TransportError>,
    calls: u64,
}

/// Deterministic transport failures for the in-memory store.
///
/// Every call a memory handle receives first consults the injector: a queued
/// error is raised once and dropped, a persistent one is raised on every call
/// until cleared. Clones share state, so an injector obtained from a client
/// controls every database, collection and bulk builder spawned from it.
#[derive(Debug, Clone, Default)]
pub struct FaultInjector {
    state: Arc<Mutex<FaultState>>,
}

impl FaultInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise `error` on the next call only
    pub fn fail_next(&self, error: TransportError) {
        self.lock().queued.push_back(error);
    }

    /// Raise `error` on each of the next `times` calls
    pub fn fail_times(&self, times: usize, error: TransportError) {
        let mut state = self.lock();
        for _ in 0..times {
            state.queued.push_back(error.clone());
        }
    }

    /// Raise `error` on every call until [`FaultInjector::clear`]
    pub fn fail_always(&self, error: TransportError) {
        self.lock().persistent = Some(error);
    }

    pub fn clear(&self) {
        let mut state = self.lock();
        state.queued.clear();
        state.persistent = None;
    }

    /// Calls observed so far, failed ones included
    pub fn calls(&self) -> u64 {
        self.lock().calls
    }

    pub fn reset_calls(&self) {
        self.lock().calls = 0;
    }

    pub(crate) fn check(&self, operation: &str) -> Result<()> {
        let mut state = self.state.lock()?;
        state.calls += 1;

        let fault = match state.queued.pop_front() {
            Some(error) => Some(error),
            None => state.persistent.clone(),
        };
        match fault {
            Some(error) => {
                debug!(operation, %error, "injecting transport fault");
                Err(error.into())
            }
            None => Ok(()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FaultState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
