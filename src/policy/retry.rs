use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::args::CallArgs;
use crate::core::{Result, ScopeError};
use crate::proxy::{Method, OverrideFn, OverrideTable, Target, override_fn};

/// How long a call keeps being retried before giving up.
pub const DEFAULT_RETRY_BUDGET: Duration = Duration::from_secs(30);

/// Monotonic time source for the retry budget.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Time elapsed since an arbitrary fixed origin.
    fn now(&self) -> Duration;
}

#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Clock that only moves when told to; for simulated time.
#[derive(Debug, Default)]
pub struct ManualClock {
    nanos: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.nanos.fetch_add(by.as_nanos() as u64, Ordering::SeqCst);
    }

    pub fn set(&self, at: Duration) {
        self.nanos.store(at.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }
}

/// States of one retried call. Everything except `Attempting` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    Attempting,
    Succeeded,
    TimedOut,
    FailedFatal,
}

impl RetryState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RetryState::Attempting)
    }
}

/// Retries a call on transient transport errors until a time budget runs out.
///
/// There is no backoff between attempts. The clock is read once at entry and
/// the budget is checked before every attempt; an attempt that has started is
/// never interrupted.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    budget: Duration,
    clock: Arc<dyn Clock>,
}

impl RetryPolicy {
    pub fn new(budget: Duration) -> Self {
        Self {
            budget,
            clock: Arc::new(SystemClock::new()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    pub fn run<T>(&self, operation: &str, mut attempt: impl FnMut() -> Result<T>) -> Result<T> {
        let start = self.clock.now();
        let mut attempts: u32 = 0;

        let (state, outcome) = loop {
            let elapsed = self.clock.now().saturating_sub(start);
            if elapsed > self.budget {
                break (
                    RetryState::TimedOut,
                    Err(ScopeError::TimeoutExceeded {
                        elapsed,
                        budget: self.budget,
                    }),
                );
            }

            attempts += 1;
            match attempt() {
                Ok(value) => break (RetryState::Succeeded, Ok(value)),
                Err(err) if err.is_transient() => {
                    warn!(operation, attempt = attempts, error = %err, "transient transport error, retrying");
                }
                Err(err) => break (RetryState::FailedFatal, Err(err)),
            }
        };

        debug!(operation, ?state, attempts, "retry loop finished");
        outcome
    }

    /// This policy as a global hook for a proxy.
    pub fn hook<M: Method>(&self) -> OverrideFn<M> {
        let policy = self.clone();
        override_fn(move |target: &Target<'_, M>, _table: &OverrideTable<M>, args: CallArgs| {
            policy.run(target.name(), || target.call(args.clone()))
        })
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_BUDGET)
    }
}
