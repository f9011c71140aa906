//! Load-shedding concurrency limiter: a named policy plus a move-only guard
//! that releases its permit exactly once, however it's dropped or moved.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LimitConfigError {
    #[error("max_concurrent must be at least 1")]
    MaxConcurrentZero,
}

/// `(max_concurrent >= 1, policy name)`. Construction fails closed: a policy
/// with `max_concurrent == 0` is a configuration error the process should
/// surface before it starts serving.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadShedderPolicy {
    name: String,
    max_concurrent: u64,
}

impl LoadShedderPolicy {
    pub fn new(name: impl Into<String>, max_concurrent: u64) -> Result<Self, LimitConfigError> {
        if max_concurrent == 0 {
            return Err(LimitConfigError::MaxConcurrentZero);
        }
        Ok(Self { name: name.into(), max_concurrent })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_concurrent(&self) -> u64 {
        self.max_concurrent
    }
}

/// Scoped concurrency permit. `acquire` increments the in-flight counter;
/// the guard decrements it exactly once on drop, regardless of how many
/// times it is moved, and a self-move through [`std::mem::swap`]-style
/// patterns leaves the invariant intact because a guard that is moved *into*
/// never also runs its own destructor before the move completes.
#[derive(Debug)]
pub struct LoadShedderGuard {
    in_flight: Option<Arc<AtomicU64>>,
}

impl LoadShedderGuard {
    fn new(in_flight: Arc<AtomicU64>) -> Self {
        Self { in_flight: Some(in_flight) }
    }
}

impl Drop for LoadShedderGuard {
    fn drop(&mut self) {
        if let Some(counter) = self.in_flight.take() {
            counter.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

/// Why a permit was refused. Presently there is exactly one reason, but the
/// enum leaves room for e.g. a draining state without changing the return
/// type of `acquire`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShedReason {
    Overloaded,
}

pub struct LoadShedder {
    policy: LoadShedderPolicy,
    in_flight: Arc<AtomicU64>,
}

impl LoadShedder {
    pub fn new(policy: LoadShedderPolicy) -> Self {
        Self { policy, in_flight: Arc::new(AtomicU64::new(0)) }
    }

    pub fn policy(&self) -> &LoadShedderPolicy {
        &self.policy
    }

    pub fn in_flight(&self) -> u64 {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Returns a guard if the in-flight count is currently below the limit
    /// (and increments it atomically as part of the check), else reports
    /// [`ShedReason::Overloaded`].
    pub fn acquire(&self) -> Result<LoadShedderGuard, ShedReason> {
        loop {
            let current = self.in_flight.load(Ordering::Acquire);
            if current >= self.policy.max_concurrent {
                return Err(ShedReason::Overloaded);
            }
            if self
                .in_flight
                .compare_exchange(current, current + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return Ok(LoadShedderGuard::new(Arc::clone(&self.in_flight)));
            }
        }
    }
}
