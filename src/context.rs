//! Context - cancellation and deadline carrier threaded through store calls.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::store::StoreError;

/// Carries an optional deadline and a shared cancellation flag.
///
/// Clones share the cancellation flag, so cancelling any clone cancels all of
/// them. [`Context::background`] (also `Default`) never expires and cannot be
/// cancelled.
#[derive(Debug, Clone, Default)]
pub struct Context {
    deadline: Option<Instant>,
    cancelled: Option<Arc<AtomicBool>>,
}

impl Context {
    /// Unbounded, non-cancellable context.
    pub fn background() -> Self {
        Self::default()
    }

    /// A cancellable context with no deadline.
    pub fn cancellable() -> Self {
        Self {
            deadline: None,
            cancelled: Some(Arc::new(AtomicBool::new(false))),
        }
    }

    /// Derive a context that expires `timeout` from now.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derive a context that expires at `deadline`, keeping the earlier
    /// deadline when one is already set.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(existing) if existing < deadline => existing,
            _ => deadline,
        };
        Self {
            deadline: Some(deadline),
            cancelled: self.cancelled.clone(),
        }
    }

    /// Cancel this context and every clone of it. No-op on a non-cancellable context.
    pub fn cancel(&self) {
        if let Some(flag) = &self.cancelled {
            flag.store(true, Ordering::SeqCst);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
            .as_ref()
            .map(|flag| flag.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline; zero once it has passed.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Fail if the context was cancelled or its deadline has passed.
    pub fn check(&self) -> Result<(), StoreError> {
        if self.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(StoreError::DeadlineExceeded),
            _ => Ok(()),
        }
    }
}
