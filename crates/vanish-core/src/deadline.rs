//! Commit latch between a caller that may give up and a service call that
//! may still be running.
//!
//! A blocking call cannot be cancelled from outside. Instead the caller and
//! the call race on one latch: the call claims it before its first write, the
//! caller claims it when its timeout fires. Whoever loses learns the outcome:
//!
//! ```text
//!            commit()             abandon()
//!   Open ───────────▶ Committed   Open ───────────▶ Abandoned
//!                     (caller waits for the result) (call writes nothing)
//! ```
//!
//! So a caller that reported a timeout is never followed by a write, and a
//! call that started writing always gets its result delivered.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU8, Ordering},
    },
    time::Duration,
};

use crate::{env::duration_millis, error::StorageError};

const OPEN: u8 = 0;
const COMMITTED: u8 = 1;
const ABANDONED: u8 = 2;

/// Shared latch for one request. Clones observe the same state.
#[derive(Debug, Clone)]
pub struct Deadline {
    state: Arc<AtomicU8>,
    budget_ms: u64,
}

impl Deadline {
    /// Open latch for a request allowed `budget` before it is abandoned.
    pub fn new(budget: Duration) -> Self {
        Self { state: Arc::new(AtomicU8::new(OPEN)), budget_ms: duration_millis(budget) }
    }

    /// Claim the latch for writing.
    ///
    /// Succeeds while open and on every call after a successful claim.
    ///
    /// # Errors
    ///
    /// `StorageError::Timeout` once the caller has abandoned the request.
    pub fn commit(&self) -> Result<(), StorageError> {
        match self.state.compare_exchange(OPEN, COMMITTED, Ordering::AcqRel, Ordering::Acquire) {
            Ok(_) | Err(COMMITTED) => Ok(()),
            Err(_) => Err(StorageError::Timeout { after_ms: self.budget_ms }),
        }
    }

    /// Give up on the request.
    ///
    /// Returns `false` if the call already started writing, in which case
    /// the caller must wait for its result.
    pub fn abandon(&self) -> bool {
        match self.state.compare_exchange(OPEN, ABANDONED, Ordering::AcqRel, Ordering::Acquire) {
            Ok(_) | Err(ABANDONED) => true,
            Err(_) => false,
        }
    }

    /// Budget this latch was created with, in milliseconds.
    pub fn budget_ms(&self) -> u64 {
        self.budget_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_then_abandon_keeps_the_commit() {
        let deadline = Deadline::new(Duration::from_millis(50));
        deadline.commit().unwrap();
        assert!(!deadline.abandon());
        deadline.commit().unwrap();
    }

    #[test]
    fn abandon_then_commit_times_out() {
        let deadline = Deadline::new(Duration::from_millis(50));
        assert!(deadline.abandon());
        assert!(deadline.abandon());
        assert_eq!(deadline.commit(), Err(StorageError::Timeout { after_ms: 50 }));
    }

    #[test]
    fn clones_share_state() {
        let deadline = Deadline::new(Duration::from_secs(1));
        let caller = deadline.clone();
        assert!(caller.abandon());
        assert!(deadline.commit().is_err());
        assert_eq!(deadline.budget_ms(), 1000);
    }
}
