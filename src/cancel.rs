//! Cooperative cancellation for simulation runs.
//!
//! A run checks its token before building the circuit, before each
//! Newton-Raphson iteration and at each sweep point or time step.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::{CircuitError, Result};

/// Shared flag that a caller raises to stop a run at its next checkpoint.
///
/// Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    /// Cancel automatically after this many checkpoints (test hook).
    budget: Option<Arc<AtomicUsize>>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that cancels itself once `checkpoints` checks have passed.
    pub fn with_checkpoint_budget(checkpoints: usize) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            budget: Some(Arc::new(AtomicUsize::new(checkpoints))),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Checkpoint: `Err(Cancelled)` once cancellation has been requested.
    pub fn check(&self) -> Result<()> {
        if let Some(budget) = &self.budget {
            let spent = budget
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_err();
            if spent {
                self.cancel();
            }
        }
        if self.is_cancelled() {
            Err(CircuitError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_flag() {
        let token = CancellationToken::new();
        let remote = token.clone();
        assert!(token.check().is_ok());
        remote.cancel();
        assert!(matches!(token.check(), Err(CircuitError::Cancelled)));
    }

    #[test]
    fn test_checkpoint_budget() {
        let token = CancellationToken::with_checkpoint_budget(2);
        assert!(token.check().is_ok());
        assert!(token.check().is_ok());
        assert!(token.check().is_err());
        assert!(token.is_cancelled());
    }
}
