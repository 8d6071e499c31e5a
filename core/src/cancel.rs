//! A cooperative cancellation flag for long-running operations
//! (`removeDataByApplication` over many resources, `storeResources` with
//! large graphs), checked between sub-steps per §5's cancellation contract.
//! Honouring it returns [`crate::errors::Error::Cancelled`] without
//! attempting any further statement changes; sub-steps already applied
//! before the check are not retroactively undone, matching the rest of the
//! mutation model's validate-then-apply granularity (see the atomicity note
//! at the top of `model.rs`).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::errors::{Error, Result};

/// Cheaply cloneable cooperative cancellation flag. Clones share the same
/// underlying flag, so cancelling one clone cancels every handle to the
/// same operation.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        CancellationToken(Arc::new(AtomicBool::new(false)))
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Returns `Err(Error::Cancelled)` if cancellation was requested, `Ok(())` otherwise.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_token_never_reports_cancelled() {
        let token = CancellationToken::new();
        assert!(token.check().is_ok());
    }

    #[test]
    fn cancelling_a_clone_is_visible_through_the_original() {
        let token = CancellationToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
        assert!(matches!(token.check(), Err(Error::Cancelled)));
    }
}
