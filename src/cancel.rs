//! Cooperative cancellation
//!
//! Every public engine operation accepts a `CancelToken` and checks it at
//! suspension points: between projects during compilation, between files
//! during call-graph construction, and around cache IO. Cancellation
//! terminates the operation with `EngineError::Canceled`; partial cache
//! entries never persist because all writes go through temp-then-rename.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{EngineError, Result};

/// Clonable cancellation handle
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; observed at the next suspension point
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Bail out with `Canceled` if cancellation was requested
    pub fn check(&self) -> Result<()> {
        if self.is_canceled() {
            Err(EngineError::Canceled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_propagates_to_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(token.check().is_ok());

        clone.cancel();
        assert!(token.is_canceled());
        assert!(matches!(token.check(), Err(EngineError::Canceled)));
    }
}
