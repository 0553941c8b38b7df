//! Cooperative cancellation for long-running passes.

use crate::error::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Frame-index mask at which long loops poll for cancellation and report
/// progress. The resulting cadence is one poll per 0x3000 (12288) frames,
/// roughly 0.25 seconds of audio at 48 kHz.
pub const POLL_MASK: usize = 0x2fff;

/// Handle by which a running transcode can be asked to stop.
///
/// Clones share the same flag. Every long-running loop polls the token at
/// the [`POLL_MASK`] cadence and unwinds with [`Error::Cancelled`] once it
/// has been tripped.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a new, untripped token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Trip the token. All holders observe the cancellation at their next poll.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Check whether the token has been tripped.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Return [`Error::Cancelled`] if the token has been tripped.
    pub fn bail(&self) -> Result<()> {
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
    fn test_fresh_token_is_not_cancelled() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        assert!(token.bail().is_ok());
    }

    #[test]
    fn test_cancel_propagates_to_clones() {
        let token = CancelToken::new();
        let clone = token.clone();

        token.cancel();

        assert!(clone.is_cancelled());
        assert!(matches!(clone.bail(), Err(Error::Cancelled)));
    }

    #[test]
    fn test_poll_mask_matches_interval() {
        // One poll per 0x3000 frames
        assert_eq!(POLL_MASK + 1, 0x3000);
        assert_eq!(0x3000 & POLL_MASK, 0);
        assert_ne!(0x2fff & POLL_MASK, 0);
    }
}
