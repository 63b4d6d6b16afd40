//! Cooperative cancellation
//!
//! One token is created per operation and threaded through every helper.
//! Loops call [`CancellationToken::check`] at iteration boundaries and the
//! explicit delays go through [`CancellationToken::sleep`], so a cancel
//! request is observed within one poll interval.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{ProfileError, ProfileResult};

const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// Shared cancel flag; clones observe the same flag
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Fail with [`ProfileError::Cancelled`] if cancellation was requested
    pub fn check(&self) -> ProfileResult<()> {
        if self.is_cancelled() {
            Err(ProfileError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Sleep for `duration`, waking early when cancelled
    pub fn sleep(&self, duration: Duration) -> ProfileResult<()> {
        let deadline = Instant::now() + duration;
        loop {
            self.check()?;
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            thread::sleep(SLEEP_SLICE.min(deadline - now));
        }
    }
}
