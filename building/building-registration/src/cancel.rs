//! Cooperative cancellation for long-running registrations.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag checked once per ICP iteration.
///
/// Clones share the same flag, so one clone can be handed to the thread
/// running the registration while another stays with the caller.
///
/// # Example
///
/// ```
/// use building_registration::CancellationToken;
///
/// let token = CancellationToken::new();
/// let worker_copy = token.clone();
///
/// assert!(!worker_copy.is_cancelled());
/// token.cancel();
/// assert!(worker_copy.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}
