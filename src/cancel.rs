use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cooperative cancellation flag shared by every branch of one session.
///
/// Cloning is cheap and every clone observes the same flag. The transition is
/// monotonic: once [`cancel()`](CancelToken::cancel) has been called the token
/// stays canceled for the rest of its life, so concurrent reads need no
/// locking.
///
/// Cancellation is cooperative, not preemptive — the walk only reacts at its
/// checkpoints, so a directory listing already in flight runs to completion.
///
/// # Example
///
/// ```rust,ignore
/// let token = CancelToken::new();
/// let session = parfind::search()
///     .root("/data")
///     .cancel_token(token.clone())
///     .build()?;
///
/// // From another thread, at any point:
/// token.cancel();
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    canceled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Irreversible; calling it again is a no-op.
    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::Relaxed);
    }

    /// Non-blocking O(1) read of the flag.
    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::Relaxed)
    }
}
