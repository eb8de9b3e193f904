//! The cancellation token source (C3): owns the shared cancellation state
//! and hands out [`SourcedToken`]s that observe it.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::inner::Inner;
use crate::token::SourcedToken;

/// Owns a piece of cancellation state and can hand out any number of
/// [`SourcedToken`]s that observe it.
///
/// Dropping a source cancels it (if not already cancelled) before releasing
/// its share of the underlying state; any sourced token still alive keeps
/// that state alive and continues to observe it as cancelled. Destroying a
/// source while code elsewhere still expects to *register* a new handler on
/// one of its tokens is the caller's responsibility to avoid — see
/// SPEC_FULL.md §3 ("Lifecycle").
#[derive(Debug)]
pub struct CancellationTokenSource {
    inner: Arc<Inner>,
}

impl CancellationTokenSource {
    /// Creates a new, non-cancelled source.
    pub fn new() -> Self {
        CancellationTokenSource { inner: Arc::new(Inner::new()) }
    }

    /// Creates a new token that observes this source's cancellation state.
    /// Cheap: clones the shared `Arc`, does not register anything.
    pub fn create_token(&self) -> SourcedToken {
        SourcedToken { inner: self.inner.clone() }
    }

    /// Returns whether this source has been cancelled. Wait-free.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    /// Marks the source (and every token created from it) as cancelled.
    ///
    /// Invokes the `cancel()` of any handler currently registered on any
    /// token drawn from this source, and does not return until that
    /// invocation has completed. Idempotent: calling this more than once, or
    /// concurrently from multiple threads, has the same observable effect as
    /// calling it once.
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    /// Spawns a detached thread that sleeps for `dur` and then cancels this
    /// source. Convenient for tests and for composing a timeout around a
    /// cancellable wait.
    pub fn cancel_after(&self, dur: Duration) {
        let inner = self.inner.clone();
        thread::spawn(move || {
            thread::sleep(dur);
            inner.cancel();
        });
    }
}

impl Default for CancellationTokenSource {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CancellationTokenSource {
    fn drop(&mut self) {
        // cancel()'s critical section around the handler callback means
        // that by the time it returns here, no handler invocation from this
        // source's own `cancel()` is still in flight; there is nothing
        // further to wait for.
        self.inner.cancel();
    }
}
