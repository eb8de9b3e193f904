//! The cancellation handler interface (C1).
//!
//! A handler is a short-lived, stack-resident callable that a wait adapter
//! installs on a token for the duration of one blocking call. The token's
//! canceller invokes `cancel()` to unblock whatever primitive the waiter is
//! sitting on; the waiter invokes `reset()` on its own thread afterwards to
//! undo any observable side effect, but only along the path where
//! cancellation actually fired.

/// A callback installed on a [`CancellationToken`](crate::CancellationToken)
/// while a thread is inside a cancellable blocking call.
///
/// Implementations must be non-blocking and idempotent: `cancel` may run on
/// an arbitrary thread (the canceller's), at most once per registration, and
/// must not itself block or panic.
pub trait CancelHandler: Send {
    /// Unblocks the primitive this handler is guarding. Called at most once,
    /// from the thread that calls `cancel()` on the token's source.
    fn cancel(&mut self);

    /// Undoes any side effect `cancel()` made observable (e.g. draining a
    /// self-pipe byte). Called at most once, only when `cancel()` actually
    /// ran before `unregister()` observed it, and always on the waiter's own
    /// thread. Most handlers have nothing to undo.
    fn reset(&mut self) {}
}

/// RAII guard shared by the wait adapters: unregisters a handler on drop, on
/// every exit path (normal return, `?`, panic unwind), so the scoped
/// acquire/release discipline around a registration can't be skipped by
/// accident.
pub(crate) struct UnregisterGuard<'t, 'h, T: crate::token::CancellationToken + ?Sized> {
    pub(crate) token: &'t T,
    pub(crate) handler: &'h mut dyn CancelHandler,
}

impl<T: crate::token::CancellationToken + ?Sized> Drop for UnregisterGuard<'_, '_, T> {
    fn drop(&mut self) {
        self.token.unregister(self.handler);
    }
}
