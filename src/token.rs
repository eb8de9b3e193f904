//! The cancellation token abstraction (C2): one sealed trait shared by three
//! concrete variants — [`DummyToken`], [`StandaloneToken`] and
//! [`SourcedToken`].
//!
//! Rather than the tagged union the design doc sketches for languages
//! without monomorphizing generics, the wait adapters in this crate are
//! simply generic over `T: CancellationToken`: the compiler specializes
//! `is_cancelled()` per concrete token type, so there is no vtable on the
//! hot path at all.

use std::sync::Arc;

use crate::handler::CancelHandler;
use crate::inner::Inner;

mod private {
    pub trait Sealed {}
}

/// The capability set shared by every cancellation token: dummy, standalone
/// and sourced.
///
/// This trait is sealed — it can only be implemented by the types in this
/// crate, preserving the "closed set of variants" property the design calls
/// for.
pub trait CancellationToken: private::Sealed {
    /// Returns whether this token has observed cancellation. Wait-free.
    ///
    /// This is inherently racy: it may start returning `true` at any moment
    /// as another thread cancels the underlying source. Once it returns
    /// `true` it keeps doing so, except after an explicit [`StandaloneToken::reset`].
    fn is_cancelled(&self) -> bool;

    /// Attempts to install `handler` so that a concurrent `cancel()` invokes
    /// it. Returns `false` (without installing anything) if the token is
    /// already cancelled — in that case the caller must not block.
    fn try_register(&self, handler: &mut dyn CancelHandler) -> bool;

    /// Removes `handler` from the token. On return, `handler.cancel()` will
    /// never be invoked again, and if it was already invoked it has fully
    /// returned.
    fn unregister(&self, handler: &mut dyn CancelHandler);

    /// Returns `Ok(())` if this token has not been cancelled, or
    /// `Err(Cancelled)` otherwise. A convenience wrapper around
    /// `is_cancelled()` for use with `?`.
    fn result(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Marker error returned by [`CancellationToken::result`] once a token has
/// observed cancellation.
///
/// Cancellation itself is never surfaced as an `Error` by this crate (see
/// the error handling design in SPEC_FULL.md §7); this type exists purely as
/// an ergonomic `?`-compatible wrapper around `is_cancelled()` for callers
/// who want cooperative early-return, mirroring how the condvar/poll
/// adapters let callers observe cancellation without making it fail the
/// blocking call itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cancelled;

impl std::fmt::Display for Cancelled {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("the operation was cancelled")
    }
}

impl std::error::Error for Cancelled {}

/// A token that never cancels.
///
/// Useful so generic code that accepts `T: CancellationToken` can be handed
/// "cancellation doesn't apply here" without special-casing an `Option` or a
/// separate code path.
#[derive(Clone, Copy, Debug, Default)]
pub struct DummyToken;

impl private::Sealed for DummyToken {}

impl CancellationToken for DummyToken {
    #[inline]
    fn is_cancelled(&self) -> bool {
        false
    }

    #[inline]
    fn try_register(&self, _handler: &mut dyn CancelHandler) -> bool {
        true
    }

    #[inline]
    fn unregister(&self, _handler: &mut dyn CancelHandler) {}
}

/// A token that owns its cancellation state directly.
///
/// A standalone token has exactly one holder (it is not `Clone`): its
/// lifetime is the holder's. Unlike a [`SourcedToken`], it additionally
/// exposes [`cancel`](StandaloneToken::cancel) and
/// [`reset`](StandaloneToken::reset) on itself, making it handy for tests and
/// for single-owner call sites that don't need a separate
/// [`CancellationTokenSource`](crate::CancellationTokenSource).
#[derive(Debug, Default)]
pub struct StandaloneToken {
    pub(crate) inner: Inner,
}

impl private::Sealed for StandaloneToken {}

impl StandaloneToken {
    /// Creates a new, non-cancelled standalone token.
    pub fn new() -> Self {
        StandaloneToken { inner: Inner::new() }
    }

    /// Marks this token as cancelled. Idempotent.
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    /// Clears cancellation so the token can be reused.
    ///
    /// Only valid when no waiter is currently registered; violating this is
    /// a contract violation (debug-asserted, unspecified in release), not a
    /// memory safety issue.
    pub fn reset(&self) {
        self.inner.reset();
    }
}

impl CancellationToken for StandaloneToken {
    #[inline]
    fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    fn try_register(&self, handler: &mut dyn CancelHandler) -> bool {
        self.inner.try_register(handler)
    }

    fn unregister(&self, handler: &mut dyn CancelHandler) {
        self.inner.unregister(handler)
    }
}

/// A lightweight, cloneable reference into a
/// [`CancellationTokenSource`](crate::CancellationTokenSource).
///
/// Any number of sourced tokens may coexist, all observing the same
/// cancellation state; the source must outlive every token created from it
/// (enforced here by the shared `Arc`, which keeps the state alive for as
/// long as any token referencing it is alive — dropping the source object
/// itself only drops the source's *handle*, not the shared state, so this is
/// stricter than the abstract contract requires).
#[derive(Clone, Debug)]
pub struct SourcedToken {
    pub(crate) inner: Arc<Inner>,
}

impl private::Sealed for SourcedToken {}

impl CancellationToken for SourcedToken {
    #[inline]
    fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    fn try_register(&self, handler: &mut dyn CancelHandler) -> bool {
        self.inner.try_register(handler)
    }

    fn unregister(&self, handler: &mut dyn CancelHandler) {
        self.inner.unregister(handler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CancellationTokenSource;

    struct CountingHandler<'a> {
        cancels: &'a std::sync::atomic::AtomicUsize,
        resets: &'a std::sync::atomic::AtomicUsize,
    }

    impl CancelHandler for CountingHandler<'_> {
        fn cancel(&mut self) {
            self.cancels.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }

        fn reset(&mut self) {
            self.resets.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }
    }

    #[test]
    fn dummy_never_cancels() {
        let token = DummyToken;
        assert!(!token.is_cancelled());
        assert_eq!(Ok(()), token.result());
    }

    #[test]
    fn dummy_register_is_noop_success() {
        let token = DummyToken;
        let cancels = std::sync::atomic::AtomicUsize::new(0);
        let resets = std::sync::atomic::AtomicUsize::new(0);
        let mut handler = CountingHandler { cancels: &cancels, resets: &resets };
        assert!(token.try_register(&mut handler));
        token.unregister(&mut handler);
        assert_eq!(0, cancels.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[test]
    fn standalone_cancel_and_reset() {
        let token = StandaloneToken::new();
        assert!(!token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
        assert_eq!(Err(Cancelled), token.result());
        // cancel() again is a no-op, not a panic
        token.cancel();
        token.reset();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn register_fails_once_cancelled() {
        let token = StandaloneToken::new();
        token.cancel();
        let cancels = std::sync::atomic::AtomicUsize::new(0);
        let resets = std::sync::atomic::AtomicUsize::new(0);
        let mut handler = CountingHandler { cancels: &cancels, resets: &resets };
        assert!(!token.try_register(&mut handler));
        assert_eq!(0, cancels.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[test]
    fn cancel_invokes_registered_handler_exactly_once() {
        let token = StandaloneToken::new();
        let cancels = std::sync::atomic::AtomicUsize::new(0);
        let resets = std::sync::atomic::AtomicUsize::new(0);
        let mut handler = CountingHandler { cancels: &cancels, resets: &resets };
        assert!(token.try_register(&mut handler));
        token.cancel();
        assert_eq!(1, cancels.load(std::sync::atomic::Ordering::SeqCst));
        token.unregister(&mut handler);
        assert_eq!(1, resets.load(std::sync::atomic::Ordering::SeqCst));
        // a second cancel must not invoke the handler again
        token.cancel();
        assert_eq!(1, cancels.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[test]
    fn clean_unregister_skips_reset() {
        let token = StandaloneToken::new();
        let cancels = std::sync::atomic::AtomicUsize::new(0);
        let resets = std::sync::atomic::AtomicUsize::new(0);
        let mut handler = CountingHandler { cancels: &cancels, resets: &resets };
        assert!(token.try_register(&mut handler));
        token.unregister(&mut handler);
        assert_eq!(0, cancels.load(std::sync::atomic::Ordering::SeqCst));
        assert_eq!(0, resets.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[test]
    fn sourced_tokens_share_state() {
        let source = CancellationTokenSource::new();
        let a = source.create_token();
        let b = source.create_token();
        assert!(!a.is_cancelled());
        assert!(!b.is_cancelled());
        source.cancel();
        assert!(a.is_cancelled());
        assert!(b.is_cancelled());
    }
}
