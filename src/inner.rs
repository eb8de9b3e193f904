//! The shared cancellation state behind standalone tokens, sourced tokens and
//! their source (C2/C3's common core).
//!
//! `Inner` is the single piece of state a standalone token owns directly and
//! that a `CancellationTokenSource` shares (via `Arc`) with every token it
//! creates. It folds the slot state machine from the design doc's §4.2 into
//! two fields: a wait-free `cancelled` flag for `is_cancelled()`, and a
//! mutex-guarded slot for the handler that is registered at most once at a
//! time. See DESIGN.md for why the CANCELLING sentinel and the handshake
//! condvar from the design sketch collapse into "the slot mutex is held
//! across the callback".

use std::mem;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::handler::CancelHandler;

type Slot = Option<NonNull<dyn CancelHandler + 'static>>;

#[derive(Debug)]
pub(crate) struct Inner {
    cancelled: AtomicBool,
    slot: Mutex<Slot>,
}

impl Default for Inner {
    fn default() -> Self {
        Inner::new()
    }
}

// SAFETY: the only non-Send/Sync field is the raw pointer inside `slot`,
// which is only ever dereferenced while the mutex is held and only ever
// points at a `CancelHandler + Send` that outlives the registration (the
// wait adapters guarantee this via their RAII unregister guard).
unsafe impl Send for Inner {}
unsafe impl Sync for Inner {}

/// Erases the lifetime of a stack-resident handler so it can be stored in
/// `Inner`'s slot. Safe as long as the handler is unregistered before its
/// real lifetime ends, which every wait adapter in this crate guarantees
/// with an RAII guard.
unsafe fn erase_lifetime(h: &mut (dyn CancelHandler + '_)) -> NonNull<dyn CancelHandler + 'static> {
    let erased: *mut (dyn CancelHandler + 'static) =
        mem::transmute::<*mut dyn CancelHandler, *mut (dyn CancelHandler + 'static)>(h as *mut _);
    NonNull::new_unchecked(erased)
}

impl Inner {
    pub(crate) fn new() -> Self {
        Inner {
            cancelled: AtomicBool::new(false),
            slot: Mutex::new(None),
        }
    }

    #[inline]
    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub(crate) fn try_register(&self, handler: &mut dyn CancelHandler) -> bool {
        // Fast path: avoid the mutex entirely once cancellation has fired.
        if self.cancelled.load(Ordering::Acquire) {
            return false;
        }
        let mut slot = self.slot.lock().unwrap();
        // Re-check: cancel() may have run while we were waiting for the lock.
        if self.cancelled.load(Ordering::Acquire) {
            return false;
        }
        debug_assert!(slot.is_none(), "a handler is already registered on this token");
        *slot = Some(unsafe { erase_lifetime(handler) });
        log::debug!("handler registered");
        true
    }

    pub(crate) fn unregister(&self, handler: &mut dyn CancelHandler) {
        let handler_addr = handler as *mut dyn CancelHandler as *const ();
        let mut slot = self.slot.lock().unwrap();
        match *slot {
            Some(installed) if installed.as_ptr() as *const () == handler_addr => {
                *slot = None;
                log::debug!("handler unregistered cleanly");
            }
            Some(_) => {
                debug_assert!(false, "unregister() called with a handler that isn't the one registered");
            }
            None => {
                // cancel() got here first: it already swapped the slot to
                // empty and ran `handler.cancel()` to completion while
                // holding this same mutex, so by the time we acquired it
                // that invocation is guaranteed finished.
                drop(slot);
                handler.reset();
                log::debug!("handler unregistered after cancellation; reset() ran");
            }
        }
    }

    pub(crate) fn cancel(&self) {
        // Idempotent, and this check runs before taking the lock so that a
        // handler's own cancel() re-entering cancel() on the same source
        // (e.g. a chained/cross-source handler, or a test double-cancel)
        // can't deadlock on the mutex we might already be holding.
        if self.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut slot = self.slot.lock().unwrap();
        if let Some(mut handler) = slot.take() {
            // SAFETY: `handler` is only non-null while registered, and the
            // registering adapter guarantees it stays valid (on its stack)
            // until unregister() observes the slot empty, which can't
            // happen until we release this lock.
            unsafe { handler.as_mut().cancel() };
            log::debug!("handler cancel() invoked");
        }
    }

    /// Standalone-token-only: clears cancellation so the token can be reused.
    /// Undefined behavior (debug-asserted) if called while a handler is
    /// registered or cancel() is concurrently in flight.
    pub(crate) fn reset(&self) {
        let slot = self.slot.lock().unwrap();
        debug_assert!(slot.is_none(), "reset() called while a handler is registered");
        drop(slot);
        self.cancelled.store(false, Ordering::Release);
    }
}
