//! The managed worker thread (C5): owns a private
//! [`CancellationTokenSource`] bound to the thread body, and cancels-then-joins
//! on reset/drop.

use std::panic;
use std::thread::JoinHandle;

use crate::source::CancellationTokenSource;
use crate::token::SourcedToken;

/// An OS thread whose body receives a [`SourcedToken`] drawn from a private
/// [`CancellationTokenSource`] that this `Thread` owns.
///
/// Calling [`reset`](Thread::reset), or simply dropping the `Thread`,
/// cancels the source and then joins the worker — in that fixed order, so
/// the worker has a chance to observe cancellation and exit cooperatively
/// before the caller blocks waiting for it. Both operations are idempotent:
/// resetting (or dropping) an already-joined `Thread` is a no-op beyond a
/// redundant (and harmless) `cancel()`.
pub struct Thread {
    source: CancellationTokenSource,
    handle: Option<JoinHandle<()>>,
}

impl Thread {
    /// Spawns `body` on a new OS thread, passing it a token bound to a fresh
    /// private source.
    pub fn new<F>(body: F) -> Self
    where
        F: FnOnce(&SourcedToken) + Send + 'static,
    {
        let source = CancellationTokenSource::new();
        let token = source.create_token();
        let handle = std::thread::Builder::new()
            .spawn(move || body(&token))
            .expect("failed to spawn OS thread");
        Thread { source, handle: Some(handle) }
    }

    /// Returns whether the worker thread has not yet been joined.
    pub fn joinable(&self) -> bool {
        self.handle.is_some()
    }

    /// Returns whether this thread's source has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.source.is_cancelled()
    }

    /// Cancels the private source, then joins the worker thread.
    ///
    /// If the worker panicked, the panic is re-raised on the calling thread
    /// via [`std::panic::resume_unwind`] — a managed thread never silently
    /// swallows a worker panic, the idiomatic Rust translation of "an
    /// unhandled exception in a thread is fatal".
    pub fn reset(&mut self) {
        self.source.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(payload) = handle.join() {
                panic::resume_unwind(payload);
            }
        }
    }
}

impl Drop for Thread {
    fn drop(&mut self) {
        self.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CancellationToken as _;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn worker_observes_cancellation_and_exits() {
        let started = Arc::new(AtomicBool::new(false));
        let finished = Arc::new(AtomicBool::new(false));
        let started2 = started.clone();
        let finished2 = finished.clone();

        let mut worker = Thread::new(move |token| {
            started2.store(true, Ordering::SeqCst);
            while !token.is_cancelled() {
                std::thread::sleep(Duration::from_millis(1));
            }
            finished2.store(true, Ordering::SeqCst);
        });

        std::thread::sleep(Duration::from_millis(20));
        assert!(started.load(Ordering::SeqCst));
        assert!(worker.joinable());
        assert!(!finished.load(Ordering::SeqCst));

        worker.reset();
        assert!(finished.load(Ordering::SeqCst));
        assert!(!worker.joinable());
    }

    #[test]
    fn double_reset_is_a_noop() {
        let mut worker = Thread::new(|_token| {});
        worker.reset();
        worker.reset();
        assert!(!worker.joinable());
    }

    #[test]
    fn drop_cancels_and_joins() {
        let finished = Arc::new(AtomicBool::new(false));
        let finished2 = finished.clone();
        {
            let _worker = Thread::new(move |token| {
                while !token.is_cancelled() {
                    std::thread::sleep(Duration::from_millis(1));
                }
                finished2.store(true, Ordering::SeqCst);
            });
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(finished.load(Ordering::SeqCst));
    }

    #[test]
    #[should_panic(expected = "worker blew up")]
    fn worker_panic_propagates_on_reset() {
        let mut worker = Thread::new(|_token| {
            panic!("worker blew up");
        });
        std::thread::sleep(Duration::from_millis(10));
        worker.reset();
    }
}
