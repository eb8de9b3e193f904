//! The cancellable condition-variable wait adapter (C4.1).

use std::sync::{Condvar, LockResult, MutexGuard};

use crate::handler::{CancelHandler, UnregisterGuard};
use crate::token::CancellationToken;

/// A handler whose `cancel()` simply wakes every waiter on a `Condvar`.
///
/// Because cancellation fires while the caller's mutex is released (that's
/// native `Condvar` behavior — the lock is released for the duration of the
/// wait), this handler must not itself take any lock.
struct NotifyHandler<'cv> {
    cv: &'cv Condvar,
}

impl CancelHandler for NotifyHandler<'_> {
    fn cancel(&mut self) {
        self.cv.notify_all();
    }
}

/// Waits on `cv`, releasing `guard`'s mutex for the duration of the wait and
/// re-acquiring it before returning, exactly like [`Condvar::wait`] — except
/// that the wait is also interrupted as soon as `token` is cancelled.
///
/// If `token` is already cancelled, returns immediately without ever
/// touching `cv`. The caller distinguishes "woken by cancellation" from
/// "woken normally" (including spurious wakeups) by checking
/// `token.is_cancelled()` after this call returns — cancellation is not
/// surfaced as an error here, matching every other non-cancellation wakeup
/// path of a condition variable.
///
/// Mutex poisoning from the underlying `Condvar::wait` call is propagated
/// via the returned `LockResult`, the same as calling `Condvar::wait`
/// directly would.
pub fn wait<'a, T, G>(
    cv: &Condvar,
    guard: MutexGuard<'a, G>,
    token: &T,
) -> LockResult<MutexGuard<'a, G>>
where
    T: CancellationToken,
{
    if token.is_cancelled() {
        return Ok(guard);
    }

    let mut handler = NotifyHandler { cv };
    if !token.try_register(&mut handler) {
        return Ok(guard);
    }
    let _unregister = UnregisterGuard { token, handler: &mut handler };

    cv.wait(guard)
}

/// Like [`wait`], but propagates mutex poisoning from `Condvar::wait` by
/// simply unwrapping the recovered guard, for callers that treat poisoning
/// as unrecoverable (the common case in this crate's own tests).
pub fn wait_unwrap_poison<'a, T, G>(cv: &Condvar, guard: MutexGuard<'a, G>, token: &T) -> MutexGuard<'a, G>
where
    T: CancellationToken,
{
    match wait(cv, guard, token) {
        Ok(guard) => guard,
        Err(_poisoned) => panic!("mutex poisoned during cancellable wait"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CancellationTokenSource, DummyToken, StandaloneToken};
    use std::sync::Mutex;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn returns_immediately_when_already_cancelled() {
        let token = StandaloneToken::new();
        token.cancel();
        let m = Mutex::new(0);
        let cv = Condvar::new();
        let guard = m.lock().unwrap();
        let guard = wait_unwrap_poison(&cv, guard, &token);
        drop(guard);
        assert!(token.is_cancelled());
    }

    #[test]
    fn dummy_token_never_wakes_spuriously_from_cancellation() {
        // With a DummyToken, only a real notify can end the wait.
        let token = DummyToken;
        let m = Mutex::new(false);
        let cv = Condvar::new();
        let m2 = &m;
        let cv2 = &cv;
        thread::scope(|s| {
            s.spawn(|| {
                thread::sleep(Duration::from_millis(20));
                *m2.lock().unwrap() = true;
                cv2.notify_all();
            });
            let mut guard = m.lock().unwrap();
            while !*guard {
                guard = wait_unwrap_poison(&cv, guard, &token);
            }
            assert!(*guard);
        });
    }

    #[test]
    fn cancel_wakes_a_blocked_waiter() {
        let source = CancellationTokenSource::new();
        let token = source.create_token();
        let m = Mutex::new(());
        let cv = Condvar::new();

        thread::scope(|s| {
            s.spawn(|| {
                thread::sleep(Duration::from_millis(20));
                source.cancel();
            });

            let guard = m.lock().unwrap();
            let guard = wait_unwrap_poison(&cv, guard, &token);
            drop(guard);
        });

        assert!(token.is_cancelled());
    }
}
