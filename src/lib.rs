// Copyright (c) 2016 Daniel Grunwald
//
// Permission is hereby granted, free of charge, to any person obtaining a copy of this
// software and associated documentation files (the "Software"), to deal in the Software
// without restriction, including without limitation the rights to use, copy, modify, merge,
// publish, distribute, sublicense, and/or sell copies of the Software, and to permit persons
// to whom the Software is furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all copies or
// substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR IMPLIED,
// INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS FOR A PARTICULAR
// PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE
// FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR
// OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
// DEALINGS IN THE SOFTWARE.

/*!
`rethread` is a small crate providing a cooperative cancellation primitive for
multi-threaded programs: a token a canceller can trip to ask another thread to
abandon whatever blocking operation it is currently performing.

Three token flavors share one [`CancellationToken`] trait:

- [`DummyToken`] never cancels — hand it to generic code that doesn't need
  cancellation without special-casing the call site.
- [`StandaloneToken`] owns its cancellation state directly; it is not shared
  and exposes `cancel()`/`reset()` on itself.
- [`SourcedToken`] is a cheap, cloneable reference into a
  [`CancellationTokenSource`], which is the thing a canceller actually calls
  `cancel()` on. Any number of sourced tokens may observe the same source.

Cooperative code checks `token.is_cancelled()` directly, or uses the
cancellable wait adapters [`wait`] (condition variables) and
[`poll`](crate::poll::poll) (file descriptor readiness, Unix only) to block on
an underlying primitive while still being interruptible by a cancel.

```rust
use rethread::{CancellationToken, CancellationTokenSource};

fn cancellable_sum(values: &[i32], token: &impl CancellationToken) -> Result<i32, rethread::Cancelled> {
    let mut sum = 0;
    for val in values {
        token.result()?;
        sum += val;
    }
    Ok(sum)
}

let source = CancellationTokenSource::new();
source.cancel();
assert_eq!(Err(rethread::Cancelled), cancellable_sum(&[1, 2, 3], &source.create_token()));
```

Cancellation is *observed*, not returned as an error, by the wait adapters
themselves:

```rust
use rethread::{wait, CancellationTokenSource};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

let source = CancellationTokenSource::new();
let token = source.create_token();
let m = Mutex::new(());
let cv = Condvar::new();

source.cancel_after(Duration::from_millis(50));
let guard = m.lock().unwrap();
let guard = wait(&cv, guard, &token).unwrap();
drop(guard);
assert!(token.is_cancelled());
```
!*/

mod error;
mod handler;
mod inner;
#[cfg(unix)]
pub mod poll;
mod source;
mod thread;
mod token;
mod wait;

pub use error::Error;
pub use handler::CancelHandler;
pub use source::CancellationTokenSource;
pub use thread::Thread;
pub use token::{CancellationToken, Cancelled, DummyToken, SourcedToken, StandaloneToken};
pub use wait::wait;

#[cfg(unix)]
pub use poll::poll;
