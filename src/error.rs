//! The one error taxonomy this crate can surface (SPEC_FULL.md §7):
//! failures of the OS primitives the descriptor-poll adapter consumes.
//! Cancellation itself is never represented here — see [`crate::Cancelled`]
//! for the separate, opt-in cooperative-check helper.

use std::io;

/// An OS primitive failed while this crate was using it.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Creating or configuring the per-thread self-pipe failed.
    #[error("failed to set up self-pipe: {0}")]
    SelfPipeSetup(#[source] io::Error),

    /// `poll(2)` itself failed (interruptions are retried internally and
    /// never surface here).
    #[error("poll(2) failed: {0}")]
    Poll(#[source] io::Error),
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::SelfPipeSetup(e) | Error::Poll(e) => e,
        }
    }
}
