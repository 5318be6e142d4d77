//! Module retrieval
//!
//! A [`Fetcher`] starts a retrieval and completes it later, from any thread,
//! through the [`FetchCompletion`] it was handed. [`BlockingFetch`] turns that
//! into a call that returns once the retrieval concluded or timed out, which
//! is what the VM's synchronous module loader needs.
//!
//! Every retrieval gets its own completion channel, so any number of
//! retrievals (from one VM or many) can be in flight at once.

mod blocking;
#[cfg(feature = "import-fetch")]
mod dir;
#[cfg(feature = "http")]
mod http;

pub use blocking::{BlockingFetch, FetchStats, FetchStatsSnapshot, YieldHook};
#[cfg(feature = "import-fetch")]
pub use dir::DirFetcher;
#[cfg(feature = "http")]
pub use http::HttpFetcher;

use crossbeam::channel::{self, Receiver, Sender};

use crate::error::FetchFailure;

pub(crate) type FetchOutcome = Result<Vec<u8>, FetchFailure>;

/// Starts retrievals.
pub trait Fetcher: Send + Sync {
    /// Begin retrieving `path`.
    ///
    /// Must return promptly. The result is delivered later by firing
    /// `completion`; dropping it unfired tells the waiting side that the
    /// retrieval was abandoned.
    fn start(&self, path: &str, completion: FetchCompletion) -> Box<dyn Transfer>;
}

/// Native resources held by one in-flight retrieval.
///
/// Closed by the blocking bridge before it returns, whatever the outcome.
pub trait Transfer: Send {
    /// Release the transfer. A retrieval still running after this may finish
    /// but its result is discarded.
    fn close(self: Box<Self>);
}

/// Transfer with nothing to release.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTransfer;

impl Transfer for NoTransfer {
    fn close(self: Box<Self>) {}
}

/// One-shot completion token for a single retrieval.
#[derive(Debug)]
pub struct FetchCompletion {
    tx: Sender<FetchOutcome>,
}

impl FetchCompletion {
    pub(crate) fn channel() -> (FetchCompletion, Receiver<FetchOutcome>) {
        let (tx, rx) = channel::bounded(1);
        (FetchCompletion { tx }, rx)
    }

    /// Deliver the retrieved payload
    pub fn succeed(self, payload: Vec<u8>) {
        self.deliver(Ok(payload));
    }

    /// Deliver a failure
    pub fn fail(self, failure: FetchFailure) {
        self.deliver(Err(failure));
    }

    /// Deliver either outcome
    pub fn complete(self, outcome: Result<Vec<u8>, FetchFailure>) {
        self.deliver(outcome);
    }

    fn deliver(self, outcome: FetchOutcome) {
        // The waiter may have timed out and gone away; the result is then dropped.
        let _ = self.tx.try_send(outcome);
    }
}
