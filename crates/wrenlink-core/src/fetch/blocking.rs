//! Blocking fetch bridge

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam::channel::RecvTimeoutError;
use tracing::{debug, warn};

use super::{FetchCompletion, Fetcher};
use crate::buffer::SourceBuffer;
use crate::config::{FetchConfig, TerminatorPolicy};
use crate::error::{FetchError, FetchFailure};

/// Called between wait slices so a cooperative host can run its event loop.
pub type YieldHook = Arc<dyn Fn() + Send + Sync>;

/// Retrieval counters shared by every request through one bridge.
#[derive(Debug, Default)]
pub struct FetchStats {
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    started: AtomicU64,
    timed_out: AtomicU64,
}

/// Point-in-time copy of [`FetchStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchStatsSnapshot {
    /// Retrievals currently waiting
    pub in_flight: usize,
    /// Most retrievals ever waiting at once
    pub peak_in_flight: usize,
    /// Retrievals started
    pub started: u64,
    /// Retrievals that hit the timeout
    pub timed_out: u64,
}

impl FetchStats {
    /// Read the counters
    pub fn snapshot(&self) -> FetchStatsSnapshot {
        FetchStatsSnapshot {
            in_flight: self.in_flight.load(Ordering::Acquire),
            peak_in_flight: self.peak_in_flight.load(Ordering::Acquire),
            started: self.started.load(Ordering::Acquire),
            timed_out: self.timed_out.load(Ordering::Acquire),
        }
    }

    fn begin(&self) -> InFlight<'_> {
        self.started.fetch_add(1, Ordering::AcqRel);
        let now = self.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::AcqRel);
        InFlight(self)
    }
}

struct InFlight<'a>(&'a FetchStats);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Runs a [`Fetcher`] retrieval to completion on the calling thread.
#[derive(Clone)]
pub struct BlockingFetch {
    fetcher: Arc<dyn Fetcher>,
    timeout: Duration,
    poll_interval: Duration,
    max_size: u64,
    terminator: TerminatorPolicy,
    yield_hook: Option<YieldHook>,
    stats: Arc<FetchStats>,
}

impl BlockingFetch {
    /// Create a bridge with default settings
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self::with_config(fetcher, &FetchConfig::default(), TerminatorPolicy::default())
    }

    /// Create a bridge from fetch settings and a terminator policy
    pub fn with_config(
        fetcher: Arc<dyn Fetcher>,
        config: &FetchConfig,
        terminator: TerminatorPolicy,
    ) -> Self {
        BlockingFetch {
            fetcher,
            timeout: config.timeout(),
            poll_interval: config.poll_interval(),
            max_size: config.max_size,
            terminator,
            yield_hook: None,
            stats: Arc::new(FetchStats::default()),
        }
    }

    /// Run `hook` between wait slices
    pub fn with_yield_hook(mut self, hook: YieldHook) -> Self {
        self.yield_hook = Some(hook);
        self
    }

    /// Shared retrieval counters
    pub fn stats(&self) -> &Arc<FetchStats> {
        &self.stats
    }

    /// Retrieval timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Retrieve `path` and terminate it for the VM.
    pub fn fetch(&self, path: &str) -> Result<SourceBuffer, FetchError> {
        let payload = self.fetch_bytes(path)?;
        Ok(SourceBuffer::from_payload(payload, self.terminator))
    }

    /// Retrieve `path` and return the raw payload.
    ///
    /// Blocks until the fetcher completes, abandons the request, or the
    /// timeout passes. The fetcher's transfer is closed on every outcome.
    pub fn fetch_bytes(&self, path: &str) -> Result<Vec<u8>, FetchError> {
        let _in_flight = self.stats.begin();
        let (completion, rx) = FetchCompletion::channel();

        debug!(path, "starting module retrieval");
        let transfer = self.fetcher.start(path, completion);
        let deadline = Instant::now() + self.timeout;

        let outcome = loop {
            let now = Instant::now();
            if now >= deadline {
                self.stats.timed_out.fetch_add(1, Ordering::AcqRel);
                warn!(path, timeout_ms = self.timeout.as_millis() as u64, "module retrieval timed out");
                break Err(FetchError::TimedOut {
                    path: path.to_string(),
                    after: self.timeout,
                });
            }

            match rx.recv_timeout(self.poll_interval.min(deadline - now)) {
                Ok(Ok(payload)) => break self.check_size(path, payload),
                Ok(Err(failure)) => {
                    debug!(path, %failure, "module retrieval failed");
                    break Err(FetchError::Failed {
                        path: path.to_string(),
                        source: failure,
                    });
                }
                Err(RecvTimeoutError::Timeout) => {
                    if let Some(hook) = &self.yield_hook {
                        hook();
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    warn!(path, "module retrieval abandoned by fetcher");
                    break Err(FetchError::Abandoned {
                        path: path.to_string(),
                    });
                }
            }
        };

        transfer.close();
        outcome
    }

    fn check_size(&self, path: &str, payload: Vec<u8>) -> Result<Vec<u8>, FetchError> {
        let size = payload.len() as u64;
        if size > self.max_size {
            return Err(FetchError::Failed {
                path: path.to_string(),
                source: FetchFailure::TooLarge {
                    size,
                    max: self.max_size,
                },
            });
        }
        Ok(payload)
    }
}

impl fmt::Debug for BlockingFetch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockingFetch")
            .field("timeout", &self.timeout)
            .field("poll_interval", &self.poll_interval)
            .field("max_size", &self.max_size)
            .field("terminator", &self.terminator)
            .field("stats", &self.stats.snapshot())
            .finish_non_exhaustive()
    }
}
