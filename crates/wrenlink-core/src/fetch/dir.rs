//! Fetcher backed by a local directory

use std::io::Read;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use tracing::debug;

use super::{FetchCompletion, Fetcher, Transfer};
use crate::defaults::MAX_SOURCE_SIZE;
use crate::error::FetchFailure;

/// Reads module paths relative to a root directory on a worker thread.
///
/// Paths that are absolute or climb out of the root are refused.
#[derive(Debug, Clone)]
pub struct DirFetcher {
    root: PathBuf,
    max_size: u64,
}

impl DirFetcher {
    /// Serve files under `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirFetcher {
            root: root.into(),
            max_size: MAX_SOURCE_SIZE,
        }
    }

    /// Set the largest accepted file
    pub fn with_max_size(mut self, max_size: u64) -> Self {
        self.max_size = max_size;
        self
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn locate(&self, path: &str) -> Result<PathBuf, FetchFailure> {
        let relative = Path::new(path);
        let contained = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if path.is_empty() || !contained {
            return Err(FetchFailure::InvalidUrl(path.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

fn read_limited(file: &Path, max_size: u64) -> Result<Vec<u8>, FetchFailure> {
    let handle = std::fs::File::open(file).map_err(|e| FetchFailure::Io(e.to_string()))?;
    let mut content = Vec::new();
    handle
        .take(max_size + 1)
        .read_to_end(&mut content)
        .map_err(|e| FetchFailure::Io(e.to_string()))?;

    if content.len() as u64 > max_size {
        return Err(FetchFailure::TooLarge {
            size: content.len() as u64,
            max: max_size,
        });
    }
    Ok(content)
}

/// Cancellation flag shared with the worker
struct DirTransfer {
    cancelled: Arc<AtomicBool>,
}

impl Transfer for DirTransfer {
    fn close(self: Box<Self>) {
        self.cancelled.store(true, Ordering::Release);
    }
}

impl Fetcher for DirFetcher {
    fn start(&self, path: &str, completion: FetchCompletion) -> Box<dyn Transfer> {
        let cancelled = Arc::new(AtomicBool::new(false));
        let file = match self.locate(path) {
            Ok(file) => file,
            Err(failure) => {
                completion.fail(failure);
                return Box::new(DirTransfer { cancelled });
            }
        };

        let max_size = self.max_size;
        let flag = cancelled.clone();
        thread::spawn(move || {
            let outcome = read_limited(&file, max_size);
            if flag.load(Ordering::Acquire) {
                debug!(file = %file.display(), "discarding read for closed transfer");
                return;
            }
            completion.complete(outcome);
        });

        Box::new(DirTransfer { cancelled })
    }
}
