//! Per-VM module cache
//!
//! Remembers the outcome of each module request made by one VM, found or not
//! found. Entries are never invalidated; the cache lives and dies with the
//! VM's session. A hit hands out a fresh copy because the VM takes ownership
//! of every buffer it receives.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::buffer::SourceBuffer;
use crate::error::ResolveError;

/// Outcomes of earlier module requests for one VM
#[derive(Debug, Default)]
pub struct ModuleCache {
    entries: Mutex<HashMap<String, Result<SourceBuffer, ResolveError>>>,
}

impl ModuleCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Earlier outcome for `name`, copied
    pub fn get(&self, name: &str) -> Option<Result<SourceBuffer, ResolveError>> {
        self.entries.lock().get(name).cloned()
    }

    /// Record the outcome for `name`
    pub fn insert(&self, name: &str, outcome: &Result<SourceBuffer, ResolveError>) {
        self.entries.lock().insert(name.to_string(), outcome.clone());
    }

    /// Return the cached outcome for `name`, or run `resolve` and remember
    /// what it produced.
    ///
    /// The lock is not held while `resolve` runs, so two threads asking for
    /// the same uncached module may both resolve it; the later result wins.
    pub fn get_or_resolve<F>(&self, name: &str, resolve: F) -> Result<SourceBuffer, ResolveError>
    where
        F: FnOnce() -> Result<SourceBuffer, ResolveError>,
    {
        if let Some(hit) = self.get(name) {
            return hit;
        }
        let outcome = resolve();
        self.insert(name, &outcome);
        outcome
    }

    /// Number of remembered modules
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether nothing is remembered
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
