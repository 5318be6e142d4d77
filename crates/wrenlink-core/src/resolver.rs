//! Module resolver
//!
//! Answers the VM's "source for module X" request. The strategy chain is:
//!
//! 1. host preload: files the host registered for this VM ahead of time;
//!    never blocks and never touches the network
//! 2. network fetch: retrieve the path through the blocking fetch bridge,
//!    optionally restricted to the host's allow list
//!
//! A strategy that comes up empty falls through to the next one. When every
//! enabled strategy fails the module is not found, which the VM reports as an
//! ordinary unresolved import.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, instrument};
use wrenlink_sdk::{AllowList, Host, ScriptAllowList, VmHandle};

use crate::buffer::SourceBuffer;
use crate::config::StrategyConfig;
use crate::error::{Attempt, ResolveError};
use crate::fetch::BlockingFetch;
use crate::path::module_path;

/// Resolves module names to source buffers for any VM.
///
/// Holds no per-VM state; caching lives in each VM's session.
pub struct ModuleResolver {
    extension: String,
    strategies: StrategyConfig,
    host: Arc<dyn Host>,
    fetch: Option<BlockingFetch>,
    allowed: ScriptAllowList,
}

impl ModuleResolver {
    /// Create a resolver
    ///
    /// # Arguments
    /// * `extension` - Appended to module names to form paths
    /// * `strategies` - Which strategies run
    /// * `host` - Supplies preloaded files and the allow list
    /// * `fetch` - Blocking fetch bridge for the network strategy
    pub fn new(
        extension: impl Into<String>,
        strategies: StrategyConfig,
        host: Arc<dyn Host>,
        fetch: Option<BlockingFetch>,
    ) -> Self {
        ModuleResolver {
            extension: extension.into(),
            strategies,
            host,
            fetch,
            allowed: ScriptAllowList::new(),
        }
    }

    /// Allow `allowed` paths for restricted fetches in addition to the
    /// host's own allow list
    pub fn with_allow_list(mut self, allowed: ScriptAllowList) -> Self {
        self.allowed = allowed;
        self
    }

    /// Strategy switches in effect
    pub fn strategies(&self) -> &StrategyConfig {
        &self.strategies
    }

    /// Path a module name is looked up under
    pub fn path_for(&self, name: &str) -> String {
        module_path(name, &self.extension)
    }

    /// Fetch bridge, if one is installed
    pub fn blocking_fetch(&self) -> Option<&BlockingFetch> {
        self.fetch.as_ref()
    }

    /// Resolve `name` for `vm` by running the strategy chain.
    #[instrument(level = "debug", skip(self))]
    pub fn resolve(&self, vm: VmHandle, name: &str) -> Result<SourceBuffer, ResolveError> {
        if !self.strategies.imports_enabled() {
            debug!("no import strategy enabled");
            return Err(ResolveError::ImportsDisabled {
                name: name.to_string(),
            });
        }

        let path = self.path_for(name);
        let mut attempts = Vec::new();

        if self.strategies.host_preload {
            match self.from_preload(vm, &path) {
                Ok(buffer) => {
                    debug!(%path, "resolved from host preload");
                    return Ok(buffer);
                }
                Err(attempt) => attempts.push(attempt),
            }
        }

        if self.strategies.network_fetch {
            match self.from_fetch(&path) {
                Ok(buffer) => {
                    debug!(%path, "resolved from fetch");
                    return Ok(buffer);
                }
                Err(attempt) => attempts.push(attempt),
            }
        }

        debug!(%path, ?attempts, "module not found");
        Err(ResolveError::NotFound {
            name: name.to_string(),
            path,
            attempts,
        })
    }

    fn from_preload(&self, vm: VmHandle, path: &str) -> Result<SourceBuffer, Attempt> {
        if !self.host.is_preloaded(vm, path) {
            return Err(Attempt::NotPreloaded);
        }
        match self.host.fetch_preloaded(vm, path) {
            Some(source) if !source.is_empty() => Ok(SourceBuffer::from_source(&source)),
            _ => Err(Attempt::PreloadedEmpty),
        }
    }

    fn is_allowed(&self, path: &str) -> bool {
        self.allowed.is_allowed(path) || self.host.is_allowed(path)
    }

    fn from_fetch(&self, path: &str) -> Result<SourceBuffer, Attempt> {
        if self.strategies.restrict_fetch && !self.is_allowed(path) {
            debug!(%path, "fetch refused, path not on allow list");
            return Err(Attempt::NotAllowListed);
        }
        let fetch = self.fetch.as_ref().ok_or(Attempt::NoFetcher)?;
        fetch
            .fetch(path)
            .map_err(|e| Attempt::FetchFailed(e.to_string()))
    }
}

impl fmt::Debug for ModuleResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleResolver")
            .field("extension", &self.extension)
            .field("strategies", &self.strategies)
            .field("fetch", &self.fetch)
            .field("allowed", &self.allowed)
            .finish_non_exhaustive()
    }
}
