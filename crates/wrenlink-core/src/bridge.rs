//! Bridge - the session registry tying engine, host and resolver together
//!
//! One `Bridge` serves any number of VMs. Each VM created through it gets a
//! session holding its module cache; the session is dropped when the VM is
//! destroyed. Host-facing calls (`create_vm`, `interpret`, ...) live on
//! `Bridge` itself, VM-facing callbacks come in through its [`VmHooks`]
//! implementation.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info, warn};
use wrenlink_sdk::{
    ForeignClassMethods, ForeignMethodFn, Host, InterpretResult, PreloadManifest,
    ScriptAllowList, VmHandle,
};

use crate::buffer::SourceBuffer;
use crate::cache::ModuleCache;
use crate::config::BridgeConfig;
use crate::dispatch;
use crate::engine::{VmConfiguration, VmEngine, VmHooks};
use crate::error::{BridgeError, ResolveError};
use crate::fetch::{BlockingFetch, FetchStatsSnapshot, Fetcher};
use crate::preload;
use crate::relay;
use crate::resolver::ModuleResolver;

#[derive(Debug, Default)]
struct VmSession {
    modules: ModuleCache,
}

/// Drives VMs on behalf of a host.
pub struct Bridge {
    config: BridgeConfig,
    engine: Arc<dyn VmEngine>,
    host: Arc<dyn Host>,
    resolver: ModuleResolver,
    sessions: DashMap<VmHandle, Arc<VmSession>>,
}

impl Bridge {
    /// Create a bridge with the default configuration and no fetcher
    pub fn new(engine: Arc<dyn VmEngine>, host: Arc<dyn Host>) -> Result<Self, BridgeError> {
        Self::with_config(engine, host, None, BridgeConfig::default())
    }

    /// Create a bridge
    ///
    /// # Arguments
    /// * `engine` - VM lifecycle primitives
    /// * `host` - Output sinks, foreign symbols, preloaded files, allow list
    /// * `fetcher` - Retrieval primitive for the network strategy
    /// * `config` - Runtime configuration, validated here
    pub fn with_config(
        engine: Arc<dyn VmEngine>,
        host: Arc<dyn Host>,
        fetcher: Option<Arc<dyn Fetcher>>,
        config: BridgeConfig,
    ) -> Result<Self, BridgeError> {
        config.validate()?;

        let fetch = fetcher.map(|fetcher| {
            let yielding = host.clone();
            BlockingFetch::with_config(fetcher, &config.fetch, config.terminator)
                .with_yield_hook(Arc::new(move || yielding.yield_now()))
        });
        let allowed: ScriptAllowList = config.allowed_scripts.iter().cloned().collect();
        let resolver = ModuleResolver::new(
            config.source_extension.clone(),
            config.strategies.clone(),
            host.clone(),
            fetch,
        )
        .with_allow_list(allowed);

        debug!(?config, "bridge configured");
        Ok(Bridge {
            config,
            engine,
            host,
            resolver,
            sessions: DashMap::new(),
        })
    }

    /// Create a bridge that fetches modules over HTTP
    #[cfg(feature = "http")]
    pub fn with_http(
        engine: Arc<dyn VmEngine>,
        host: Arc<dyn Host>,
        config: BridgeConfig,
    ) -> Result<Self, BridgeError> {
        let fetcher = crate::fetch::HttpFetcher::from_config(&config.fetch)?;
        Self::with_config(engine, host, Some(Arc::new(fetcher)), config)
    }

    /// Configuration in effect
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// The host this bridge serves
    pub fn host(&self) -> &Arc<dyn Host> {
        &self.host
    }

    /// Retrieval counters, if a fetcher is installed
    pub fn fetch_stats(&self) -> Option<FetchStatsSnapshot> {
        self.resolver
            .blocking_fetch()
            .map(|fetch| fetch.stats().snapshot())
    }

    // ========================================================================
    // VM lifecycle
    // ========================================================================

    /// Create a VM and attach a session to it
    pub fn create_vm(&self) -> Result<VmHandle, BridgeError> {
        let vm_config = VmConfiguration {
            imports_enabled: self.config.strategies.imports_enabled(),
        };
        let vm = self
            .engine
            .new_vm(&vm_config)
            .ok_or(BridgeError::VmCreationFailed)?;

        if self
            .sessions
            .insert(vm, Arc::new(VmSession::default()))
            .is_some()
        {
            warn!(%vm, "engine reused a live handle; previous session dropped");
        }
        info!(%vm, imports_enabled = vm_config.imports_enabled, "VM created");
        Ok(vm)
    }

    /// Destroy a VM and drop its session.
    ///
    /// `None` and handles this bridge does not know are ignored.
    pub fn destroy_vm(&self, vm: Option<VmHandle>) {
        let Some(vm) = vm else {
            return;
        };
        match self.sessions.remove(&vm) {
            Some(_) => {
                self.engine.free_vm(vm);
                info!(%vm, "VM destroyed");
            }
            None => warn!(%vm, "ignoring destroy of unknown VM"),
        }
    }

    /// Whether `vm` was created by this bridge and not yet destroyed
    pub fn is_live(&self, vm: VmHandle) -> bool {
        self.sessions.contains_key(&vm)
    }

    /// Number of live VMs
    pub fn vm_count(&self) -> usize {
        self.sessions.len()
    }

    /// Number of module outcomes cached for `vm`
    pub fn cached_modules(&self, vm: VmHandle) -> Option<usize> {
        self.session(vm).map(|session| session.modules.len())
    }

    /// Run `source` as module `module` in `vm`
    pub fn interpret(
        &self,
        vm: VmHandle,
        module: &str,
        source: &str,
    ) -> Result<InterpretResult, BridgeError> {
        if !self.is_live(vm) {
            return Err(BridgeError::UnknownVm(vm));
        }
        let result = self.engine.interpret(vm, module, source, self);
        debug!(%vm, module, ?result, "interpret finished");
        Ok(result)
    }

    /// Retrieve files through the fetcher for the host to preload
    pub fn import_files(&self, paths: &[&str]) -> Result<PreloadManifest, BridgeError> {
        let fetch = self.resolver.blocking_fetch().ok_or(BridgeError::NoFetcher)?;
        Ok(preload::import_files(fetch, paths)?)
    }

    fn session(&self, vm: VmHandle) -> Option<Arc<VmSession>> {
        // Clone out so no map shard stays locked while resolving
        self.sessions.get(&vm).map(|entry| Arc::clone(entry.value()))
    }
}

impl VmHooks for Bridge {
    fn load_module(&self, vm: VmHandle, name: &str) -> Result<SourceBuffer, ResolveError> {
        match self.session(vm) {
            Some(session) if self.config.cache_modules => session
                .modules
                .get_or_resolve(name, || self.resolver.resolve(vm, name)),
            Some(_) => self.resolver.resolve(vm, name),
            None => {
                warn!(%vm, name, "module request from unknown VM");
                self.resolver.resolve(vm, name)
            }
        }
    }

    fn write(&self, vm: VmHandle, text: &str) {
        relay::write(&*self.host, vm, text);
    }

    fn report_error(
        &self,
        vm: VmHandle,
        raw_kind: i32,
        module: Option<&str>,
        raw_line: i32,
        message: &str,
    ) {
        relay::report_error(&*self.host, vm, raw_kind, module, raw_line, message);
    }

    fn bind_foreign_method(
        &self,
        vm: VmHandle,
        module: &str,
        class_name: &str,
        is_static: bool,
        signature: &str,
    ) -> Option<ForeignMethodFn> {
        dispatch::bind_method(&*self.host, vm, module, class_name, is_static, signature)
    }

    fn bind_foreign_class(
        &self,
        vm: VmHandle,
        module: &str,
        class_name: &str,
    ) -> ForeignClassMethods {
        dispatch::bind_class(&*self.host, vm, module, class_name)
    }
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("config", &self.config)
            .field("resolver", &self.resolver)
            .field("vms", &self.sessions.len())
            .finish_non_exhaustive()
    }
}
