//! In-process host built from closures and registries
//!
//! `EmbeddedHost` is the host a Rust program uses when it embeds the VM
//! directly: output goes to per-VM closures, foreign bindings come from a
//! per-VM [`ForeignRegistry`], preloaded files from a per-VM
//! [`PreloadManifest`], and restricted fetches are checked against one
//! shared [`ScriptAllowList`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::allow::ScriptAllowList;
use crate::error::{SdkError, SdkResult};
use crate::foreign::{FinalizerFn, ForeignClassMethods, ForeignMethodFn, ForeignRegistry, MethodKey};
use crate::handle::VmHandle;
use crate::host::{AllowList, ForeignResolver, HostIo, PreloadStore};
use crate::preload::PreloadManifest;
use crate::report::ErrorReport;

type WriteFn = dyn Fn(&str) + Send + Sync;
type ErrorFn = dyn Fn(&ErrorReport) + Send + Sync;

/// Output callbacks for one VM
pub struct HostCallbacks {
    write: Box<WriteFn>,
    error: Box<ErrorFn>,
}

impl HostCallbacks {
    /// Create callbacks from a write closure and an error closure
    pub fn new<W, E>(write: W, error: E) -> Self
    where
        W: Fn(&str) + Send + Sync + 'static,
        E: Fn(&ErrorReport) + Send + Sync + 'static,
    {
        HostCallbacks {
            write: Box::new(write),
            error: Box::new(error),
        }
    }
}

impl Default for HostCallbacks {
    fn default() -> Self {
        HostCallbacks::new(|_| {}, |_| {})
    }
}

impl fmt::Debug for HostCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostCallbacks").finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
struct VmRecord {
    callbacks: HostCallbacks,
    foreign: RwLock<ForeignRegistry>,
    files: RwLock<PreloadManifest>,
}

/// Host that keeps everything in memory, keyed by VM handle.
///
/// Callbacks for unknown handles are silently ignored and lookups return
/// nothing, so a VM that was never attached behaves like one bound to
/// [`NoopHost`](crate::NoopHost).
#[derive(Debug, Default)]
pub struct EmbeddedHost {
    vms: RwLock<HashMap<VmHandle, Arc<VmRecord>>>,
    allow_list: RwLock<ScriptAllowList>,
}

impl EmbeddedHost {
    /// Create a host with no VMs and an empty allow list
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a host whose allow list starts with `allow_list`
    pub fn with_allow_list(allow_list: ScriptAllowList) -> Self {
        EmbeddedHost {
            vms: RwLock::new(HashMap::new()),
            allow_list: RwLock::new(allow_list),
        }
    }

    /// Start tracking a VM.
    ///
    /// Attaching a handle that is already attached replaces its record, so
    /// earlier registrations for that handle are dropped.
    pub fn attach(&self, vm: VmHandle, callbacks: HostCallbacks) {
        let record = VmRecord {
            callbacks,
            ..VmRecord::default()
        };
        self.vms.write().insert(vm, Arc::new(record));
    }

    /// Stop tracking a VM. Returns whether it was attached.
    pub fn detach(&self, vm: VmHandle) -> bool {
        self.vms.write().remove(&vm).is_some()
    }

    /// Whether `vm` is attached
    pub fn is_attached(&self, vm: VmHandle) -> bool {
        self.vms.read().contains_key(&vm)
    }

    fn record(&self, vm: VmHandle) -> Option<Arc<VmRecord>> {
        self.vms.read().get(&vm).cloned()
    }

    fn attached(&self, vm: VmHandle) -> SdkResult<Arc<VmRecord>> {
        self.record(vm).ok_or(SdkError::UnknownVm(vm))
    }

    /// Register a foreign method for one VM
    pub fn add_foreign_method(
        &self,
        vm: VmHandle,
        key: MethodKey,
        method: ForeignMethodFn,
    ) -> SdkResult<()> {
        self.attached(vm)?.foreign.write().add_method(key, method)
    }

    /// Register several methods of one class.
    ///
    /// Stops at the first duplicate; methods registered before it stay.
    pub fn add_foreign_class_methods<'a, I>(
        &self,
        vm: VmHandle,
        module: &str,
        class_name: &str,
        methods: I,
    ) -> SdkResult<()>
    where
        I: IntoIterator<Item = (bool, &'a str, ForeignMethodFn)>,
    {
        let record = self.attached(vm)?;
        let mut registry = record.foreign.write();
        for (is_static, signature, method) in methods {
            registry.add_method(MethodKey::new(module, class_name, is_static, signature), method)?;
        }
        Ok(())
    }

    /// Register a foreign class's allocator and finalizer for one VM
    pub fn add_foreign_class(
        &self,
        vm: VmHandle,
        module: &str,
        class_name: &str,
        methods: ForeignClassMethods,
    ) -> SdkResult<()> {
        self.attached(vm)?
            .foreign
            .write()
            .add_class(module, class_name, methods)
    }

    /// Register a source file for one VM under `path`
    pub fn import_source(
        &self,
        vm: VmHandle,
        path: impl Into<String>,
        source: impl Into<Vec<u8>>,
    ) -> SdkResult<()> {
        self.attached(vm)?.files.write().insert(path, source);
        Ok(())
    }

    /// Move a whole manifest into one VM's preloaded files
    pub fn import_manifest(&self, vm: VmHandle, manifest: PreloadManifest) -> SdkResult<()> {
        self.attached(vm)?.files.write().merge(manifest);
        Ok(())
    }

    /// Allow a path for restricted fetches
    pub fn allow_script(&self, path: impl Into<String>) {
        self.allow_list.write().allow(path);
    }
}

impl HostIo for EmbeddedHost {
    fn write(&self, vm: VmHandle, text: &str) {
        if let Some(record) = self.record(vm) {
            (record.callbacks.write)(text);
        }
    }

    fn report_error(&self, vm: VmHandle, report: &ErrorReport) {
        if let Some(record) = self.record(vm) {
            (record.callbacks.error)(report);
        }
    }
}

impl ForeignResolver for EmbeddedHost {
    fn foreign_method(&self, vm: VmHandle, key: &MethodKey) -> Option<ForeignMethodFn> {
        self.record(vm)?.foreign.read().method(key)
    }

    fn foreign_allocator(
        &self,
        vm: VmHandle,
        module: &str,
        class_name: &str,
    ) -> Option<ForeignMethodFn> {
        self.record(vm)?.foreign.read().allocator(module, class_name)
    }

    fn foreign_finalizer(
        &self,
        vm: VmHandle,
        module: &str,
        class_name: &str,
    ) -> Option<FinalizerFn> {
        self.record(vm)?.foreign.read().finalizer(module, class_name)
    }
}

impl PreloadStore for EmbeddedHost {
    fn is_preloaded(&self, vm: VmHandle, path: &str) -> bool {
        self.record(vm)
            .map(|record| record.files.read().contains(path))
            .unwrap_or(false)
    }

    fn fetch_preloaded(&self, vm: VmHandle, path: &str) -> Option<Vec<u8>> {
        self.record(vm)?.files.read().get(path).map(<[u8]>::to_vec)
    }
}

impl AllowList for EmbeddedHost {
    fn is_allowed(&self, path: &str) -> bool {
        self.allow_list.read().is_allowed(path)
    }
}
