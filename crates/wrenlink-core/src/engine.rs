//! VM engine contract
//!
//! The bridge never constructs, runs or frees a VM itself. An engine does,
//! and while it runs source it calls back into the bridge through
//! [`VmHooks`] whenever the VM needs a module, prints, reports an error or
//! binds a foreign symbol.

use wrenlink_sdk::{ForeignClassMethods, ForeignMethodFn, InterpretResult, VmHandle};

use crate::buffer::SourceBuffer;
use crate::error::ResolveError;

/// Settings a new VM is created with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmConfiguration {
    /// Install the module loading callback. When false the VM reports every
    /// import as unresolved without asking the bridge.
    pub imports_enabled: bool,
}

/// Callbacks a running VM makes into the bridge.
pub trait VmHooks {
    /// Source for an imported module
    fn load_module(&self, vm: VmHandle, name: &str) -> Result<SourceBuffer, ResolveError>;

    /// Script output
    fn write(&self, vm: VmHandle, text: &str);

    /// Compile error, runtime error or stack frame, in the VM's raw form
    fn report_error(
        &self,
        vm: VmHandle,
        raw_kind: i32,
        module: Option<&str>,
        raw_line: i32,
        message: &str,
    );

    /// Native function for a foreign method
    fn bind_foreign_method(
        &self,
        vm: VmHandle,
        module: &str,
        class_name: &str,
        is_static: bool,
        signature: &str,
    ) -> Option<ForeignMethodFn>;

    /// Allocator and finalizer for a foreign class
    fn bind_foreign_class(&self, vm: VmHandle, module: &str, class_name: &str)
        -> ForeignClassMethods;
}

/// VM lifecycle primitives supplied by the embedder.
pub trait VmEngine: Send + Sync {
    /// Construct a VM. `None` if construction failed.
    fn new_vm(&self, config: &VmConfiguration) -> Option<VmHandle>;

    /// Tear down a VM created by [`new_vm`](Self::new_vm)
    fn free_vm(&self, vm: VmHandle);

    /// Compile and run `source` as module `module`.
    ///
    /// Engines that route VM callbacks through `hooks` must only call it
    /// for the duration of this call.
    fn interpret(
        &self,
        vm: VmHandle,
        module: &str,
        source: &str,
        hooks: &dyn VmHooks,
    ) -> InterpretResult;
}
