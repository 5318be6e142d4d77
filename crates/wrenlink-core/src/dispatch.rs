//! Foreign dispatch
//!
//! Forwards the VM's foreign binding requests to the host's symbol table.
//! Whatever the host returns, including nothing, goes back to the VM as is:
//! a missing method makes the VM raise its own "unbound" error, a missing
//! allocator or finalizer means the class has no custom behavior.

use tracing::trace;
use wrenlink_sdk::{ForeignClassMethods, ForeignMethodFn, ForeignResolver, MethodKey, VmHandle};

/// Look up a foreign method
pub fn bind_method<R: ForeignResolver + ?Sized>(
    resolver: &R,
    vm: VmHandle,
    module: &str,
    class_name: &str,
    is_static: bool,
    signature: &str,
) -> Option<ForeignMethodFn> {
    let key = MethodKey::new(module, class_name, is_static, signature);
    let method = resolver.foreign_method(vm, &key);
    if method.is_none() {
        trace!(%vm, module, class_name, is_static, signature, "foreign method unbound");
    }
    method
}

/// Look up a foreign class's allocator and finalizer.
///
/// The two are resolved independently; either may be absent.
pub fn bind_class<R: ForeignResolver + ?Sized>(
    resolver: &R,
    vm: VmHandle,
    module: &str,
    class_name: &str,
) -> ForeignClassMethods {
    ForeignClassMethods {
        allocate: resolver.foreign_allocator(vm, module, class_name),
        finalize: resolver.foreign_finalizer(vm, module, class_name),
    }
}
