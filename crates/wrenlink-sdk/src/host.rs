//! Host traits - what the bridge needs from the embedding environment
//!
//! The bridge never talks to the host directly; it goes through these traits.
//! A host usually implements all of them on one type and gets [`Host`] for
//! free through the blanket impl.

use crate::foreign::{FinalizerFn, ForeignMethodFn, MethodKey};
use crate::handle::VmHandle;
use crate::report::ErrorReport;

// ============================================================================
// Console and error output
// ============================================================================

/// Output side of the host boundary.
pub trait HostIo {
    /// Print text written by the script (`System.print` and friends).
    ///
    /// The text is passed through verbatim; it may be empty and may lack a
    /// trailing newline.
    fn write(&self, vm: VmHandle, text: &str);

    /// Deliver a compile error, runtime error or stack-trace frame.
    fn report_error(&self, vm: VmHandle, report: &ErrorReport);

    /// Give a cooperative host a chance to run its event loop.
    ///
    /// Called repeatedly while a module retrieval is in flight. The default
    /// does nothing, which is right for hosts whose fetchers run on their own
    /// threads.
    fn yield_now(&self) {}
}

// ============================================================================
// Foreign symbol lookup
// ============================================================================

/// The host's symbol table for foreign methods and classes.
pub trait ForeignResolver {
    /// Find the native function for a foreign method, or `None` if unbound.
    fn foreign_method(&self, vm: VmHandle, key: &MethodKey) -> Option<ForeignMethodFn>;

    /// Find the allocator for a foreign class.
    fn foreign_allocator(
        &self,
        vm: VmHandle,
        module: &str,
        class_name: &str,
    ) -> Option<ForeignMethodFn>;

    /// Find the finalizer for a foreign class.
    fn foreign_finalizer(&self, vm: VmHandle, module: &str, class_name: &str)
        -> Option<FinalizerFn>;
}

// ============================================================================
// Module sources
// ============================================================================

/// Files the host registered ahead of time for a VM.
pub trait PreloadStore {
    /// Whether `path` was registered for this VM
    fn is_preloaded(&self, vm: VmHandle, path: &str) -> bool;

    /// Contents of a registered file.
    ///
    /// `None` or an empty vector means "nothing to give"; the resolver then
    /// moves on to the next strategy.
    fn fetch_preloaded(&self, vm: VmHandle, path: &str) -> Option<Vec<u8>>;
}

/// Paths that may be fetched from the network when retrieval is restricted.
pub trait AllowList {
    /// Whether `path` is on the allow list
    fn is_allowed(&self, path: &str) -> bool;
}

/// Everything the bridge needs from a host.
pub trait Host: HostIo + ForeignResolver + PreloadStore + AllowList + Send + Sync {}

impl<T> Host for T where T: HostIo + ForeignResolver + PreloadStore + AllowList + Send + Sync {}

// ============================================================================
// NoopHost
// ============================================================================

/// Host that discards output and resolves nothing.
///
/// Used in tests and as a stand-in before a real host is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHost;

impl HostIo for NoopHost {
    fn write(&self, _vm: VmHandle, _text: &str) {}

    fn report_error(&self, _vm: VmHandle, _report: &ErrorReport) {}
}

impl ForeignResolver for NoopHost {
    fn foreign_method(&self, _vm: VmHandle, _key: &MethodKey) -> Option<ForeignMethodFn> {
        None
    }

    fn foreign_allocator(
        &self,
        _vm: VmHandle,
        _module: &str,
        _class_name: &str,
    ) -> Option<ForeignMethodFn> {
        None
    }

    fn foreign_finalizer(
        &self,
        _vm: VmHandle,
        _module: &str,
        _class_name: &str,
    ) -> Option<FinalizerFn> {
        None
    }
}

impl PreloadStore for NoopHost {
    fn is_preloaded(&self, _vm: VmHandle, _path: &str) -> bool {
        false
    }

    fn fetch_preloaded(&self, _vm: VmHandle, _path: &str) -> Option<Vec<u8>> {
        None
    }
}

impl AllowList for NoopHost {
    fn is_allowed(&self, _path: &str) -> bool {
        false
    }
}
