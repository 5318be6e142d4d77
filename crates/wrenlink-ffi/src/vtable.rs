//! C vtables for the engine and the host, and their Rust adapters
//!
//! Every callback is optional at the type level so a C caller can leave
//! fields zeroed. The engine's three callbacks are checked at install time;
//! a missing host callback behaves like a host that has nothing to offer.

use std::ffi::CString;
use std::os::raw::{c_char, c_int, c_void};
use std::ptr;

use tracing::warn;
use wrenlink_core::{VmConfiguration, VmEngine, VmHooks};
use wrenlink_sdk::{
    AllowList, ErrorReport, FinalizerFn, ForeignMethodFn, ForeignResolver, HostIo,
    InterpretResult, MethodKey, PreloadStore, VmHandle,
};

use crate::FfiError;

// ============================================================================
// Engine
// ============================================================================

/// VM lifecycle primitives supplied by the embedder.
///
/// The VM itself is configured by the embedder to call the `wrenlink_*`
/// trampolines for module loading, output, errors and foreign binding.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct WrenLinkEngine {
    /// Passed back to every callback
    pub ctx: *mut c_void,
    /// Construct a VM; `imports_enabled` is 0 when the load hook must not be
    /// installed. Returns null on failure.
    pub new_vm: Option<unsafe extern "C" fn(ctx: *mut c_void, imports_enabled: c_int) -> *mut c_void>,
    /// Free a VM created by `new_vm`
    pub free_vm: Option<unsafe extern "C" fn(ctx: *mut c_void, vm: *mut c_void)>,
    /// Interpret source; returns the VM's result code
    pub interpret: Option<
        unsafe extern "C" fn(
            ctx: *mut c_void,
            vm: *mut c_void,
            module: *const c_char,
            source: *const c_char,
        ) -> c_int,
    >,
}

type NewVmFn = unsafe extern "C" fn(*mut c_void, c_int) -> *mut c_void;
type FreeVmFn = unsafe extern "C" fn(*mut c_void, *mut c_void);
type InterpretFn = unsafe extern "C" fn(*mut c_void, *mut c_void, *const c_char, *const c_char) -> c_int;

pub(crate) struct CEngine {
    ctx: *mut c_void,
    new_vm: NewVmFn,
    free_vm: FreeVmFn,
    interpret: InterpretFn,
}

// The embedder guarantees its callbacks may be called from any thread.
unsafe impl Send for CEngine {}
unsafe impl Sync for CEngine {}

impl CEngine {
    pub(crate) fn from_vtable(vtable: &WrenLinkEngine) -> Result<Self, FfiError> {
        Ok(CEngine {
            ctx: vtable.ctx,
            new_vm: vtable.new_vm.ok_or(FfiError::MissingCallback("engine.new_vm"))?,
            free_vm: vtable.free_vm.ok_or(FfiError::MissingCallback("engine.free_vm"))?,
            interpret: vtable
                .interpret
                .ok_or(FfiError::MissingCallback("engine.interpret"))?,
        })
    }
}

impl VmEngine for CEngine {
    fn new_vm(&self, config: &VmConfiguration) -> Option<VmHandle> {
        let vm = unsafe { (self.new_vm)(self.ctx, config.imports_enabled as c_int) };
        VmHandle::from_ptr(vm)
    }

    fn free_vm(&self, vm: VmHandle) {
        unsafe { (self.free_vm)(self.ctx, vm.as_ptr()) }
    }

    // A C VM calls back through the global trampolines, not through `hooks`.
    fn interpret(
        &self,
        vm: VmHandle,
        module: &str,
        source: &str,
        _hooks: &dyn VmHooks,
    ) -> InterpretResult {
        let (Ok(module), Ok(source)) = (CString::new(module), CString::new(source)) else {
            warn!(%vm, "source or module name contains a NUL byte");
            return InterpretResult::CompileError;
        };
        let raw = unsafe { (self.interpret)(self.ctx, vm.as_ptr(), module.as_ptr(), source.as_ptr()) };
        InterpretResult::from_raw(raw).unwrap_or_else(|| {
            warn!(%vm, raw, "engine returned an unknown result code");
            InterpretResult::RuntimeError
        })
    }
}

// ============================================================================
// Host
// ============================================================================

/// Host services supplied by the embedder.
///
/// Strings passed to the host are only valid for the duration of the call.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct WrenLinkHost {
    /// Passed back to every callback
    pub ctx: *mut c_void,
    /// Print script output
    pub write: Option<unsafe extern "C" fn(ctx: *mut c_void, vm: *mut c_void, text: *const c_char)>,
    /// Deliver an error report; `module` may be null and `line` is -1 when absent
    pub report_error: Option<
        unsafe extern "C" fn(
            ctx: *mut c_void,
            vm: *mut c_void,
            kind: c_int,
            module: *const c_char,
            line: c_int,
            message: *const c_char,
        ),
    >,
    /// Find a foreign method; return null when unbound
    pub resolve_foreign_method: Option<
        unsafe extern "C" fn(
            ctx: *mut c_void,
            vm: *mut c_void,
            module: *const c_char,
            class_name: *const c_char,
            is_static: bool,
            signature: *const c_char,
        ) -> Option<ForeignMethodFn>,
    >,
    /// Find a foreign class allocator
    pub resolve_foreign_allocator: Option<
        unsafe extern "C" fn(
            ctx: *mut c_void,
            vm: *mut c_void,
            module: *const c_char,
            class_name: *const c_char,
        ) -> Option<ForeignMethodFn>,
    >,
    /// Find a foreign class finalizer
    pub resolve_foreign_finalizer: Option<
        unsafe extern "C" fn(
            ctx: *mut c_void,
            vm: *mut c_void,
            module: *const c_char,
            class_name: *const c_char,
        ) -> Option<FinalizerFn>,
    >,
    /// Non-zero if `path` was preloaded for `vm`
    pub is_path_preloaded:
        Option<unsafe extern "C" fn(ctx: *mut c_void, vm: *mut c_void, path: *const c_char) -> c_int>,
    /// Contents of a preloaded file. The returned bytes stay owned by the
    /// host and are copied before the call returns. Null means no file.
    pub fetch_preloaded: Option<
        unsafe extern "C" fn(
            ctx: *mut c_void,
            vm: *mut c_void,
            path: *const c_char,
            out_len: *mut usize,
        ) -> *const u8,
    >,
    /// Non-zero if a restricted fetch may retrieve `path`
    pub is_path_allow_listed: Option<unsafe extern "C" fn(ctx: *mut c_void, path: *const c_char) -> c_int>,
    /// Run the host's event loop briefly while a fetch is in flight
    pub yield_now: Option<unsafe extern "C" fn(ctx: *mut c_void)>,
}

pub(crate) struct CHost {
    vtable: WrenLinkHost,
}

unsafe impl Send for CHost {}
unsafe impl Sync for CHost {}

impl CHost {
    pub(crate) fn from_vtable(vtable: &WrenLinkHost) -> Self {
        CHost { vtable: *vtable }
    }
}

/// Strings from the VM never contain NUL; anything else is cut at the first one
fn c_string(s: &str) -> CString {
    let end = s.find('\0').unwrap_or(s.len());
    CString::new(&s[..end]).unwrap_or_default()
}

impl HostIo for CHost {
    fn write(&self, vm: VmHandle, text: &str) {
        if let Some(write) = self.vtable.write {
            let text = c_string(text);
            unsafe { write(self.vtable.ctx, vm.as_ptr(), text.as_ptr()) }
        }
    }

    fn report_error(&self, vm: VmHandle, report: &ErrorReport) {
        let Some(report_error) = self.vtable.report_error else {
            return;
        };
        let module = report.module.as_deref().map(c_string);
        let message = c_string(&report.message);
        unsafe {
            report_error(
                self.vtable.ctx,
                vm.as_ptr(),
                report.raw_kind,
                module.as_ref().map_or(ptr::null(), |m| m.as_ptr()),
                report.raw_line,
                message.as_ptr(),
            )
        }
    }

    fn yield_now(&self) {
        if let Some(yield_now) = self.vtable.yield_now {
            unsafe { yield_now(self.vtable.ctx) }
        }
    }
}

impl ForeignResolver for CHost {
    fn foreign_method(&self, vm: VmHandle, key: &MethodKey) -> Option<ForeignMethodFn> {
        let resolve = self.vtable.resolve_foreign_method?;
        let (module, class_name, signature) = (
            c_string(&key.module),
            c_string(&key.class_name),
            c_string(&key.signature),
        );
        unsafe {
            resolve(
                self.vtable.ctx,
                vm.as_ptr(),
                module.as_ptr(),
                class_name.as_ptr(),
                key.is_static,
                signature.as_ptr(),
            )
        }
    }

    fn foreign_allocator(
        &self,
        vm: VmHandle,
        module: &str,
        class_name: &str,
    ) -> Option<ForeignMethodFn> {
        let resolve = self.vtable.resolve_foreign_allocator?;
        let (module, class_name) = (c_string(module), c_string(class_name));
        unsafe { resolve(self.vtable.ctx, vm.as_ptr(), module.as_ptr(), class_name.as_ptr()) }
    }

    fn foreign_finalizer(&self, vm: VmHandle, module: &str, class_name: &str) -> Option<FinalizerFn> {
        let resolve = self.vtable.resolve_foreign_finalizer?;
        let (module, class_name) = (c_string(module), c_string(class_name));
        unsafe { resolve(self.vtable.ctx, vm.as_ptr(), module.as_ptr(), class_name.as_ptr()) }
    }
}

impl PreloadStore for CHost {
    fn is_preloaded(&self, vm: VmHandle, path: &str) -> bool {
        let Some(is_preloaded) = self.vtable.is_path_preloaded else {
            return false;
        };
        let path = c_string(path);
        unsafe { is_preloaded(self.vtable.ctx, vm.as_ptr(), path.as_ptr()) != 0 }
    }

    fn fetch_preloaded(&self, vm: VmHandle, path: &str) -> Option<Vec<u8>> {
        let fetch = self.vtable.fetch_preloaded?;
        let path = c_string(path);
        let mut len = 0usize;
        let data = unsafe { fetch(self.vtable.ctx, vm.as_ptr(), path.as_ptr(), &mut len) };
        if data.is_null() {
            return None;
        }
        Some(unsafe { std::slice::from_raw_parts(data, len) }.to_vec())
    }
}

impl AllowList for CHost {
    fn is_allowed(&self, path: &str) -> bool {
        let Some(is_allowed) = self.vtable.is_path_allow_listed else {
            return false;
        };
        let path = c_string(path);
        unsafe { is_allowed(self.vtable.ctx, path.as_ptr()) != 0 }
    }
}
