//! C ABI for wrenlink
//!
//! An embedder hands wrenlink three vtables once with `wrenlink_install`:
//! the engine (VM lifecycle), the host (output, foreign symbols, preloaded
//! files, allow list) and optionally a fetcher. It then configures the Wren VM
//! so that its load-module, write, error and foreign-binding callbacks point
//! at the `wrenlink_*` trampolines below.
//!
//! Conventions:
//! - Fallible calls take an optional `WrenLinkError**` out-parameter
//! - Strings returned to the caller are freed with `wrenlink_string_free`
//! - Module buffers are allocated with `malloc` so the VM can free them

mod fetch;
mod vtable;

use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int, c_void};
use std::ptr;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::{info, warn};
use wrenlink_core::{Bridge, BridgeConfig, BridgeError, ConfigError, FetchFailure, Fetcher, VmHooks};
use wrenlink_sdk::{
    ConstantTable, ErrorKind, ForeignClassMethods, ForeignMethodFn, InterpretResult, ValueType,
    VmHandle,
};

pub use fetch::WrenLinkFetcher;
pub use vtable::{WrenLinkEngine, WrenLinkHost};

use fetch::CFetcher;
use vtable::{CEngine, CHost};

// ============================================================================
// Errors
// ============================================================================

/// Error information
#[repr(C)]
pub struct WrenLinkError {
    message: *mut c_char,
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum FfiError {
    #[error("Invalid arguments (null pointer: {0})")]
    NullArgument(&'static str),

    #[error("Invalid UTF-8 in {0}")]
    InvalidUtf8(&'static str),

    #[error("Missing callback: {0}")]
    MissingCallback(&'static str),

    #[error("wrenlink is not installed")]
    NotInstalled,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

/// Convert Rust string to C string (caller must free)
unsafe fn rust_to_c_string(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(c_str) => c_str.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Set error out-parameter
unsafe fn set_error(error_out: *mut *mut WrenLinkError, error: FfiError) {
    warn!(%error, "wrenlink call failed");
    if !error_out.is_null() {
        let message = rust_to_c_string(&error.to_string());
        *error_out = Box::into_raw(Box::new(WrenLinkError { message }));
    }
}

/// Borrow a required C string argument
unsafe fn arg_str<'a>(ptr: *const c_char, name: &'static str) -> Result<&'a str, FfiError> {
    if ptr.is_null() {
        return Err(FfiError::NullArgument(name));
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map_err(|_| FfiError::InvalidUtf8(name))
}

/// Borrow an optional C string argument; null and invalid UTF-8 are `None`
unsafe fn opt_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok()
}

// ============================================================================
// Installation
// ============================================================================

static BRIDGE: Lazy<Mutex<Option<Arc<Bridge>>>> = Lazy::new(|| Mutex::new(None));

/// The installed bridge. Cloned out so no lock is held while the engine
/// re-enters through a trampoline.
fn bridge() -> Option<Arc<Bridge>> {
    BRIDGE.lock().clone()
}

fn installed() -> Result<Arc<Bridge>, FfiError> {
    bridge().ok_or(FfiError::NotInstalled)
}

unsafe fn install(
    engine: *const WrenLinkEngine,
    host: *const WrenLinkHost,
    fetcher: *const WrenLinkFetcher,
    config_toml: *const c_char,
) -> Result<(), FfiError> {
    let engine = engine.as_ref().ok_or(FfiError::NullArgument("engine"))?;
    let host = host.as_ref().ok_or(FfiError::NullArgument("host"))?;

    let config = match opt_str(config_toml) {
        Some(toml) => BridgeConfig::from_toml_str(toml)?,
        None if config_toml.is_null() => BridgeConfig::default(),
        None => return Err(FfiError::InvalidUtf8("config")),
    };
    let fetcher: Option<Arc<dyn Fetcher>> = match fetcher.as_ref() {
        Some(vtable) => Some(Arc::new(
            CFetcher::from_vtable(vtable).ok_or(FfiError::MissingCallback("fetcher.start"))?,
        )),
        None => None,
    };

    let bridge = Bridge::with_config(
        Arc::new(CEngine::from_vtable(engine)?),
        Arc::new(CHost::from_vtable(host)),
        fetcher,
        config,
    )?;

    if BRIDGE.lock().replace(Arc::new(bridge)).is_some() {
        warn!("replacing a previously installed bridge");
    }
    info!("wrenlink installed");
    Ok(())
}

/// Install the engine, host and fetcher wrenlink works with
///
/// # Arguments
/// * `engine` - VM lifecycle callbacks (must not be NULL)
/// * `host` - Host callbacks (must not be NULL)
/// * `fetcher` - Retrieval callbacks, or NULL for no network strategy
/// * `config_toml` - Runtime configuration as TOML, or NULL for defaults
/// * `error` - Optional pointer to receive error information
///
/// # Returns
/// * 0 on success
/// * -1 on failure (check error parameter)
///
/// # Safety
/// - The vtables are copied; their `ctx` pointers must stay valid until
///   `wrenlink_uninstall()` or the next install
/// - Callbacks may be invoked from any thread that calls into wrenlink
///
/// # Example (C)
/// ```c
/// WrenLinkError* error = NULL;
/// if (wrenlink_install(&engine, &host, NULL, "cache_modules = true", &error) != 0) {
///     fprintf(stderr, "install failed: %s\n", wrenlink_error_message(error));
///     wrenlink_error_free(error);
///     return 1;
/// }
/// ```
#[no_mangle]
pub unsafe extern "C" fn wrenlink_install(
    engine: *const WrenLinkEngine,
    host: *const WrenLinkHost,
    fetcher: *const WrenLinkFetcher,
    config_toml: *const c_char,
    error: *mut *mut WrenLinkError,
) -> c_int {
    match install(engine, host, fetcher, config_toml) {
        Ok(()) => 0,
        Err(e) => {
            set_error(error, e);
            -1
        }
    }
}

/// Drop the installed bridge.
///
/// VMs are owned by the embedder and are not freed here. Trampolines called
/// after this return nothing.
#[no_mangle]
pub extern "C" fn wrenlink_uninstall() {
    if BRIDGE.lock().take().is_some() {
        info!("wrenlink uninstalled");
    }
}

// ============================================================================
// VM Lifecycle Functions
// ============================================================================

/// Create a VM through the installed engine
///
/// # Returns
/// * Non-null VM pointer on success
/// * NULL on failure (check error parameter)
///
/// # Safety
/// The returned VM must be freed with `wrenlink_vm_free()`
#[no_mangle]
pub unsafe extern "C" fn wrenlink_vm_new(error: *mut *mut WrenLinkError) -> *mut c_void {
    let created = installed().and_then(|bridge| Ok(bridge.create_vm()?));
    match created {
        Ok(vm) => vm.as_ptr(),
        Err(e) => {
            set_error(error, e);
            ptr::null_mut()
        }
    }
}

/// Free a VM and everything wrenlink attached to it
///
/// # Safety
/// - NULL and pointers wrenlink does not know are ignored
/// - The VM must not be used after this call
#[no_mangle]
pub unsafe extern "C" fn wrenlink_vm_free(vm: *mut c_void) {
    if let Some(bridge) = bridge() {
        bridge.destroy_vm(VmHandle::from_ptr(vm));
    }
}

/// Interpret `source` as module `module`
///
/// # Returns
/// * The VM's result code (`wrenlink_result_*`)
/// * -1 if the call itself failed (check error parameter)
///
/// # Safety
/// - `vm` must come from `wrenlink_vm_new()`
/// - `module` and `source` must be valid null-terminated strings
#[no_mangle]
pub unsafe extern "C" fn wrenlink_vm_interpret(
    vm: *mut c_void,
    module: *const c_char,
    source: *const c_char,
    error: *mut *mut WrenLinkError,
) -> c_int {
    let run = || -> Result<InterpretResult, FfiError> {
        let bridge = installed()?;
        let vm = VmHandle::from_ptr(vm).ok_or(FfiError::NullArgument("vm"))?;
        let module = arg_str(module, "module")?;
        let source = arg_str(source, "source")?;
        Ok(bridge.interpret(vm, module, source)?)
    };
    match run() {
        Ok(result) => result.as_raw(),
        Err(e) => {
            set_error(error, e);
            -1
        }
    }
}

// ============================================================================
// VM Callback Trampolines
// ============================================================================

/// Copy a module's bytes, terminator included, into a `malloc` block
unsafe fn load_into_malloc(vm: *mut c_void, name: *const c_char) -> Option<(*mut c_char, usize)> {
    let bridge = bridge()?;
    let vm = VmHandle::from_ptr(vm)?;
    let name = opt_str(name)?;
    let buffer = bridge.load_module(vm, name).ok()?;

    let bytes = buffer.as_bytes_with_nul();
    let block = libc::malloc(bytes.len()) as *mut u8;
    if block.is_null() {
        warn!(%vm, name, size = bytes.len(), "allocation for module source failed");
        return None;
    }
    ptr::copy_nonoverlapping(bytes.as_ptr(), block, bytes.len());
    Some((block as *mut c_char, bytes.len()))
}

/// Load-module callback for the VM
///
/// # Returns
/// * A NUL-terminated source buffer the VM takes ownership of (`free()`)
/// * NULL if the module was not found
///
/// # Safety
/// `name` must be a valid null-terminated string
#[no_mangle]
pub unsafe extern "C" fn wrenlink_load_module(vm: *mut c_void, name: *const c_char) -> *mut c_char {
    load_into_malloc(vm, name).map_or(ptr::null_mut(), |(block, _)| block)
}

/// Load-module callback that also reports the buffer length
///
/// # Returns
/// * The buffer, with `*out_len` set to its length including the terminator
/// * NULL with `*out_len` set to -1 if the module was not found
///
/// # Safety
/// `name` must be a valid null-terminated string; `out_len` may be NULL
#[no_mangle]
pub unsafe extern "C" fn wrenlink_load_module_sized(
    vm: *mut c_void,
    name: *const c_char,
    out_len: *mut isize,
) -> *mut c_char {
    let (block, len) = match load_into_malloc(vm, name) {
        Some((block, len)) => (block, len as isize),
        None => (ptr::null_mut(), -1),
    };
    if !out_len.is_null() {
        *out_len = len;
    }
    block
}

/// Write callback for the VM
///
/// # Safety
/// `text` must be a valid null-terminated string
#[no_mangle]
pub unsafe extern "C" fn wrenlink_write(vm: *mut c_void, text: *const c_char) {
    let (Some(bridge), Some(vm)) = (bridge(), VmHandle::from_ptr(vm)) else {
        return;
    };
    if text.is_null() {
        return;
    }
    let text = CStr::from_ptr(text).to_string_lossy();
    bridge.write(vm, &text);
}

/// Error callback for the VM
///
/// # Safety
/// `module` may be NULL; `message` must be a valid null-terminated string
#[no_mangle]
pub unsafe extern "C" fn wrenlink_error(
    vm: *mut c_void,
    kind: c_int,
    module: *const c_char,
    line: c_int,
    message: *const c_char,
) {
    let (Some(bridge), Some(vm)) = (bridge(), VmHandle::from_ptr(vm)) else {
        return;
    };
    let message = if message.is_null() {
        Default::default()
    } else {
        CStr::from_ptr(message).to_string_lossy()
    };
    bridge.report_error(vm, kind, opt_str(module), line, &message);
}

/// Foreign-method binding callback for the VM
///
/// # Returns
/// * The host's function, or NULL if the method is unbound
///
/// # Safety
/// String arguments must be valid null-terminated strings
#[no_mangle]
pub unsafe extern "C" fn wrenlink_bind_foreign_method(
    vm: *mut c_void,
    module: *const c_char,
    class_name: *const c_char,
    is_static: bool,
    signature: *const c_char,
) -> Option<ForeignMethodFn> {
    let bridge = bridge()?;
    let vm = VmHandle::from_ptr(vm)?;
    bridge.bind_foreign_method(
        vm,
        opt_str(module)?,
        opt_str(class_name)?,
        is_static,
        opt_str(signature)?,
    )
}

/// Foreign-class binding callback for the VM
///
/// # Returns
/// * Allocator and finalizer; either may be NULL
///
/// # Safety
/// String arguments must be valid null-terminated strings
#[no_mangle]
pub unsafe extern "C" fn wrenlink_bind_foreign_class(
    vm: *mut c_void,
    module: *const c_char,
    class_name: *const c_char,
) -> ForeignClassMethods {
    let (Some(bridge), Some(vm), Some(module), Some(class_name)) = (
        bridge(),
        VmHandle::from_ptr(vm),
        opt_str(module),
        opt_str(class_name),
    ) else {
        return ForeignClassMethods::default();
    };
    bridge.bind_foreign_class(vm, module, class_name)
}

// ============================================================================
// Fetch Completions
// ============================================================================

/// Report that retrieval `request` produced `len` bytes at `data`
///
/// # Returns
/// * 0 if the payload was delivered
/// * -1 if the request is unknown, finished, timed out or cancelled
///
/// # Safety
/// `data` must point to `len` readable bytes (may be NULL when `len` is 0).
/// The bytes are copied before this returns.
#[no_mangle]
pub unsafe extern "C" fn wrenlink_fetch_succeeded(request: u64, data: *const u8, len: usize) -> c_int {
    let payload = if data.is_null() || len == 0 {
        Vec::new()
    } else {
        std::slice::from_raw_parts(data, len).to_vec()
    };
    if fetch::complete(request, |_| Ok(payload)) {
        0
    } else {
        -1
    }
}

/// Report that retrieval `request` failed
///
/// # Arguments
/// * `status` - HTTP status, or 0 for a transport failure
/// * `message` - Optional description
///
/// # Returns
/// * 0 if the failure was delivered, -1 if the request is not pending
///
/// # Safety
/// `message` may be NULL
#[no_mangle]
pub unsafe extern "C" fn wrenlink_fetch_failed(request: u64, status: c_int, message: *const c_char) -> c_int {
    let message = opt_str(message).unwrap_or("retrieval failed").to_string();
    let delivered = fetch::complete(request, |path| {
        Err(match u16::try_from(status) {
            Ok(status) if status > 0 => FetchFailure::Status {
                status,
                url: path.to_string(),
            },
            _ => FetchFailure::Network(message),
        })
    });
    if delivered {
        0
    } else {
        -1
    }
}

// ============================================================================
// VM Constants
// ============================================================================

/// `WREN_RESULT_SUCCESS`
#[no_mangle]
pub extern "C" fn wrenlink_result_success() -> c_int {
    InterpretResult::Success.as_raw()
}

/// `WREN_RESULT_COMPILE_ERROR`
#[no_mangle]
pub extern "C" fn wrenlink_result_compile_error() -> c_int {
    InterpretResult::CompileError.as_raw()
}

/// `WREN_RESULT_RUNTIME_ERROR`
#[no_mangle]
pub extern "C" fn wrenlink_result_runtime_error() -> c_int {
    InterpretResult::RuntimeError.as_raw()
}

/// `WREN_TYPE_BOOL`
#[no_mangle]
pub extern "C" fn wrenlink_type_bool() -> c_int {
    ValueType::Bool.as_raw()
}

/// `WREN_TYPE_NUM`
#[no_mangle]
pub extern "C" fn wrenlink_type_num() -> c_int {
    ValueType::Num.as_raw()
}

/// `WREN_TYPE_FOREIGN`
#[no_mangle]
pub extern "C" fn wrenlink_type_foreign() -> c_int {
    ValueType::Foreign.as_raw()
}

/// `WREN_TYPE_LIST`
#[no_mangle]
pub extern "C" fn wrenlink_type_list() -> c_int {
    ValueType::List.as_raw()
}

/// `WREN_TYPE_NULL`
#[no_mangle]
pub extern "C" fn wrenlink_type_null() -> c_int {
    ValueType::Null.as_raw()
}

/// `WREN_TYPE_STRING`
#[no_mangle]
pub extern "C" fn wrenlink_type_string() -> c_int {
    ValueType::String.as_raw()
}

/// `WREN_TYPE_UNKNOWN`
#[no_mangle]
pub extern "C" fn wrenlink_type_unknown() -> c_int {
    ValueType::Unknown.as_raw()
}

/// `WREN_ERROR_COMPILE`
#[no_mangle]
pub extern "C" fn wrenlink_error_compile() -> c_int {
    ErrorKind::Compile.as_raw()
}

/// `WREN_ERROR_RUNTIME`
#[no_mangle]
pub extern "C" fn wrenlink_error_runtime() -> c_int {
    ErrorKind::Runtime.as_raw()
}

/// `WREN_ERROR_STACK_TRACE`
#[no_mangle]
pub extern "C" fn wrenlink_error_stack_trace() -> c_int {
    ErrorKind::StackTrace.as_raw()
}

/// All constants as one JSON object
///
/// # Safety
/// The returned string must be freed with `wrenlink_string_free()`
#[no_mangle]
pub unsafe extern "C" fn wrenlink_constant_table_json() -> *mut c_char {
    rust_to_c_string(&ConstantTable::CURRENT.to_json())
}

/// Free a string returned by wrenlink
///
/// # Safety
/// `s` must come from wrenlink and not be freed twice; NULL is ignored
#[no_mangle]
pub unsafe extern "C" fn wrenlink_string_free(s: *mut c_char) {
    if s.is_null() {
        return;
    }
    drop(CString::from_raw(s));
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get error message
///
/// # Returns
/// * Null-terminated message, owned by the error; NULL if `error` is NULL
///
/// # Safety
/// `error` must come from a wrenlink call
#[no_mangle]
pub unsafe extern "C" fn wrenlink_error_message(error: *const WrenLinkError) -> *const c_char {
    if error.is_null() {
        return ptr::null();
    }
    (*error).message
}

/// Free an error
///
/// # Safety
/// `error` must come from a wrenlink call and not be freed twice; NULL is ignored
#[no_mangle]
pub unsafe extern "C" fn wrenlink_error_free(error: *mut WrenLinkError) {
    if error.is_null() {
        return;
    }
    let error = Box::from_raw(error);
    if !error.message.is_null() {
        drop(CString::from_raw(error.message));
    }
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the wrenlink version string
///
/// # Safety
/// The returned string is static and must not be freed
#[no_mangle]
pub unsafe extern "C" fn wrenlink_version() -> *const c_char {
    static VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "\0");
    VERSION.as_ptr() as *const c_char
}

// ============================================================================
// Tests
// ============================================================================
