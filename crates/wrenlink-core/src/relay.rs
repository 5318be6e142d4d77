//! Console output and error report relay
//!
//! Both calls forward synchronously to the host. Nothing is buffered,
//! reformatted or rate limited.

use tracing::debug;
use wrenlink_sdk::{ErrorKind, ErrorReport, HostIo, VmHandle};

/// Forward script output to the host
pub fn write<H: HostIo + ?Sized>(host: &H, vm: VmHandle, text: &str) {
    host.write(vm, text);
}

/// Forward an error report to the host.
///
/// `raw_kind` and `raw_line` are the VM's own values and reach the host
/// unchanged, including kinds this build does not know.
pub fn report_error<H: HostIo + ?Sized>(
    host: &H,
    vm: VmHandle,
    raw_kind: i32,
    module: Option<&str>,
    raw_line: i32,
    message: &str,
) {
    if ErrorKind::from_raw(raw_kind).is_none() {
        debug!(%vm, raw_kind, "forwarding error report of unknown kind");
    }
    host.report_error(vm, &ErrorReport::from_raw(raw_kind, module, raw_line, message));
}
