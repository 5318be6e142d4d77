//! Error types for host-side registration

use crate::handle::VmHandle;

/// Result type for host-side registration calls
pub type SdkResult<T> = Result<T, SdkError>;

/// Errors raised while building up a host's bindings
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SdkError {
    /// A foreign method with the same key is already registered
    #[error("Foreign method defined twice: {module}.{class_name}{} {signature}", static_marker(.is_static))]
    DuplicateMethod {
        /// Module name
        module: String,
        /// Class name
        class_name: String,
        /// Whether the method is static
        is_static: bool,
        /// Method signature
        signature: String,
    },

    /// A foreign class with the same name is already registered
    #[error("Foreign class defined twice: {module}.{class_name}")]
    DuplicateClass {
        /// Module name
        module: String,
        /// Class name
        class_name: String,
    },

    /// The VM handle has no host-side record
    #[error("Unknown VM handle: {0}")]
    UnknownVm(VmHandle),
}

fn static_marker(is_static: &bool) -> &'static str {
    if *is_static {
        " (static)"
    } else {
        ""
    }
}
