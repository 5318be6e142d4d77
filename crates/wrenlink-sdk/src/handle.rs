//! VM handles

use std::fmt;
use std::num::NonZeroUsize;

/// Opaque, host-assigned identifier for one embedded VM instance.
///
/// A handle is never zero: the null handle is represented as `None` wherever
/// one may be absent, so "no VM" cannot be confused with a live instance.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VmHandle(NonZeroUsize);

impl VmHandle {
    /// Wrap a raw handle value, returning `None` for the null handle.
    pub fn from_raw(raw: usize) -> Option<Self> {
        NonZeroUsize::new(raw).map(VmHandle)
    }

    /// Wrap a raw VM pointer, returning `None` for a null pointer.
    pub fn from_ptr<T>(ptr: *mut T) -> Option<Self> {
        Self::from_raw(ptr as usize)
    }

    /// Get the raw handle value
    pub fn as_raw(self) -> usize {
        self.0.get()
    }

    /// Get the handle back as the VM pointer it was created from
    pub fn as_ptr<T>(self) -> *mut T {
        self.0.get() as *mut T
    }
}

impl fmt::Debug for VmHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VmHandle({:#x})", self.0.get())
    }
}

impl fmt::Display for VmHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0.get())
    }
}
