//! C fetcher vtable
//!
//! The embedder starts a retrieval when asked and later reports the result
//! with `wrenlink_fetch_succeeded` / `wrenlink_fetch_failed`, quoting the
//! request id it was given. Each id is used once; completions for an id that
//! already finished, timed out or was cancelled are rejected.

use std::ffi::CString;
use std::os::raw::{c_char, c_void};
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use once_cell::sync::Lazy;
use tracing::debug;
use wrenlink_core::{FetchCompletion, FetchFailure, Fetcher, NoTransfer, Transfer};

/// Retrieval primitive supplied by the embedder
#[repr(C)]
#[derive(Clone, Copy)]
pub struct WrenLinkFetcher {
    /// Passed back to every callback
    pub ctx: *mut c_void,
    /// Begin retrieving `path`; complete later with `request`
    pub start: Option<unsafe extern "C" fn(ctx: *mut c_void, path: *const c_char, request: u64)>,
    /// Stop a retrieval that will no longer be waited on
    pub cancel: Option<unsafe extern "C" fn(ctx: *mut c_void, request: u64)>,
}

struct Pending {
    path: String,
    completion: FetchCompletion,
}

static PENDING: Lazy<DashMap<u64, Pending>> = Lazy::new(DashMap::new);
static NEXT_REQUEST: AtomicU64 = AtomicU64::new(1);

/// Finish a pending request. Returns false if `request` is not pending.
pub(crate) fn complete(request: u64, outcome: impl FnOnce(&str) -> Result<Vec<u8>, FetchFailure>) -> bool {
    match PENDING.remove(&request) {
        Some((_, pending)) => {
            let result = outcome(&pending.path);
            pending.completion.complete(result);
            true
        }
        None => {
            debug!(request, "completion for a request that is no longer pending");
            false
        }
    }
}

pub(crate) struct CFetcher {
    ctx: *mut c_void,
    start: unsafe extern "C" fn(*mut c_void, *const c_char, u64),
    cancel: Option<unsafe extern "C" fn(*mut c_void, u64)>,
}

unsafe impl Send for CFetcher {}
unsafe impl Sync for CFetcher {}

impl CFetcher {
    /// `None` when the vtable has no `start` callback
    pub(crate) fn from_vtable(vtable: &WrenLinkFetcher) -> Option<Self> {
        Some(CFetcher {
            ctx: vtable.ctx,
            start: vtable.start?,
            cancel: vtable.cancel,
        })
    }
}

impl Fetcher for CFetcher {
    fn start(&self, path: &str, completion: FetchCompletion) -> Box<dyn Transfer> {
        let Ok(c_path) = CString::new(path) else {
            completion.fail(FetchFailure::InvalidUrl(path.to_string()));
            return Box::new(NoTransfer);
        };

        let request = NEXT_REQUEST.fetch_add(1, Ordering::Relaxed);
        PENDING.insert(
            request,
            Pending {
                path: path.to_string(),
                completion,
            },
        );
        // The embedder may complete synchronously from inside `start`
        unsafe { (self.start)(self.ctx, c_path.as_ptr(), request) };

        Box::new(CTransfer {
            request,
            ctx: self.ctx,
            cancel: self.cancel,
        })
    }
}

struct CTransfer {
    request: u64,
    ctx: *mut c_void,
    cancel: Option<unsafe extern "C" fn(*mut c_void, u64)>,
}

unsafe impl Send for CTransfer {}

impl Transfer for CTransfer {
    fn close(self: Box<Self>) {
        // Still pending means the wait gave up on it
        if PENDING.remove(&self.request).is_some() {
            debug!(request = self.request, "cancelling abandoned retrieval");
            if let Some(cancel) = self.cancel {
                unsafe { cancel(self.ctx, self.request) }
            }
        }
    }
}
