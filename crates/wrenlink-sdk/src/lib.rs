//! wrenlink SDK - host-facing vocabulary for embedding a Wren VM
//!
//! This crate holds the types that cross the host/VM boundary and the traits a
//! host implements so that the bridge core can reach it:
//!
//! - [`VmHandle`]: opaque, host-assigned VM identifier
//! - VM constants ([`InterpretResult`], [`ValueType`], [`ErrorKind`], [`ConstantTable`])
//! - [`ErrorReport`]: structured compile/runtime/stack-trace report
//! - Foreign binding types ([`ForeignMethodFn`], [`FinalizerFn`], [`ForeignClassMethods`])
//! - Host traits ([`HostIo`], [`ForeignResolver`], [`PreloadStore`], [`AllowList`], [`Host`])
//! - Ready-made host pieces ([`ForeignRegistry`], [`PreloadManifest`],
//!   [`ScriptAllowList`], [`EmbeddedHost`], [`NoopHost`])
//!
//! # Example
//!
//! ```ignore
//! use wrenlink_sdk::{EmbeddedHost, HostCallbacks, MethodKey};
//!
//! let host = EmbeddedHost::new();
//! host.attach(vm, HostCallbacks::new(|text| print!("{}", text), |report| eprintln!("{}", report)));
//! host.add_foreign_method(vm, MethodKey::new("main", "Math", true, "add(_,_)"), add_fn)?;
//! host.import_source(vm, "lib.wren", "class Lib {}");
//! ```

#![warn(missing_docs)]

pub mod allow;
pub mod constants;
pub mod embedded;
pub mod error;
pub mod foreign;
pub mod handle;
pub mod host;
pub mod preload;
pub mod report;

pub use allow::ScriptAllowList;
pub use constants::{ConstantTable, ErrorKind, InterpretResult, ValueType};
pub use embedded::{EmbeddedHost, HostCallbacks};
pub use error::{SdkError, SdkResult};
pub use foreign::{FinalizerFn, ForeignClassMethods, ForeignMethodFn, ForeignRegistry, MethodKey};
pub use handle::VmHandle;
pub use host::{AllowList, ForeignResolver, Host, HostIo, NoopHost, PreloadStore};
pub use preload::PreloadManifest;
pub use report::{ErrorReport, NO_LINE};
