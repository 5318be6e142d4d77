//! wrenlink core
//!
//! The bridging layer between an embedded Wren VM and its host:
//!
//! - [`ModuleResolver`]: satisfies the VM's import requests from host
//!   preloaded files or through a [`Fetcher`]
//! - [`BlockingFetch`]: waits for a callback-completed retrieval so the VM's
//!   synchronous loader can use it
//! - [`dispatch`]: forwards foreign method/class lookups to the host
//! - [`relay`]: forwards script output and error reports to the host
//! - [`Bridge`]: owns per-VM sessions and implements the VM-facing
//!   [`VmHooks`] on top of all of the above
//!
//! Logging goes through `tracing`; installing a subscriber is up to the
//! embedding program.

pub mod bridge;
pub mod buffer;
pub mod cache;
pub mod config;
pub mod defaults;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod path;
pub mod preload;
pub mod relay;
pub mod resolver;

pub use bridge::Bridge;
pub use buffer::SourceBuffer;
pub use cache::ModuleCache;
pub use config::{BridgeConfig, FetchConfig, StrategyConfig, TerminatorPolicy};
pub use engine::{VmConfiguration, VmEngine, VmHooks};
pub use error::{Attempt, BridgeError, ConfigError, FetchError, FetchFailure, ResolveError};
pub use fetch::{BlockingFetch, FetchCompletion, FetchStats, Fetcher, NoTransfer, Transfer};
pub use path::module_path;
pub use resolver::ModuleResolver;

#[cfg(feature = "import-fetch")]
pub use fetch::DirFetcher;
#[cfg(feature = "http")]
pub use fetch::HttpFetcher;

/// Re-exported so embedders need only one dependency
pub use wrenlink_sdk as sdk;
