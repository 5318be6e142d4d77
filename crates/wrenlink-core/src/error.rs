//! Error types for the bridging core.
//!
//! None of these cross the VM boundary: the VM only ever sees a null buffer
//! or a null function pointer. They exist so that the Rust side can log why a
//! module was not found and so that setup calls can fail loudly.

use std::fmt;
use std::time::Duration;

use wrenlink_sdk::{SdkError, VmHandle};

/// Errors loading or validating a [`BridgeConfig`](crate::BridgeConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the config file
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Failed to render TOML
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A value is out of range or malformed
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// A strategy is switched on but its Cargo feature is not compiled in
    #[error("Strategy '{0}' is enabled but not compiled in")]
    StrategyNotCompiled(&'static str),

    /// Fetching is on without the allow list in a build that requires it
    #[error("Fetch restriction is compiled in; strategies.restrict_fetch cannot be false")]
    RestrictionRequired,
}

/// Why a fetcher could not produce a module's source.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchFailure {
    /// Non-success status
    #[error("HTTP {status} for URL: {url}")]
    Status {
        /// Status code
        status: u16,
        /// Requested URL
        url: String,
    },

    /// Transport-level failure
    #[error("Network error: {0}")]
    Network(String),

    /// The path could not be turned into a location
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Payload exceeds the size cap
    #[error("Content too large: {size} bytes (max: {max})")]
    TooLarge {
        /// Payload size
        size: u64,
        /// Configured maximum
        max: u64,
    },

    /// Local read failed
    #[error("IO error: {0}")]
    Io(String),
}

/// Outcome of a blocking fetch that did not deliver a payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// The fetcher reported failure
    #[error("Fetch of '{path}' failed: {source}")]
    Failed {
        /// Requested path
        path: String,
        /// Reported failure
        #[source]
        source: FetchFailure,
    },

    /// No completion arrived within the timeout
    #[error("Fetch of '{path}' timed out after {}ms", .after.as_millis())]
    TimedOut {
        /// Requested path
        path: String,
        /// Time waited
        after: Duration,
    },

    /// The completion was dropped without firing
    #[error("Fetch of '{path}' was abandoned by the fetcher")]
    Abandoned {
        /// Requested path
        path: String,
    },
}

/// One strategy's reason for not producing a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt {
    /// The host has no preloaded file at the path
    NotPreloaded,
    /// The host has a preloaded file but it is empty
    PreloadedEmpty,
    /// Restricted fetch refused a path that is not on the allow list
    NotAllowListed,
    /// Network fetch is enabled but the bridge has no fetcher
    NoFetcher,
    /// The blocking fetch failed
    FetchFailed(String),
}

impl fmt::Display for Attempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attempt::NotPreloaded => write!(f, "not preloaded"),
            Attempt::PreloadedEmpty => write!(f, "preloaded file is empty"),
            Attempt::NotAllowListed => write!(f, "not on the allow list"),
            Attempt::NoFetcher => write!(f, "no fetcher installed"),
            Attempt::FetchFailed(reason) => write!(f, "{}", reason),
        }
    }
}

/// Why a module request produced no source.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// Every enabled strategy came up empty
    #[error("Module '{name}' not found at '{path}' ({})", join_attempts(.attempts))]
    NotFound {
        /// Requested module name
        name: String,
        /// Derived module path
        path: String,
        /// One entry per strategy tried, in order
        attempts: Vec<Attempt>,
    },

    /// No strategy is enabled, so imports are a no-op
    #[error("Imports are disabled; module '{name}' not loaded")]
    ImportsDisabled {
        /// Requested module name
        name: String,
    },
}

impl ResolveError {
    /// Requested module name
    pub fn module_name(&self) -> &str {
        match self {
            ResolveError::NotFound { name, .. } | ResolveError::ImportsDisabled { name } => name,
        }
    }
}

fn join_attempts(attempts: &[Attempt]) -> String {
    if attempts.is_empty() {
        return "no strategy tried".to_string();
    }
    attempts
        .iter()
        .map(Attempt::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors from [`Bridge`](crate::Bridge) calls made by the host.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Fetch error
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Host registration error
    #[error(transparent)]
    Sdk(#[from] SdkError),

    /// The engine failed to construct a VM
    #[error("VM engine failed to create a VM")]
    VmCreationFailed,

    /// The handle was not created by this bridge or was already destroyed
    #[error("Unknown VM handle: {0}")]
    UnknownVm(VmHandle),

    /// The call needs a fetcher and none was installed
    #[error("No fetcher installed")]
    NoFetcher,
}
