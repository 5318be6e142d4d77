//! Default constants for bridge configuration.

/// Extension appended to a module name to form its path.
pub const DEFAULT_SOURCE_EXTENSION: &str = ".wren";

/// Default upper bound on one module retrieval, in milliseconds.
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 30_000;

/// Default length of one wait slice while a retrieval is in flight.
/// The host's yield hook runs once per slice.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10;

/// Largest module source a fetcher will accept (50 MB).
pub const MAX_SOURCE_SIZE: u64 = 50 * 1024 * 1024;

/// User agent sent by the HTTP fetcher.
pub const USER_AGENT: &str = concat!("wrenlink/", env!("CARGO_PKG_VERSION"));
