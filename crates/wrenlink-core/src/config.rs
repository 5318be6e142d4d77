//! Bridge configuration (wrenlink.toml)
//!
//! Which strategies exist is decided at build time by Cargo features; this
//! file only decides which of the compiled-in strategies are switched on and
//! how they behave. Every field has a default, so an empty document is a
//! valid configuration.
//!
//! ```toml
//! source_extension = ".wren"
//! cache_modules = true
//! terminator = "append"
//! allowed_scripts = ["lib.wren"]
//!
//! [strategies]
//! host_preload = true
//! network_fetch = true
//! restrict_fetch = false
//!
//! [fetch]
//! timeout_ms = 30000
//! poll_interval_ms = 10
//! base_url = "https://example.com/scripts/"
//! max_size = 52428800
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::defaults::{
    DEFAULT_FETCH_TIMEOUT_MS, DEFAULT_POLL_INTERVAL_MS, DEFAULT_SOURCE_EXTENSION, MAX_SOURCE_SIZE,
};
use crate::error::ConfigError;

/// How a fetched payload is terminated before it is handed to the VM.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TerminatorPolicy {
    /// Copy the whole payload and add a terminator after it
    #[default]
    Append,
    /// Keep the payload length and replace its final byte with the
    /// terminator. Loses the last payload byte; kept for hosts whose scripts
    /// were written against that behavior.
    OverwriteLast,
}

/// Which module resolution strategies are switched on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    /// Look in the host's preloaded files first
    pub host_preload: bool,
    /// Fall back to retrieving the module through the fetcher
    pub network_fetch: bool,
    /// Only fetch paths on the host's allow list. Always on when fetching in
    /// a build with the `fetch-allow-list` feature.
    pub restrict_fetch: bool,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        StrategyConfig {
            host_preload: cfg!(feature = "import-host"),
            network_fetch: cfg!(feature = "import-fetch"),
            restrict_fetch: cfg!(feature = "fetch-allow-list"),
        }
    }
}

impl StrategyConfig {
    /// Strategy set with nothing enabled
    pub fn none() -> Self {
        StrategyConfig {
            host_preload: false,
            network_fetch: false,
            restrict_fetch: false,
        }
    }

    /// Whether any strategy can produce a module
    pub fn imports_enabled(&self) -> bool {
        self.host_preload || self.network_fetch
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.host_preload && !cfg!(feature = "import-host") {
            return Err(ConfigError::StrategyNotCompiled("host_preload"));
        }
        if self.network_fetch && !cfg!(feature = "import-fetch") {
            return Err(ConfigError::StrategyNotCompiled("network_fetch"));
        }
        if self.network_fetch && !self.restrict_fetch && cfg!(feature = "fetch-allow-list") {
            return Err(ConfigError::RestrictionRequired);
        }
        Ok(())
    }
}

/// Settings for the blocking fetch bridge and the built-in fetchers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Upper bound on one retrieval (default: 30000)
    pub timeout_ms: u64,
    /// Length of one wait slice (default: 10)
    pub poll_interval_ms: u64,
    /// Base URL relative module paths are joined against
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Largest accepted payload in bytes (default: 50 MB)
    pub max_size: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        FetchConfig {
            timeout_ms: DEFAULT_FETCH_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            base_url: None,
            max_size: MAX_SOURCE_SIZE,
        }
    }
}

impl FetchConfig {
    /// Retrieval timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Wait slice length
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "fetch.timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "fetch.poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if let Some(base) = &self.base_url {
            url::Url::parse(base)
                .map_err(|e| ConfigError::Invalid(format!("fetch.base_url '{}': {}", base, e)))?;
        }
        Ok(())
    }
}

/// Runtime configuration of a [`Bridge`](crate::Bridge).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Extension appended to module names (default: ".wren")
    pub source_extension: String,
    /// Remember each module's outcome per VM (default: true)
    pub cache_modules: bool,
    /// How fetched payloads are terminated
    pub terminator: TerminatorPolicy,
    /// Paths a restricted fetch may retrieve
    pub allowed_scripts: Vec<String>,
    /// Strategy switches
    pub strategies: StrategyConfig,
    /// Fetch settings
    pub fetch: FetchConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            source_extension: DEFAULT_SOURCE_EXTENSION.to_string(),
            cache_modules: true,
            terminator: TerminatorPolicy::default(),
            allowed_scripts: Vec::new(),
            strategies: StrategyConfig::default(),
            fetch: FetchConfig::default(),
        }
    }
}

impl BridgeConfig {
    /// Load a configuration file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse a configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: BridgeConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Render the configuration as TOML
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check values that serde cannot
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.strategies.validate()?;
        self.fetch.validate()
    }
}
