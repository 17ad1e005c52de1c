//! Runtime configuration read from `WALLET01_*` environment variables.

use crate::chains::ChainRegistry;
use crate::events::DEFAULT_EVENT_CAPACITY;
use crate::store::StoreConfig;
use crate::utils::to_hex_chain_id;

use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PROVIDER_URL: &str = "http://127.0.0.1:1248";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Errors raised while loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be {expected}, got {value:?}")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },

    #[error("Failed to read chains file {path}: {source}")]
    ChainsFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid chains file {path}: {source}")]
    ChainsFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Clone, Debug)]
pub struct WalletConfig {
    /// Chain the connector starts on and connects to.
    pub default_chain: String,
    /// JSON-RPC endpoint of the wallet used by the binary.
    pub provider_url: String,
    pub request_timeout: Duration,
    pub operation_timeout: Option<Duration>,
    pub event_capacity: usize,
    pub data_dir: PathBuf,
    /// Extra chain descriptors (JSON array) merged into the registry.
    pub chains_file: Option<PathBuf>,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            default_chain: "1".to_string(),
            provider_url: DEFAULT_PROVIDER_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            operation_timeout: None,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            data_dir: PathBuf::from("./data"),
            chains_file: None,
        }
    }
}

impl WalletConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let default_chain = lookup("WALLET01_DEFAULT_CHAIN").unwrap_or(defaults.default_chain);
        let provider_url = lookup("WALLET01_PROVIDER_URL").unwrap_or(defaults.provider_url);

        let request_timeout = match lookup("WALLET01_REQUEST_TIMEOUT_SECS") {
            Some(value) => Duration::from_secs(parse_secs("WALLET01_REQUEST_TIMEOUT_SECS", &value)?),
            None => defaults.request_timeout,
        };

        let operation_timeout = match lookup("WALLET01_OPERATION_TIMEOUT_SECS") {
            Some(value) => match parse_secs("WALLET01_OPERATION_TIMEOUT_SECS", &value)? {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            None => defaults.operation_timeout,
        };

        let event_capacity = match lookup("WALLET01_EVENT_CAPACITY") {
            Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
                name: "WALLET01_EVENT_CAPACITY",
                expected: "a positive number",
                value,
            })?,
            None => defaults.event_capacity,
        };

        let data_dir = lookup("WALLET01_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);
        let chains_file = lookup("WALLET01_CHAINS_FILE")
            .filter(|path| !path.is_empty())
            .map(PathBuf::from);

        Ok(Self {
            default_chain,
            provider_url,
            request_timeout,
            operation_timeout,
            event_capacity,
            data_dir,
            chains_file,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if to_hex_chain_id(&self.default_chain).is_none() {
            return Err(ConfigError::Invalid {
                name: "WALLET01_DEFAULT_CHAIN",
                expected: "a numeric chain id",
                value: self.default_chain.clone(),
            });
        }

        if !self.provider_url.starts_with("http://") && !self.provider_url.starts_with("https://") {
            return Err(ConfigError::Invalid {
                name: "WALLET01_PROVIDER_URL",
                expected: "an http(s) URL",
                value: self.provider_url.clone(),
            });
        }

        if self.request_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                name: "WALLET01_REQUEST_TIMEOUT_SECS",
                expected: "greater than zero",
                value: "0".to_string(),
            });
        }

        if self.event_capacity == 0 {
            return Err(ConfigError::Invalid {
                name: "WALLET01_EVENT_CAPACITY",
                expected: "a positive number",
                value: "0".to_string(),
            });
        }

        Ok(())
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            operation_timeout: self.operation_timeout,
        }
    }

    /// Default chains plus the descriptors from `chains_file`, if any.
    pub fn load_registry(&self) -> Result<ChainRegistry, ConfigError> {
        let mut registry = ChainRegistry::with_defaults();
        if let Some(path) = &self.chains_file {
            let json = std::fs::read_to_string(path).map_err(|source| ConfigError::ChainsFile {
                path: path.clone(),
                source,
            })?;
            registry
                .extend_from_json(&json)
                .map_err(|source| ConfigError::ChainsFormat {
                    path: path.clone(),
                    source,
                })?;
        }
        Ok(registry)
    }
}

fn parse_secs(name: &'static str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        name,
        expected: "a whole number of seconds",
        value: value.to_string(),
    })
}
