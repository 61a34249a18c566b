//! Client configuration
//!
//! Identity comes from the environment or from the node's JSON config file
//! (`~/.btfs/config` by default). The API endpoint and request deadline come
//! from the environment with sensible defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::crypto::{CryptoError, KeyMaterial, PrivateKey, PublicKey};

/// Peer id variable
pub const ENV_PEER_ID: &str = "BTFS_PEER_ID";
/// Base64 public key envelope variable
pub const ENV_PUBLIC_KEY: &str = "BTFS_PUBLIC_KEY";
/// Base64 private key envelope variable
pub const ENV_PRIVATE_KEY: &str = "BTFS_PRIVATE_KEY";
/// API base URL variable
pub const ENV_API_URL: &str = "BTFS_API_URL";
/// Request deadline variable, whole seconds
pub const ENV_TIMEOUT: &str = "BTFS_TIMEOUT_SECS";

/// Default node API
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:5001";
/// Default per-request deadline
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Cannot read {path:?}: {source}")]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid JSON of the expected shape
    #[error("Invalid config file: {0}")]
    Parse(#[from] serde_json::Error),

    /// No peer id configured
    #[error("peer id not configured")]
    MissingPeerId,

    /// A configured key does not parse, or the key pair is inconsistent
    #[error("Invalid {field}: {source}")]
    InvalidKey {
        /// Which setting
        field: &'static str,
        /// Why it was rejected
        #[source]
        source: CryptoError,
    },

    /// A setting has an unusable value
    #[error("Invalid {name}: {value:?}")]
    InvalidValue {
        /// Setting name
        name: &'static str,
        /// Offending value
        value: String,
    },
}

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Identity settings as they appear in the node config file
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Peer id
    #[serde(rename = "PeerID", default)]
    pub peer_id: String,
    /// Base64 public key envelope
    #[serde(rename = "PubKey", default)]
    pub public_key: String,
    /// Base64 private key envelope
    #[serde(rename = "PrivKey", default)]
    pub private_key: String,
}

#[derive(Deserialize)]
struct NodeConfig {
    #[serde(rename = "Identity")]
    identity: IdentityConfig,
}

impl IdentityConfig {
    /// Read identity from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read identity through an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |name| lookup(name).map(|v| v.trim().to_string()).unwrap_or_default();
        IdentityConfig {
            peer_id: var(ENV_PEER_ID),
            public_key: var(ENV_PUBLIC_KEY),
            private_key: var(ENV_PRIVATE_KEY),
        }
    }

    /// Read the `Identity` section of a node config file
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let node: NodeConfig = serde_json::from_str(&text)?;
        Ok(node.identity)
    }

    /// Node config file in the user's home directory
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".btfs").join("config"))
    }

    /// Environment first; the default config file fills whatever is unset
    ///
    /// Keys are never mixed: the file's key pair is used only when the
    /// environment sets neither key.
    pub fn load() -> ConfigResult<Self> {
        let mut config = Self::from_env();
        if config.is_complete() {
            return Ok(config);
        }
        if let Some(path) = Self::default_path().filter(|p| p.exists()) {
            config.fill_from(Self::from_file(&path)?);
        }
        Ok(config)
    }

    fn is_complete(&self) -> bool {
        !self.peer_id.is_empty() && !self.public_key.is_empty() && !self.private_key.is_empty()
    }

    fn fill_from(&mut self, other: IdentityConfig) {
        if self.peer_id.is_empty() {
            self.peer_id = other.peer_id;
        }
        if self.public_key.is_empty() && self.private_key.is_empty() {
            self.public_key = other.public_key;
            self.private_key = other.private_key;
        }
    }

    /// Parse the keys into signing material
    ///
    /// An empty private key yields watch-only material; the signing flows
    /// then report the missing key themselves.
    pub fn into_key_material(self) -> ConfigResult<KeyMaterial> {
        if self.peer_id.is_empty() {
            return Err(ConfigError::MissingPeerId);
        }

        let public_key = non_empty(&self.public_key)
            .map(PublicKey::from_base64)
            .transpose()
            .map_err(|source| ConfigError::InvalidKey {
                field: "public key",
                source,
            })?;
        let private_key = non_empty(&self.private_key)
            .map(PrivateKey::from_base64)
            .transpose()
            .map_err(|source| ConfigError::InvalidKey {
                field: "private key",
                source,
            })?;

        KeyMaterial::new(self.peer_id, public_key, private_key).map_err(|source| {
            ConfigError::InvalidKey {
                field: "key pair",
                source,
            }
        })
    }
}

fn non_empty(s: &str) -> Option<&str> {
    Some(s).filter(|s| !s.is_empty())
}

impl std::fmt::Debug for IdentityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityConfig")
            .field("peer_id", &self.peer_id)
            .field("public_key", &self.public_key)
            .field(
                "private_key",
                &if self.private_key.is_empty() { "<unset>" } else { "<redacted>" },
            )
            .finish()
    }
}

/// Where and how to reach the node API
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the node API
    pub api_url: String,
    /// Deadline applied to every coordinator call
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            api_url: DEFAULT_API_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ClientConfig {
    /// Read overrides from the process environment
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read overrides through an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<Self> {
        let mut config = ClientConfig::default();

        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            config.api_url = url.trim().to_string();
        }
        if let Some(secs) = lookup(ENV_TIMEOUT).filter(|v| !v.trim().is_empty()) {
            let parsed = secs
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|&s| s > 0)
                .ok_or(ConfigError::InvalidValue {
                    name: ENV_TIMEOUT,
                    value: secs.clone(),
                })?;
            config.timeout = Duration::from_secs(parsed);
        }
        Ok(config)
    }
}
