//! Hosting configuration.
//!
//! A provider is identified either by its ledger id or by the key pair that
//! owns it, never both. The key pair lives in its own file so the
//! configuration can be shared without leaking it.
//!
//! ```toml
//! key_pair = "/etc/coinkit/owner.json"
//! capacity = 1024
//! directory = "/var/lib/coinkit"
//!
//! [chain]
//! endpoints = ["http://localhost:8000"]
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use coinkit_chain::ClientConfig;
use coinkit_core::KeyPair;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default wait between listener polls.
pub const DEFAULT_LISTEN_INTERVAL_MS: u64 = 2000;

/// Configuration for a [`HostingServer`](crate::HostingServer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostingConfig {
    /// Ledger id of the provider to host for.
    #[serde(default)]
    pub id: Option<u64>,

    /// Path to a serialized key pair owning the provider.
    #[serde(default, alias = "keyPair")]
    pub key_pair: Option<PathBuf>,

    /// Storage available for hosting, in megabytes.
    #[serde(default)]
    pub capacity: u32,

    /// Root of the hosted files; one subdirectory per info-hash.
    pub directory: PathBuf,

    #[serde(default)]
    pub verbose: bool,

    #[serde(default = "default_listen_interval_ms")]
    pub listen_interval_ms: u64,

    /// Give up on a torrent whose metadata takes longer than this.
    #[serde(default)]
    pub metadata_timeout_ms: Option<u64>,

    #[serde(default)]
    pub chain: ClientConfig,
}

fn default_listen_interval_ms() -> u64 {
    DEFAULT_LISTEN_INTERVAL_MS
}

/// How the hosted provider is identified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderIdentity {
    /// A known provider id.
    Id(u64),
    /// The key pair owning the provider. The id is looked up, or a provider
    /// is created.
    Owner(KeyPair),
}

impl HostingConfig {
    /// Configuration for hosting a known provider id.
    pub fn with_id(id: u64, capacity: u32, directory: impl Into<PathBuf>) -> Self {
        Self {
            id: Some(id),
            key_pair: None,
            capacity,
            directory: directory.into(),
            verbose: false,
            listen_interval_ms: DEFAULT_LISTEN_INTERVAL_MS,
            metadata_timeout_ms: None,
            chain: ClientConfig::default(),
        }
    }

    /// Configuration for hosting a provider owned by the key pair in `path`.
    pub fn with_key_pair(
        path: impl Into<PathBuf>,
        capacity: u32,
        directory: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id: None,
            key_pair: Some(path.into()),
            ..Self::with_id(0, capacity, directory)
        }
    }

    /// Parse a TOML configuration.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Read and parse a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Parse(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Check the configuration before hosting starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match (self.id, &self.key_pair) {
            (Some(_), Some(_)) => return Err(ConfigError::AmbiguousIdentity),
            (None, None) => return Err(ConfigError::MissingIdentity),
            _ => {}
        }
        if self.capacity == 0 {
            return Err(ConfigError::NonPositiveCapacity);
        }
        if !self.directory.is_dir() {
            return Err(ConfigError::NotADirectory(self.directory.clone()));
        }
        Ok(())
    }

    /// Resolve the provider identity, loading the key pair if configured.
    pub fn identity(&self) -> Result<ProviderIdentity, ConfigError> {
        match (self.id, &self.key_pair) {
            (Some(_), Some(_)) => Err(ConfigError::AmbiguousIdentity),
            (Some(id), None) => Ok(ProviderIdentity::Id(id)),
            (None, Some(path)) => load_key_pair(path).map(ProviderIdentity::Owner),
            (None, None) => Err(ConfigError::MissingIdentity),
        }
    }

    pub fn listen_interval(&self) -> Duration {
        Duration::from_millis(self.listen_interval_ms)
    }

    pub fn metadata_timeout(&self) -> Option<Duration> {
        self.metadata_timeout_ms.map(Duration::from_millis)
    }
}

/// Load a serialized key pair from a file.
pub fn load_key_pair(path: impl AsRef<Path>) -> Result<KeyPair, ConfigError> {
    let path = path.as_ref();
    let key_file = |message: String| ConfigError::KeyFile {
        path: path.to_path_buf(),
        message,
    };
    let text = std::fs::read_to_string(path).map_err(|e| key_file(e.to_string()))?;
    KeyPair::from_serialized(&text).map_err(|e| key_file(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toml_defaults() {
        let config = HostingConfig::from_toml_str(
            r#"
            id = 7
            capacity = 100
            directory = "/tmp"
            "#,
        )
        .unwrap();
        assert_eq!(config.id, Some(7));
        assert!(!config.verbose);
        assert_eq!(config.listen_interval(), Duration::from_secs(2));
        assert_eq!(config.metadata_timeout(), None);
        assert_eq!(config.chain, ClientConfig::default());
    }

    #[test]
    fn test_toml_nested_chain() {
        let config = HostingConfig::from_toml_str(
            r#"
            keyPair = "owner.json"
            capacity = 1
            directory = "/tmp"
            metadata_timeout_ms = 500

            [chain]
            endpoints = ["http://a:8000", "http://b:8000"]
            retry_attempts = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.key_pair, Some(PathBuf::from("owner.json")));
        assert_eq!(config.chain.endpoints.len(), 2);
        assert_eq!(config.chain.retry_attempts, 5);
        assert_eq!(config.metadata_timeout(), Some(Duration::from_millis(500)));
    }

    #[test]
    fn test_missing_directory_is_parse_error() {
        assert!(matches!(
            HostingConfig::from_toml_str("id = 1"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_validate_identity() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = HostingConfig::with_id(1, 10, dir.path());
        assert!(config.validate().is_ok());

        config.key_pair = Some(PathBuf::from("owner.json"));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::AmbiguousIdentity)
        ));

        config.id = None;
        config.key_pair = None;
        assert!(matches!(config.validate(), Err(ConfigError::MissingIdentity)));
    }

    #[test]
    fn test_validate_capacity_and_directory() {
        let dir = tempfile::tempdir().unwrap();
        let config = HostingConfig::with_id(1, 0, dir.path());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonPositiveCapacity)
        ));

        let file = dir.path().join("file");
        std::fs::write(&file, b"x").unwrap();
        let config = HostingConfig::with_id(1, 10, &file);
        assert!(matches!(config.validate(), Err(ConfigError::NotADirectory(_))));
    }

    #[test]
    fn test_key_pair_identity() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("owner.json");
        let kp = KeyPair::from_secret_phrase("owner");
        std::fs::write(&path, kp.serialize()).unwrap();

        let config = HostingConfig::with_key_pair(&path, 10, dir.path());
        assert!(config.validate().is_ok());
        assert_eq!(config.identity().unwrap(), ProviderIdentity::Owner(kp));
    }

    #[test]
    fn test_bad_key_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("owner.json");
        std::fs::write(&path, "{}").unwrap();
        assert!(matches!(
            load_key_pair(&path),
            Err(ConfigError::KeyFile { .. })
        ));
        assert!(matches!(
            load_key_pair(dir.path().join("missing.json")),
            Err(ConfigError::KeyFile { .. })
        ));
    }
}
