//! Scenario configuration loading and management.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::CoreError;

/// Capacity of each issuer's revocation registry in the walkthrough.
pub const REGISTRY_CAPACITY: u32 = 5;

/// Full configuration for a walkthrough run.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ScenarioConfig {
    /// Ledger pool settings.
    #[serde(default)]
    pub pool: PoolConfig,

    /// Wallet storage backend selection.
    #[serde(default)]
    pub wallet_storage: WalletStorageConfig,

    /// Revocation tails storage.
    #[serde(default)]
    pub tails: TailsConfig,

    /// Credential selection policy used when building proofs.
    #[serde(default)]
    pub selection: SelectionConfig,

    /// Fixed names and values of the getting-started walkthrough.
    #[serde(default)]
    pub walkthrough: WalkthroughConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Name of the pool ledger configuration.
    #[serde(default = "default_pool_name")]
    pub name: String,
    /// Path to the genesis transactions file.
    #[serde(default = "default_genesis_path")]
    pub genesis_path: PathBuf,
    /// Wire protocol version sent with every request.
    #[serde(default = "default_protocol_version")]
    pub protocol_version: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WalletStorageConfig {
    /// Storage driver name; `None` selects the built-in default.
    #[serde(default)]
    pub storage_type: Option<String>,
    /// Driver-specific configuration (JSON).
    #[serde(default)]
    pub storage_config: Option<String>,
    /// Driver-specific credentials (JSON).
    #[serde(default)]
    pub storage_credentials: Option<String>,
    /// Native plug-in library requested for the driver.
    #[serde(default)]
    pub library: Option<PathBuf>,
    /// Entry point symbol inside `library`.
    #[serde(default)]
    pub entrypoint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TailsConfig {
    /// Base directory; each issuer writes under `<base_dir>/<issuer>`.
    #[serde(default = "default_tails_dir")]
    pub base_dir: PathBuf,
}

/// How a holder picks one credential among several candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicyKind {
    /// Always the first candidate.
    #[default]
    First,
    /// The most recently stored candidate.
    Newest,
    /// Fixed index per referent, falling back to the first candidate.
    PerReferent,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SelectionConfig {
    #[serde(default)]
    pub policy: SelectionPolicyKind,
    /// Referent → candidate index, used by `per_referent`.
    #[serde(default)]
    pub per_referent: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkthroughConfig {
    /// How many transcripts the holder obtains from the college.
    #[serde(default = "default_transcript_rounds")]
    pub transcript_rounds: usize,
    /// Nonce carried in connection requests.
    #[serde(default = "default_connection_nonce")]
    pub connection_nonce: u64,
    /// Seed of the steward DID present in the genesis file.
    #[serde(default = "default_steward_seed")]
    pub steward_seed: String,
    /// Raw value of the transcript `average` attribute.
    #[serde(default = "default_transcript_average")]
    pub transcript_average: String,
    /// Threshold of the `average >=` predicate in the job application.
    #[serde(default = "default_average_threshold")]
    pub average_threshold: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (text, json).
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_pool_name() -> String {
    "pool1".into()
}
fn default_genesis_path() -> PathBuf {
    PathBuf::from("./pool1.txn")
}
fn default_protocol_version() -> u32 {
    2
}
fn default_tails_dir() -> PathBuf {
    std::env::temp_dir().join("verinym_tails")
}
fn default_transcript_rounds() -> usize {
    2
}
fn default_connection_nonce() -> u64 {
    123_456_789
}
fn default_steward_seed() -> String {
    "000000000000000000000000Steward1".into()
}
fn default_transcript_average() -> String {
    "5".into()
}
fn default_average_threshold() -> i64 {
    4
}
fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "text".into()
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            name: default_pool_name(),
            genesis_path: default_genesis_path(),
            protocol_version: default_protocol_version(),
        }
    }
}

impl Default for TailsConfig {
    fn default() -> Self {
        Self {
            base_dir: default_tails_dir(),
        }
    }
}

impl Default for WalkthroughConfig {
    fn default() -> Self {
        Self {
            transcript_rounds: default_transcript_rounds(),
            connection_nonce: default_connection_nonce(),
            steward_seed: default_steward_seed(),
            transcript_average: default_transcript_average(),
            average_threshold: default_average_threshold(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl ScenarioConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            let config: ScenarioConfig = toml::from_str(&contents)?;
            config.validate()?;
            Ok(config)
        } else {
            tracing::debug!(path = %path.display(), "config file absent, using defaults");
            Ok(Self::default())
        }
    }

    /// Save the current config to a TOML file.
    pub fn save(&self, path: &Path) -> Result<(), CoreError> {
        let contents = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Reject settings the walkthrough cannot run with.
    pub fn validate(&self) -> Result<(), CoreError> {
        if !matches!(self.pool.protocol_version, 1 | 2) {
            return Err(CoreError::InvalidConfig(format!(
                "unsupported protocol version {}",
                self.pool.protocol_version
            )));
        }
        if self.pool.name.is_empty() {
            return Err(CoreError::InvalidConfig("pool name is empty".into()));
        }
        if self.walkthrough.transcript_rounds == 0 {
            return Err(CoreError::InvalidConfig(
                "transcript_rounds must be at least 1".into(),
            ));
        }
        if self.walkthrough.transcript_rounds > REGISTRY_CAPACITY as usize {
            return Err(CoreError::InvalidConfig(format!(
                "transcript_rounds exceeds the registry capacity of {}",
                REGISTRY_CAPACITY
            )));
        }
        if self.walkthrough.steward_seed.len() != 32 {
            return Err(CoreError::InvalidConfig(format!(
                "steward seed must be 32 bytes, got {}",
                self.walkthrough.steward_seed.len()
            )));
        }
        let storage = &self.wallet_storage;
        if (storage.library.is_some() || storage.entrypoint.is_some())
            && storage.storage_type.is_none()
        {
            return Err(CoreError::InvalidConfig(
                "library/entrypoint given without a storage_type".into(),
            ));
        }
        for (label, json) in [
            ("storage_config", &storage.storage_config),
            ("storage_credentials", &storage.storage_credentials),
        ] {
            if let Some(raw) = json {
                serde_json::from_str::<serde_json::Value>(raw).map_err(|e| {
                    CoreError::InvalidConfig(format!("{} is not valid JSON: {}", label, e))
                })?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ScenarioConfig::default();
        assert_eq!(config.pool.name, "pool1");
        assert_eq!(config.pool.protocol_version, 2);
        assert_eq!(config.walkthrough.transcript_rounds, 2);
        assert_eq!(config.walkthrough.connection_nonce, 123_456_789);
        assert_eq!(config.selection.policy, SelectionPolicyKind::First);
        assert!(config.wallet_storage.storage_type.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = ScenarioConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let decoded: ScenarioConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(decoded.pool.name, config.pool.name);
        assert_eq!(decoded.logging.level, config.logging.level);
    }

    #[test]
    fn test_config_load_nonexistent_uses_defaults() {
        let config = ScenarioConfig::load(Path::new("/nonexistent/verinym.toml")).unwrap();
        assert_eq!(config.pool.protocol_version, 2);
    }

    #[test]
    fn test_config_from_toml_partial() {
        let toml_str = r#"
[pool]
name = "sandbox"

[selection]
policy = "per_referent"

[selection.per_referent]
attr2_referent = 1
"#;
        let config: ScenarioConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.pool.name, "sandbox");
        assert_eq!(config.pool.protocol_version, 2);
        assert_eq!(config.selection.policy, SelectionPolicyKind::PerReferent);
        assert_eq!(config.selection.per_referent.get("attr2_referent"), Some(&1));
    }

    #[test]
    fn test_validate_rejects_protocol_version() {
        let mut config = ScenarioConfig::default();
        config.pool.protocol_version = 3;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_transcript_rounds_over_capacity() {
        let mut config = ScenarioConfig::default();
        config.walkthrough.transcript_rounds = REGISTRY_CAPACITY as usize;
        assert!(config.validate().is_ok());
        config.walkthrough.transcript_rounds += 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_library_without_type() {
        let mut config = ScenarioConfig::default();
        config.wallet_storage.library = Some(PathBuf::from("libstorage.so"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_storage_json() {
        let mut config = ScenarioConfig::default();
        config.wallet_storage.storage_type = Some("rocksdb".into());
        config.wallet_storage.storage_config = Some("{not json".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!("verinym-config-{}", uuid::Uuid::now_v7()));
        let path = dir.join("verinym.toml");
        let mut config = ScenarioConfig::default();
        config.walkthrough.transcript_rounds = 3;
        config.save(&path).unwrap();
        let loaded = ScenarioConfig::load(&path).unwrap();
        assert_eq!(loaded.walkthrough.transcript_rounds, 3);
        std::fs::remove_dir_all(&dir).ok();
    }
}
