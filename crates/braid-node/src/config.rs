//! Node configuration types

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Complete node configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Node operation settings
    #[serde(default)]
    pub node: NodeSettings,

    /// Intake pipeline settings
    #[serde(default)]
    pub intake: IntakeSettings,

    /// Consensus parameters
    #[serde(default)]
    pub consensus: ConsensusSettings,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl NodeConfig {
    /// Load configuration from a TOML file, with `BRAID_`-prefixed
    /// environment variables overriding file values
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.to_path_buf()).required(false))
            .add_source(config::Environment::with_prefix("BRAID").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

/// Basic node settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeSettings {
    /// Chain identifier
    #[serde(default = "default_chain_id")]
    pub chain_id: String,

    /// Node name
    #[serde(default = "default_node_name")]
    pub name: String,

    /// Data directory
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

fn default_chain_id() -> String {
    "braid-testnet-1".to_string()
}

fn default_node_name() -> String {
    "braid-node".to_string()
}

fn default_data_dir() -> String {
    "./data".to_string()
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            chain_id: default_chain_id(),
            name: default_node_name(),
            data_dir: default_data_dir(),
        }
    }
}

/// Intake pipeline settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IntakeSettings {
    /// Capacity of the inbound command channel feeding the intake
    /// stage
    #[serde(default = "default_command_capacity")]
    pub command_channel_capacity: usize,

    /// Capacity of the released-events channel consumed by consensus
    #[serde(default = "default_released_capacity")]
    pub released_channel_capacity: usize,
}

fn default_command_capacity() -> usize {
    1024
}

fn default_released_capacity() -> usize {
    1024
}

impl Default for IntakeSettings {
    fn default() -> Self {
        Self {
            command_channel_capacity: default_command_capacity(),
            released_channel_capacity: default_released_capacity(),
        }
    }
}

/// Consensus parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConsensusSettings {
    /// Number of recent rounds kept non-ancient; also the span covered
    /// by a synthetic bootstrap snapshot
    #[serde(default = "default_non_ancient_round_span")]
    pub non_ancient_round_span: u64,
}

fn default_non_ancient_round_span() -> u64 {
    26
}

impl Default for ConsensusSettings {
    fn default() -> Self {
        Self {
            non_ancient_round_span: default_non_ancient_round_span(),
        }
    }
}

/// Logging configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Color output
    #[serde(default = "default_true")]
    pub color: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            color: true,
        }
    }
}

/// Metrics configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable metrics
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics address
    #[serde(default = "default_metrics_address")]
    pub address: String,
}

fn default_metrics_address() -> String {
    "127.0.0.1:9615".to_string()
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            address: default_metrics_address(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = NodeConfig::default();
        assert_eq!(config.node.chain_id, "braid-testnet-1");
        assert_eq!(config.intake.command_channel_capacity, 1024);
        assert_eq!(config.consensus.non_ancient_round_span, 26);
        assert!(config.metrics.enabled);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = NodeConfig::load(Path::new("/nonexistent/braid.toml")).unwrap();
        assert_eq!(config.consensus.non_ancient_round_span, 26);
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("braid.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            r#"
[node]
chain_id = "braid-local"

[consensus]
non_ancient_round_span = 8

[metrics]
enabled = false
"#
        )
        .unwrap();

        let config = NodeConfig::load(&path).unwrap();
        assert_eq!(config.node.chain_id, "braid-local");
        assert_eq!(config.consensus.non_ancient_round_span, 8);
        assert!(!config.metrics.enabled);
        // Untouched sections keep their defaults.
        assert_eq!(config.intake.released_channel_capacity, 1024);
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = NodeConfig::default();
        let serialized = toml::to_string(&config).unwrap();
        let parsed: NodeConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed.node.name, config.node.name);
        assert_eq!(
            parsed.consensus.non_ancient_round_span,
            config.consensus.non_ancient_round_span
        );
    }
}
