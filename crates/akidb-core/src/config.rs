//! Configuration management for the AkiDB metadata control plane
//!
//! Supports:
//! - YAML/TOML configuration files
//! - Environment variable overrides
//! - Reasonable defaults
//! - Configuration validation

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Root configuration structure for the metadata control plane
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct McpConfig {
    #[serde(default)]
    pub segment: SegmentConfig,
}

impl McpConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Environment variables (highest priority)
    /// 2. Config file specified by AKIDB_MCP_CONFIG env var
    /// 3. ./config/akidb-mcp.yaml
    /// 4. /etc/akidb/akidb-mcp.yaml
    /// 5. Hardcoded defaults (lowest priority)
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        builder = Self::set_defaults(builder)?;

        if let Ok(config_path) = std::env::var("AKIDB_MCP_CONFIG") {
            builder = builder.add_source(File::with_name(&config_path).required(false));
        }

        builder = builder
            .add_source(File::with_name("./config/akidb-mcp").required(false))
            .add_source(File::with_name("/etc/akidb/akidb-mcp").required(false));

        // Example: AKIDB_MCP__SEGMENT__MAX_SEGMENT_BYTES=268435456
        builder = builder.add_source(
            Environment::with_prefix("AKIDB_MCP")
                .separator("__")
                .try_parsing(true),
        );

        let config: McpConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        tracing::debug!(?config, "Loaded metadata control plane configuration");
        Ok(config)
    }

    fn set_defaults(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        let defaults = SegmentConfig::default();
        builder
            .set_default("segment.max_segment_bytes", defaults.max_segment_bytes as i64)?
            .set_default("segment.soft_fill_threshold", defaults.soft_fill_threshold)?
            .set_default(
                "segment.min_assign_increment",
                defaults.min_assign_increment as i64,
            )?
            .set_default(
                "segment.assign_expiration_ms",
                defaults.assign_expiration_ms as i64,
            )?
            .set_default("segment.soft_full_policy", defaults.soft_full_policy.as_str())?
            .set_default("segment.mailbox_capacity", defaults.mailbox_capacity as i64)?
            .set_default(
                "segment.sync_channel_capacity",
                defaults.sync_channel_capacity as i64,
            )
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.segment.validate()
    }

    /// Load configuration from a specific file path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config: McpConfig = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()?
            .try_deserialize()?;
        config.validate()?;

        Ok(config)
    }
}

/// How segments that crossed the soft-fill threshold are treated by allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SoftFullPolicy {
    /// Never grant new rows to a soft-full segment.
    Exclude,
    /// Grant to soft-full segments only after every other segment was tried.
    Deprioritize,
}

impl SoftFullPolicy {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Exclude => "exclude",
            Self::Deprioritize => "deprioritize",
        }
    }
}

/// Growing segment allocation and sealing
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SegmentConfig {
    /// Maximum segment size in bytes; divided by the record size to get a segment's row capacity
    pub max_segment_bytes: u64,

    /// Fill ratio (allocated / capacity) at which the assigner schedules a segment for sealing
    pub soft_fill_threshold: f64,

    /// Segments with less remaining room than this many rows stop receiving grants
    pub min_assign_increment: u64,

    /// Interval of the reservation-expiration sweep in milliseconds
    pub assign_expiration_ms: u64,

    /// Treatment of soft-full segments by the first-fit search
    pub soft_full_policy: SoftFullPolicy,

    /// Bounded capacity of the segment manager's request mailbox
    pub mailbox_capacity: usize,

    /// Bounded capacity of the outbound proxy-sync signal channel
    pub sync_channel_capacity: usize,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            max_segment_bytes: 512 * 1024 * 1024,
            soft_fill_threshold: 0.75,
            min_assign_increment: 1024,
            assign_expiration_ms: 2000,
            soft_full_policy: SoftFullPolicy::Exclude,
            mailbox_capacity: 1024,
            sync_channel_capacity: 1024,
        }
    }
}

impl SegmentConfig {
    /// Sweep interval as Duration
    pub fn assign_expiration(&self) -> Duration {
        Duration::from_millis(self.assign_expiration_ms)
    }

    /// Validate segment configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_segment_bytes == 0 {
            return Err(ConfigError::Message(
                "segment.max_segment_bytes must be > 0".to_string(),
            ));
        }

        if !(self.soft_fill_threshold > 0.0 && self.soft_fill_threshold <= 1.0) {
            return Err(ConfigError::Message(
                "segment.soft_fill_threshold must be in (0, 1]".to_string(),
            ));
        }

        if self.assign_expiration_ms == 0 {
            return Err(ConfigError::Message(
                "segment.assign_expiration_ms must be > 0".to_string(),
            ));
        }

        if self.mailbox_capacity == 0 || self.sync_channel_capacity == 0 {
            return Err(ConfigError::Message(
                "segment channel capacities must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}
