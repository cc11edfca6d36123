use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::IngestError;
use crate::types::TableRef;

/// TOML-backed configuration loaded from disk.
/// Tokens and the database URL stay as env vars.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub graph: GraphConfig,
    #[serde(default)]
    pub ga4: Option<Ga4Config>,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    pub warehouse: WarehouseConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GraphConfig {
    pub api_version: String,
    pub page_id: String,
    pub metrics: Vec<String>,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Ga4Config {
    pub property_id: String,
    #[serde(default)]
    pub base_url: Option<String>,
    /// First day worth fetching when the traffic table is empty, as a
    /// quoted `YYYY-MM-DD` string.
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    #[serde(default = "default_chunk_days")]
    pub chunk_days: u32,
    #[serde(default = "default_chunk_days")]
    pub ga4_chunk_days: u32,
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
    #[serde(default = "default_concurrency")]
    pub enrichment_concurrency: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            chunk_days: default_chunk_days(),
            ga4_chunk_days: default_chunk_days(),
            lookback_days: default_lookback_days(),
            enrichment_concurrency: default_concurrency(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffKind {
    Fixed,
    Exponential,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    #[serde(default = "default_backoff")]
    pub backoff: BackoffKind,
}

impl RetryConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_ms: default_delay_ms(),
            backoff: default_backoff(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WarehouseConfig {
    pub project: String,
    pub dataset: String,
    #[serde(default = "default_insights_table")]
    pub insights_table: String,
    #[serde(default = "default_posts_table")]
    pub posts_table: String,
    #[serde(default = "default_traffic_table")]
    pub traffic_table: String,
}

impl WarehouseConfig {
    pub fn insights(&self) -> TableRef {
        TableRef::new(&self.project, &self.dataset, &self.insights_table)
    }

    pub fn posts(&self) -> TableRef {
        TableRef::new(&self.project, &self.dataset, &self.posts_table)
    }

    pub fn traffic(&self) -> TableRef {
        TableRef::new(&self.project, &self.dataset, &self.traffic_table)
    }
}

fn default_page_size() -> u32 {
    50
}
fn default_chunk_days() -> u32 {
    30
}
fn default_lookback_days() -> u32 {
    365
}
fn default_concurrency() -> usize {
    10
}
fn default_max_attempts() -> u32 {
    3
}
fn default_delay_ms() -> u64 {
    2_000
}
fn default_backoff() -> BackoffKind {
    BackoffKind::Fixed
}
fn default_insights_table() -> String {
    "page_insights".to_string()
}
fn default_posts_table() -> String {
    "post_insights".to_string()
}
fn default_traffic_table() -> String {
    "ga4_historical_summary".to_string()
}

impl FileConfig {
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: FileConfig = toml::from_str(content).context("Failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> std::result::Result<(), IngestError> {
        let bad = |msg: &str| Err(IngestError::Config(msg.to_string()));

        if self.graph.page_id.trim().is_empty() {
            return bad("graph.page_id must not be empty");
        }
        if self.graph.metrics.is_empty() {
            return bad("graph.metrics must list at least one metric");
        }
        if self.graph.page_size == 0 {
            return bad("graph.page_size must be at least 1");
        }
        if self.sync.chunk_days == 0 || self.sync.ga4_chunk_days == 0 {
            return bad("sync chunk widths must be at least 1 day");
        }
        if self.sync.enrichment_concurrency == 0 {
            return bad("sync.enrichment_concurrency must be at least 1");
        }
        if self.retry.max_attempts == 0 {
            return bad("retry.max_attempts must be at least 1");
        }
        if let Some(ga4) = &self.ga4 {
            if ga4.property_id.trim().is_empty() {
                return bad("ga4.property_id must not be empty");
            }
        }

        self.warehouse.insights().validate()?;
        self.warehouse.posts().validate()?;
        self.warehouse.traffic().validate()?;
        Ok(())
    }
}

/// Load, parse and validate a TOML config file.
pub fn load_config(path: &Path) -> Result<FileConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    FileConfig::from_toml(&content)
        .with_context(|| format!("Invalid config file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [graph]
        api_version = "v19.0"
        page_id = "1234567890"
        metrics = ["page_impressions", "page_post_engagements"]

        [warehouse]
        project = "analytics"
        dataset = "raw_social"
    "#;

    #[test]
    fn minimal_config_fills_defaults() {
        let config = FileConfig::from_toml(MINIMAL).unwrap();
        assert_eq!(config.graph.page_size, 50);
        assert_eq!(config.sync.chunk_days, 30);
        assert_eq!(config.sync.lookback_days, 365);
        assert_eq!(config.sync.enrichment_concurrency, 10);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.delay(), Duration::from_secs(2));
        assert_eq!(config.retry.backoff, BackoffKind::Fixed);
        assert!(config.ga4.is_none());
        assert_eq!(
            config.warehouse.insights().to_string(),
            "analytics.raw_social.page_insights"
        );
    }

    #[test]
    fn zero_chunk_width_is_rejected() {
        let toml = format!("{MINIMAL}\n[sync]\nchunk_days = 0\n");
        let err = FileConfig::from_toml(&toml).unwrap_err();
        assert!(format!("{err:#}").contains("chunk widths"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let toml = format!("{MINIMAL}\n[retry]\nattempts = 5\n");
        assert!(FileConfig::from_toml(&toml).is_err());
    }

    #[test]
    fn invalid_table_identifier_is_rejected() {
        let toml = MINIMAL.replace("raw_social", "raw-social");
        assert!(FileConfig::from_toml(&toml).is_err());
    }

    #[test]
    fn ga4_section_parses_start_date() {
        let toml = format!(
            "{MINIMAL}\n[ga4]\nproperty_id = \"987654\"\nstart_date = \"2023-01-01\"\n"
        );
        let config = FileConfig::from_toml(&toml).unwrap();
        let ga4 = config.ga4.unwrap();
        assert_eq!(ga4.property_id, "987654");
        assert_eq!(ga4.start_date, NaiveDate::from_ymd_opt(2023, 1, 1));
    }

    #[test]
    fn exponential_backoff_parses() {
        let toml = format!("{MINIMAL}\n[retry]\nbackoff = \"exponential\"\ndelay_ms = 10\n");
        let config = FileConfig::from_toml(&toml).unwrap();
        assert_eq!(config.retry.backoff, BackoffKind::Exponential);
        assert_eq!(config.retry.delay(), Duration::from_millis(10));
    }
}
