use std::time::Duration;

use serde::Deserialize;

use crate::crawl::CrawlSettings;
use crate::dedup::DedupSettings;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid path pattern {pattern:?}: {message}")]
    InvalidPattern { pattern: String, message: String },
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
    #[error("invalid crawl hostname {0:?}")]
    InvalidHostname(String),
    #[error("unsupported crawl scheme {0:?}")]
    InvalidScheme(String),
    #[error("malformed configuration: {0}")]
    Malformed(String),
}

/// Everything the pipeline reads at construction. Read-only afterwards.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Regular expressions; a matching path is never indexed.
    pub exclude_paths: Vec<String>,
    /// Regular expressions; a path must match one of these to be indexed.
    pub include_paths: Vec<String>,
    /// How long an accepted path is shielded from re-processing.
    pub expire_secs: u64,
    /// Workers per stage.
    pub workers: usize,
    /// Capacity of each inter-stage channel.
    pub buffer: usize,
    /// Wait before an empty-body record is submitted again.
    pub defer_delay_ms: u64,
    pub heartbeat_interval_ms: u64,
    /// Indexer hand-offs allowed in flight at once; the index stage waits
    /// for a free slot beyond that.
    pub index_in_flight: usize,
    pub dedup: DedupSettings,
    pub crawl: CrawlSettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            exclude_paths: Vec::new(),
            include_paths: vec!["^/".to_string()],
            expire_secs: 60 * 60,
            workers: 1,
            buffer: 64,
            defer_delay_ms: 50,
            heartbeat_interval_ms: 1_000,
            index_in_flight: 64,
            dedup: DedupSettings::default(),
            crawl: CrawlSettings::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(raw).map_err(|err| ConfigError::Malformed(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::Zero { field: "workers" });
        }
        if self.buffer == 0 {
            return Err(ConfigError::Zero { field: "buffer" });
        }
        if self.heartbeat_interval_ms == 0 {
            return Err(ConfigError::Zero {
                field: "heartbeat_interval_ms",
            });
        }
        if self.index_in_flight == 0 {
            return Err(ConfigError::Zero {
                field: "index_in_flight",
            });
        }
        if self.dedup.capacity == 0 {
            return Err(ConfigError::Zero {
                field: "dedup.capacity",
            });
        }
        self.crawl.validate()
    }

    pub fn expire(&self) -> Duration {
        Duration::from_secs(self.expire_secs)
    }

    pub fn defer_delay(&self) -> Duration {
        Duration::from_millis(self.defer_delay_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }
}
