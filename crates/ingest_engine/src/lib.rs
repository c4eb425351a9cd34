//! Ingestion engine: validate → parse → index pipeline for served pages.
mod config;
mod crawl;
mod decode;
mod dedup;
mod extract;
mod filter;
mod indexer;
mod pipeline;
mod record;
mod stage;
mod stats;
mod strip;
mod types;

pub use config::{ConfigError, PipelineConfig};
pub use crawl::{crawl_path, CrawlClient, CrawlSettings, ReqwestCrawlClient};
pub use decode::detect_encoding;
pub use dedup::{Clock, DedupCache, DedupSettings};
pub use extract::{ContentExtractor, ExtractError};
pub use filter::PathFilter;
pub use indexer::{ChannelIndexer, Indexer};
pub use pipeline::{Pipeline, PipelineError};
pub use record::{PageRecord, Record, SharedRecord};
pub use stats::{PipelineStats, StatsSnapshot};
pub use strip::strip_markup;
pub use types::{CrawlError, CrawlFailure, DocumentKind, Link, Stage, Verdict};
