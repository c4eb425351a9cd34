use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use ingest_logging::{ingest_debug, ingest_trace};
use tokio::sync::{mpsc, Semaphore};

use crate::crawl::Crawler;
use crate::decode::detect_encoding;
use crate::dedup::DedupCache;
use crate::extract::ContentExtractor;
use crate::filter::PathFilter;
use crate::indexer::Indexer;
use crate::record::SharedRecord;
use crate::stats::PipelineStats;
use crate::strip::strip_markup;
use crate::types::{DocumentKind, Link, Verdict};

const TITLE_TAG: &str = "title";
const PLAIN_TEXT_EXTENSIONS: &[&str] = &[".txt", ".md"];

/// Per-record work of the three stages, shared by all workers.
pub(crate) struct Stages {
    pub(crate) filter: PathFilter,
    pub(crate) cache: DedupCache,
    pub(crate) expire: Duration,
    pub(crate) defer_delay: Duration,
    pub(crate) crawler: Option<Crawler>,
    pub(crate) indexer: Arc<dyn Indexer>,
    pub(crate) index_permits: Arc<Semaphore>,
    pub(crate) stats: Arc<PipelineStats>,
}

impl Stages {
    /// Filters and deduplicates. Only an accepted record touches the cache.
    pub(crate) fn validate(&self, record: &SharedRecord) -> Verdict {
        let path = record.path();
        let verdict = if record.body().is_empty() && !record.ignored() {
            ingest_debug!("deferring {}: body not ready", path);
            Verdict::Defer
        } else if self.filter.is_eligible(path) && self.cache.accept(path, self.expire) {
            Verdict::Accept
        } else {
            ingest_trace!("rejecting {}", path);
            Verdict::Reject
        };
        self.stats.record_verdict(verdict);
        verdict
    }

    /// Submits `record` to the pipeline input again after the defer delay.
    /// Counted as `resubmitted`, never as `submitted`.
    pub(crate) fn defer(&self, record: SharedRecord, input: mpsc::Sender<SharedRecord>) {
        let delay = self.defer_delay;
        let stats = Arc::clone(&self.stats);
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if input.send(record).await.is_ok() {
                stats.resubmitted();
            }
        });
    }

    /// Classifies the record and enriches it in place. Anything that is
    /// neither titled markup nor a known text file is marked ignored.
    pub(crate) fn parse(&self, record: &SharedRecord) -> DocumentKind {
        let body = record.body();
        let extractor = ContentExtractor::with_encoding(detect_encoding(&body));

        let kind = match extractor.extract_title(&body[..], TITLE_TAG) {
            Ok(title) if !title.is_empty() => {
                if let Some(crawler) = &self.crawler {
                    match extractor.extract_links(&body[..]) {
                        Ok(links) => self.crawl_links(crawler, record.path(), &links),
                        Err(err) => ingest_debug!("{}: link extraction failed: {}", record.path(), err),
                    }
                }
                record.set_title(title);
                record.set_body(Bytes::from(strip_markup(&body)));
                DocumentKind::Html
            }
            _ if is_plain_text(record.path()) => {
                record.set_title(base_name(record.path()).to_string());
                DocumentKind::PlainText
            }
            _ => {
                ingest_debug!("ignoring {}: no title and not a text file", record.path());
                record.ignore();
                DocumentKind::Unsupported
            }
        };
        self.stats.record_kind(kind);
        kind
    }

    /// Hands the record to the indexer without waiting for the outcome.
    /// Waits for a free slot while `index_in_flight` hand-offs are pending.
    pub(crate) async fn index(&self, record: &SharedRecord) {
        let Ok(permit) = Arc::clone(&self.index_permits).acquire_owned().await else {
            return;
        };
        let indexer = Arc::clone(&self.indexer);
        let record = Arc::clone(record);
        tokio::spawn(async move {
            let _permit = permit;
            indexer.pipe(record).await;
        });
        self.stats.indexed();
    }

    fn crawl_links(&self, crawler: &Crawler, record_path: &str, links: &[Link]) {
        for href in links.iter().filter_map(|link| link.get("href")) {
            match crawler.target_path(href, record_path) {
                Some(path) => crawler.dispatch(&path),
                None => ingest_trace!("{}: not crawling {:?}", record_path, href),
            }
        }
    }
}

fn is_plain_text(path: &str) -> bool {
    PLAIN_TEXT_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

fn base_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return if path.is_empty() { "." } else { "/" };
    }
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}
