use std::sync::Arc;
use std::time::Duration;

use ingest_logging::{ingest_debug, ingest_warn};
use serde::Deserialize;
use tokio::sync::Semaphore;
use url::Url;

use crate::config::ConfigError;
use crate::stats::PipelineStats;
use crate::{CrawlError, CrawlFailure};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlSettings {
    /// Host, optionally with `:port`, that discovered links are fetched from.
    /// Empty disables crawling.
    pub hostname: String,
    pub scheme: String,
    /// Crawl fetches allowed in flight at once; extra links are dropped.
    pub max_in_flight: usize,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub redirect_limit: usize,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            hostname: String::new(),
            scheme: "http".to_string(),
            max_in_flight: 32,
            connect_timeout_ms: 5_000,
            request_timeout_ms: 30_000,
            redirect_limit: 5,
        }
    }
}

impl CrawlSettings {
    pub fn is_enabled(&self) -> bool {
        !self.hostname.is_empty()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(self.scheme.as_str(), "http" | "https") {
            return Err(ConfigError::InvalidScheme(self.scheme.clone()));
        }
        if self.max_in_flight == 0 {
            return Err(ConfigError::Zero {
                field: "crawl.max_in_flight",
            });
        }
        if !self.is_enabled() {
            return Ok(());
        }
        let invalid = || ConfigError::InvalidHostname(self.hostname.clone());
        if self.hostname.contains(['/', '?', '#', '@']) {
            return Err(invalid());
        }
        let parsed = Url::parse(&format!("{}://{}/", self.scheme, self.hostname))
            .map_err(|_| invalid())?;
        if parsed.host_str().is_none() {
            return Err(invalid());
        }
        Ok(())
    }

    pub fn url_for(&self, path: &str) -> String {
        format!("{}://{}{}", self.scheme, self.hostname, path)
    }

    fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Issues the GET that makes the serving layer see a page. The response body
/// is never read.
#[async_trait::async_trait]
pub trait CrawlClient: Send + Sync {
    async fn get(&self, url: &str) -> Result<(), CrawlError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestCrawlClient {
    client: reqwest::Client,
}

impl ReqwestCrawlClient {
    pub fn new(settings: &CrawlSettings) -> Result<Self, CrawlError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout())
            .timeout(settings.request_timeout())
            .redirect(reqwest::redirect::Policy::limited(settings.redirect_limit))
            .build()
            .map_err(|err| CrawlError::new(CrawlFailure::Network, err.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl CrawlClient for ReqwestCrawlClient {
    async fn get(&self, url: &str) -> Result<(), CrawlError> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|err| CrawlError::new(CrawlFailure::InvalidUrl, err.to_string()))?;
        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(CrawlError::new(
                CrawlFailure::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }
        Ok(())
    }
}

fn map_reqwest_error(err: reqwest::Error) -> CrawlError {
    if err.is_timeout() {
        return CrawlError::new(CrawlFailure::Timeout, err.to_string());
    }
    if err.is_redirect() {
        return CrawlError::new(CrawlFailure::RedirectLimitExceeded, err.to_string());
    }
    CrawlError::new(CrawlFailure::Network, err.to_string())
}

/// Fire-and-forget fetches of same-host links, bounded by a permit pool.
pub(crate) struct Crawler {
    settings: CrawlSettings,
    client: Arc<dyn CrawlClient>,
    permits: Arc<Semaphore>,
    stats: Arc<PipelineStats>,
}

impl Crawler {
    pub(crate) fn new(
        settings: CrawlSettings,
        client: Arc<dyn CrawlClient>,
        stats: Arc<PipelineStats>,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(settings.max_in_flight));
        Self {
            settings,
            client,
            permits,
            stats,
        }
    }

    pub(crate) fn target_path(&self, href: &str, record_path: &str) -> Option<String> {
        crawl_path(href, &self.settings.hostname, record_path)
    }

    /// Spawns the fetch of `path` and returns immediately. Never fails the
    /// caller: saturation and fetch errors are only counted and logged.
    pub(crate) fn dispatch(&self, path: &str) {
        let url = self.settings.url_for(path);
        let Ok(permit) = Arc::clone(&self.permits).try_acquire_owned() else {
            self.stats.crawl_dropped();
            ingest_warn!("crawl saturated, dropping {}", url);
            return;
        };

        self.stats.crawl_dispatched();
        let client = Arc::clone(&self.client);
        let stats = Arc::clone(&self.stats);
        tokio::spawn(async move {
            let _permit = permit;
            match client.get(&url).await {
                Ok(()) => ingest_debug!("crawled {}", url),
                Err(err) => {
                    stats.crawl_failed();
                    ingest_debug!("crawl of {} failed: {}", url, err);
                }
            }
        });
    }
}

/// Works out the path, if any, at which a link found on `record_path` should
/// be fetched from `hostname`.
///
/// Only relative links and http(s) links to `hostname` qualify. Query and
/// fragment are dropped; a path not already under `record_path` is placed
/// under it.
pub fn crawl_path(href: &str, hostname: &str, record_path: &str) -> Option<String> {
    let href = href.trim();
    let path = if href.starts_with("//") {
        same_host_path(&Url::parse(&format!("http:{href}")).ok()?, hostname)?
    } else {
        match Url::parse(href) {
            Ok(url) => same_host_path(&url, hostname)?,
            Err(url::ParseError::RelativeUrlWithoutBase) => relative_path(href)?,
            Err(_) => return None,
        }
    };
    if path.is_empty() {
        return None;
    }

    let joined = join_under(record_path, &path);
    if joined.starts_with('/') {
        Some(joined)
    } else {
        Some(format!("/{joined}"))
    }
}

fn same_host_path(url: &Url, hostname: &str) -> Option<String> {
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    let host = match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        (None, _) => String::new(),
    };
    if !host.is_empty() && !host.eq_ignore_ascii_case(hostname) {
        return None;
    }
    Some(url.path().to_string())
}

fn relative_path(href: &str) -> Option<String> {
    let end = href.find(['?', '#']).unwrap_or(href.len());
    let path = &href[..end];
    if path.is_empty() {
        None
    } else {
        Some(path.to_string())
    }
}

fn join_under(record_path: &str, path: &str) -> String {
    if path.starts_with(record_path) {
        return path.to_string();
    }
    match (record_path.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{record_path}{}", &path[1..]),
        (false, false) => format!("{record_path}/{path}"),
        _ => format!("{record_path}{path}"),
    }
}
