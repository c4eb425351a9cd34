use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use ingest_logging::{ingest_debug, ingest_info, ingest_trace, ingest_warn};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, Mutex, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{ConfigError, PipelineConfig};
use crate::crawl::{CrawlClient, Crawler, ReqwestCrawlClient};
use crate::dedup::DedupCache;
use crate::filter::PathFilter;
use crate::indexer::Indexer;
use crate::record::SharedRecord;
use crate::stage::Stages;
use crate::stats::{PipelineStats, StatsSnapshot};
use crate::types::{CrawlError, Stage, Verdict};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("crawl client: {0}")]
    Crawl(#[from] CrawlError),
    #[error("pipeline must be started inside a tokio runtime")]
    NoRuntime,
}

type SharedReceiver = Arc<Mutex<mpsc::Receiver<SharedRecord>>>;

/// Validate → parse → index over bounded channels, each stage served by its
/// own pool of workers. Records of one path move through the stages in
/// order; records of different paths may overtake each other.
pub struct Pipeline {
    runtime: Handle,
    input: mpsc::Sender<SharedRecord>,
    stats: Arc<PipelineStats>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl Pipeline {
    /// Builds the pipeline and starts its workers on the current runtime.
    /// Crawl fetches, when enabled, go through reqwest.
    pub fn new(config: PipelineConfig, indexer: Arc<dyn Indexer>) -> Result<Self, PipelineError> {
        let client: Option<Arc<dyn CrawlClient>> = if config.crawl.is_enabled() {
            Some(Arc::new(ReqwestCrawlClient::new(&config.crawl)?))
        } else {
            None
        };
        Self::build(config, indexer, client)
    }

    pub fn with_crawl_client(
        config: PipelineConfig,
        indexer: Arc<dyn Indexer>,
        client: Arc<dyn CrawlClient>,
    ) -> Result<Self, PipelineError> {
        Self::build(config, indexer, Some(client))
    }

    fn build(
        config: PipelineConfig,
        indexer: Arc<dyn Indexer>,
        client: Option<Arc<dyn CrawlClient>>,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| PipelineError::NoRuntime)?;
        let filter = PathFilter::from_patterns(&config.exclude_paths, &config.include_paths)?;
        let capacity = NonZeroUsize::new(config.dedup.capacity).ok_or(ConfigError::Zero {
            field: "dedup.capacity",
        })?;

        let stats = Arc::new(PipelineStats::default());
        let crawler = match client {
            Some(client) if config.crawl.is_enabled() => Some(Crawler::new(
                config.crawl.clone(),
                client,
                Arc::clone(&stats),
            )),
            _ => None,
        };
        let stages = Arc::new(Stages {
            filter,
            cache: DedupCache::new(capacity),
            expire: config.expire(),
            defer_delay: config.defer_delay(),
            crawler,
            indexer,
            index_permits: Arc::new(Semaphore::new(config.index_in_flight)),
            stats: Arc::clone(&stats),
        });

        let (input_tx, input_rx) = mpsc::channel(config.buffer);
        let (parse_tx, parse_rx) = mpsc::channel(config.buffer);
        let (index_tx, index_rx) = mpsc::channel(config.buffer);
        let (out_tx, out_rx) = mpsc::channel(config.buffer);
        let input_rx = shared(input_rx);
        let parse_rx = shared(parse_rx);
        let index_rx = shared(index_rx);

        let cancel = CancellationToken::new();
        let mut tasks = Vec::with_capacity(config.workers * 3 + 1);
        for worker in 0..config.workers {
            tasks.push(runtime.spawn(validate_worker(
                worker,
                Arc::clone(&stages),
                Arc::clone(&input_rx),
                parse_tx.clone(),
                input_tx.clone(),
                cancel.clone(),
            )));
            tasks.push(runtime.spawn(parse_worker(
                worker,
                Arc::clone(&stages),
                Arc::clone(&parse_rx),
                index_tx.clone(),
                cancel.clone(),
            )));
            tasks.push(runtime.spawn(index_worker(
                worker,
                Arc::clone(&stages),
                Arc::clone(&index_rx),
                out_tx.clone(),
                cancel.clone(),
            )));
        }
        tasks.push(runtime.spawn(heartbeat(
            out_rx,
            config.heartbeat_interval(),
            Arc::clone(&stats),
            cancel.clone(),
        )));

        ingest_info!(
            "pipeline started: workers={} buffer={} expire={}s crawl={}",
            config.workers,
            config.buffer,
            config.expire_secs,
            if config.crawl.is_enabled() {
                config.crawl.hostname.as_str()
            } else {
                "off"
            }
        );

        Ok(Self {
            runtime,
            input: input_tx,
            stats,
            cancel,
            tasks,
        })
    }

    /// Enqueues a record for validation, waiting while the input is full.
    pub async fn pipe(&self, record: SharedRecord) {
        self.stats.submitted();
        if let Err(err) = self.input.send(record).await {
            ingest_warn!("pipeline stopped, dropping {}", err.0.path());
        }
    }

    /// Enqueues a record without waiting. Callable from outside the runtime.
    pub fn submit(&self, record: SharedRecord) {
        self.stats.submitted();
        let input = self.input.clone();
        self.runtime.spawn(async move {
            if let Err(err) = input.send(record).await {
                ingest_warn!("pipeline stopped, dropping {}", err.0.path());
            }
        });
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Stops all workers and waits for them. Records still buffered are
    /// dropped; detached crawl and indexer tasks run to completion on their own.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        for task in std::mem::take(&mut self.tasks) {
            let _ = task.await;
        }
        ingest_info!("pipeline stopped: {}", self.stats.snapshot());
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn shared(rx: mpsc::Receiver<SharedRecord>) -> SharedReceiver {
    Arc::new(Mutex::new(rx))
}

async fn next_record(rx: &SharedReceiver, cancel: &CancellationToken) -> Option<SharedRecord> {
    tokio::select! {
        _ = cancel.cancelled() => None,
        record = async { rx.lock().await.recv().await } => record,
    }
}

/// Blocks while the downstream stage is full. False once the pipeline stops.
async fn forward(
    tx: &mpsc::Sender<SharedRecord>,
    record: SharedRecord,
    cancel: &CancellationToken,
) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        sent = tx.send(record) => sent.is_ok(),
    }
}

async fn validate_worker(
    worker: usize,
    stages: Arc<Stages>,
    rx: SharedReceiver,
    parse_tx: mpsc::Sender<SharedRecord>,
    input_tx: mpsc::Sender<SharedRecord>,
    cancel: CancellationToken,
) {
    while let Some(record) = next_record(&rx, &cancel).await {
        match stages.validate(&record) {
            Verdict::Accept => {
                if !forward(&parse_tx, record, &cancel).await {
                    break;
                }
            }
            Verdict::Defer => stages.defer(record, input_tx.clone()),
            Verdict::Reject => {}
        }
    }
    ingest_debug!("{} worker {} stopped", Stage::Validate, worker);
}

async fn parse_worker(
    worker: usize,
    stages: Arc<Stages>,
    rx: SharedReceiver,
    index_tx: mpsc::Sender<SharedRecord>,
    cancel: CancellationToken,
) {
    while let Some(record) = next_record(&rx, &cancel).await {
        if stages.parse(&record).is_indexable() && !forward(&index_tx, record, &cancel).await {
            break;
        }
    }
    ingest_debug!("{} worker {} stopped", Stage::Parse, worker);
}

async fn index_worker(
    worker: usize,
    stages: Arc<Stages>,
    rx: SharedReceiver,
    out_tx: mpsc::Sender<SharedRecord>,
    cancel: CancellationToken,
) {
    while let Some(record) = next_record(&rx, &cancel).await {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = stages.index(&record) => {}
        }
        if !forward(&out_tx, record, &cancel).await {
            break;
        }
    }
    ingest_debug!("{} worker {} stopped", Stage::Index, worker);
}

/// Drains the final stage so it never backs up, and periodically reports.
async fn heartbeat(
    mut out: mpsc::Receiver<SharedRecord>,
    interval: Duration,
    stats: Arc<PipelineStats>,
    cancel: CancellationToken,
) {
    let mut tick = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            record = out.recv() => match record {
                Some(record) => ingest_trace!("indexed {}", record.path()),
                None => break,
            },
            _ = tick.tick() => ingest_debug!("pipeline heartbeat: {}", stats.snapshot()),
        }
    }
}
