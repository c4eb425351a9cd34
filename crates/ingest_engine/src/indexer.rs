use tokio::sync::mpsc;

use crate::record::SharedRecord;

/// Downstream store for enriched records. The pipeline never waits on or
/// inspects the outcome; failures are the indexer's own business.
#[async_trait::async_trait]
pub trait Indexer: Send + Sync {
    async fn pipe(&self, record: SharedRecord);
}

/// Forwards enriched records into a bounded channel.
pub struct ChannelIndexer {
    tx: mpsc::Sender<SharedRecord>,
}

impl ChannelIndexer {
    pub fn new(tx: mpsc::Sender<SharedRecord>) -> Self {
        Self { tx }
    }

    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<SharedRecord>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self::new(tx), rx)
    }
}

#[async_trait::async_trait]
impl Indexer for ChannelIndexer {
    async fn pipe(&self, record: SharedRecord) {
        let _ = self.tx.send(record).await;
    }
}
