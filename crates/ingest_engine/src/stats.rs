use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::{DocumentKind, Verdict};

/// Lock-free outcome counters shared by all stage workers.
#[derive(Debug, Default)]
pub struct PipelineStats {
    submitted: AtomicU64,
    resubmitted: AtomicU64,
    accepted: AtomicU64,
    deferred: AtomicU64,
    rejected: AtomicU64,
    html: AtomicU64,
    plain_text: AtomicU64,
    ignored: AtomicU64,
    indexed: AtomicU64,
    crawl_dispatched: AtomicU64,
    crawl_dropped: AtomicU64,
    crawl_failed: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Producer calls to `pipe`/`submit`.
    pub submitted: u64,
    /// Deferred records put back on the input.
    pub resubmitted: u64,
    pub accepted: u64,
    pub deferred: u64,
    pub rejected: u64,
    pub html: u64,
    pub plain_text: u64,
    pub ignored: u64,
    pub indexed: u64,
    pub crawl_dispatched: u64,
    pub crawl_dropped: u64,
    pub crawl_failed: u64,
}

impl PipelineStats {
    pub(crate) fn submitted(&self) {
        bump(&self.submitted);
    }

    pub(crate) fn resubmitted(&self) {
        bump(&self.resubmitted);
    }

    pub(crate) fn record_verdict(&self, verdict: Verdict) {
        match verdict {
            Verdict::Accept => bump(&self.accepted),
            Verdict::Defer => bump(&self.deferred),
            Verdict::Reject => bump(&self.rejected),
        }
    }

    pub(crate) fn record_kind(&self, kind: DocumentKind) {
        match kind {
            DocumentKind::Html => bump(&self.html),
            DocumentKind::PlainText => bump(&self.plain_text),
            DocumentKind::Unsupported => bump(&self.ignored),
        }
    }

    pub(crate) fn indexed(&self) {
        bump(&self.indexed);
    }

    pub(crate) fn crawl_dispatched(&self) {
        bump(&self.crawl_dispatched);
    }

    pub(crate) fn crawl_dropped(&self) {
        bump(&self.crawl_dropped);
    }

    pub(crate) fn crawl_failed(&self) {
        bump(&self.crawl_failed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        StatsSnapshot {
            submitted: load(&self.submitted),
            resubmitted: load(&self.resubmitted),
            accepted: load(&self.accepted),
            deferred: load(&self.deferred),
            rejected: load(&self.rejected),
            html: load(&self.html),
            plain_text: load(&self.plain_text),
            ignored: load(&self.ignored),
            indexed: load(&self.indexed),
            crawl_dispatched: load(&self.crawl_dispatched),
            crawl_dropped: load(&self.crawl_dropped),
            crawl_failed: load(&self.crawl_failed),
        }
    }
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "submitted={} resubmitted={} accepted={} deferred={} rejected={} html={} text={} ignored={} indexed={} crawl={}/{}/{} (sent/dropped/failed)",
            self.submitted,
            self.resubmitted,
            self.accepted,
            self.deferred,
            self.rejected,
            self.html,
            self.plain_text,
            self.ignored,
            self.indexed,
            self.crawl_dispatched,
            self.crawl_dropped,
            self.crawl_failed,
        )
    }
}
