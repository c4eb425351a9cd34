use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use bytes::Bytes;

/// A document flowing through the pipeline.
///
/// Producers own the concrete type; the pipeline only shares it and mutates it
/// in place through this capability set. `ignore` is one-way.
pub trait Record: Send + Sync {
    fn path(&self) -> &str;
    fn body(&self) -> Bytes;
    fn set_body(&self, body: Bytes);
    fn title(&self) -> String;
    fn set_title(&self, title: String);
    fn ignored(&self) -> bool;
    fn ignore(&self);
}

pub type SharedRecord = Arc<dyn Record>;

/// In-memory record, as built by the serving layer for one page.
#[derive(Debug, Default)]
pub struct PageRecord {
    path: String,
    body: RwLock<Bytes>,
    title: RwLock<String>,
    ignored: AtomicBool,
}

impl PageRecord {
    pub fn new(path: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            path: path.into(),
            body: RwLock::new(body.into()),
            ..Self::default()
        }
    }

    pub fn shared(path: impl Into<String>, body: impl Into<Bytes>) -> SharedRecord {
        Arc::new(Self::new(path, body))
    }
}

impl Record for PageRecord {
    fn path(&self) -> &str {
        &self.path
    }

    fn body(&self) -> Bytes {
        match self.body.read() {
            Ok(body) => body.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn set_body(&self, body: Bytes) {
        match self.body.write() {
            Ok(mut slot) => *slot = body,
            Err(poisoned) => *poisoned.into_inner() = body,
        }
    }

    fn title(&self) -> String {
        match self.title.read() {
            Ok(title) => title.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn set_title(&self, title: String) {
        match self.title.write() {
            Ok(mut slot) => *slot = title,
            Err(poisoned) => *poisoned.into_inner() = title,
        }
    }

    fn ignored(&self) -> bool {
        self.ignored.load(Ordering::Acquire)
    }

    fn ignore(&self) {
        self.ignored.store(true, Ordering::Release);
    }
}
