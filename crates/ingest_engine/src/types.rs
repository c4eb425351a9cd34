use std::collections::HashMap;
use std::fmt;

/// Attribute map of a single anchor element, as found in the markup.
pub type Link = HashMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Validate,
    Parse,
    Index,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Validate => write!(f, "validate"),
            Stage::Parse => write!(f, "parse"),
            Stage::Index => write!(f, "index"),
        }
    }
}

/// How the validate stage disposed of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Defer,
    Reject,
}

/// What the parse stage recognised a record as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Html,
    PlainText,
    Unsupported,
}

impl DocumentKind {
    pub fn is_indexable(self) -> bool {
        !matches!(self, DocumentKind::Unsupported)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct CrawlError {
    pub kind: CrawlFailure,
    pub message: String,
}

impl CrawlError {
    pub(crate) fn new(kind: CrawlFailure, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlFailure {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    RedirectLimitExceeded,
    Saturated,
    Network,
}

impl fmt::Display for CrawlFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrawlFailure::InvalidUrl => write!(f, "invalid url"),
            CrawlFailure::HttpStatus(code) => write!(f, "http status {code}"),
            CrawlFailure::Timeout => write!(f, "timeout"),
            CrawlFailure::RedirectLimitExceeded => write!(f, "redirect limit exceeded"),
            CrawlFailure::Saturated => write!(f, "too many crawl fetches in flight"),
            CrawlFailure::Network => write!(f, "network error"),
        }
    }
}
