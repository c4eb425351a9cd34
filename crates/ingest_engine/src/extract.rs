use std::cell::RefCell;
use std::io::{self, Read};
use std::rc::Rc;

use encoding_rs::{Encoding, UTF_8};
use html_escape::decode_html_entities;
use lol_html::errors::RewritingError;
use lol_html::{element, text, AsciiCompatibleEncoding, HtmlRewriter, Settings};

use crate::types::Link;

const CHUNK_SIZE: usize = 8 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("no text found inside <{0}>")]
    TagNotFound(String),
    #[error("invalid tag name {0:?}")]
    InvalidTag(String),
    #[error("read error: {0}")]
    Io(#[from] io::Error),
    #[error("markup tokenizer error: {0}")]
    Tokenizer(String),
}

/// Single-pass, streaming extraction over markup.
///
/// Every call consumes its reader; run it again on a fresh reader to extract
/// something else from the same bytes. Memory is bounded by the tokenizer's
/// buffer, never by the document size.
#[derive(Debug, Clone, Copy)]
pub struct ContentExtractor {
    encoding: &'static Encoding,
}

impl Default for ContentExtractor {
    fn default() -> Self {
        Self { encoding: UTF_8 }
    }
}

impl ContentExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the markup as `encoding`. Encodings the tokenizer cannot read
    /// (UTF-16 and friends) fall back to UTF-8.
    pub fn with_encoding(encoding: &'static Encoding) -> Self {
        match AsciiCompatibleEncoding::new(encoding) {
            Some(_) => Self { encoding },
            None => Self::default(),
        }
    }

    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    /// Returns the first non-empty, entity-decoded text inside the first `tag`
    /// element that has any. Stops reading as soon as that text is complete.
    pub fn extract_title<R: Read>(&self, reader: R, tag: &str) -> Result<String, ExtractError> {
        if !is_element_name(tag) {
            return Err(ExtractError::InvalidTag(tag.to_string()));
        }

        let state: Rc<RefCell<TitleState>> = Rc::default();
        let handler_state = Rc::clone(&state);

        let mut settings = Settings {
            element_content_handlers: vec![text!(tag, move |chunk| {
                let mut state = handler_state.borrow_mut();
                if state.found.is_some() {
                    return Ok(());
                }
                state.pending.push_str(chunk.as_str());
                if chunk.last_in_text_node() {
                    let text = decode_entities(&std::mem::take(&mut state.pending));
                    if !text.is_empty() {
                        state.found = Some(text);
                    }
                }
                Ok(())
            })],
            strict: false,
            ..Settings::default()
        };
        if let Some(encoding) = AsciiCompatibleEncoding::new(self.encoding) {
            settings.encoding = encoding;
        }
        let mut rewriter = HtmlRewriter::new(settings, |_: &[u8]| {});

        let stopped_early = pump(reader, |chunk| {
            rewriter.write(chunk).map_err(tokenizer_error)?;
            Ok(state.borrow().found.is_some())
        })?;
        if !stopped_early {
            rewriter.end().map_err(tokenizer_error)?;
        }

        let found = state.borrow_mut().found.take();
        found.ok_or_else(|| ExtractError::TagNotFound(tag.to_string()))
    }

    /// Returns the attributes of every anchor start tag, in document order.
    /// Values are entity-decoded; a repeated attribute keeps its last value.
    pub fn extract_links<R: Read>(&self, reader: R) -> Result<Vec<Link>, ExtractError> {
        let links: Rc<RefCell<Vec<Link>>> = Rc::default();
        let collector = Rc::clone(&links);

        let mut settings = Settings {
            element_content_handlers: vec![element!("a", move |el| {
                let link: Link = el
                    .attributes()
                    .iter()
                    .map(|attr| (attr.name(), decode_entities(&attr.value())))
                    .collect();
                collector.borrow_mut().push(link);
                Ok(())
            })],
            strict: false,
            ..Settings::default()
        };
        if let Some(encoding) = AsciiCompatibleEncoding::new(self.encoding) {
            settings.encoding = encoding;
        }
        let mut rewriter = HtmlRewriter::new(settings, |_: &[u8]| {});

        pump(reader, |chunk| {
            rewriter.write(chunk).map_err(tokenizer_error)?;
            Ok(false)
        })?;
        rewriter.end().map_err(tokenizer_error)?;

        Ok(links.take())
    }
}

#[derive(Debug, Default)]
struct TitleState {
    pending: String,
    found: Option<String>,
}

/// Feeds `reader` to `sink` in fixed-size chunks until the reader is drained
/// or `sink` asks to stop. Returns whether it stopped early.
fn pump<R, F>(mut reader: R, mut sink: F) -> Result<bool, ExtractError>
where
    R: Read,
    F: FnMut(&[u8]) -> Result<bool, ExtractError>,
{
    let mut buf = [0u8; CHUNK_SIZE];
    loop {
        let read = match reader.read(&mut buf) {
            Ok(0) => return Ok(false),
            Ok(read) => read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if sink(&buf[..read])? {
            return Ok(true);
        }
    }
}

fn decode_entities(input: &str) -> String {
    decode_html_entities(input).into_owned()
}

fn tokenizer_error(err: RewritingError) -> ExtractError {
    ExtractError::Tokenizer(err.to_string())
}

fn is_element_name(tag: &str) -> bool {
    let mut chars = tag.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-')
}
