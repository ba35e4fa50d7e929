//! Body parsing and document rendering collaborators.
//!
//! The router never produces or consumes markup itself. A host supplies a
//! [`BodyParser`] for incoming entries and a [`Renderer`] for outgoing
//! documents; the JSON implementations here are what the binary and the tests
//! use.

use crate::error::{ProviderError, ProviderResult};

use super::{Document, Entry};

/// Media type essence: parameters stripped, lowercased.
#[must_use]
pub fn media_type_essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Value of a `name=value` media type parameter.
#[must_use]
pub fn media_type_param<'a>(content_type: &'a str, name: &str) -> Option<&'a str> {
    content_type.split(';').skip(1).find_map(|p| {
        let (k, v) = p.split_once('=')?;
        k.trim()
            .eq_ignore_ascii_case(name)
            .then(|| v.trim().trim_matches('"'))
    })
}

/// Turns request bodies into entries.
pub trait BodyParser: Send + Sync {
    /// Whether `content_type` carries an entry this parser understands.
    fn accepts(&self, content_type: &str) -> bool;

    fn parse_entry(&self, body: &[u8]) -> ProviderResult<Entry>;
}

/// Turns documents into bytes.
pub trait Renderer: Send + Sync {
    fn content_type(&self, document: &Document) -> String;

    fn render(&self, document: &Document) -> ProviderResult<Vec<u8>>;
}

/// Entries as JSON (`application/json`, `application/atom+json`).
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEntryParser;

impl BodyParser for JsonEntryParser {
    fn accepts(&self, content_type: &str) -> bool {
        matches!(
            media_type_essence(content_type).as_str(),
            "application/json" | "application/atom+json"
        )
    }

    fn parse_entry(&self, body: &[u8]) -> ProviderResult<Entry> {
        if body.is_empty() {
            return Err(ProviderError::Parse("empty body".to_string()));
        }
        serde_json::from_slice(body).map_err(|e| ProviderError::Parse(e.to_string()))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRenderer {
    pub pretty: bool,
}

impl Renderer for JsonRenderer {
    fn content_type(&self, document: &Document) -> String {
        format!("application/json; kind={}", document.kind())
    }

    fn render(&self, document: &Document) -> ProviderResult<Vec<u8>> {
        let bytes = if self.pretty {
            serde_json::to_vec_pretty(document)
        } else {
            serde_json::to_vec(document)
        };
        bytes.map_err(|e| ProviderError::Internal(format!("render {}: {e}", document.kind())))
    }
}
