use chrono::{DateTime, Utc};
use http::Method;
use serde_json::json;
use std::fmt;
use std::io::Write;
use std::sync::Arc;

use super::{HeaderVec, RequestContext};
use crate::error::{ProviderError, ProviderResult};
use crate::model::{http_date, parse_http_date, parse_marker, Document, Renderer};
use crate::validation::{EntityTag, TagList};

/// Entity producer attached to an outcome.
#[derive(Clone, Default)]
pub enum Body {
    #[default]
    Empty,
    Bytes(Vec<u8>),
    /// Rendered on demand by the renderer that produced the content type
    Document {
        document: Box<Document>,
        renderer: Arc<dyn Renderer>,
    },
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Bytes(b) => write!(f, "Bytes({} bytes)", b.len()),
            Self::Document { document, .. } => write!(f, "Document({})", document.kind()),
        }
    }
}

/// Result of a dispatched operation.
///
/// Built by the operation handler; the dispatcher only adds `Allow` and strips
/// the body for `HEAD`.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub status: u16,
    pub entity_tag: Option<EntityTag>,
    pub last_modified: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub content_location: Option<String>,
    pub content_type: Option<String>,
    pub allow: Option<String>,
    /// Any additional headers
    pub headers: HeaderVec,
    pub body: Body,
}

impl Outcome {
    #[must_use]
    pub fn new(status: u16) -> Self {
        Self {
            status,
            entity_tag: None,
            last_modified: None,
            location: None,
            content_location: None,
            content_type: None,
            allow: None,
            headers: HeaderVec::new(),
            body: Body::Empty,
        }
    }

    #[must_use]
    pub fn ok() -> Self {
        Self::new(200)
    }

    #[must_use]
    pub fn created(location: impl Into<String>) -> Self {
        let location = location.into();
        let mut outcome = Self::new(201);
        outcome.content_location = Some(location.clone());
        outcome.location = Some(location);
        outcome
    }

    #[must_use]
    pub fn no_content() -> Self {
        Self::new(204)
    }

    /// Structured error outcome: JSON body `{"error", "status"}`.
    ///
    /// Server-side failures get a generic message; the detail stays in the log.
    #[must_use]
    pub fn from_error(error: &ProviderError) -> Self {
        let status = error.status();
        let body = json!({ "error": error.public_message(), "status": status });
        let mut outcome = Self::new(status);
        outcome.content_type = Some("application/json".to_string());
        outcome.body = Body::Bytes(body.to_string().into_bytes());
        outcome
    }

    #[must_use]
    pub fn with_entity_tag(mut self, tag: EntityTag) -> Self {
        self.entity_tag = Some(tag);
        self
    }

    /// Set `Last-Modified` from an adapter modification marker.
    ///
    /// Markers that are neither RFC 3339 nor an HTTP-date leave the header unset.
    #[must_use]
    pub fn with_last_modified(mut self, marker: &str) -> Self {
        self.last_modified = parse_marker(marker);
        self
    }

    #[must_use]
    pub fn with_last_modified_at(mut self, at: DateTime<Utc>) -> Self {
        self.last_modified = Some(at);
        self
    }

    #[must_use]
    pub fn with_content_location(mut self, value: impl Into<String>) -> Self {
        self.content_location = Some(value.into());
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((Arc::from(name), value.into()));
        self
    }

    #[must_use]
    pub fn with_allow(mut self, methods: &[Method]) -> Self {
        self.allow = Some(join_methods(methods));
        self
    }

    #[must_use]
    pub fn with_document(mut self, document: Document, renderer: Arc<dyn Renderer>) -> Self {
        self.content_type = Some(renderer.content_type(&document));
        self.body = Body::Document {
            document: Box::new(document),
            renderer,
        };
        self
    }

    #[must_use]
    pub fn with_bytes(mut self, content_type: &str, bytes: Vec<u8>) -> Self {
        self.content_type = Some(content_type.to_string());
        self.body = Body::Bytes(bytes);
        self
    }

    /// Drop the entity producer, keeping every header (used for `HEAD`).
    #[must_use]
    pub fn without_body(mut self) -> Self {
        self.body = Body::Empty;
        self
    }

    #[must_use]
    pub fn has_body(&self) -> bool {
        !matches!(self.body, Body::Empty)
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Header lookup covering both the typed fields and extra headers.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<String> {
        self.header_lines()
            .into_iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    /// All response headers in emission order.
    #[must_use]
    pub fn header_lines(&self) -> Vec<(String, String)> {
        let typed = [
            ("Content-Type", self.content_type.clone()),
            ("ETag", self.entity_tag.as_ref().map(ToString::to_string)),
            ("Last-Modified", self.last_modified.as_ref().map(http_date)),
            ("Location", self.location.clone()),
            ("Content-Location", self.content_location.clone()),
            ("Allow", self.allow.clone()),
        ];
        typed
            .into_iter()
            .filter_map(|(k, v)| v.map(|v| (k.to_string(), v)))
            .chain(self.headers.iter().map(|(k, v)| (k.to_string(), v.clone())))
            .collect()
    }

    /// Produce the entity bytes.
    pub fn render(&self) -> ProviderResult<Vec<u8>> {
        match &self.body {
            Body::Empty => Ok(Vec::new()),
            Body::Bytes(bytes) => Ok(bytes.clone()),
            Body::Document { document, renderer } => renderer.render(document),
        }
    }

    /// Write the entity to `out`.
    pub fn write_to(&self, out: &mut dyn Write) -> ProviderResult<()> {
        let bytes = self.render()?;
        out.write_all(&bytes)
            .map_err(|e| ProviderError::Internal(format!("write response body: {e}")))
    }

    /// Whether the request's conditional headers allow a 304 instead of this
    /// outcome. Only successful `GET`/`HEAD` outcomes qualify.
    #[must_use]
    pub fn is_not_modified(&self, request: &RequestContext) -> bool {
        if self.status != 200 || !matches!(*request.method(), Method::GET | Method::HEAD) {
            return false;
        }
        if let Some(header) = request.header("if-none-match") {
            return match &self.entity_tag {
                Some(tag) => tag.matches_any(&EntityTag::parse_list(header), true),
                None => EntityTag::parse_list(header) == TagList::Any,
            };
        }
        // HTTP-dates carry whole seconds only
        let since = request.header("if-modified-since").and_then(parse_http_date);
        match (since, &self.last_modified) {
            (Some(since), Some(modified)) => modified.timestamp() <= since.timestamp(),
            _ => false,
        }
    }

    /// 304 carrying this outcome's validators and no entity.
    #[must_use]
    pub fn into_not_modified(self) -> Self {
        let mut outcome = Self::new(304);
        outcome.entity_tag = self.entity_tag;
        outcome.last_modified = self.last_modified;
        outcome.content_location = self.content_location;
        outcome
    }
}

fn join_methods(methods: &[Method]) -> String {
    methods
        .iter()
        .map(Method::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
