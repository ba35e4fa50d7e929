use http::Method;
use once_cell::sync::Lazy;
use once_cell::unsync::OnceCell;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use url::Url;

use crate::adapter::CollectionAdapter;
use crate::error::ProviderResult;
use crate::model::{media_type_essence, media_type_param, BodyParser, Entry};
use crate::security::Principal;
use crate::target::Target;
use crate::template::Params;

/// Maximum inline headers before heap allocation.
pub const MAX_INLINE_HEADERS: usize = 16;

/// Header storage; names keep their original case and compare case-insensitively.
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// Request-scoped attribute naming the adapter chosen by the resolver.
pub const ADAPTER_ATTRIBUTE: &str = "atomrouter.adapter";

/// ULID request identifier used to correlate log lines.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub struct RequestId(ulid::Ulid);

impl RequestId {
    #[must_use]
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }

    /// Reuse a valid `X-Request-Id` value, otherwise mint a fresh id.
    #[must_use]
    pub fn from_header_or_new(value: Option<&str>) -> Self {
        value.and_then(|v| v.parse().ok()).unwrap_or_default()
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for RequestId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ulid::Ulid::from_string(s.trim()).map(Self)
    }
}

/// Attribute store selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Request,
    Session,
}

/// Everything the router reads about one request.
///
/// The host binding builds it; resolution writes the [`Target`], the selected
/// adapter and request-scoped attributes back into it. The body is parsed at
/// most once and the result (success or failure) is cached.
#[derive(Clone)]
pub struct RequestContext {
    id: RequestId,
    method: Method,
    uri: String,
    base: Url,
    context_path: String,
    headers: HeaderVec,
    query: Params,
    request_attributes: HashMap<String, String>,
    session_attributes: HashMap<String, String>,
    body: Vec<u8>,
    parsed_entry: OnceCell<ProviderResult<Entry>>,
    principal: Option<Principal>,
    target: Option<Target>,
    adapter: Option<Arc<dyn CollectionAdapter>>,
}

#[allow(clippy::expect_used)]
static DEFAULT_BASE: Lazy<Url> =
    Lazy::new(|| Url::parse("http://localhost/").expect("static base URL is valid"));

fn parse_query(uri: &str) -> Params {
    uri.split_once('?')
        .map(|(_, q)| {
            url::form_urlencoded::parse(q.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect()
        })
        .unwrap_or_default()
}

impl RequestContext {
    /// `uri` is the request target as received: context path, path and query.
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        let uri = uri.into();
        Self {
            id: RequestId::new(),
            method,
            query: parse_query(&uri),
            uri,
            base: DEFAULT_BASE.clone(),
            context_path: String::new(),
            headers: HeaderVec::new(),
            request_attributes: HashMap::new(),
            session_attributes: HashMap::new(),
            body: Vec::new(),
            parsed_entry: OnceCell::new(),
            principal: None,
            target: None,
            adapter: None,
        }
    }

    pub fn get(uri: impl Into<String>) -> Self {
        Self::new(Method::GET, uri)
    }

    #[must_use]
    pub fn with_base(mut self, base: Url) -> Self {
        self.base = base;
        self
    }

    /// Mount point of the service, e.g. `/atom`. A trailing `/` is dropped.
    #[must_use]
    pub fn with_context_path(mut self, context_path: &str) -> Self {
        self.context_path = context_path.trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        let value = value.into();
        if name.eq_ignore_ascii_case("x-request-id") {
            self.id = RequestId::from_header_or_new(Some(&value));
        }
        self.headers.push((Arc::from(name), value));
        self
    }

    #[must_use]
    pub fn with_body(mut self, content_type: &str, body: impl Into<Vec<u8>>) -> Self {
        self.headers
            .retain(|(k, _)| !k.eq_ignore_ascii_case("content-type"));
        self.headers
            .push((Arc::from("Content-Type"), content_type.to_string()));
        self.body = body.into();
        self.parsed_entry = OnceCell::new();
        self
    }

    #[must_use]
    pub fn with_session_attribute(mut self, name: &str, value: impl Into<String>) -> Self {
        self.session_attributes.insert(name.to_string(), value.into());
        self
    }

    #[must_use]
    pub fn id(&self) -> RequestId {
        self.id
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    #[must_use]
    pub fn base(&self) -> &Url {
        &self.base
    }

    #[must_use]
    pub fn context_path(&self) -> &str {
        &self.context_path
    }

    /// Path relative to the context path, query stripped.
    #[must_use]
    pub fn path(&self) -> &str {
        let path = self
            .uri
            .split(['?', '#'])
            .next()
            .unwrap_or_default();
        match path.strip_prefix(self.context_path.as_str()) {
            Some(rest) if !self.context_path.is_empty() && (rest.is_empty() || rest.starts_with('/')) => {
                if rest.is_empty() {
                    "/"
                } else {
                    rest
                }
            }
            _ => path,
        }
    }

    #[must_use]
    pub fn query_string(&self) -> Option<&str> {
        self.uri.split_once('?').map(|(_, q)| q)
    }

    #[must_use]
    pub fn query(&self) -> &Params {
        &self.query
    }

    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name)
    }

    /// Request URI resolved against the base URI.
    #[must_use]
    pub fn resolved_uri(&self) -> String {
        self.base
            .join(&self.uri)
            .map(String::from)
            .unwrap_or_else(|_| self.uri.clone())
    }

    /// Header value (case-insensitive per RFC 7230); the first occurrence wins.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_ref(), v.as_str()))
    }

    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Lowercased media type without parameters.
    #[must_use]
    pub fn media_type(&self) -> Option<String> {
        self.content_type().map(media_type_essence)
    }

    #[must_use]
    pub fn charset(&self) -> Option<&str> {
        self.content_type().and_then(|ct| media_type_param(ct, "charset"))
    }

    /// First language range of `Accept-Language`.
    #[must_use]
    pub fn language(&self) -> Option<&str> {
        self.header("accept-language")?
            .split(',')
            .next()
            .and_then(|l| l.split(';').next())
            .map(str::trim)
            .filter(|l| !l.is_empty())
    }

    #[must_use]
    pub fn slug(&self) -> Option<&str> {
        self.header("slug")
    }

    #[must_use]
    pub fn attribute(&self, scope: Scope, name: &str) -> Option<&str> {
        let store = match scope {
            Scope::Request => &self.request_attributes,
            Scope::Session => &self.session_attributes,
        };
        store.get(name).map(String::as_str)
    }

    pub fn set_attribute(&mut self, scope: Scope, name: &str, value: impl Into<String>) {
        let store = match scope {
            Scope::Request => &mut self.request_attributes,
            Scope::Session => &mut self.session_attributes,
        };
        store.insert(name.to_string(), value.into());
    }

    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Parse the body as an entry; the outcome is cached for the request.
    pub fn entry(&self, parser: &dyn BodyParser) -> ProviderResult<&Entry> {
        self.parsed_entry
            .get_or_init(|| parser.parse_entry(&self.body))
            .as_ref()
            .map_err(Clone::clone)
    }

    #[must_use]
    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    pub fn set_principal(&mut self, principal: Option<Principal>) {
        self.principal = principal;
    }

    #[must_use]
    pub fn target(&self) -> Option<&Target> {
        self.target.as_ref()
    }

    pub fn set_target(&mut self, target: Target) {
        self.target = Some(target);
    }

    #[must_use]
    pub fn adapter(&self) -> Option<&Arc<dyn CollectionAdapter>> {
        self.adapter.as_ref()
    }

    /// Bind the adapter chosen for this request and record its name as a
    /// request attribute.
    pub fn set_adapter(&mut self, adapter: Arc<dyn CollectionAdapter>) {
        self.request_attributes
            .insert(ADAPTER_ATTRIBUTE.to_string(), adapter.name().to_string());
        self.adapter = Some(adapter);
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("id", &self.id)
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("context_path", &self.context_path)
            .field("headers", &self.headers)
            .field("body_len", &self.body.len())
            .field("target", &self.target)
            .field("adapter", &self.adapter.as_ref().map(|a| a.name()))
            .finish()
    }
}
