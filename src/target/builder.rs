use super::RouteTable;
use crate::context::{RequestContext, Scope};
use crate::template::{ChainSource, ParamSource};

/// Synthetic variables derived from the current request.
///
/// | Name | Value |
/// |---|---|
/// | `request_uri` | request target as received |
/// | `request_resolved_uri` | request target resolved against the base URI |
/// | `request_content_type` | `Content-Type` header |
/// | `request_context_path` | service mount point |
/// | `request_user` | resolved principal |
/// | `request_language` | first `Accept-Language` range |
/// | `request_charset` | charset of the body |
/// | `target_identity` | identity of the resolved target |
/// | `target_path` | path relative to the context path |
/// | `target_base` | base URI |
/// | `request_parameter_<n>` | query parameter `n` |
/// | `request_header_<n>` | header `n` |
/// | `request_attribute_<n>` | request-scoped attribute `n` |
/// | `session_attribute_<n>` | session-scoped attribute `n` |
/// | `target_parameter_<n>` | parameter `n` of the resolved target |
#[derive(Debug, Clone, Copy)]
pub struct RequestVariables<'a> {
    request: &'a RequestContext,
}

impl<'a> RequestVariables<'a> {
    #[must_use]
    pub fn new(request: &'a RequestContext) -> Self {
        Self { request }
    }
}

impl ParamSource for RequestVariables<'_> {
    fn resolve(&self, name: &str) -> Option<String> {
        let req = self.request;
        let owned = |v: Option<&str>| v.map(str::to_string);
        match name {
            "request_uri" => Some(req.uri().to_string()),
            "request_resolved_uri" => Some(req.resolved_uri()),
            "request_content_type" => owned(req.content_type()),
            "request_context_path" => Some(req.context_path().to_string()),
            "request_user" => req.principal().map(|p| p.name.clone()),
            "request_language" => owned(req.language()),
            "request_charset" => owned(req.charset()),
            "target_identity" => req.target().map(|t| t.identity().to_string()),
            "target_path" => Some(req.path().to_string()),
            "target_base" => Some(req.base().to_string()),
            _ => {
                if let Some(n) = name.strip_prefix("request_parameter_") {
                    owned(req.query_param(n))
                } else if let Some(n) = name.strip_prefix("request_header_") {
                    owned(req.header(n))
                } else if let Some(n) = name.strip_prefix("request_attribute_") {
                    owned(req.attribute(Scope::Request, n))
                } else if let Some(n) = name.strip_prefix("session_attribute_") {
                    owned(req.attribute(Scope::Session, n))
                } else if let Some(n) = name.strip_prefix("target_parameter_") {
                    req.target().and_then(|t| t.param(n)).map(str::to_string)
                } else {
                    None
                }
            }
        }
    }
}

/// Inverse of the resolver: named route + parameters -> URI.
#[derive(Debug, Clone, Copy)]
pub struct TargetBuilder<'a> {
    table: &'a RouteTable,
    request: Option<&'a RequestContext>,
}

impl<'a> TargetBuilder<'a> {
    #[must_use]
    pub fn new(table: &'a RouteTable) -> Self {
        Self {
            table,
            request: None,
        }
    }

    /// Builder that also draws on the target and synthetic variables of
    /// `request` and prefixes its context path.
    #[must_use]
    pub fn for_request(table: &'a RouteTable, request: &'a RequestContext) -> Self {
        Self {
            table,
            request: Some(request),
        }
    }

    /// Expand route `key`.
    ///
    /// Values come from `source` first, then from the parameters of the
    /// current target, then from [`RequestVariables`]. Unresolved variables
    /// expand empty; undeclared names supplied by `source` become a query
    /// string. `None` only when `key` is unknown.
    #[must_use]
    pub fn url_for(&self, key: &str, source: &dyn ParamSource) -> Option<String> {
        let route = self.table.route(key)?;
        let Some(request) = self.request else {
            return Some(route.expand(source));
        };

        let variables = RequestVariables::new(request);
        let mut chain = ChainSource::new().then(source);
        if let Some(target) = request.target() {
            chain = chain.then(target.params());
        }
        chain = chain.then(&variables);

        Some(format!("{}{}", request.context_path(), route.expand(&chain)))
    }

    /// [`TargetBuilder::url_for`] resolved against the request base URI.
    #[must_use]
    pub fn absolute_url_for(&self, key: &str, source: &dyn ParamSource) -> Option<String> {
        let relative = self.url_for(key, source)?;
        match self.request {
            Some(request) => Some(
                request
                    .base()
                    .join(&relative)
                    .map(String::from)
                    .unwrap_or(relative),
            ),
            None => Some(relative),
        }
    }
}
