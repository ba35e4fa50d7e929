//! # Security Module
//!
//! Identity hook run before dispatch. A resolver only names the caller; it
//! never authorises. The resolved [`Principal`] is stored on the request and
//! exposed to templates as `request_user`.
//!
//! ```rust
//! use atomrouter::context::RequestContext;
//! use atomrouter::security::{HeaderIdentityResolver, IdentityResolver};
//!
//! let resolver = HeaderIdentityResolver::default();
//! let request = RequestContext::get("/posts").with_header("X-Remote-User", "alice");
//! assert_eq!(resolver.resolve(&request).unwrap().name, "alice");
//! ```

use tracing::debug;

use crate::context::RequestContext;

/// The authenticated caller, as far as the host binding could tell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub name: String,
}

impl Principal {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Resolves a principal for an incoming request.
pub trait IdentityResolver: Send + Sync {
    fn resolve(&self, request: &RequestContext) -> Option<Principal>;
}

/// Every request is anonymous.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnonymousResolver;

impl IdentityResolver for AnonymousResolver {
    fn resolve(&self, _request: &RequestContext) -> Option<Principal> {
        None
    }
}

/// Trusts a header set by an authenticating proxy in front of the service.
#[derive(Debug, Clone)]
pub struct HeaderIdentityResolver {
    header: String,
}

impl HeaderIdentityResolver {
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
        }
    }

    #[must_use]
    pub fn header(&self) -> &str {
        &self.header
    }
}

impl Default for HeaderIdentityResolver {
    fn default() -> Self {
        Self::new("X-Remote-User")
    }
}

impl IdentityResolver for HeaderIdentityResolver {
    fn resolve(&self, request: &RequestContext) -> Option<Principal> {
        let name = request.header(&self.header)?.trim();
        if name.is_empty() {
            return None;
        }
        debug!(
            request_id = %request.id(),
            header = %self.header,
            principal = %name,
            "Identity resolved from header"
        );
        Some(Principal::new(name))
    }
}
