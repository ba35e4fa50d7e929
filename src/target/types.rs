use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::template::Params;

/// Abstract kind of resource a request addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResourceType {
    Service,
    Collection,
    Entry,
    Media,
    Categories,
    Unknown,
}

impl ResourceType {
    pub const ALL: [ResourceType; 6] = [
        Self::Service,
        Self::Collection,
        Self::Entry,
        Self::Media,
        Self::Categories,
        Self::Unknown,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Service => "SERVICE",
            Self::Collection => "COLLECTION",
            Self::Entry => "ENTRY",
            Self::Media => "MEDIA",
            Self::Categories => "CATEGORIES",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown resource type: {s}"))
    }
}

/// Resolved classification of one request.
///
/// Built once by the resolver and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    resource_type: ResourceType,
    identity: String,
    params: Params,
    route: Option<Arc<str>>,
}

impl Target {
    pub fn new(
        resource_type: ResourceType,
        identity: impl Into<String>,
        params: Params,
        route: Option<Arc<str>>,
    ) -> Self {
        Self {
            resource_type,
            identity: identity.into(),
            params,
            route,
        }
    }

    /// Target for a request no route matched.
    pub fn unknown(identity: impl Into<String>) -> Self {
        Self::new(ResourceType::Unknown, identity, Params::new(), None)
    }

    #[must_use]
    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    /// Canonical resolved URI of the request.
    #[must_use]
    pub fn identity(&self) -> &str {
        &self.identity
    }

    #[must_use]
    pub fn params(&self) -> &Params {
        &self.params
    }

    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    /// Name of the route (or pattern) that produced this target.
    #[must_use]
    pub fn route_name(&self) -> Option<&str> {
        self.route.as_deref()
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.resource_type != ResourceType::Unknown
    }
}
