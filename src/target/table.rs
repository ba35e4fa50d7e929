use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use super::ResourceType;
use crate::adapter::CollectionAdapter;
use crate::template::{decode_value, ParamSource, Params, RegexPattern, Route, TemplateError};

/// Parameter naming the collection a target belongs to.
pub const COLLECTION_PARAM: &str = "collection";
/// Parameter naming the member (or media resource) inside a collection.
pub const MEMBER_PARAM: &str = "entry";
/// Suffix of a collection root that addresses its category document.
pub const DEFAULT_CATEGORIES_MARKER: &str = ";categories";

enum Matcher {
    Template(Route),
    Pattern { name: Arc<str>, pattern: RegexPattern },
}

impl Matcher {
    fn name(&self) -> &str {
        match self {
            Self::Template(route) => route.name(),
            Self::Pattern { name, .. } => name,
        }
    }

    fn source(&self) -> &str {
        match self {
            Self::Template(route) => route.template(),
            Self::Pattern { pattern, .. } => pattern.as_str(),
        }
    }
}

struct Registration {
    matcher: Matcher,
    resource_type: ResourceType,
    adapter: Option<Arc<dyn CollectionAdapter>>,
    /// Set for collection roots, which sub-resolve their suffix
    collection: Option<Arc<str>>,
}

/// Outcome of matching a path against the table.
#[derive(Clone)]
pub struct Resolution {
    pub resource_type: ResourceType,
    pub params: Params,
    pub route: Arc<str>,
    /// Adapter bound to the matching registration, if any
    pub adapter: Option<Arc<dyn CollectionAdapter>>,
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolution")
            .field("resource_type", &self.resource_type)
            .field("params", &self.params)
            .field("route", &self.route)
            .field("adapter", &self.adapter.as_ref().map(|a| a.name()))
            .finish()
    }
}

/// One row of [`RouteTable::summary`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteSummary {
    pub name: String,
    pub source: String,
    pub resource_type: ResourceType,
    pub adapter: Option<String>,
    pub collection_root: bool,
}

/// Workspace grouping for the service document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    pub title: String,
    pub collections: Vec<String>,
}

/// Immutable routing configuration.
///
/// Built once through [`RouteTableBuilder`] and then only read, so a single
/// table is shared by every concurrently handled request.
pub struct RouteTable {
    registrations: Vec<Registration>,
    /// Literal template -> first registration with that exact template
    literal_index: HashMap<String, usize>,
    routes: HashMap<String, Route>,
    adapters: Vec<Arc<dyn CollectionAdapter>>,
    workspaces: Vec<Workspace>,
    categories_marker: String,
}

impl RouteTable {
    #[must_use]
    pub fn builder() -> RouteTableBuilder {
        RouteTableBuilder::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    #[must_use]
    pub fn categories_marker(&self) -> &str {
        &self.categories_marker
    }

    /// Named template used for URL building.
    #[must_use]
    pub fn route(&self, name: &str) -> Option<&Route> {
        self.routes.get(name)
    }

    pub fn route_names(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }

    /// Adapter registered for collection `name`.
    #[must_use]
    pub fn adapter(&self, name: &str) -> Option<&Arc<dyn CollectionAdapter>> {
        self.adapters.iter().find(|a| a.name() == name)
    }

    pub fn adapters(&self) -> impl Iterator<Item = &Arc<dyn CollectionAdapter>> {
        self.adapters.iter()
    }

    #[must_use]
    pub fn workspaces(&self) -> &[Workspace] {
        &self.workspaces
    }

    /// Registrations in resolution order.
    #[must_use]
    pub fn summary(&self) -> Vec<RouteSummary> {
        self.registrations
            .iter()
            .map(|r| RouteSummary {
                name: r.matcher.name().to_string(),
                source: r.matcher.source().to_string(),
                resource_type: r.resource_type,
                adapter: r.adapter.as_ref().map(|a| a.name().to_string()),
                collection_root: r.collection.is_some(),
            })
            .collect()
    }

    /// Expand a named route without any request context.
    #[must_use]
    pub fn expand(&self, name: &str, source: &dyn ParamSource) -> Option<String> {
        self.route(name).map(|r| r.expand(source))
    }

    /// Match `path` (no query) against the registrations, first match wins.
    ///
    /// A literal template equal to the path bounds the scan: registrations
    /// after it are never consulted, earlier ones still take precedence.
    #[must_use]
    pub fn find(&self, path: &str) -> Option<Resolution> {
        let end = self
            .literal_index
            .get(path)
            .map_or(self.registrations.len(), |idx| idx + 1);
        self.registrations[..end]
            .iter()
            .find_map(|reg| self.try_match(reg, path))
    }

    fn try_match(&self, reg: &Registration, path: &str) -> Option<Resolution> {
        let (resource_type, params) = match (&reg.matcher, &reg.collection) {
            (Matcher::Template(route), Some(name)) => {
                let (mut params, rest) = route.match_prefix(path)?;
                let adapter = reg
                    .adapter
                    .as_ref()
                    .or_else(|| params.get(COLLECTION_PARAM).and_then(|c| self.adapter(c)));
                let media_base = adapter.and_then(|a| a.media_base());
                let rest = match rest {
                    // a root ending in '/' has already consumed the separator
                    r if route.template().ends_with('/') && !r.is_empty() => format!("/{r}"),
                    r => r.to_string(),
                };
                let (resource_type, member) = self.classify(&rest, media_base)?;
                if !params.contains(COLLECTION_PARAM) {
                    params.insert(COLLECTION_PARAM, name.as_ref());
                }
                if let Some(member) = member {
                    params.insert(MEMBER_PARAM, member);
                }
                (resource_type, params)
            }
            (Matcher::Template(route), None) => (reg.resource_type, route.match_path(path)?),
            (Matcher::Pattern { pattern, .. }, _) => (reg.resource_type, pattern.match_path(path)?),
        };
        Some(Resolution {
            resource_type,
            params,
            route: match &reg.matcher {
                Matcher::Template(route) => route.shared_name(),
                Matcher::Pattern { name, .. } => Arc::clone(name),
            },
            adapter: reg.adapter.clone(),
        })
    }

    /// Classify the suffix left after a collection root.
    fn classify(&self, rest: &str, media_base: Option<&str>) -> Option<(ResourceType, Option<String>)> {
        if rest.is_empty() || rest == "/" {
            return Some((ResourceType::Collection, None));
        }
        if rest == self.categories_marker {
            return Some((ResourceType::Categories, None));
        }
        let member = rest.strip_prefix('/')?;
        if let Some(key) = media_base
            .filter(|m| !m.is_empty())
            .and_then(|m| member.strip_prefix(m))
        {
            if is_single_segment(key) {
                return Some((ResourceType::Media, Some(decode_value(key))));
            }
        }
        is_single_segment(member).then(|| (ResourceType::Entry, Some(decode_value(member))))
    }
}

fn is_single_segment(s: &str) -> bool {
    !s.is_empty() && !s.contains(['/', ';', '?', '#'])
}

impl fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteTable")
            .field("routes", &self.summary())
            .field("categories_marker", &self.categories_marker)
            .finish()
    }
}

/// Append-only builder for [`RouteTable`]; registration order is resolution
/// order.
pub struct RouteTableBuilder {
    registrations: Vec<Registration>,
    routes: HashMap<String, Route>,
    adapters: Vec<Arc<dyn CollectionAdapter>>,
    workspaces: Vec<Workspace>,
    categories_marker: String,
}

impl Default for RouteTableBuilder {
    fn default() -> Self {
        Self {
            registrations: Vec::new(),
            routes: HashMap::new(),
            adapters: Vec::new(),
            workspaces: Vec::new(),
            categories_marker: DEFAULT_CATEGORIES_MARKER.to_string(),
        }
    }
}

impl RouteTableBuilder {
    /// Resolvable route of a fixed resource type.
    pub fn route(self, name: &str, template: &str, resource_type: ResourceType) -> Result<Self, TemplateError> {
        Ok(self.add_route(Route::compile(name, template)?, resource_type, None))
    }

    /// Resolvable route with a bound adapter.
    pub fn route_with_adapter(
        self,
        name: &str,
        template: &str,
        resource_type: ResourceType,
        adapter: Arc<dyn CollectionAdapter>,
    ) -> Result<Self, TemplateError> {
        Ok(self.add_route(Route::compile(name, template)?, resource_type, Some(adapter)))
    }

    /// Register a precompiled route (e.g. one carrying defaults or requirements).
    #[must_use]
    pub fn add_route(
        mut self,
        route: Route,
        resource_type: ResourceType,
        adapter: Option<Arc<dyn CollectionAdapter>>,
    ) -> Self {
        self.name_route(route.clone());
        self.registrations.push(Registration {
            matcher: Matcher::Template(route),
            resource_type,
            adapter,
            collection: None,
        });
        self
    }

    /// Regex registration with positional fields.
    pub fn pattern(
        mut self,
        name: &str,
        pattern: &str,
        fields: &[&str],
        resource_type: ResourceType,
    ) -> Result<Self, TemplateError> {
        let pattern = RegexPattern::new(pattern, fields)?;
        self.registrations.push(Registration {
            matcher: Matcher::Pattern {
                name: Arc::from(name),
                pattern,
            },
            resource_type,
            adapter: None,
            collection: None,
        });
        Ok(self)
    }

    /// Template used only for URL building.
    pub fn template(mut self, name: &str, template: &str) -> Result<Self, TemplateError> {
        self.name_route(Route::compile(name, template)?);
        Ok(self)
    }

    /// Register an adapter without a route of its own; generic routes find it
    /// through the `collection` parameter.
    #[must_use]
    pub fn adapter(mut self, adapter: Arc<dyn CollectionAdapter>) -> Self {
        self.add_adapter(adapter);
        self
    }

    /// Collection root bound to `adapter`.
    ///
    /// The suffix after the root selects the resource: nothing for the
    /// collection, the categories marker for its categories, the adapter's
    /// media base plus a key for media, any other single segment for an entry.
    /// Also names the templates `<name>`, `<name>.entry` and, with a media
    /// base, `<name>.media`.
    pub fn collection(mut self, template: &str, adapter: Arc<dyn CollectionAdapter>) -> Result<Self, TemplateError> {
        let name = adapter.name().to_string();
        let root = Route::compile(&name, template)?;
        let base = template.trim_end_matches('/');
        self.name_route(Route::compile(&format!("{name}.entry"), &format!("{base}/{{{MEMBER_PARAM}}}"))?);
        if let Some(media_base) = adapter.media_base() {
            self.name_route(Route::compile(
                &format!("{name}.media"),
                &format!("{base}/{media_base}{{{MEMBER_PARAM}}}"),
            )?);
        }
        self.name_route(root.clone());
        self.add_adapter(Arc::clone(&adapter));
        self.registrations.push(Registration {
            matcher: Matcher::Template(root),
            resource_type: ResourceType::Collection,
            adapter: Some(adapter),
            collection: Some(Arc::from(name)),
        });
        Ok(self)
    }

    #[must_use]
    pub fn workspace(mut self, title: &str, collections: &[&str]) -> Self {
        self.workspaces.push(Workspace {
            title: title.to_string(),
            collections: collections.iter().map(|c| c.to_string()).collect(),
        });
        self
    }

    #[must_use]
    pub fn categories_marker(mut self, marker: &str) -> Self {
        self.categories_marker = marker.to_string();
        self
    }

    fn name_route(&mut self, route: Route) {
        if let Some(previous) = self.routes.get(route.name()) {
            warn!(
                route_name = %route.name(),
                previous = %previous.template(),
                replacement = %route.template(),
                "Route name registered twice; the later template is used for URL building"
            );
        }
        self.routes.insert(route.name().to_string(), route);
    }

    fn add_adapter(&mut self, adapter: Arc<dyn CollectionAdapter>) {
        if let Some(pos) = self.adapters.iter().position(|a| a.name() == adapter.name()) {
            self.adapters[pos] = adapter;
        } else {
            self.adapters.push(adapter);
        }
    }

    /// Freeze the configuration.
    ///
    /// Without explicit workspaces every registered collection is listed in a
    /// single workspace titled `Main`.
    #[must_use]
    pub fn build(mut self) -> RouteTable {
        if self.workspaces.is_empty() && !self.adapters.is_empty() {
            self.workspaces.push(Workspace {
                title: "Main".to_string(),
                collections: self.adapters.iter().map(|a| a.name().to_string()).collect(),
            });
        }

        let mut literal_index = HashMap::new();
        for (idx, reg) in self.registrations.iter().enumerate() {
            if let Matcher::Template(route) = &reg.matcher {
                if route.is_literal() {
                    literal_index.entry(route.template().to_string()).or_insert(idx);
                }
            }
        }

        let routes_summary: Vec<String> = self
            .registrations
            .iter()
            .take(10)
            .map(|r| format!("{} {} -> {}", r.matcher.name(), r.matcher.source(), r.resource_type))
            .collect();
        info!(
            routes_count = self.registrations.len(),
            named_templates = self.routes.len(),
            adapters = self.adapters.len(),
            categories_marker = %self.categories_marker,
            routes_summary = ?routes_summary,
            "Route table loaded"
        );

        RouteTable {
            registrations: self.registrations,
            literal_index,
            routes: self.routes,
            adapters: self.adapters,
            workspaces: self.workspaces,
            categories_marker: self.categories_marker,
        }
    }
}
