//! # Configuration Module
//!
//! Two layers, as in most deployments of the router:
//!
//! - [`ServiceConfig`]: the route table description, loaded from YAML or JSON
//!   once at startup (and again on reload)
//! - [`RuntimeConfig`]: process level knobs read from `ATOMR_*` environment
//!   variables
//!
//! ## Example
//!
//! ```yaml
//! base_uri: http://localhost:8080/
//! service: /
//! workspaces:
//!   - title: Blog
//!     collections:
//!       - name: posts
//!         href: /posts
//!       - name: pics
//!         href: /pics/
//!         media_base: media/
//! routes:
//!   - name: entry
//!     template: /{collection}/{entry}
//!     type: entry
//! ```

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::Path;
use std::sync::Arc;
use url::Url;

use crate::adapter::{CollectionAdapter, MemoryAdapter};
use crate::model::Categories;
use crate::target::{ResourceType, RouteTable, DEFAULT_CATEGORIES_MARKER};
use crate::template::Route;

/// Default request body limit (10 MiB)
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

fn default_marker() -> String {
    DEFAULT_CATEGORIES_MARKER.to_string()
}

/// One collection root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Adapter name; also the name of the collection's URL template
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    /// Root template, e.g. `/posts`
    pub href: String,
    #[serde(default)]
    pub accept: Vec<String>,
    #[serde(default)]
    pub media_base: Option<String>,
    #[serde(default)]
    pub categories: Option<Categories>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    pub title: String,
    #[serde(default)]
    pub collections: Vec<CollectionConfig>,
}

/// Extra resolvable template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteConfig {
    pub name: String,
    pub template: String,
    /// Resource type name, case-insensitive
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(default)]
    pub defaults: BTreeMap<String, String>,
    #[serde(default)]
    pub requirements: BTreeMap<String, String>,
}

/// Regex registration with positional fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternConfig {
    pub name: String,
    pub pattern: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(default)]
    pub fields: Vec<String>,
}

/// Template used only for URL building.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateConfig {
    pub name: String,
    pub template: String,
}

/// Declarative route table.
///
/// Registration order on [`ServiceConfig::build`]: the service route, every
/// collection root in workspace order, `routes`, then `patterns`. First match
/// wins, so that order is the resolution order too.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub base_uri: Option<String>,
    #[serde(default)]
    pub context_path: Option<String>,
    #[serde(default = "default_marker")]
    pub categories_marker: String,
    /// Template of the service document
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub workspaces: Vec<WorkspaceConfig>,
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
    #[serde(default)]
    pub patterns: Vec<PatternConfig>,
    #[serde(default)]
    pub templates: Vec<TemplateConfig>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_uri: None,
            context_path: None,
            categories_marker: default_marker(),
            service: None,
            workspaces: Vec::new(),
            routes: Vec::new(),
            patterns: Vec::new(),
            templates: Vec::new(),
        }
    }
}

fn parse_type(name: &str, value: &str) -> Result<ResourceType> {
    value
        .parse()
        .map_err(|e: String| anyhow!(e))
        .with_context(|| format!("route '{name}'"))
}

impl ServiceConfig {
    /// Load from a `.yaml`/`.yml` or `.json` file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read service config {}", path.display()))?;
        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(&text),
            Some("json") => serde_json::from_str(&text).context("invalid JSON service config"),
            other => bail!("unsupported config extension {:?} for {}", other, path.display()),
        }?;
        config
            .validate()
            .with_context(|| format!("invalid service config {}", path.display()))?;
        Ok(config)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).context("invalid YAML service config")
    }

    /// Base URI, if configured, parsed.
    pub fn base_url(&self) -> Result<Option<Url>> {
        self.base_uri
            .as_deref()
            .map(|b| Url::parse(b).with_context(|| format!("invalid base_uri {b}")))
            .transpose()
    }

    /// Every collection, in workspace order.
    pub fn collections(&self) -> impl Iterator<Item = &CollectionConfig> {
        self.workspaces.iter().flat_map(|w| w.collections.iter())
    }

    /// Structural checks that do not need adapters.
    pub fn validate(&self) -> Result<()> {
        self.base_url()?;
        let mut seen = std::collections::HashSet::new();
        for c in self.collections() {
            if !seen.insert(c.name.as_str()) {
                bail!("collection '{}' declared twice", c.name);
            }
        }
        for r in &self.routes {
            parse_type(&r.name, &r.resource_type)?;
        }
        for p in &self.patterns {
            parse_type(&p.name, &p.resource_type)?;
        }
        Ok(())
    }

    /// One [`MemoryAdapter`] per declared collection.
    pub fn memory_adapters(&self) -> Vec<Arc<dyn CollectionAdapter>> {
        self.collections()
            .map(|c| {
                let mut adapter = MemoryAdapter::new(c.name.as_str());
                if let Some(title) = &c.title {
                    adapter = adapter.with_title(title.as_str());
                }
                if !c.accept.is_empty() {
                    adapter = adapter.with_accept(c.accept.clone());
                }
                if let Some(media_base) = &c.media_base {
                    adapter = adapter.with_media(media_base.as_str());
                }
                if let Some(categories) = &c.categories {
                    adapter = adapter.with_categories(categories.clone());
                }
                Arc::new(adapter) as Arc<dyn CollectionAdapter>
            })
            .collect()
    }

    /// Build the route table, binding each collection to the adapter of the
    /// same name in `adapters`.
    pub fn build(&self, adapters: &[Arc<dyn CollectionAdapter>]) -> Result<RouteTable> {
        self.validate()?;
        let mut builder = RouteTable::builder().categories_marker(&self.categories_marker);

        if let Some(service) = &self.service {
            builder = builder
                .route("service", service, ResourceType::Service)
                .context("service route")?;
        }

        for c in self.collections() {
            let adapter = adapters
                .iter()
                .find(|a| a.name() == c.name)
                .ok_or_else(|| anyhow!("no adapter for collection '{}'", c.name))?;
            builder = builder
                .collection(&c.href, Arc::clone(adapter))
                .with_context(|| format!("collection '{}'", c.name))?;
        }
        for w in &self.workspaces {
            let names: Vec<&str> = w.collections.iter().map(|c| c.name.as_str()).collect();
            builder = builder.workspace(&w.title, &names);
        }

        // adapters not bound to a root are still reachable through generic routes
        for adapter in adapters {
            if !self.collections().any(|c| c.name == adapter.name()) {
                builder = builder.adapter(Arc::clone(adapter));
            }
        }

        for r in &self.routes {
            let mut route = Route::compile(&r.name, &r.template).with_context(|| format!("route '{}'", r.name))?;
            for (var, value) in &r.defaults {
                route = route.with_default(var, value);
            }
            for (var, pattern) in &r.requirements {
                route = route
                    .with_requirement(var, pattern)
                    .with_context(|| format!("route '{}' requirement on {var}", r.name))?;
            }
            builder = builder.add_route(route, parse_type(&r.name, &r.resource_type)?, None);
        }

        for p in &self.patterns {
            let fields: Vec<&str> = p.fields.iter().map(String::as_str).collect();
            builder = builder
                .pattern(&p.name, &p.pattern, &fields, parse_type(&p.name, &p.resource_type)?)
                .with_context(|| format!("pattern '{}'", p.name))?;
        }

        for t in &self.templates {
            builder = builder
                .template(&t.name, &t.template)
                .with_context(|| format!("template '{}'", t.name))?;
        }

        Ok(builder.build())
    }
}

/// Process level settings from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// `ATOMR_BASE_URI`; overrides the configured base
    pub base_uri: Option<Url>,
    /// `ATOMR_MAX_BODY_BYTES`
    pub max_body_bytes: usize,
    /// `ATOMR_CATEGORIES_MARKER`; overrides the configured marker
    pub categories_marker: Option<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            base_uri: None,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            categories_marker: None,
        }
    }
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Unparseable values fall back to the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            base_uri: lookup("ATOMR_BASE_URI").and_then(|v| Url::parse(&v).ok()),
            max_body_bytes: lookup("ATOMR_MAX_BODY_BYTES")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(DEFAULT_MAX_BODY_BYTES),
            categories_marker: lookup("ATOMR_CATEGORIES_MARKER").filter(|m| !m.is_empty()),
        }
    }

    /// Apply the environment overrides to a service configuration.
    pub fn apply(&self, config: &mut ServiceConfig) {
        if let Some(base) = &self.base_uri {
            config.base_uri = Some(base.to_string());
        }
        if let Some(marker) = &self.categories_marker {
            config.categories_marker = marker.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
base_uri: http://example.org/
service: /
workspaces:
  - title: Blog
    collections:
      - name: posts
        title: Posts
        href: /posts
      - name: pics
        href: /pics/
        media_base: media/
        categories:
          fixed: true
          categories:
            - term: cats
routes:
  - name: entry
    template: /{collection}/{entry}
    type: entry
  - name: page
    template: /{collection}/page/{n}
    type: Collection
    defaults: { n: "1" }
    requirements: { n: '\d+' }
patterns:
  - name: archive
    pattern: '^/archive/(\d{4})$'
    type: COLLECTION
    fields: [year]
templates:
  - name: search
    template: /search/{q}
"#;

    #[test]
    fn test_yaml_round_trip_into_table() {
        let config = ServiceConfig::from_yaml(YAML).unwrap();
        assert_eq!(config.categories_marker, ";categories");
        assert_eq!(config.collections().count(), 2);

        let adapters = config.memory_adapters();
        let table = config.build(&adapters).unwrap();
        let names: Vec<String> = table.summary().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["service", "posts", "pics", "entry", "page", "archive"]);
        assert_eq!(table.workspaces()[0].title, "Blog");
        assert!(table.route("search").is_some());
        assert!(table.route("pics.media").is_some());
        assert_eq!(table.adapter("pics").and_then(|a| a.media_base()), Some("media/"));
    }

    #[test]
    fn test_missing_adapter_is_an_error() {
        let config = ServiceConfig::from_yaml(YAML).unwrap();
        let err = config.build(&[]).unwrap_err();
        assert!(format!("{err:#}").contains("no adapter for collection 'posts'"));
    }

    #[test]
    fn test_bad_resource_type_is_rejected() {
        let yaml = "routes:\n  - name: x\n    template: /x\n    type: feed\n";
        let config = ServiceConfig::from_yaml(yaml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(format!("{err:#}").contains("unknown resource type"));
    }

    #[test]
    fn test_duplicate_collection_is_rejected() {
        let yaml = "workspaces:\n  - title: a\n    collections:\n      - {name: p, href: /p}\n      - {name: p, href: /q}\n";
        let config = ServiceConfig::from_yaml(yaml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_runtime_config_lookup() {
        let config = RuntimeConfig::from_lookup(|k| match k {
            "ATOMR_BASE_URI" => Some("https://atom.example/".to_string()),
            "ATOMR_MAX_BODY_BYTES" => Some("1024".to_string()),
            _ => None,
        });
        assert_eq!(config.base_uri.as_ref().map(Url::as_str), Some("https://atom.example/"));
        assert_eq!(config.max_body_bytes, 1024);
        assert!(config.categories_marker.is_none());

        let fallback = RuntimeConfig::from_lookup(|k| (k == "ATOMR_MAX_BODY_BYTES").then(|| "lots".to_string()));
        assert_eq!(fallback.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
    }

    #[test]
    fn test_runtime_overrides_apply() {
        let mut config = ServiceConfig::default();
        let runtime = RuntimeConfig {
            categories_marker: Some("/-/cats".to_string()),
            ..RuntimeConfig::default()
        };
        runtime.apply(&mut config);
        assert_eq!(config.categories_marker, "/-/cats");
        assert!(config.base_uri.is_none());
    }
}
