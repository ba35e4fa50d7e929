//! # atomrouter
//!
//! **atomrouter** is the request routing and dispatch engine of an Atom
//! Publishing Protocol resource server. Given a method, a path, headers and a
//! body it decides which resource the request addresses, runs the matching
//! operation on a pluggable storage adapter and produces an outcome carrying
//! status, caching validators and an entity producer.
//!
//! It does not listen on sockets, persist anything or read XML; a host
//! binding supplies those through [`context::RequestContext`],
//! [`adapter::CollectionAdapter`] and the [`model::BodyParser`] /
//! [`model::Renderer`] seams.
//!
//! ## Architecture
//!
//! - **[`template`]** - URI templates and regex patterns: match and expand
//! - **[`target`]** - route table, resolver (path → target) and builder (route → URI)
//! - **[`dispatcher`]** - method × resource-type state machine and adapter lifecycle
//! - **[`adapter`]** - storage capability set plus an in-memory backend
//! - **[`validation`]** - entity tags, entry validity, update conflicts
//! - **[`filter`]** - hooks before and after dispatch that may answer a request
//! - **[`service`]** - the whole pipeline behind one call, with hot reload
//! - **[`config`]** / **[`logging`]** - YAML configuration and tracing setup
//!
//! ### Request Handling Flow
//!
//! ```text
//! RequestContext
//!   → IdentityResolver      principal for request_user
//!   → TargetResolver        first registration that matches wins
//!   → FilterChain           before hooks, may answer early
//!   → Dispatcher            OPTIONS / 405 / operation selection
//!   → lifecycle::run        begin → operation → end | compensate
//!   → Outcome               status, ETag, Location, Allow, body
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use atomrouter::adapter::{CollectionAdapter, MemoryAdapter};
//! use atomrouter::context::RequestContext;
//! use atomrouter::service::AtomService;
//! use atomrouter::target::{ResourceType, RouteTable};
//! use std::sync::Arc;
//!
//! let posts: Arc<dyn CollectionAdapter> = Arc::new(MemoryAdapter::new("posts"));
//! let table = RouteTable::builder()
//!     .route("service", "/", ResourceType::Service)
//!     .unwrap()
//!     .collection("/posts", posts)
//!     .unwrap()
//!     .build();
//!
//! let service = AtomService::new(table);
//! let outcome = service.handle(RequestContext::get("/posts"));
//! assert_eq!(outcome.status, 200);
//! assert!(outcome.entity_tag.is_some());
//! ```

pub mod adapter;
pub mod cli;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod filter;
pub mod logging;
pub mod model;
pub mod security;
pub mod service;
pub mod target;
pub mod template;
pub mod validation;

pub use error::{ProviderError, ProviderResult};
pub use service::AtomService;
