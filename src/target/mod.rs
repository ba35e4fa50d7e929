//! # Target Module
//!
//! Request classification. A [`RouteTable`] holds the ordered registrations
//! (templates, regex patterns and collection roots), the named templates used
//! for URL building and the collection adapters. [`TargetResolver`] turns a
//! request into a [`Target`]; [`TargetBuilder`] goes the other way.
//!
//! ## Example
//!
//! ```rust
//! use atomrouter::target::{ResourceType, RouteTable, TargetBuilder, TargetResolver};
//! use http::Method;
//!
//! let table = RouteTable::builder()
//!     .route("entry", "/{collection}/{entry}", ResourceType::Entry)
//!     .unwrap()
//!     .build();
//!
//! let target = TargetResolver::new(&table).resolve_path(&Method::GET, "/posts/42");
//! assert_eq!(target.resource_type(), ResourceType::Entry);
//! assert_eq!(target.param("entry"), Some("42"));
//!
//! let url = TargetBuilder::new(&table).url_for("entry", &[("collection", "posts"), ("entry", "42")]);
//! assert_eq!(url.as_deref(), Some("/posts/42"));
//! ```

mod builder;
mod resolver;
mod table;
mod types;

pub use builder::{RequestVariables, TargetBuilder};
pub use resolver::TargetResolver;
pub use table::{
    Resolution, RouteSummary, RouteTable, RouteTableBuilder, Workspace, COLLECTION_PARAM,
    DEFAULT_CATEGORIES_MARKER, MEMBER_PARAM,
};
pub use types::{ResourceType, Target};
