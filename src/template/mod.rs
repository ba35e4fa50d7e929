//! # Template Module
//!
//! Named URI templates and regex patterns, the two matchers the resolver walks.
//!
//! ## Overview
//!
//! A [`Route`] compiles a template such as `/{collection}/{entry}` into a
//! regex at configuration time. Matching yields a [`Params`] bag; expansion
//! pulls values from any [`ParamSource`] and produces a concrete path. The two
//! operations are inverses for every variable the route declares.
//!
//! A [`RegexPattern`] covers paths templates cannot describe. It exposes
//! positional capture groups and, when the regex is simple enough, a derived
//! reverse template for expansion.
//!
//! ## Example
//!
//! ```rust
//! use atomrouter::template::Route;
//!
//! let route = Route::compile("feed", "/{collection}")
//!     .unwrap()
//!     .with_default("collection", "posts");
//! assert_eq!(route.expand(&atomrouter::template::EmptySource), "/posts");
//! assert_eq!(route.expand(&[("collection", "drafts"), ("page", "2")]), "/drafts?page=2");
//! ```

mod params;
mod regex_pattern;
mod route;
mod source;

pub use params::{ParamVec, Params, MAX_INLINE_PARAMS};
pub use regex_pattern::RegexPattern;
pub(crate) use route::decode_value;
pub use route::{Route, TemplateError};
pub use source::{ChainSource, EmptySource, FieldSource, Fields, FnSource, ParamSource};
