//! # Context Module
//!
//! Per-request state. [`RequestContext`] is what the host binding hands in;
//! [`Outcome`] is what the dispatcher hands back. Neither is shared across
//! requests.

mod request;
mod response;

pub use request::{
    HeaderVec, RequestContext, RequestId, Scope, ADAPTER_ATTRIBUTE, MAX_INLINE_HEADERS,
};
pub use response::{Body, Outcome};
