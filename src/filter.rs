//! # Filter Module
//!
//! Hooks around dispatch. A [`Filter`] sees the request after its target is
//! resolved and may answer it outright; every filter whose `before` ran gets
//! `after` with the final outcome, innermost first.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::context::{Outcome, RequestContext, Scope};

pub trait Filter: Send + Sync {
    /// Return an outcome to skip the remaining filters and the dispatcher.
    fn before(&self, _request: &mut RequestContext) -> Option<Outcome> {
        None
    }

    fn after(&self, _request: &RequestContext, _outcome: &mut Outcome, _latency: Duration) {}
}

/// Ordered filters applied around one dispatch.
#[derive(Clone, Default)]
pub struct FilterChain {
    filters: Vec<Arc<dyn Filter>>,
}

impl std::fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterChain")
            .field("filters", &self.filters.len())
            .finish()
    }
}

impl FilterChain {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, filter: Arc<dyn Filter>) {
        self.filters.push(filter);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Run `before` hooks in order, then `next` unless a filter answered,
    /// then `after` hooks in reverse order.
    pub fn run<F>(&self, request: &mut RequestContext, next: F) -> Outcome
    where
        F: FnOnce(&RequestContext) -> Outcome,
    {
        let start = Instant::now();
        let mut entered = 0;
        let mut early = None;
        for (idx, filter) in self.filters.iter().enumerate() {
            entered += 1;
            if let Some(outcome) = filter.before(request) {
                debug!(
                    filter_idx = idx,
                    filter_name = std::any::type_name_of_val(filter.as_ref()),
                    status = outcome.status,
                    "Filter answered request"
                );
                early = Some(outcome);
                break;
            }
        }

        let mut outcome = match early {
            Some(outcome) => outcome,
            None => next(&*request),
        };
        let latency = start.elapsed();
        for filter in self.filters[..entered].iter().rev() {
            filter.after(&*request, &mut outcome, latency);
        }
        outcome
    }
}

/// Copies target parameters into request-scoped attributes under new names.
///
/// ```
/// use atomrouter::filter::{Filter, ParamMappingFilter};
///
/// let filter = ParamMappingFilter::new().map("entry", "search_terms");
/// # let _ = &filter as &dyn Filter;
/// ```
#[derive(Debug, Clone, Default)]
pub struct ParamMappingFilter {
    mappings: Vec<(String, String)>,
}

impl ParamMappingFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn map(mut self, param: &str, attribute: &str) -> Self {
        self.mappings.push((param.to_string(), attribute.to_string()));
        self
    }
}

impl Filter for ParamMappingFilter {
    fn before(&self, request: &mut RequestContext) -> Option<Outcome> {
        let values: Vec<(String, String)> = match request.target() {
            Some(target) => self
                .mappings
                .iter()
                .filter_map(|(param, attribute)| {
                    target.param(param).map(|v| (attribute.clone(), v.to_string()))
                })
                .collect(),
            None => return None,
        };
        for (attribute, value) in values {
            request.set_attribute(Scope::Request, &attribute, value);
        }
        None
    }
}
