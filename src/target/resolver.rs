use http::Method;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::{RouteTable, Target, COLLECTION_PARAM};
use crate::context::RequestContext;

/// Matches requests against a [`RouteTable`].
///
/// Resolution is deterministic: registrations are tried in the order they
/// were added and the first match wins, even when a later registration would
/// match more specifically.
#[derive(Debug, Clone, Copy)]
pub struct TargetResolver<'a> {
    table: &'a RouteTable,
}

impl<'a> TargetResolver<'a> {
    #[must_use]
    pub fn new(table: &'a RouteTable) -> Self {
        Self { table }
    }

    /// Resolve a bare path. The identity of the returned target is the path
    /// itself; query and fragment are ignored.
    #[must_use]
    pub fn resolve_path(&self, method: &Method, path: &str) -> Target {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        match self.matched(method, path) {
            Some(resolution) => Target::new(
                resolution.resource_type,
                path,
                resolution.params,
                Some(resolution.route),
            ),
            None => Target::unknown(path),
        }
    }

    /// Resolve `request`, storing the target and any bound adapter on it.
    pub fn resolve(&self, request: &mut RequestContext) -> Target {
        let identity = request.resolved_uri();
        let target = match self.matched(request.method(), request.path()) {
            Some(resolution) => {
                let adapter = resolution.adapter.or_else(|| {
                    resolution
                        .params
                        .get(COLLECTION_PARAM)
                        .and_then(|c| self.table.adapter(c))
                        .cloned()
                });
                if let Some(adapter) = adapter {
                    request.set_adapter(adapter);
                }
                Target::new(
                    resolution.resource_type,
                    identity,
                    resolution.params,
                    Some(resolution.route),
                )
            }
            None => Target::unknown(identity),
        };
        request.set_target(target.clone());
        target
    }

    fn matched(&self, method: &Method, path: &str) -> Option<super::Resolution> {
        debug!(method = %method, path = %path, "Route match attempt");

        let start = Instant::now();
        let resolution = self.table.find(path);
        let elapsed = start.elapsed();

        match &resolution {
            Some(r) if elapsed > Duration::from_millis(1) => warn!(
                method = %method,
                path = %path,
                route_name = %r.route,
                resource_type = %r.resource_type,
                path_params = ?r.params,
                duration_us = elapsed.as_micros(),
                "Slow route matching detected"
            ),
            Some(r) => info!(
                method = %method,
                path = %path,
                route_name = %r.route,
                resource_type = %r.resource_type,
                path_params = ?r.params,
                duration_us = elapsed.as_micros(),
                "Route matched"
            ),
            None => warn!(
                method = %method,
                path = %path,
                duration_us = elapsed.as_micros(),
                "No route matched"
            ),
        }
        resolution
    }
}
