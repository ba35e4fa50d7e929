//! # Service Module
//!
//! [`AtomService`] is the whole pipeline behind one call: identity hook,
//! body-size guard, target resolution, the filter chain around dispatch and
//! the conditional `304` short-circuit. A host binding turns its native request into a
//! [`RequestContext`], calls [`AtomService::handle`] and writes the
//! [`Outcome`] back.
//!
//! The route table sits behind an `ArcSwap`: [`AtomService::reload`] swaps in
//! a new table without blocking readers, and a request keeps the snapshot it
//! loaded when it started.

use arc_swap::ArcSwap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, info_span, warn};

use crate::config::RuntimeConfig;
use crate::context::{Outcome, RequestContext};
use crate::dispatcher::Dispatcher;
use crate::error::ProviderError;
use crate::filter::{Filter, FilterChain};
use crate::security::{AnonymousResolver, IdentityResolver};
use crate::target::{RouteTable, TargetBuilder, TargetResolver};
use crate::template::ParamSource;

pub struct AtomService {
    table: ArcSwap<RouteTable>,
    dispatcher: Dispatcher,
    identity: Arc<dyn IdentityResolver>,
    filters: FilterChain,
    runtime: RuntimeConfig,
}

impl std::fmt::Debug for AtomService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AtomService")
            .field("routes", &self.table.load().len())
            .field("filters", &self.filters.len())
            .field("runtime", &self.runtime)
            .finish_non_exhaustive()
    }
}

impl AtomService {
    /// JSON parser and renderer, anonymous requests, default limits.
    #[must_use]
    pub fn new(table: RouteTable) -> Self {
        Self {
            table: ArcSwap::from_pointee(table),
            dispatcher: Dispatcher::default(),
            identity: Arc::new(AnonymousResolver),
            filters: FilterChain::new(),
            runtime: RuntimeConfig::default(),
        }
    }

    #[must_use]
    pub fn with_dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    #[must_use]
    pub fn with_identity_resolver(mut self, identity: Arc<dyn IdentityResolver>) -> Self {
        self.identity = identity;
        self
    }

    /// Append a filter; filters run in the order they are added.
    #[must_use]
    pub fn with_filter(mut self, filter: Arc<dyn Filter>) -> Self {
        self.filters.push(filter);
        self
    }

    #[must_use]
    pub fn with_runtime_config(mut self, runtime: RuntimeConfig) -> Self {
        self.runtime = runtime;
        self
    }

    #[must_use]
    pub fn runtime_config(&self) -> &RuntimeConfig {
        &self.runtime
    }

    /// Current route table snapshot.
    #[must_use]
    pub fn table(&self) -> Arc<RouteTable> {
        self.table.load_full()
    }

    /// Replace the route table. Requests already in flight finish against
    /// the table they started with.
    pub fn reload(&self, table: RouteTable) {
        let previous = self.table.swap(Arc::new(table));
        info!(
            previous_routes = previous.len(),
            routes = self.table.load().len(),
            "Route table reloaded"
        );
    }

    /// URL for route `key` outside any request.
    #[must_use]
    pub fn url_for(&self, key: &str, source: &dyn ParamSource) -> Option<String> {
        TargetBuilder::new(&self.table.load()).url_for(key, source)
    }

    /// Run the full pipeline for one request.
    #[must_use]
    pub fn handle(&self, request: RequestContext) -> Outcome {
        let table = self.table.load_full();
        let mut request = match &self.runtime.base_uri {
            Some(base) => request.with_base(base.clone()),
            None => request,
        };
        let span = info_span!("request", request_id = %request.id(), method = %request.method());
        let _entered = span.enter();
        let start = Instant::now();

        if request.body().len() > self.runtime.max_body_bytes {
            warn!(
                body_bytes = request.body().len(),
                max_body_bytes = self.runtime.max_body_bytes,
                "Request body too large"
            );
            return Outcome::from_error(&ProviderError::BadRequest(format!(
                "request body exceeds {} bytes",
                self.runtime.max_body_bytes
            )));
        }

        let principal = self.identity.resolve(&request);
        request.set_principal(principal);

        let target = TargetResolver::new(&table).resolve(&mut request);
        let dispatcher = &self.dispatcher;
        let mut outcome = self
            .filters
            .run(&mut request, |request| dispatcher.dispatch(&table, request));
        if outcome.is_not_modified(&request) {
            outcome = outcome.into_not_modified();
        }

        info!(
            path = %request.path(),
            resource_type = %target.resource_type(),
            status = outcome.status,
            duration_us = start.elapsed().as_micros(),
            "Request handled"
        );
        outcome
    }
}
