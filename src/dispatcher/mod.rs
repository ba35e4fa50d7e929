//! # Dispatcher Module
//!
//! Turns a resolved request into an [`Outcome`].
//!
//! ## Request Flow
//!
//! 1. An unresolved target answers `404`
//! 2. `OPTIONS` answers `200` with the legal methods of the resource type
//! 3. [`select_operation`] maps (method, resource type) to an [`Operation`];
//!    unmapped pairs answer `405` with the same `Allow` set
//! 4. Adapter-backed operations run inside [`lifecycle::run`]
//! 5. Errors become structured outcomes; an adapter declining an optional
//!    operation answers `405` advertising only the read methods
//! 6. `HEAD` drops the entity and keeps every header
//!
//! The dispatcher holds no per-request state and is shared by every request.

mod core;
pub mod lifecycle;
mod provider;

pub use core::{allow_header, declined_allow, legal_methods, safe_methods, select_operation, Operation};

use http::Method;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::context::{Outcome, RequestContext};
use crate::error::{ProviderError, ProviderResult};
use crate::model::{BodyParser, JsonEntryParser, JsonRenderer, Renderer};
use crate::target::{ResourceType, RouteTable, COLLECTION_PARAM};
use provider::Provider;

/// Selects and runs the operation for a resolved request.
#[derive(Clone)]
pub struct Dispatcher {
    parser: Arc<dyn BodyParser>,
    renderer: Arc<dyn Renderer>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(Arc::new(JsonEntryParser), Arc::new(JsonRenderer::default()))
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher").finish_non_exhaustive()
    }
}

impl Dispatcher {
    #[must_use]
    pub fn new(parser: Arc<dyn BodyParser>, renderer: Arc<dyn Renderer>) -> Self {
        Self { parser, renderer }
    }

    #[must_use]
    pub fn parser(&self) -> &dyn BodyParser {
        self.parser.as_ref()
    }

    /// Dispatch `request`, which must already carry its target.
    #[must_use]
    pub fn dispatch(&self, table: &RouteTable, request: &RequestContext) -> Outcome {
        let resource_type = request
            .target()
            .map_or(ResourceType::Unknown, |t| t.resource_type());
        let method = request.method();

        let outcome = match self.try_dispatch(table, request, resource_type) {
            Ok(outcome) => outcome,
            Err(e) => {
                let status = e.status();
                if e.is_client_error() {
                    info!(
                        request_id = %request.id(),
                        method = %method,
                        path = %request.path(),
                        resource_type = %resource_type,
                        status = status,
                        error = %e,
                        "Request rejected"
                    );
                } else {
                    error!(
                        request_id = %request.id(),
                        method = %method,
                        path = %request.path(),
                        resource_type = %resource_type,
                        status = status,
                        error = %e,
                        error_debug = ?e,
                        "Request failed"
                    );
                }
                let outcome = Outcome::from_error(&e);
                match e {
                    ProviderError::Unsupported { .. } => outcome.with_allow(&declined_allow(resource_type, method)),
                    _ => outcome,
                }
            }
        };

        if *method == Method::HEAD {
            outcome.without_body()
        } else {
            outcome
        }
    }

    fn try_dispatch(
        &self,
        table: &RouteTable,
        request: &RequestContext,
        resource_type: ResourceType,
    ) -> ProviderResult<Outcome> {
        let method = request.method();
        if resource_type == ResourceType::Unknown {
            return Err(ProviderError::Unroutable(request.path().to_string()));
        }
        if *method == Method::OPTIONS {
            return Ok(Outcome::ok().with_allow(legal_methods(resource_type)));
        }

        let entry_body = request
            .content_type()
            .is_some_and(|ct| self.parser.accepts(ct));
        let Some(operation) = select_operation(method, resource_type, entry_body) else {
            info!(
                request_id = %request.id(),
                method = %method,
                resource_type = %resource_type,
                allow = %allow_header(resource_type),
                "Method not allowed"
            );
            return Ok(Outcome::from_error(&ProviderError::unsupported("method"))
                .with_allow(legal_methods(resource_type)));
        };

        debug!(
            request_id = %request.id(),
            method = %method,
            resource_type = %resource_type,
            operation = %operation,
            "Dispatch selected"
        );

        let provider = Provider {
            table,
            request,
            parser: self.parser.as_ref(),
            renderer: &self.renderer,
        };
        if !operation.needs_adapter() {
            return provider.get_service();
        }

        let adapter = request
            .adapter()
            .or_else(|| {
                request
                    .target()
                    .and_then(|t| t.param(COLLECTION_PARAM))
                    .and_then(|c| table.adapter(c))
            })
            .ok_or_else(|| {
                let name = request
                    .target()
                    .and_then(|t| t.param(COLLECTION_PARAM))
                    .unwrap_or_default();
                ProviderError::NotFound(format!("collection {name}"))
            })?;

        lifecycle::run(adapter.as_ref(), request, operation, || {
            provider.execute(adapter.as_ref(), operation)
        })
    }
}
