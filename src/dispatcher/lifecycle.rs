//! begin / end / compensate bracket around one dispatched operation.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;
use tracing::{debug, error, warn};

use super::Operation;
use crate::adapter::CollectionAdapter;
use crate::context::{Outcome, RequestContext};
use crate::error::{ProviderError, ProviderResult};

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Run `f`, turning a panic into an adapter failure.
fn guarded<T>(stage: &str, f: impl FnOnce() -> ProviderResult<T>) -> ProviderResult<T> {
    catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|panic| {
        let message = panic_message(panic.as_ref());
        let backtrace = std::backtrace::Backtrace::capture();
        error!(
            stage = %stage,
            panic_message = %message,
            backtrace = %backtrace,
            "Adapter panicked - CRITICAL"
        );
        Err(ProviderError::adapter(format!("{stage} panicked: {message}")))
    })
}

/// Execute `operation` inside the adapter lifecycle.
///
/// - `begin` fails: its error is returned, nothing else is called.
/// - the operation succeeds: `end` is called with the outcome.
/// - the operation fails or panics: `compensate` is called with the error.
///
/// Exactly one of `end`/`compensate` follows a successful `begin`. Their own
/// failures are logged and never replace the operation's result.
pub fn run<F>(
    adapter: &dyn CollectionAdapter,
    request: &RequestContext,
    operation: Operation,
    f: F,
) -> ProviderResult<Outcome>
where
    F: FnOnce() -> ProviderResult<Outcome>,
{
    let request_id = request.id();
    let collection = adapter.name();

    if let Err(e) = guarded("begin", || adapter.begin(request)) {
        warn!(
            request_id = %request_id,
            collection = %collection,
            operation = %operation,
            status = e.status(),
            error = %e,
            "Adapter begin failed; operation skipped"
        );
        return Err(e);
    }
    debug!(request_id = %request_id, collection = %collection, operation = %operation, "Lifecycle begin");

    let start = Instant::now();
    let result = guarded(operation.as_str(), f);
    let elapsed_us = start.elapsed().as_micros();

    match &result {
        Ok(outcome) => {
            if let Err(e) = guarded("end", || adapter.end(request, outcome)) {
                error!(
                    request_id = %request_id,
                    collection = %collection,
                    operation = %operation,
                    error = %e,
                    "Adapter end failed"
                );
            }
            debug!(
                request_id = %request_id,
                collection = %collection,
                operation = %operation,
                status = outcome.status,
                duration_us = elapsed_us,
                "Lifecycle end"
            );
        }
        Err(failure) => {
            if let Err(e) = guarded("compensate", || adapter.compensate(request, failure)) {
                error!(
                    request_id = %request_id,
                    collection = %collection,
                    operation = %operation,
                    original_error = %failure,
                    error = %e,
                    "Adapter compensate failed"
                );
            }
            debug!(
                request_id = %request_id,
                collection = %collection,
                operation = %operation,
                status = failure.status(),
                duration_us = elapsed_us,
                "Lifecycle compensate"
            );
        }
    }
    result
}
