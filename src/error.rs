//! # Error Module
//!
//! Every stage of the request pipeline (resolver → dispatcher → lifecycle manager)
//! returns [`ProviderResult`]. A [`ProviderError`] carries enough information to
//! produce the final HTTP status, so no stage needs to unwind to report a failure.
//!
//! | Variant | Status |
//! |---|---|
//! | `Parse`, `UnsupportedMediaType` | 415 |
//! | `Validation`, `BadRequest` | 400 |
//! | `Conflict` | 409 |
//! | `NotFound`, `Unroutable` | 404 |
//! | `Unsupported` | 405 (+ `Allow`) |
//! | `Adapter { status, .. }` | embedded status |
//! | `Internal` | 500 |

use thiserror::Error;

/// Result type threaded through resolution, dispatch and adapter calls.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Structured failure of a request, tagged with the status it maps to.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// Request body could not be read or parsed into a document
    #[error("unable to parse request body: {0}")]
    Parse(String),

    /// Body media type is not one the target accepts
    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),

    /// Entry failed the minimal validity rules
    #[error("invalid entry: {0}")]
    Validation(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    /// Submitted entry does not describe the stored entry
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Adapter declined an optional operation
    #[error("operation not supported: {operation}")]
    Unsupported { operation: &'static str },

    /// No registered route matched the request path
    #[error("no route matches {0}")]
    Unroutable(String),

    /// Failure raised by an adapter or one of its lifecycle hooks
    #[error("adapter failure ({status}): {message}")]
    Adapter { status: u16, message: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl ProviderError {
    /// Adapter failure with the default 500 status.
    pub fn adapter(message: impl Into<String>) -> Self {
        Self::Adapter {
            status: 500,
            message: message.into(),
        }
    }

    /// Adapter failure carrying an explicit status (e.g. 409 raised by a backend).
    pub fn adapter_status(status: u16, message: impl Into<String>) -> Self {
        Self::Adapter {
            status,
            message: message.into(),
        }
    }

    pub fn unsupported(operation: &'static str) -> Self {
        Self::Unsupported { operation }
    }

    /// HTTP status this error maps to.
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            Self::Parse(_) | Self::UnsupportedMediaType(_) => 415,
            Self::Validation(_) | Self::BadRequest(_) => 400,
            Self::Conflict(_) => 409,
            Self::NotFound(_) | Self::Unroutable(_) => 404,
            Self::Unsupported { .. } => 405,
            Self::Adapter { status, .. } => {
                if (400..600).contains(status) {
                    *status
                } else {
                    500
                }
            }
            Self::Internal(_) => 500,
        }
    }

    /// 4xx failures are routine and logged at `info`; everything else at `error`.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status())
    }

    /// Message safe to return to the caller.
    ///
    /// Server-side failures are reduced to a generic message; the full detail
    /// only goes to the log.
    #[must_use]
    pub fn public_message(&self) -> String {
        if self.is_client_error() {
            self.to_string()
        } else {
            "internal server error".to_string()
        }
    }
}
