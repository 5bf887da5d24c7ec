//! Error taxonomy shared by the engine and the HTTP surface.
//!
//! Per-record problems (`InputError`) stay inside a batch report; everything
//! else propagates to the immediate caller as `AnalyzeError`.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Machine-readable error category, serialized in `{error, kind}` bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidField,
    MalformedDate,
    RateLimited,
    ClassifierUnavailable,
    CacheUnavailable,
    UpstreamUnavailable,
    BadRequest,
}

/// Structured error body: `{ "error": "...", "kind": "..." }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: ErrorKind,
}

impl ErrorBody {
    pub fn new(kind: ErrorKind, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            kind,
        }
    }
}

/// A single review record could not be turned into a well-formed review.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("field `{field}` must be {expected}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
    },

    #[error("unparsable date `{0}`")]
    MalformedDate(String),
}

impl InputError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            InputError::MissingField(_) | InputError::InvalidField { .. } => {
                ErrorKind::InvalidField
            }
            InputError::MalformedDate(_) => ErrorKind::MalformedDate,
        }
    }
}

/// Admission denied by a per-client window. Nothing was executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("rate limit exceeded; retry in {}s", .retry_after.as_secs().max(1))]
pub struct RateLimited {
    pub retry_after: Duration,
}

impl RateLimited {
    /// Whole seconds for a `Retry-After` header (never zero).
    pub fn retry_after_secs(&self) -> u64 {
        let secs = self.retry_after.as_secs();
        if self.retry_after.subsec_nanos() > 0 {
            secs + 1
        } else {
            secs.max(1)
        }
    }
}

/// The external classifier could not produce a signal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("classifier unavailable: {reason}")]
pub struct ClassifierUnavailable {
    pub reason: String,
}

impl ClassifierUnavailable {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// The verdict store refused an operation. Callers fail open.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("verdict cache unavailable: {reason}")]
pub struct CacheUnavailable {
    pub reason: String,
}

impl CacheUnavailable {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Errors surfaced to the caller of a service operation.
#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error(transparent)]
    RateLimited(#[from] RateLimited),

    #[error(transparent)]
    ClassifierUnavailable(#[from] ClassifierUnavailable),

    /// The chain stays server-side; callers only learn the source is down.
    #[error("review source unavailable")]
    Upstream(#[source] anyhow::Error),

    #[error("{0}")]
    BadRequest(String),
}

impl AnalyzeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnalyzeError::RateLimited(_) => ErrorKind::RateLimited,
            AnalyzeError::ClassifierUnavailable(_) => ErrorKind::ClassifierUnavailable,
            AnalyzeError::Upstream(_) => ErrorKind::UpstreamUnavailable,
            AnalyzeError::BadRequest(_) => ErrorKind::BadRequest,
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody::new(self.kind(), self.to_string())
    }
}
