//! # Response and Error Envelopes
//!
//! The wrappers the transport publishes for every pushed result.
//!
//! ## Matching Contract
//!
//! - An envelope carries a set of matchers. Each matcher is either a full
//!   `CorrelationKey` or a bare request-kind prefix, because several waiting
//!   consumers can legitimately want the same underlying event.
//! - `satisfies(key)` is the only matching function; it defers to
//!   `CorrelationKey::matches`.
//! - Matching does not consume anything. Consumption is the registry claim.
//! - Every envelope carries an `id`. Clones delivered to different
//!   subscribers share it, so consumers can tell one event seen many times
//!   from many events.

use crate::correlation::CorrelationKey;
use crate::ipc::ResponsePayload;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Success event pushed by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    /// Event identity, shared by every clone of this envelope.
    #[serde(default = "Uuid::now_v7")]
    pub id: Uuid,
    /// Keys or prefixes this response can satisfy.
    pub matchers: Vec<String>,
    /// Domain payload.
    pub payload: ResponsePayload,
    /// True when replayed from a cache; non-authoritative for some claims.
    #[serde(default)]
    pub cached: bool,
}

impl ResponseEnvelope {
    /// Envelope answering exactly one key.
    #[must_use]
    pub fn for_key(key: &CorrelationKey, payload: ResponsePayload) -> Self {
        Self {
            id: Uuid::now_v7(),
            matchers: vec![key.as_str().to_string()],
            payload,
            cached: false,
        }
    }

    /// Envelope answering any pending request of the given kind.
    #[must_use]
    pub fn for_prefix(prefix: &str, payload: ResponsePayload) -> Self {
        Self {
            id: Uuid::now_v7(),
            matchers: vec![prefix.to_string()],
            payload,
            cached: false,
        }
    }

    /// Mark the envelope as cache-derived.
    #[must_use]
    pub fn cached(mut self) -> Self {
        self.cached = true;
        self
    }

    /// Add another matcher.
    #[must_use]
    pub fn also_matching(mut self, matcher: impl Into<String>) -> Self {
        self.matchers.push(matcher.into());
        self
    }

    /// Whether this envelope can satisfy the given key.
    #[must_use]
    pub fn satisfies(&self, key: &CorrelationKey) -> bool {
        self.matchers.iter().any(|m| key.matches(m))
    }

    /// Whether one of the matchers names `key` in full.
    #[must_use]
    pub fn addresses(&self, key: &CorrelationKey) -> bool {
        self.matchers.iter().any(|m| m == key.as_str())
    }
}

/// Domain error codes reported by the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    /// Credential rejected; triggers the refresh flow.
    Unauthorized,
    /// Caller lacks permission for the operation.
    Forbidden,
    /// Target resource does not exist.
    NotFound,
    /// Request was malformed.
    InvalidRequest,
    /// Server throttled the client.
    RateLimited,
    /// Server-side failure.
    Internal,
    /// Any other code, carried verbatim.
    Other(i32),
}

impl ErrorCode {
    /// Numeric wire code.
    #[must_use]
    pub fn as_i32(&self) -> i32 {
        match self {
            ErrorCode::Unauthorized => 401,
            ErrorCode::Forbidden => 403,
            ErrorCode::NotFound => 404,
            ErrorCode::InvalidRequest => 400,
            ErrorCode::RateLimited => 429,
            ErrorCode::Internal => 500,
            ErrorCode::Other(code) => *code,
        }
    }

    /// Parse a numeric wire code.
    #[must_use]
    pub fn from_i32(code: i32) -> Self {
        match code {
            401 => ErrorCode::Unauthorized,
            403 => ErrorCode::Forbidden,
            404 => ErrorCode::NotFound,
            400 => ErrorCode::InvalidRequest,
            429 => ErrorCode::RateLimited,
            500 => ErrorCode::Internal,
            other => ErrorCode::Other(other),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::Unauthorized => write!(f, "unauthorized"),
            ErrorCode::Forbidden => write!(f, "forbidden"),
            ErrorCode::NotFound => write!(f, "not_found"),
            ErrorCode::InvalidRequest => write!(f, "invalid_request"),
            ErrorCode::RateLimited => write!(f, "rate_limited"),
            ErrorCode::Internal => write!(f, "internal"),
            ErrorCode::Other(code) => write!(f, "code_{code}"),
        }
    }
}

/// Failure event pushed by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// Event identity, shared by every clone of this envelope.
    #[serde(default = "Uuid::now_v7")]
    pub id: Uuid,
    /// Keys or prefixes this failure applies to. May be empty for
    /// session-wide errors nobody claims.
    pub matchers: Vec<String>,
    /// Domain error code.
    pub code: ErrorCode,
    /// Whether the message is fit to show to the end user.
    pub presentable: bool,
    /// Human-readable detail.
    pub detail: String,
}

impl ErrorEnvelope {
    /// Error answering exactly one key.
    #[must_use]
    pub fn for_key(key: &CorrelationKey, code: ErrorCode, detail: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            matchers: vec![key.as_str().to_string()],
            code,
            presentable: false,
            detail: detail.into(),
        }
    }

    /// Session-wide error not tied to any request.
    #[must_use]
    pub fn session(code: ErrorCode, detail: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            matchers: Vec::new(),
            code,
            presentable: false,
            detail: detail.into(),
        }
    }

    /// Mark the error as presentable to the end user.
    #[must_use]
    pub fn presentable(mut self) -> Self {
        self.presentable = true;
        self
    }

    /// Whether this error can satisfy the given key.
    #[must_use]
    pub fn satisfies(&self, key: &CorrelationKey) -> bool {
        self.matchers.iter().any(|m| key.matches(m))
    }

    /// Whether one of the matchers names `key` in full.
    #[must_use]
    pub fn addresses(&self, key: &CorrelationKey) -> bool {
        self.matchers.iter().any(|m| m == key.as_str())
    }

    /// True for the credential-rejected code.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        self.code == ErrorCode::Unauthorized
    }
}

impl fmt::Display for ErrorEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.detail, self.code)
    }
}
