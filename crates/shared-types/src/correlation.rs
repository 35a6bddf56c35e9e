//! # Correlation Keys
//!
//! A `CorrelationKey` ties an outbound request to the pushed event that
//! answers it. Keys are built as `<prefix>-<suffix>` where the prefix names
//! the request kind and the suffix is a hyphen-free UUID, unique per
//! in-flight request.
//!
//! ## Matching Rule
//!
//! A matcher string matches a key iff it is either:
//! - the full key, or
//! - exactly the key's prefix (everything before the final `-`).
//!
//! Nothing looser is accepted: `"pin"` does not match `"unpin-…"`, and
//! `"fetch"` does not match `"fetch-history-…"`.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use uuid::Uuid;

/// Separator between the kind prefix and the unique suffix.
pub const KEY_SEPARATOR: char = '-';

/// Opaque correlation key for one in-flight request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationKey(String);

impl CorrelationKey {
    /// Generate a fresh key for the given request-kind prefix.
    ///
    /// The suffix is a UUID v7 rendered without hyphens, so the prefix can be
    /// recovered unambiguously even when it contains hyphens itself.
    #[must_use]
    pub fn generate(prefix: &str) -> Self {
        Self(format!(
            "{}{}{}",
            prefix,
            KEY_SEPARATOR,
            Uuid::now_v7().simple()
        ))
    }

    /// Build a key from a prefix and an explicit suffix.
    ///
    /// Returns `None` if the suffix is empty or contains the separator.
    #[must_use]
    pub fn from_parts(prefix: &str, suffix: &str) -> Option<Self> {
        if suffix.is_empty() || suffix.contains(KEY_SEPARATOR) {
            return None;
        }
        Some(Self(format!("{prefix}{KEY_SEPARATOR}{suffix}")))
    }

    /// The request-kind prefix of this key.
    #[must_use]
    pub fn prefix(&self) -> &str {
        self.0
            .rsplit_once(KEY_SEPARATOR)
            .map_or(self.0.as_str(), |(prefix, _)| prefix)
    }

    /// The unique suffix of this key.
    #[must_use]
    pub fn suffix(&self) -> &str {
        self.0
            .rsplit_once(KEY_SEPARATOR)
            .map_or("", |(_, suffix)| suffix)
    }

    /// Whether `matcher` selects this key (full key or exact prefix).
    #[must_use]
    pub fn matches(&self, matcher: &str) -> bool {
        self.0 == matcher || self.prefix() == matcher
    }

    /// The key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CorrelationKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// Hash and Eq are derived from the inner String, so lookups by &str agree.
impl Borrow<str> for CorrelationKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<CorrelationKey> for String {
    fn from(key: CorrelationKey) -> Self {
        key.0
    }
}
