//! Error types for the Pending Request Registry

use shared_types::CorrelationKey;
use thiserror::Error;

/// Errors that can occur in the Pending Request Registry.
///
/// These are contract violations: keys are unique by construction, so a
/// duplicate means a caller reused a key.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Duplicate correlation key: {0}")]
    DuplicateKey(CorrelationKey),
}
