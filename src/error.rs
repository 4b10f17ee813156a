// Registry error kinds
//
// Only two outcomes can go wrong inside the registry. Both are expected,
// typed results the caller branches on; nothing here is fatal.

use thiserror::Error;

/// Result type for every fallible registry call
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// No record exists for the referenced id
    #[error("equipment not found: {id}")]
    NotFound { id: u64 },

    /// Health score above the allowed maximum.
    ///
    /// The name is kept for compatibility with existing callers that branch
    /// on `err-unauthorized`; no permission check happens anywhere.
    #[error("health score {score} for equipment {id} exceeds {max}", max = crate::equipment::MAX_HEALTH_SCORE)]
    Unauthorized { id: u64, score: u64 },
}

impl RegistryError {
    pub fn not_found(id: u64) -> Self {
        RegistryError::NotFound { id }
    }

    pub fn unauthorized(id: u64, score: u64) -> Self {
        RegistryError::Unauthorized { id, score }
    }

    /// Stable error code used on the wire
    pub fn code(&self) -> &'static str {
        match self {
            RegistryError::NotFound { .. } => "err-not-found",
            RegistryError::Unauthorized { .. } => "err-unauthorized",
        }
    }
}
