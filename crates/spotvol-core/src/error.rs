use thiserror::Error;

use crate::fetcher::FetchError;
use crate::store::StorageError;

/// Lookups against the fixed pair catalog.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("unsupported currency: '{symbol}'")]
    UnsupportedCurrency { symbol: String },
    #[error("pair not found: '{pair}'")]
    PairNotFound { pair: String },
}

impl CatalogError {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::UnsupportedCurrency { .. } => "catalog.unsupported_currency",
            Self::PairNotFound { .. } => "catalog.pair_not_found",
        }
    }
}

/// Value-level contract violations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("timestamp must be RFC3339 UTC (suffix Z): '{value}'")]
    TimestampNotUtc { value: String },
    #[error("timestamp out of range: {micros} microseconds since epoch")]
    TimestampOutOfRange { micros: i64 },

    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: &'static str },
    #[error("field '{field}' must be non-negative")]
    NegativeValue { field: &'static str },

    #[error("history window must be between 1 and {max} hours, got {hours}")]
    InvalidHistoryWindow { hours: u32, max: u32 },
}

/// Top-level error for price service operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("upstream fetch failed: {0}")]
    Upstream(#[from] FetchError),

    #[error("storage failed: {0}")]
    Storage(#[from] StorageError),

    #[error("cache entry for '{key}' holds an unexpected value")]
    CacheMismatch { key: String },

    #[error("{operation} task ended before finishing: {detail}")]
    TaskFailed {
        operation: &'static str,
        detail: String,
    },
}

impl ServiceError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Catalog(error) => error.code(),
            Self::Validation(_) => "validation.invalid",
            Self::Upstream(error) => error.code(),
            Self::Storage(error) => error.code(),
            Self::CacheMismatch { .. } => "cache.mismatch",
            Self::TaskFailed { .. } => "service.task_failed",
        }
    }

    /// Whether the error means the requested pair does not exist.
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Catalog(CatalogError::PairNotFound { .. }))
    }
}
