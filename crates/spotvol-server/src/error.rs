use spotvol_core::{ServiceError, StorageError};
use spotvol_warehouse::WarehouseError;
use thiserror::Error;

/// Server and command errors mapped to exit codes.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("warehouse unavailable: {0}")]
    Warehouse(#[from] WarehouseError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<StorageError> for ServerError {
    fn from(value: StorageError) -> Self {
        Self::Service(ServiceError::Storage(value))
    }
}

impl ServerError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Service(ServiceError::Catalog(_) | ServiceError::Validation(_)) => 2,
            Self::Service(ServiceError::Upstream(_)) => 3,
            Self::Service(
                ServiceError::Storage(_)
                | ServiceError::CacheMismatch { .. }
                | ServiceError::TaskFailed { .. },
            ) => 4,
            Self::Warehouse(_) => 4,
            Self::Serialization(_) => 10,
            Self::Io(_) => 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use spotvol_core::{CatalogError, FetchError, FetchErrorKind};

    use super::*;

    #[test]
    fn exit_codes_follow_error_category() {
        let not_found = ServerError::from(ServiceError::from(CatalogError::PairNotFound {
            pair: String::from("xyz/usd"),
        }));
        assert_eq!(not_found.exit_code(), 2);

        let upstream = ServerError::from(ServiceError::from(FetchError::new(
            FetchErrorKind::Status,
            "status 500",
        )));
        assert_eq!(upstream.exit_code(), 3);

        let storage = ServerError::from(StorageError::Timeout {
            operation: "read history",
            timeout_ms: 5_000,
        });
        assert_eq!(storage.exit_code(), 4);

        let io = ServerError::from(std::io::Error::other("closed"));
        assert_eq!(io.exit_code(), 10);
    }
}
