use thiserror::Error;

/// Canonical error type for metadata control plane operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Entity was not found in the metadata catalog.
    #[error("{entity} `{id}` was not found")]
    NotFound {
        /// Entity type name (e.g. `"collection"`).
        entity: &'static str,
        /// Identifier of the missing entity.
        id: String,
    },

    /// Entity already exists and cannot be created again.
    #[error("{entity} `{id}` already exists")]
    AlreadyExists {
        /// Entity type name (e.g. `"partition"`).
        entity: &'static str,
        /// Identifier that conflicts.
        id: String,
    },

    /// A single request asked for more rows than any segment can hold.
    #[error("requested {requested} rows but a segment holds at most {capacity}")]
    CapacityExceeded {
        /// Row count carried by the request.
        requested: u64,
        /// Maximum row count of a segment for the collection.
        capacity: u64,
    },

    /// Collection schema cannot be used to size segments.
    #[error("schema error: {message}")]
    Schema {
        /// Human-readable description of the malformed field.
        message: String,
    },

    /// The metadata catalog rejected or failed an operation.
    #[error("catalog error: {message}")]
    Catalog {
        /// Error reported by the catalog accessor.
        message: String,
    },

    /// Operation violates current state machine rules.
    #[error("invalid state: {message}")]
    InvalidState {
        /// Human-readable explanation of the invalid state.
        message: String,
    },

    /// Unexpected internal error occurred.
    #[error("internal error: {message}")]
    Internal {
        /// Human-readable details for debugging purposes.
        message: String,
    },
}

impl CoreError {
    /// Creates a `NotFound` variant.
    #[must_use]
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Creates an `AlreadyExists` variant.
    #[must_use]
    pub fn already_exists(entity: &'static str, id: impl Into<String>) -> Self {
        Self::AlreadyExists {
            entity,
            id: id.into(),
        }
    }

    /// Creates a `CapacityExceeded` variant.
    #[must_use]
    pub const fn capacity_exceeded(requested: u64, capacity: u64) -> Self {
        Self::CapacityExceeded {
            requested,
            capacity,
        }
    }

    /// Creates a `Schema` variant.
    #[must_use]
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
        }
    }

    /// Creates a `Catalog` variant.
    #[must_use]
    pub fn catalog(message: impl Into<String>) -> Self {
        Self::Catalog {
            message: message.into(),
        }
    }

    /// Creates an `InvalidState` variant.
    #[must_use]
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Creates an `Internal` variant.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Convenient result alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
