//! Error types for the allocation engine.
//!
//! Every fallible operation returns [`Result<T>`]. The variants map one to one
//! onto the failure codes reported to callers through
//! [`MutationResponse`](crate::response::MutationResponse).

use std::net::IpAddr;

/// Errors returned by registry, allocator, host and audit operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed address literal, prefix out of range, or an invalid field.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The canonical `(network, prefix)` pair is already registered.
    #[error("Subnet {0} already exists")]
    DuplicateSubnet(String),

    /// Unknown subnet, address or host.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The address is held by a different host.
    #[error("IP {ip} is already assigned to another host ({host_id})")]
    AlreadyAssigned { ip: IpAddr, host_id: String },

    /// A delete was blocked by a live assignment.
    #[error("Referential integrity error: {0}")]
    ReferentialIntegrity(String),

    /// The store rejected the transaction; nothing was applied.
    #[error("Storage error: {0}")]
    Storage(String),

    /// File system error while loading or persisting the store.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error while loading or persisting the store.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Error::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Stable machine readable code for the boundary response.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation_error",
            Error::DuplicateSubnet(_) => "duplicate_subnet",
            Error::NotFound { .. } => "not_found",
            Error::AlreadyAssigned { .. } => "already_assigned",
            Error::ReferentialIntegrity(_) => "referential_integrity_error",
            Error::Storage(_) | Error::Io(_) | Error::Json(_) => "storage_error",
        }
    }
}

/// A specialized Result type for allocation engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(Error::Validation("x".into()).code(), "validation_error");
        assert_eq!(Error::not_found("Subnet", "abc").code(), "not_found");
        assert_eq!(
            Error::Storage("disk full".into()).code(),
            "storage_error"
        );
    }

    #[test]
    fn test_not_found_message() {
        let err = Error::not_found("Address", "10.0.0.99");
        assert_eq!(err.to_string(), "Address not found: 10.0.0.99");
    }
}
