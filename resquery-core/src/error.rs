//! Error types and result types for resource access operations.
//!
//! Compilation errors (malformed filter values, invalid reference identifiers) are
//! client faults and surface as [`ResourceError::InvalidArgument`]. Store failures are
//! carried as [`ResourceError::Backend`] and propagate unchanged.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors raised while compiling or executing a resource query.
#[derive(Error, Debug)]
pub enum ResourceError {
    /// A client supplied value could not be interpreted, e.g. a malformed reference
    /// identifier or a filter value that does not match the field type.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// A required parameter was not supplied.
    #[error("Missing parameter: {0}")]
    MissingParameter(String),
    /// The requested resource does not exist.
    /// The first argument is the resource ID, the second is the collection name.
    #[error("Resource {0} not found in collection {1}")]
    ResourceNotFound(String, String),
    /// The requested collection is not registered in the schema registry.
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),
    /// A document with the given ID already exists in the collection.
    #[error("Document {0} already exists in collection {1}")]
    DocumentAlreadyExists(String, String),
    /// A schema definition violates registry invariants.
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),
    /// The configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// Serialization/deserialization error when converting between document formats.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during backend initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
}

impl ResourceError {
    /// Builds the error raised for a token that is not a well-formed reference identifier.
    pub fn invalid_reference(value: &str) -> Self {
        ResourceError::InvalidArgument(format!(
            "the value \"{value}\" is not a valid ObjectId. Use a valid ObjectId to filter for this property"
        ))
    }

    /// Returns `true` if the error was caused by client input rather than the store.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ResourceError::InvalidArgument(_)
                | ResourceError::MissingParameter(_)
                | ResourceError::ResourceNotFound(_, _)
                | ResourceError::CollectionNotFound(_)
        )
    }
}

/// A specialized `Result` type for resource access operations.
pub type ResourceResult<T> = Result<T, ResourceError>;

impl From<BsonError> for ResourceError {
    fn from(err: BsonError) -> Self {
        ResourceError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for ResourceError {
    fn from(err: SerdeJsonError) -> Self {
        ResourceError::Serialization(err.to_string())
    }
}
