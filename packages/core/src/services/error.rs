//! Service Layer Error Types
//!
//! This module defines error types for service-layer operations, providing
//! detailed error handling for business logic failures.

use crate::models::ValidationError;
use crate::operations::TreeOperationError;
use thiserror::Error;

/// Service operation errors
///
/// Provides high-level error types for all blueprint service operations,
/// with detailed context and proper error chaining.
#[derive(Error, Debug)]
pub enum BlueprintServiceError {
    /// Blueprint not found by ID
    #[error("Blueprint not found: {id}")]
    BlueprintNotFound { id: String },

    /// Node not found by ID
    #[error("Node not found: {id}")]
    NodeNotFound { id: String },

    /// Validation failed for a payload or an import batch
    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),

    /// Structural operation failed
    #[error(transparent)]
    TreeOperation(#[from] TreeOperationError),

    /// Invalid update operation
    #[error("Invalid update: {0}")]
    InvalidUpdate(String),

    /// Bulk operation failed
    #[error("Bulk operation failed: {context}")]
    BulkOperationFailed { context: String },

    /// Node kept changing group while sibling locks were being acquired
    #[error("Node '{node_id}' was moved concurrently, giving up after {attempts} attempt(s)")]
    ConcurrentModification { node_id: String, attempts: usize },

    /// Store operation failed
    #[error("Database operation failed: {0}")]
    DatabaseError(String),

    /// Service initialization failed
    #[error("Initialization error: {0}")]
    InitializationError(String),
}

impl BlueprintServiceError {
    /// Create a blueprint not found error
    pub fn blueprint_not_found(id: impl Into<String>) -> Self {
        Self::BlueprintNotFound { id: id.into() }
    }

    /// Create a node not found error
    pub fn node_not_found(id: impl Into<String>) -> Self {
        Self::NodeNotFound { id: id.into() }
    }

    /// Create an invalid update error
    pub fn invalid_update(msg: impl Into<String>) -> Self {
        Self::InvalidUpdate(msg.into())
    }

    /// Create a bulk operation failed error
    pub fn bulk_operation_failed(context: impl Into<String>) -> Self {
        Self::BulkOperationFailed {
            context: context.into(),
        }
    }

    /// Create a database error from any store error
    pub fn database_error(err: impl std::fmt::Display) -> Self {
        Self::DatabaseError(err.to_string())
    }

    /// True when the error means something does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::BlueprintNotFound { .. }
                | Self::NodeNotFound { .. }
                | Self::TreeOperation(TreeOperationError::NodeNotFound { .. })
        )
    }
}
