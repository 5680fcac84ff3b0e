//! Error types shared by allocators, stores and workflows

use crate::model::{AllocationId, AllocationUserId};
use thiserror::Error;

/// Errors reported by a cloud backend client
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Referenced entity does not exist on the backend
    #[error("not found: {0}")]
    NotFound(String),

    /// Entity already exists or is in a conflicting state
    #[error("conflict: {0}")]
    Conflict(String),

    /// Any other backend or transport failure
    #[error("backend error: {0}")]
    Transport(String),
}

impl BackendError {
    /// Whether the backend reported the entity as absent
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result type for backend calls
pub type BackendResult<T> = Result<T, BackendError>;

/// Turns `NotFound` into `Ok(None)` for operations where absence means
/// the work is already done.
pub trait NotFoundExt<T> {
    /// Absorb `NotFound`, propagate everything else
    fn ok_if_not_found(self) -> BackendResult<Option<T>>;
}

impl<T> NotFoundExt<T> for BackendResult<T> {
    fn ok_if_not_found(self) -> BackendResult<Option<T>> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(BackendError::NotFound(what)) => {
                tracing::debug!("Absorbed not found: {}", what);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

/// Errors reported by the allocation store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No allocation with this id
    #[error("allocation not found: {0}")]
    AllocationNotFound(AllocationId),

    /// No allocation user with this id
    #[error("allocation user not found: {0}")]
    AllocationUserNotFound(AllocationUserId),

    /// Attribute value has an unexpected type
    #[error("attribute {name} has unexpected value {value}")]
    InvalidAttribute {
        /// Attribute name
        name: String,
        /// Stored value
        value: String,
    },

    /// Underlying storage failure
    #[error("storage error: {0}")]
    Storage(String),
}

/// Result type for store calls
pub type StoreResult<T> = Result<T, StoreError>;
