//! Workflow errors

use crate::activation::ActivationState;
use cloudgrant_allocator::AllocatorError;
use cloudgrant_common::{AllocationId, StoreError};
use std::time::Duration;
use thiserror::Error;

/// Workflow errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    /// Attribute store failed
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Allocator or backend failed
    #[error("allocator error: {0}")]
    Allocator(#[from] AllocatorError),

    /// Project id never appeared on the allocation
    #[error("allocation {allocation} has no project id after {waited:?}")]
    Timeout {
        /// Allocation waited on
        allocation: AllocationId,
        /// Time spent waiting
        waited: Duration,
    },

    /// Activation failed part way
    #[error("activation of allocation {allocation} stopped at {reached}: {source}")]
    Activation {
        /// Allocation activated
        allocation: AllocationId,
        /// Last state reached before the failure
        reached: ActivationState,
        /// Failing step
        #[source]
        source: Box<WorkflowError>,
    },

    /// Configuration could not be loaded
    #[error("config error: {0}")]
    Config(String),
}

impl WorkflowError {
    /// Whether this wraps a backend `NotFound`
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Allocator(e) => e.is_not_found(),
            Self::Activation { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    /// State an activation reached before failing
    pub fn activation_state(&self) -> Option<ActivationState> {
        match self {
            Self::Activation { reached, .. } => Some(*reached),
            _ => None,
        }
    }
}

/// Result type for workflow operations
pub type Result<T> = std::result::Result<T, WorkflowError>;
