//! CloudGrant Resource Allocators
//!
//! One allocator per cloud backend, all behind the same capability trait.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                        ALLOCATOR REGISTRY                            │
//! │        resource type ──► Backend ──► AllocatorFactory                │
//! └──────────────┬──────────────────────────────────┬───────────────────┘
//!                │                                  │
//! ┌──────────────▼──────────────┐    ┌──────────────▼──────────────┐
//! │     OpenStackAllocator      │    │     OpenShiftAllocator      │
//! │  projects, federation,      │    │  namespaces, users,         │
//! │  compute/volume/network/    │    │  role bindings,             │
//! │  object quotas, default net │    │  resource quota             │
//! └──────────────┬──────────────┘    └──────────────┬──────────────┘
//!                │ OpenStackApi                     │ OpenShiftApi
//!                ▼                                  ▼
//!          backend clients                    backend clients
//! ```
//!
//! Quota values come from the static policy tables in [`quota`] and are
//! persisted on the allocation before any allocator pushes them.

#![warn(missing_docs)]

pub mod allocator;
pub mod backend;
pub mod naming;
pub mod openshift;
pub mod openstack;
pub mod quota;
pub mod registry;

pub use allocator::{FederatedUser, QuotaSnapshot, ResourceAllocator};
pub use backend::Backend;
pub use naming::unique_project_name;
pub use quota::{apply_quota_policy, QuotaPolicy};
pub use registry::{AllocatorContext, AllocatorFactory, AllocatorRegistry};

use cloudgrant_common::{BackendError, StoreError};
use thiserror::Error;

/// Allocator errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllocatorError {
    /// Backend call failed
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// Attribute store failed
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Resource lacks a setting the backend needs
    #[error("resource {resource} is missing setting {setting}")]
    MissingSetting {
        /// Resource name
        resource: String,
        /// Attribute name of the missing setting
        setting: &'static str,
    },

    /// Generated name cannot be used on the backend
    #[error("invalid project name: {0}")]
    InvalidName(String),
}

impl AllocatorError {
    /// Whether this wraps a backend `NotFound`
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Backend(e) if e.is_not_found())
    }
}

/// Result type for allocator operations
pub type Result<T> = std::result::Result<T, AllocatorError>;
