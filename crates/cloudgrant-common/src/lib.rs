//! CloudGrant Common
//!
//! Shared model for the allocation provisioning engine.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        HOST ALLOCATION SYSTEM                     │
//! │   Allocation ── Resource (backend type)                           │
//! │       │    └─── Project ── PI user                                │
//! │       └──────── AllocationUser (username)                         │
//! └───────┬──────────────────────────────────────────────────────────┘
//!         │ get_attribute / set_attribute
//! ┌───────▼──────────────────────────────────────────────────────────┐
//! │                        ATTRIBUTE STORE                            │
//! │   "Allocated Project ID"  "Allocated Project Name"  quota attrs   │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The attribute store is the only state shared between workflows; it is
//! always injected, never global.

#![warn(missing_docs)]

pub mod attributes;
pub mod error;
pub mod model;
pub mod store;

pub use attributes::QuotaDimension;
pub use error::{BackendError, BackendResult, NotFoundExt, StoreError, StoreResult};
pub use model::{
    Allocation, AllocationId, AllocationStatus, AllocationUser, AllocationUserId,
    AttributeValue, Project, Resource, User,
};
pub use store::{AllocationAttributes, AllocationStore, InMemoryAllocationStore};
