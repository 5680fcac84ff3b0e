//! CloudGrant Workflows
//!
//! Backend-agnostic orchestration of allocation lifecycle events.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                           PROVISIONER                                │
//! │   activate │ disable │ add_user │ remove_user │ handle │ spawn       │
//! └──────┬──────────┬──────────┬─────────────┬─────────────────────────┘
//!        │          │          │             │
//! ┌──────▼──────────▼───┐  ┌───▼─────────────▼───┐  ┌─────────────────┐
//! │  Activation/Disable │  │     Membership      │  │ Quota Validator │
//! │  create/reactivate, │  │  wait for project,  │  │ drift/mismatch, │
//! │  quota, PI role     │  │  grant/revoke role  │  │ reapply         │
//! └──────────┬──────────┘  └──────────┬──────────┘  └────────┬────────┘
//!            │                        │                      │
//!            └────────────┬───────────┴──────────────────────┘
//!                         ▼
//!          AllocatorRegistry ──► ResourceAllocator
//!                         │
//!                         ▼
//!                  AllocationStore (attributes)
//! ```
//!
//! The store is the only shared state. Workflows may run concurrently for
//! the same allocation; every backend mutation is idempotent.

#![warn(missing_docs)]

pub mod activation;
pub mod config;
pub mod error;
pub mod membership;
pub mod provisioner;
pub mod validation;

#[cfg(test)]
mod fixtures;

pub use activation::{activate_allocation, disable_allocation, ActivationOutcome, ActivationState, DisableOutcome};
pub use config::{CloudGrantConfig, MembershipConfig};
pub use error::{Result, WorkflowError};
pub use membership::{add_user_to_allocation, remove_user_from_allocation, wait_for_project_id, MembershipOutcome};
pub use provisioner::{standard_registry, AllocationEvent, EventOutcome, Provisioner};
pub use validation::{QuotaFinding, QuotaValidator, ValidationReport, ValidationStatus};
