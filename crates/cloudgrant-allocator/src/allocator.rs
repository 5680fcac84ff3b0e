//! Resource Allocator capability trait

use crate::backend::Backend;
use crate::Result;
use async_trait::async_trait;
use cloudgrant_common::QuotaDimension;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A federated identity on a backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FederatedUser {
    /// Backend user id
    pub id: String,
    /// External username
    pub username: String,
}

/// Quota values as currently enforced by a backend
pub type QuotaSnapshot = BTreeMap<QuotaDimension, i64>;

/// Project, identity and quota primitives of one cloud backend.
///
/// Every mutation is idempotent: workflows may re-run any of them after a
/// partial failure or while racing another workflow on the same allocation.
#[async_trait]
pub trait ResourceAllocator: Send + Sync {
    /// Backend this allocator talks to, selects the quota policy
    fn backend(&self) -> Backend;

    /// Longest project name the backend accepts, `None` when unbounded
    fn project_name_max_length(&self) -> Option<usize>;

    /// Dimensions pushed by [`set_quota`](Self::set_quota)
    fn quota_dimensions(&self) -> &'static [QuotaDimension];

    /// Create a project, returning its backend id
    async fn create_project(&self, project_name: &str) -> Result<String>;

    /// Bring a disabled project back, no-op when already active
    async fn reactivate_project(&self, project_id: &str) -> Result<()>;

    /// Disable or schedule deletion of a project
    async fn disable_project(&self, project_id: &str) -> Result<()>;

    /// Baseline configuration, run once after creation
    async fn create_project_defaults(&self, project_id: &str) -> Result<()>;

    /// Ensure a federated identity exists for `username`
    async fn get_or_create_federated_user(&self, username: &str) -> Result<FederatedUser>;

    /// Grant the member role on the project
    async fn assign_role_on_user(&self, username: &str, project_id: &str) -> Result<()>;

    /// Revoke the member role, no-op when not granted
    async fn remove_role_from_user(&self, username: &str, project_id: &str) -> Result<()>;

    /// Push the allocation's quota attributes to the backend
    async fn set_quota(&self, project_id: &str) -> Result<()>;

    /// Read back the quota the backend enforces
    async fn get_quota(&self, project_id: &str) -> Result<QuotaSnapshot>;

    /// Whether the project exists on the backend
    async fn project_exists(&self, project_id: &str) -> Result<bool>;
}
