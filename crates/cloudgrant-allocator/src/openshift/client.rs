//! OpenShift client contract

use async_trait::async_trait;
use cloudgrant_common::BackendResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Project (namespace) on the cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcProject {
    /// Namespace name, a DNS label
    pub id: String,
    /// Human readable name
    pub display_name: String,
    /// User the project was requested for
    pub requester: String,
}

/// Cluster user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcUser {
    /// User name, the external username
    pub name: String,
}

/// Operations the OpenShift allocator needs from the cluster.
///
/// Absent entities are reported as `BackendError::NotFound`.
#[async_trait]
pub trait OpenShiftApi: Send + Sync {
    /// Create a project
    async fn create_project(&self, id: &str, display_name: &str, requester: &str) -> BackendResult<OcProject>;

    /// Get a project
    async fn get_project(&self, id: &str) -> BackendResult<OcProject>;

    /// Delete a project. Deletion completes asynchronously on a real cluster.
    async fn delete_project(&self, id: &str) -> BackendResult<()>;

    /// Get a user
    async fn get_user(&self, name: &str) -> BackendResult<OcUser>;

    /// Create a user with an identity mapping for the external username
    async fn create_user(&self, name: &str) -> BackendResult<OcUser>;

    /// Get a role binding, `NotFound` when absent
    async fn get_role_binding(&self, user: &str, project_id: &str, role: &str) -> BackendResult<()>;

    /// Bind a role
    async fn add_role(&self, user: &str, project_id: &str, role: &str) -> BackendResult<()>;

    /// Unbind a role, `NotFound` when absent
    async fn remove_role(&self, user: &str, project_id: &str, role: &str) -> BackendResult<()>;

    /// Replace the project's resource quota
    async fn set_quota(&self, project_id: &str, quota: &BTreeMap<String, String>) -> BackendResult<()>;

    /// Read the project's resource quota
    async fn get_quota(&self, project_id: &str) -> BackendResult<BTreeMap<String, String>>;
}
