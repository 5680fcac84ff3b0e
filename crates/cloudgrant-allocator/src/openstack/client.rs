//! OpenStack client contract
//!
//! Identity, compute, volume, network and object-storage operations the
//! allocator needs, shaped after the respective service APIs.

use async_trait::async_trait;
use cloudgrant_common::BackendResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// Identity
// =============================================================================

/// Identity project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsProject {
    pub id: String,
    pub name: String,
    pub domain_id: Option<String>,
    pub enabled: bool,
}

/// Project creation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectCreate {
    pub name: String,
    pub domain_id: Option<String>,
    pub enabled: bool,
}

/// Identity role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsRole {
    pub id: String,
    pub name: String,
}

/// Identity user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsUser {
    pub id: String,
    pub name: String,
    pub domain_id: Option<String>,
}

/// User lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserQuery {
    /// Federated unique id
    UniqueId(String),
    /// Name within a domain
    Name { name: String, domain_id: Option<String> },
}

/// User creation payload with a federation mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FederatedUserPayload {
    pub user: FederatedUserSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FederatedUserSpec {
    pub domain_id: Option<String>,
    pub enabled: bool,
    pub name: String,
    pub email: String,
    pub federated: Vec<FederationEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FederationEntry {
    pub idp_id: String,
    pub protocols: Vec<FederationProtocol>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FederationProtocol {
    pub protocol_id: String,
    pub unique_id: String,
}

impl FederatedUserPayload {
    /// Unique ids this payload maps to the user
    pub fn unique_ids(&self) -> impl Iterator<Item = &str> {
        self.user
            .federated
            .iter()
            .flat_map(|f| f.protocols.iter().map(|p| p.unique_id.as_str()))
    }
}

// =============================================================================
// Quotas
// =============================================================================

/// Service owning a set of quota keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum QuotaService {
    Compute,
    Volume,
    Network,
    Object,
}

impl QuotaService {
    /// All services, in push order
    pub const ALL: [QuotaService; 4] = [Self::Compute, Self::Volume, Self::Network, Self::Object];
}

// =============================================================================
// Network
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsNetwork {
    pub id: String,
    pub name: String,
    pub project_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkCreate {
    pub name: String,
    pub project_id: String,
    pub admin_state_up: bool,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsSubnet {
    pub id: String,
    pub name: String,
    pub network_id: String,
    pub project_id: String,
    pub cidr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubnetCreate {
    pub network_id: String,
    pub name: String,
    pub ip_version: u8,
    pub project_id: String,
    pub cidr: String,
    pub dns_nameservers: Vec<String>,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsRouter {
    pub id: String,
    pub name: String,
    pub project_id: String,
    pub external_network_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterCreate {
    pub name: String,
    pub project_id: String,
    pub external_network_id: Option<String>,
    pub admin_state_up: bool,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsPort {
    pub id: String,
    pub device_id: String,
    pub network_id: String,
}

/// Operations the OpenStack allocator needs from the cloud.
///
/// Absent entities are reported as `BackendError::NotFound`. A cloud
/// without object storage answers `NotFound` for the `Object` service.
#[async_trait]
pub trait OpenStackApi: Send + Sync {
    async fn create_project(&self, request: &ProjectCreate) -> BackendResult<OsProject>;
    async fn get_project(&self, id: &str) -> BackendResult<OsProject>;
    async fn update_project(&self, id: &str, enabled: bool) -> BackendResult<OsProject>;

    async fn find_role(&self, name: &str) -> BackendResult<OsRole>;
    async fn list_users(&self, query: &UserQuery) -> BackendResult<Vec<OsUser>>;
    async fn create_user(&self, payload: &FederatedUserPayload) -> BackendResult<OsUser>;
    async fn grant_role(&self, user_id: &str, project_id: &str, role_id: &str) -> BackendResult<()>;
    async fn revoke_role(&self, user_id: &str, project_id: &str, role_id: &str) -> BackendResult<()>;

    async fn update_quota(
        &self,
        service: QuotaService,
        project_id: &str,
        values: &BTreeMap<String, i64>,
    ) -> BackendResult<()>;
    async fn get_quota(&self, service: QuotaService, project_id: &str) -> BackendResult<BTreeMap<String, i64>>;

    async fn list_networks(&self, project_id: &str, name: &str) -> BackendResult<Vec<OsNetwork>>;
    async fn create_network(&self, request: &NetworkCreate) -> BackendResult<OsNetwork>;
    async fn list_subnets(&self, project_id: &str, name: &str) -> BackendResult<Vec<OsSubnet>>;
    async fn create_subnet(&self, request: &SubnetCreate) -> BackendResult<OsSubnet>;
    async fn list_routers(&self, project_id: &str, name: &str) -> BackendResult<Vec<OsRouter>>;
    async fn create_router(&self, request: &RouterCreate) -> BackendResult<OsRouter>;
    async fn list_ports(&self, project_id: &str, device_id: &str, network_id: &str) -> BackendResult<Vec<OsPort>>;
    async fn add_router_interface(&self, router_id: &str, subnet_id: &str) -> BackendResult<OsPort>;
}
