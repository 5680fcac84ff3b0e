//! In-memory OpenStack cloud (for testing and development)

use super::client::*;
use async_trait::async_trait;
use cloudgrant_common::{BackendError, BackendResult};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use uuid::Uuid;

struct CloudState {
    projects: HashMap<String, OsProject>,
    roles: HashMap<String, OsRole>,
    users: Vec<OsUser>,
    unique_ids: HashMap<String, String>,
    grants: HashSet<(String, String, String)>,
    quotas: HashMap<(QuotaService, String), BTreeMap<String, i64>>,
    object_storage: bool,
    networks: Vec<OsNetwork>,
    subnets: Vec<OsSubnet>,
    routers: Vec<OsRouter>,
    ports: Vec<OsPort>,
    project_creates: usize,
}

/// In-memory cloud with a `member` role
pub struct InMemoryOpenStack {
    state: Mutex<CloudState>,
    interleaved: bool,
}

fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn not_found(kind: &str, id: &str) -> BackendError {
    BackendError::NotFound(format!("{} {}", kind, id))
}

impl InMemoryOpenStack {
    /// Create cloud with object storage enabled
    pub fn new() -> Self {
        let mut roles = HashMap::new();
        for name in ["member", "reader", "admin"] {
            roles.insert(name.to_string(), OsRole { id: new_id(), name: name.to_string() });
        }
        Self {
            state: Mutex::new(CloudState {
                projects: HashMap::new(),
                roles,
                users: Vec::new(),
                unique_ids: HashMap::new(),
                grants: HashSet::new(),
                quotas: HashMap::new(),
                object_storage: true,
                networks: Vec::new(),
                subnets: Vec::new(),
                routers: Vec::new(),
                ports: Vec::new(),
                project_creates: 0,
            }),
            interleaved: false,
        }
    }

    /// Builder: every call yields to the scheduler before touching state
    pub fn interleaved(mut self) -> Self {
        self.interleaved = true;
        self
    }

    async fn pause(&self) {
        if self.interleaved {
            tokio::task::yield_now().await;
        }
    }

    /// Builder: cloud without object storage
    pub fn without_object_storage(self) -> Self {
        self.state.lock().object_storage = false;
        self
    }

    /// Add a local (non-federated) user
    pub fn add_local_user(&self, name: &str, domain_id: Option<&str>) -> OsUser {
        let user = OsUser {
            id: new_id(),
            name: name.to_string(),
            domain_id: domain_id.map(str::to_string),
        };
        self.state.lock().users.push(user.clone());
        user
    }

    /// Project by id
    pub fn project(&self, id: &str) -> Option<OsProject> {
        self.state.lock().projects.get(id).cloned()
    }

    /// Number of projects ever created
    pub fn project_create_count(&self) -> usize {
        self.state.lock().project_creates
    }

    /// Number of users
    pub fn user_count(&self) -> usize {
        self.state.lock().users.len()
    }

    /// Whether `username` holds `role` on the project
    pub fn has_role(&self, username: &str, project_id: &str, role: &str) -> bool {
        let state = self.state.lock();
        let Some(role) = state.roles.get(role) else {
            return false;
        };
        state
            .users
            .iter()
            .filter(|u| u.name == username)
            .any(|u| {
                state
                    .grants
                    .contains(&(u.id.clone(), project_id.to_string(), role.id.clone()))
            })
    }

    /// Number of role grants currently in place
    pub fn grant_count(&self) -> usize {
        self.state.lock().grants.len()
    }

    /// Quota values of a service
    pub fn quota(&self, service: QuotaService, project_id: &str) -> BTreeMap<String, i64> {
        self.state
            .lock()
            .quotas
            .get(&(service, project_id.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    /// Network, subnet, router and port counts of a project
    pub fn network_resource_counts(&self, project_id: &str) -> (usize, usize, usize, usize) {
        let state = self.state.lock();
        let routers: Vec<_> = state.routers.iter().filter(|r| r.project_id == project_id).collect();
        (
            state.networks.iter().filter(|n| n.project_id == project_id).count(),
            state.subnets.iter().filter(|s| s.project_id == project_id).count(),
            routers.len(),
            state
                .ports
                .iter()
                .filter(|p| routers.iter().any(|r| r.id == p.device_id))
                .count(),
        )
    }
}

impl Default for InMemoryOpenStack {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OpenStackApi for InMemoryOpenStack {
    async fn create_project(&self, request: &ProjectCreate) -> BackendResult<OsProject> {
        self.pause().await;
        let mut state = self.state.lock();
        if state
            .projects
            .values()
            .any(|p| p.name == request.name && p.domain_id == request.domain_id)
        {
            return Err(BackendError::Conflict(format!("project {} exists", request.name)));
        }
        let project = OsProject {
            id: new_id(),
            name: request.name.clone(),
            domain_id: request.domain_id.clone(),
            enabled: request.enabled,
        };
        state.projects.insert(project.id.clone(), project.clone());
        state.project_creates += 1;
        Ok(project)
    }

    async fn get_project(&self, id: &str) -> BackendResult<OsProject> {
        self.pause().await;
        self.project(id).ok_or_else(|| not_found("project", id))
    }

    async fn update_project(&self, id: &str, enabled: bool) -> BackendResult<OsProject> {
        self.pause().await;
        let mut state = self.state.lock();
        let project = state.projects.get_mut(id).ok_or_else(|| not_found("project", id))?;
        project.enabled = enabled;
        Ok(project.clone())
    }

    async fn find_role(&self, name: &str) -> BackendResult<OsRole> {
        self.pause().await;
        self.state
            .lock()
            .roles
            .get(name)
            .cloned()
            .ok_or_else(|| not_found("role", name))
    }

    async fn list_users(&self, query: &UserQuery) -> BackendResult<Vec<OsUser>> {
        self.pause().await;
        let state = self.state.lock();
        let users = match query {
            UserQuery::UniqueId(unique_id) => match state.unique_ids.get(unique_id) {
                Some(user_id) => state.users.iter().filter(|u| &u.id == user_id).cloned().collect(),
                None => Vec::new(),
            },
            UserQuery::Name { name, domain_id } => state
                .users
                .iter()
                .filter(|u| &u.name == name)
                .filter(|u| domain_id.is_none() || &u.domain_id == domain_id)
                .cloned()
                .collect(),
        };
        Ok(users)
    }

    async fn create_user(&self, payload: &FederatedUserPayload) -> BackendResult<OsUser> {
        self.pause().await;
        let mut state = self.state.lock();
        if let Some(taken) = payload.unique_ids().find(|id| state.unique_ids.contains_key(*id)) {
            return Err(BackendError::Conflict(format!("unique id {} mapped", taken)));
        }
        let user = OsUser {
            id: new_id(),
            name: payload.user.name.clone(),
            domain_id: payload.user.domain_id.clone(),
        };
        let unique_ids: Vec<String> = payload.unique_ids().map(str::to_string).collect();
        for unique_id in unique_ids {
            state.unique_ids.insert(unique_id, user.id.clone());
        }
        state.users.push(user.clone());
        Ok(user)
    }

    async fn grant_role(&self, user_id: &str, project_id: &str, role_id: &str) -> BackendResult<()> {
        self.pause().await;
        let mut state = self.state.lock();
        if !state.projects.contains_key(project_id) {
            return Err(not_found("project", project_id));
        }
        if !state.users.iter().any(|u| u.id == user_id) {
            return Err(not_found("user", user_id));
        }
        state
            .grants
            .insert((user_id.to_string(), project_id.to_string(), role_id.to_string()));
        Ok(())
    }

    async fn revoke_role(&self, user_id: &str, project_id: &str, role_id: &str) -> BackendResult<()> {
        self.pause().await;
        let removed = self
            .state
            .lock()
            .grants
            .remove(&(user_id.to_string(), project_id.to_string(), role_id.to_string()));
        if removed {
            Ok(())
        } else {
            Err(not_found("role assignment", role_id))
        }
    }

    async fn update_quota(
        &self,
        service: QuotaService,
        project_id: &str,
        values: &BTreeMap<String, i64>,
    ) -> BackendResult<()> {
        self.pause().await;
        let mut state = self.state.lock();
        if service == QuotaService::Object && !state.object_storage {
            return Err(not_found("service", "object-store"));
        }
        if !state.projects.contains_key(project_id) {
            return Err(not_found("project", project_id));
        }
        state
            .quotas
            .entry((service, project_id.to_string()))
            .or_default()
            .extend(values.iter().map(|(k, v)| (k.clone(), *v)));
        Ok(())
    }

    async fn get_quota(&self, service: QuotaService, project_id: &str) -> BackendResult<BTreeMap<String, i64>> {
        self.pause().await;
        let state = self.state.lock();
        if service == QuotaService::Object && !state.object_storage {
            return Err(not_found("service", "object-store"));
        }
        if !state.projects.contains_key(project_id) {
            return Err(not_found("project", project_id));
        }
        Ok(state
            .quotas
            .get(&(service, project_id.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn list_networks(&self, project_id: &str, name: &str) -> BackendResult<Vec<OsNetwork>> {
        self.pause().await;
        Ok(self
            .state
            .lock()
            .networks
            .iter()
            .filter(|n| n.project_id == project_id && n.name == name)
            .cloned()
            .collect())
    }

    async fn create_network(&self, request: &NetworkCreate) -> BackendResult<OsNetwork> {
        self.pause().await;
        let network = OsNetwork {
            id: new_id(),
            name: request.name.clone(),
            project_id: request.project_id.clone(),
        };
        self.state.lock().networks.push(network.clone());
        Ok(network)
    }

    async fn list_subnets(&self, project_id: &str, name: &str) -> BackendResult<Vec<OsSubnet>> {
        self.pause().await;
        Ok(self
            .state
            .lock()
            .subnets
            .iter()
            .filter(|s| s.project_id == project_id && s.name == name)
            .cloned()
            .collect())
    }

    async fn create_subnet(&self, request: &SubnetCreate) -> BackendResult<OsSubnet> {
        self.pause().await;
        let mut state = self.state.lock();
        if !state.networks.iter().any(|n| n.id == request.network_id) {
            return Err(not_found("network", &request.network_id));
        }
        let subnet = OsSubnet {
            id: new_id(),
            name: request.name.clone(),
            network_id: request.network_id.clone(),
            project_id: request.project_id.clone(),
            cidr: request.cidr.clone(),
        };
        state.subnets.push(subnet.clone());
        Ok(subnet)
    }

    async fn list_routers(&self, project_id: &str, name: &str) -> BackendResult<Vec<OsRouter>> {
        self.pause().await;
        Ok(self
            .state
            .lock()
            .routers
            .iter()
            .filter(|r| r.project_id == project_id && r.name == name)
            .cloned()
            .collect())
    }

    async fn create_router(&self, request: &RouterCreate) -> BackendResult<OsRouter> {
        self.pause().await;
        let router = OsRouter {
            id: new_id(),
            name: request.name.clone(),
            project_id: request.project_id.clone(),
            external_network_id: request.external_network_id.clone(),
        };
        self.state.lock().routers.push(router.clone());
        Ok(router)
    }

    async fn list_ports(&self, _project_id: &str, device_id: &str, network_id: &str) -> BackendResult<Vec<OsPort>> {
        self.pause().await;
        Ok(self
            .state
            .lock()
            .ports
            .iter()
            .filter(|p| p.device_id == device_id && p.network_id == network_id)
            .cloned()
            .collect())
    }

    async fn add_router_interface(&self, router_id: &str, subnet_id: &str) -> BackendResult<OsPort> {
        self.pause().await;
        let mut state = self.state.lock();
        if !state.routers.iter().any(|r| r.id == router_id) {
            return Err(not_found("router", router_id));
        }
        let network_id = state
            .subnets
            .iter()
            .find(|s| s.id == subnet_id)
            .map(|s| s.network_id.clone())
            .ok_or_else(|| not_found("subnet", subnet_id))?;
        let port = OsPort {
            id: new_id(),
            device_id: router_id.to_string(),
            network_id,
        };
        state.ports.push(port.clone());
        Ok(port)
    }
}
