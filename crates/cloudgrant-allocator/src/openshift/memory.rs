//! In-memory OpenShift cluster (for testing and development)

use super::client::{OcProject, OcUser, OpenShiftApi};
use async_trait::async_trait;
use cloudgrant_common::{BackendError, BackendResult};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Default)]
struct ClusterState {
    projects: HashMap<String, OcProject>,
    users: HashMap<String, OcUser>,
    bindings: HashSet<(String, String, String)>,
    quotas: HashMap<String, BTreeMap<String, String>>,
    project_creates: usize,
    role_adds: usize,
}

/// In-memory cluster
#[derive(Default)]
pub struct InMemoryOpenShift {
    state: Mutex<ClusterState>,
    interleaved: bool,
}

impl InMemoryOpenShift {
    /// Create empty cluster
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: every call yields to the scheduler before touching state,
    /// so concurrent callers interleave as they would against a real cluster
    pub fn interleaved(mut self) -> Self {
        self.interleaved = true;
        self
    }

    async fn pause(&self) {
        if self.interleaved {
            tokio::task::yield_now().await;
        }
    }

    /// Whether the project exists
    pub fn has_project(&self, id: &str) -> bool {
        self.state.lock().projects.contains_key(id)
    }

    /// Whether the user exists
    pub fn has_user(&self, name: &str) -> bool {
        self.state.lock().users.contains_key(name)
    }

    /// Whether the role is bound
    pub fn has_role(&self, user: &str, project_id: &str, role: &str) -> bool {
        self.state
            .lock()
            .bindings
            .contains(&(user.to_string(), project_id.to_string(), role.to_string()))
    }

    /// Current quota of a project
    pub fn quota(&self, project_id: &str) -> BTreeMap<String, String> {
        self.state.lock().quotas.get(project_id).cloned().unwrap_or_default()
    }

    /// Number of projects ever created
    pub fn project_create_count(&self) -> usize {
        self.state.lock().project_creates
    }

    /// Number of role bindings ever added
    pub fn role_add_count(&self) -> usize {
        self.state.lock().role_adds
    }
}

#[async_trait]
impl OpenShiftApi for InMemoryOpenShift {
    async fn create_project(&self, id: &str, display_name: &str, requester: &str) -> BackendResult<OcProject> {
        self.pause().await;
        let mut state = self.state.lock();
        if state.projects.contains_key(id) {
            return Err(BackendError::Conflict(format!("project {} exists", id)));
        }
        let project = OcProject {
            id: id.to_string(),
            display_name: display_name.to_string(),
            requester: requester.to_string(),
        };
        state.projects.insert(id.to_string(), project.clone());
        state.project_creates += 1;
        Ok(project)
    }

    async fn get_project(&self, id: &str) -> BackendResult<OcProject> {
        self.pause().await;
        self.state
            .lock()
            .projects
            .get(id)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(format!("project {}", id)))
    }

    async fn delete_project(&self, id: &str) -> BackendResult<()> {
        self.pause().await;
        let mut state = self.state.lock();
        state
            .projects
            .remove(id)
            .ok_or_else(|| BackendError::NotFound(format!("project {}", id)))?;
        state.bindings.retain(|(_, project, _)| project != id);
        state.quotas.remove(id);
        Ok(())
    }

    async fn get_user(&self, name: &str) -> BackendResult<OcUser> {
        self.pause().await;
        self.state
            .lock()
            .users
            .get(name)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(format!("user {}", name)))
    }

    async fn create_user(&self, name: &str) -> BackendResult<OcUser> {
        self.pause().await;
        let mut state = self.state.lock();
        if state.users.contains_key(name) {
            return Err(BackendError::Conflict(format!("user {} exists", name)));
        }
        let user = OcUser { name: name.to_string() };
        state.users.insert(name.to_string(), user.clone());
        Ok(user)
    }

    async fn get_role_binding(&self, user: &str, project_id: &str, role: &str) -> BackendResult<()> {
        self.pause().await;
        if self.has_role(user, project_id, role) {
            Ok(())
        } else {
            Err(BackendError::NotFound(format!("{} on {} for {}", role, project_id, user)))
        }
    }

    async fn add_role(&self, user: &str, project_id: &str, role: &str) -> BackendResult<()> {
        self.pause().await;
        let mut state = self.state.lock();
        if !state.projects.contains_key(project_id) {
            return Err(BackendError::NotFound(format!("project {}", project_id)));
        }
        if !state.users.contains_key(user) {
            return Err(BackendError::NotFound(format!("user {}", user)));
        }
        if state
            .bindings
            .insert((user.to_string(), project_id.to_string(), role.to_string()))
        {
            state.role_adds += 1;
        }
        Ok(())
    }

    async fn remove_role(&self, user: &str, project_id: &str, role: &str) -> BackendResult<()> {
        self.pause().await;
        let removed = self
            .state
            .lock()
            .bindings
            .remove(&(user.to_string(), project_id.to_string(), role.to_string()));
        if removed {
            Ok(())
        } else {
            Err(BackendError::NotFound(format!("{} on {} for {}", role, project_id, user)))
        }
    }

    async fn set_quota(&self, project_id: &str, quota: &BTreeMap<String, String>) -> BackendResult<()> {
        self.pause().await;
        let mut state = self.state.lock();
        if !state.projects.contains_key(project_id) {
            return Err(BackendError::NotFound(format!("project {}", project_id)));
        }
        state.quotas.insert(project_id.to_string(), quota.clone());
        Ok(())
    }

    async fn get_quota(&self, project_id: &str) -> BackendResult<BTreeMap<String, String>> {
        self.pause().await;
        let state = self.state.lock();
        if !state.projects.contains_key(project_id) {
            return Err(BackendError::NotFound(format!("project {}", project_id)));
        }
        Ok(state.quotas.get(project_id).cloned().unwrap_or_default())
    }
}
