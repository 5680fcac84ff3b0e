//! OpenShift Allocator
//!
//! Projects are namespaces whose name is the generated project name reduced
//! to a DNS label. Disabling deletes the namespace; the cluster finishes the
//! deletion in the background, so a disabled project may linger briefly.

mod client;
mod memory;

pub use client::{OcProject, OcUser, OpenShiftApi};
pub use memory::InMemoryOpenShift;

use crate::allocator::{FederatedUser, QuotaSnapshot, ResourceAllocator};
use crate::backend::Backend;
use crate::registry::AllocatorContext;
use crate::{AllocatorError, Result};
use async_trait::async_trait;
use cloudgrant_common::attributes::ALLOCATION_PROJECT_NAME;
use cloudgrant_common::{
    Allocation, AllocationAttributes, BackendError, NotFoundExt, QuotaDimension, Resource,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Kubernetes object names are DNS labels
pub const PROJECT_NAME_MAX_LENGTH: usize = 63;

static INVALID_LABEL_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new("[^a-z0-9-]+").expect("valid label pattern"));

/// Dimension, quota key, unit suffix
const QUOTA_KEYS: &[(QuotaDimension, &str, &str)] = &[
    (QuotaDimension::LimitsCpu, "limits.cpu", ""),
    (QuotaDimension::LimitsMemory, "limits.memory", "Mi"),
    (QuotaDimension::LimitsEphemeralStorageGb, "limits.ephemeral-storage", "Gi"),
];

const QUOTA_DIMENSIONS: &[QuotaDimension] = &[
    QuotaDimension::LimitsCpu,
    QuotaDimension::LimitsMemory,
    QuotaDimension::LimitsEphemeralStorageGb,
];

/// OpenShift settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenShiftSettings {
    /// Cluster role bound to project members
    pub member_role: String,
}

impl Default for OpenShiftSettings {
    fn default() -> Self {
        Self {
            member_role: "edit".into(),
        }
    }
}

/// Reduce a name to a DNS label: lowercase alphanumerics and `-`
pub fn to_dns_label(name: &str) -> Result<String> {
    let lowered = name.to_lowercase();
    let label = INVALID_LABEL_CHARS.replace_all(&lowered, "-");
    let label = label.trim_matches('-');
    if label.is_empty() {
        return Err(AllocatorError::InvalidName(name.to_string()));
    }
    Ok(label.chars().take(PROJECT_NAME_MAX_LENGTH).collect())
}

/// Parse a resource quantity such as `4`, `4096Mi`, `10Gi` or `500m`
fn parse_quantity(value: &str, unit: &str) -> Option<i64> {
    let value = value.trim();
    if let Some(millis) = value.strip_suffix('m') {
        return millis.parse::<i64>().ok().map(|m| m / 1000);
    }
    value.strip_suffix(unit).unwrap_or(value).parse().ok()
}

/// Allocator for an OpenShift cluster
pub struct OpenShiftAllocator {
    resource: Resource,
    allocation: Allocation,
    attributes: AllocationAttributes,
    api: Arc<dyn OpenShiftApi>,
    settings: OpenShiftSettings,
}

impl OpenShiftAllocator {
    /// Bind allocator to an allocation
    pub fn new(ctx: AllocatorContext, api: Arc<dyn OpenShiftApi>, settings: OpenShiftSettings) -> Self {
        Self {
            resource: ctx.resource,
            allocation: ctx.allocation,
            attributes: ctx.attributes,
            api,
            settings,
        }
    }

    async fn ensure_project(&self, id: &str, display_name: &str) -> Result<()> {
        let requester = &self.allocation.project.pi.username;
        self.api.create_project(id, display_name, requester).await?;
        Ok(())
    }
}

#[async_trait]
impl ResourceAllocator for OpenShiftAllocator {
    fn backend(&self) -> Backend {
        Backend::OpenShift
    }

    fn project_name_max_length(&self) -> Option<usize> {
        Some(PROJECT_NAME_MAX_LENGTH)
    }

    fn quota_dimensions(&self) -> &'static [QuotaDimension] {
        QUOTA_DIMENSIONS
    }

    async fn create_project(&self, project_name: &str) -> Result<String> {
        let id = to_dns_label(project_name)?;
        self.ensure_project(&id, project_name).await?;
        info!("Created project {} on {}", id, self.resource.name);
        Ok(id)
    }

    async fn reactivate_project(&self, project_id: &str) -> Result<()> {
        match self.api.get_project(project_id).await {
            Ok(_) => {
                debug!("Project {} already active", project_id);
                Ok(())
            }
            Err(BackendError::NotFound(_)) => {
                let display_name = self
                    .attributes
                    .get_text(ALLOCATION_PROJECT_NAME)
                    .await?
                    .unwrap_or_else(|| project_id.to_string());
                self.ensure_project(project_id, &display_name).await?;
                info!("Recreated project {} on {}", project_id, self.resource.name);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn disable_project(&self, project_id: &str) -> Result<()> {
        if self.api.delete_project(project_id).await.ok_if_not_found()?.is_none() {
            debug!("Project {} already gone", project_id);
        } else {
            info!("Deleted project {} on {}", project_id, self.resource.name);
        }
        Ok(())
    }

    async fn create_project_defaults(&self, project_id: &str) -> Result<()> {
        debug!("No project defaults for OpenShift project {}", project_id);
        Ok(())
    }

    async fn get_or_create_federated_user(&self, username: &str) -> Result<FederatedUser> {
        let user = match self.api.get_user(username).await {
            Ok(user) => user,
            Err(BackendError::NotFound(_)) => {
                info!("Creating user {} on {}", username, self.resource.name);
                match self.api.create_user(username).await {
                    Ok(user) => user,
                    // Created concurrently since the lookup
                    Err(BackendError::Conflict(_)) => {
                        debug!("User {} created concurrently, looking it up again", username);
                        self.api.get_user(username).await?
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            Err(e) => return Err(e.into()),
        };
        Ok(FederatedUser {
            id: user.name.clone(),
            username: user.name,
        })
    }

    async fn assign_role_on_user(&self, username: &str, project_id: &str) -> Result<()> {
        let role = &self.settings.member_role;
        if self
            .api
            .get_role_binding(username, project_id, role)
            .await
            .ok_if_not_found()?
            .is_some()
        {
            debug!("{} already has {} on {}", username, role, project_id);
            return Ok(());
        }
        self.api.add_role(username, project_id, role).await?;
        info!("Granted {} on {} to {}", role, project_id, username);
        Ok(())
    }

    async fn remove_role_from_user(&self, username: &str, project_id: &str) -> Result<()> {
        let role = &self.settings.member_role;
        if self
            .api
            .remove_role(username, project_id, role)
            .await
            .ok_if_not_found()?
            .is_some()
        {
            info!("Revoked {} on {} from {}", role, project_id, username);
        }
        Ok(())
    }

    async fn set_quota(&self, project_id: &str) -> Result<()> {
        let mut quota = BTreeMap::new();
        for (dim, key, unit) in QUOTA_KEYS {
            if let Some(value) = self.attributes.get_int(dim.attribute_name()).await? {
                quota.insert(key.to_string(), format!("{}{}", value, unit));
            }
        }
        self.api.set_quota(project_id, &quota).await?;
        debug!("Set quota {:?} on {}", quota, project_id);
        Ok(())
    }

    async fn get_quota(&self, project_id: &str) -> Result<QuotaSnapshot> {
        let quota = self.api.get_quota(project_id).await?;
        Ok(QUOTA_KEYS
            .iter()
            .filter_map(|(dim, key, unit)| {
                let value = quota.get(*key)?;
                parse_quantity(value, unit).map(|v| (*dim, v))
            })
            .collect())
    }

    async fn project_exists(&self, project_id: &str) -> Result<bool> {
        Ok(self.api.get_project(project_id).await.ok_if_not_found()?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloudgrant_common::{AllocationStatus, InMemoryAllocationStore, Project, User};
    use tokio_test::assert_ok;

    struct Fixture {
        store: Arc<InMemoryAllocationStore>,
        cluster: Arc<InMemoryOpenShift>,
        allocator: OpenShiftAllocator,
    }

    fn allocator_on(store: &Arc<InMemoryAllocationStore>, cluster: &Arc<InMemoryOpenShift>) -> OpenShiftAllocator {
        let resource = Resource::new(1, "ocp", "OpenShift");
        let allocation = Allocation {
            id: 1,
            quantity: 2,
            resources: vec![resource.clone()],
            project: Project { id: 1, title: "Lab".into(), pi: User::new("pi") },
            status: AllocationStatus::New,
        };
        store.insert_allocation(allocation.clone());
        OpenShiftAllocator::new(
            AllocatorContext {
                resource,
                allocation,
                attributes: AllocationAttributes::new(store.clone(), 1),
            },
            cluster.clone(),
            OpenShiftSettings::default(),
        )
    }

    fn fixture_with(cluster: InMemoryOpenShift) -> Fixture {
        let store = Arc::new(InMemoryAllocationStore::new());
        let cluster = Arc::new(cluster);
        let allocator = allocator_on(&store, &cluster);
        Fixture { store, cluster, allocator }
    }

    fn fixture() -> Fixture {
        fixture_with(InMemoryOpenShift::new())
    }

    #[test]
    fn test_dns_label() {
        assert_eq!(to_dns_label("My Lab_2024-fa1b2c3").unwrap(), "my-lab-2024-fa1b2c3");
        assert_eq!(to_dns_label("--Über--f00aa11").unwrap(), "ber--f00aa11");
        assert!(to_dns_label("___").is_err());
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("4096Mi", "Mi"), Some(4096));
        assert_eq!(parse_quantity("10Gi", "Gi"), Some(10));
        assert_eq!(parse_quantity("4", ""), Some(4));
        assert_eq!(parse_quantity("2000m", ""), Some(2));
        assert_eq!(parse_quantity("lots", ""), None);
    }

    #[tokio::test]
    async fn test_project_lifecycle() {
        let f = fixture();
        let id = assert_ok!(f.allocator.create_project("Lab Project-fabc123").await);
        assert_eq!(id, "lab-project-fabc123");
        assert!(f.cluster.has_project(&id));

        assert_ok!(f.allocator.disable_project(&id).await);
        assert!(!f.cluster.has_project(&id));
        // Second disable absorbs NotFound
        assert_ok!(f.allocator.disable_project(&id).await);

        assert_ok!(f.allocator.reactivate_project(&id).await);
        assert!(f.cluster.has_project(&id));
        assert_eq!(f.cluster.project_create_count(), 2);

        // Active project: no-op
        assert_ok!(f.allocator.reactivate_project(&id).await);
        assert_eq!(f.cluster.project_create_count(), 2);
    }

    #[tokio::test]
    async fn test_generated_name_keeps_full_suffix() {
        let f = fixture();
        let name = crate::naming::unique_project_name(&"Lab ".repeat(40), Some(PROJECT_NAME_MAX_LENGTH));
        assert_eq!(name.chars().count(), PROJECT_NAME_MAX_LENGTH);

        let id = assert_ok!(f.allocator.create_project(&name).await);
        let suffix = &name[name.len() - crate::naming::SUFFIX_WIDTH..];
        assert!(id.ends_with(suffix), "{} lost part of {}", id, suffix);
        assert_eq!(id, to_dns_label(&name).unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_user_creation() {
        let f = fixture_with(InMemoryOpenShift::new().interleaved());
        let other = allocator_on(&f.store, &f.cluster);

        let (a, b) = tokio::join!(
            f.allocator.get_or_create_federated_user("pi"),
            other.get_or_create_federated_user("pi"),
        );

        assert_eq!(assert_ok!(a).id, "pi");
        assert_eq!(assert_ok!(b).id, "pi");
        assert!(f.cluster.has_user("pi"));
    }

    #[tokio::test]
    async fn test_roles_idempotent() {
        let f = fixture();
        let id = f.allocator.create_project("lab-f000001").await.unwrap();

        assert_ok!(f.allocator.get_or_create_federated_user("alice").await);
        assert_ok!(f.allocator.get_or_create_federated_user("alice").await);
        assert_ok!(f.allocator.assign_role_on_user("alice", &id).await);
        assert_ok!(f.allocator.assign_role_on_user("alice", &id).await);
        assert_eq!(f.cluster.role_add_count(), 1);
        assert!(f.cluster.has_role("alice", &id, "edit"));

        assert_ok!(f.allocator.remove_role_from_user("alice", &id).await);
        assert_ok!(f.allocator.remove_role_from_user("alice", &id).await);
        assert!(!f.cluster.has_role("alice", &id, "edit"));
        // Identity survives role removal
        assert!(f.cluster.has_user("alice"));
    }

    #[tokio::test]
    async fn test_quota_round_trip() {
        let f = fixture();
        let id = f.allocator.create_project("lab-f000002").await.unwrap();
        let attrs = AllocationAttributes::new(f.store.clone(), 1);
        attrs.set(QuotaDimension::LimitsCpu.attribute_name(), 4).await.unwrap();
        attrs.set(QuotaDimension::LimitsMemory.attribute_name(), 4096).await.unwrap();

        assert_ok!(f.allocator.set_quota(&id).await);

        let pushed = f.cluster.quota(&id);
        assert_eq!(pushed["limits.cpu"], "4");
        assert_eq!(pushed["limits.memory"], "4096Mi");
        assert!(!pushed.contains_key("limits.ephemeral-storage"));

        let snapshot = assert_ok!(f.allocator.get_quota(&id).await);
        assert_eq!(snapshot[&QuotaDimension::LimitsMemory], 4096);
        assert_eq!(snapshot.get(&QuotaDimension::LimitsEphemeralStorageGb), None);
    }
}
