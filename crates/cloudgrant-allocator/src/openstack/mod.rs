//! OpenStack Allocator
//!
//! Projects live in the resource's project domain. Users are federated: a
//! user record carries a mapping from the identity provider's unique id to
//! the local account, so the first login lands in the pre-provisioned
//! project.
//!
//! Quota attributes fan out over four services:
//!
//! ```text
//! compute  instances, cores, ram
//! volume   volumes, gigabytes
//! network  floatingip
//! object   x-account-meta-quota-bytes   (GB on the allocation, bytes here)
//! ```
//!
//! The GPU attribute is bookkeeping only and never pushed.

mod client;
mod memory;
mod network;

pub use client::*;
pub use memory::InMemoryOpenStack;

use crate::allocator::{FederatedUser, QuotaSnapshot, ResourceAllocator};
use crate::backend::Backend;
use crate::registry::AllocatorContext;
use crate::{AllocatorError, Result};
use async_trait::async_trait;
use cloudgrant_common::attributes::{
    RESOURCE_DEFAULT_PUBLIC_NETWORK, RESOURCE_FEDERATION_PROTOCOL, RESOURCE_IDP,
    RESOURCE_PROJECT_DOMAIN, RESOURCE_USER_DOMAIN,
};
use cloudgrant_common::{AllocationAttributes, BackendError, NotFoundExt, QuotaDimension, Resource};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Identity service limit on project names
pub const PROJECT_NAME_MAX_LENGTH: usize = 64;

/// 1 GB = 10^9 B
pub const GB_IN_BYTES: i64 = 1_000_000_000;

const OBJECT_QUOTA_KEY: &str = "x-account-meta-quota-bytes";

/// Federated unique id of a username: its form encoding, as the identity
/// provider maps it (`jane doe@x` becomes `jane+doe%40x`)
pub fn federated_unique_id(username: &str) -> String {
    urlencoding::encode(username).replace("%20", "+")
}

/// Service, dimension, quota key
const QUOTA_KEYS: &[(QuotaService, QuotaDimension, &str)] = &[
    (QuotaService::Compute, QuotaDimension::Instances, "instances"),
    (QuotaService::Compute, QuotaDimension::Vcpu, "cores"),
    (QuotaService::Compute, QuotaDimension::Ram, "ram"),
    (QuotaService::Volume, QuotaDimension::Volumes, "volumes"),
    (QuotaService::Volume, QuotaDimension::VolumesGb, "gigabytes"),
    (QuotaService::Network, QuotaDimension::FloatingIps, "floatingip"),
    (QuotaService::Object, QuotaDimension::ObjectGb, OBJECT_QUOTA_KEY),
];

const QUOTA_DIMENSIONS: &[QuotaDimension] = &[
    QuotaDimension::Instances,
    QuotaDimension::Vcpu,
    QuotaDimension::Ram,
    QuotaDimension::Volumes,
    QuotaDimension::VolumesGb,
    QuotaDimension::FloatingIps,
    QuotaDimension::ObjectGb,
];

/// OpenStack settings, overridable per resource where noted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenStackSettings {
    /// Role granted to project members
    pub member_role: String,
    /// Federation protocol when the resource sets none
    pub federation_protocol: String,
    /// Default subnet CIDR when the resource sets none
    pub default_network_cidr: String,
    /// Nameservers of the default subnet
    pub dns_nameservers: Vec<String>,
}

impl Default for OpenStackSettings {
    fn default() -> Self {
        Self {
            member_role: "member".into(),
            federation_protocol: "openid".into(),
            default_network_cidr: "192.168.0.0/24".into(),
            dns_nameservers: vec!["8.8.8.8".into(), "8.8.4.4".into()],
        }
    }
}

/// Allocator for an OpenStack cloud
pub struct OpenStackAllocator {
    resource: Resource,
    attributes: AllocationAttributes,
    api: Arc<dyn OpenStackApi>,
    settings: OpenStackSettings,
}

impl OpenStackAllocator {
    /// Bind allocator to an allocation
    pub fn new(ctx: AllocatorContext, api: Arc<dyn OpenStackApi>, settings: OpenStackSettings) -> Self {
        Self {
            resource: ctx.resource,
            attributes: ctx.attributes,
            api,
            settings,
        }
    }

    fn setting(&self, name: &str) -> Option<String> {
        self.resource.get_attribute(name).map(str::to_string)
    }

    /// Creation payload mapping `username` to the resource's identity provider
    pub fn federated_user_payload(&self, username: &str) -> Result<FederatedUserPayload> {
        let idp_id = self.setting(RESOURCE_IDP).ok_or_else(|| AllocatorError::MissingSetting {
            resource: self.resource.name.clone(),
            setting: RESOURCE_IDP,
        })?;
        let protocol_id = self
            .setting(RESOURCE_FEDERATION_PROTOCOL)
            .unwrap_or_else(|| self.settings.federation_protocol.clone());

        Ok(FederatedUserPayload {
            user: FederatedUserSpec {
                domain_id: self.setting(RESOURCE_USER_DOMAIN),
                enabled: true,
                name: username.to_string(),
                email: username.to_string(),
                federated: vec![FederationEntry {
                    idp_id,
                    protocols: vec![FederationProtocol {
                        protocol_id,
                        unique_id: federated_unique_id(username),
                    }],
                }],
            },
        })
    }

    /// Look a user up by federated unique id, then by name in the user
    /// domain. The name fallback may return a non-federated user.
    pub async fn find_federated_user(&self, username: &str) -> Result<Option<OsUser>> {
        let unique_id = federated_unique_id(username);
        let by_unique_id = self.api.list_users(&UserQuery::UniqueId(unique_id)).await?;
        if let Some(user) = by_unique_id.into_iter().next() {
            return Ok(Some(user));
        }

        let by_name = self
            .api
            .list_users(&UserQuery::Name {
                name: username.to_string(),
                domain_id: self.setting(RESOURCE_USER_DOMAIN),
            })
            .await?;
        Ok(by_name.into_iter().next())
    }
}

#[async_trait]
impl ResourceAllocator for OpenStackAllocator {
    fn backend(&self) -> Backend {
        Backend::OpenStack
    }

    fn project_name_max_length(&self) -> Option<usize> {
        Some(PROJECT_NAME_MAX_LENGTH)
    }

    fn quota_dimensions(&self) -> &'static [QuotaDimension] {
        QUOTA_DIMENSIONS
    }

    async fn create_project(&self, project_name: &str) -> Result<String> {
        let project = self
            .api
            .create_project(&ProjectCreate {
                name: project_name.to_string(),
                domain_id: self.setting(RESOURCE_PROJECT_DOMAIN),
                enabled: true,
            })
            .await?;
        info!("Created project {} ({}) on {}", project.name, project.id, self.resource.name);
        Ok(project.id)
    }

    async fn reactivate_project(&self, project_id: &str) -> Result<()> {
        let project = self.api.get_project(project_id).await?;
        if project.enabled {
            debug!("Project {} already enabled", project_id);
            return Ok(());
        }
        self.api.update_project(project_id, true).await?;
        info!("Re-enabled project {}", project_id);
        Ok(())
    }

    async fn disable_project(&self, project_id: &str) -> Result<()> {
        if self
            .api
            .update_project(project_id, false)
            .await
            .ok_if_not_found()?
            .is_none()
        {
            debug!("Project {} does not exist, nothing to disable", project_id);
        } else {
            info!("Disabled project {}", project_id);
        }
        Ok(())
    }

    async fn create_project_defaults(&self, project_id: &str) -> Result<()> {
        match self.setting(RESOURCE_DEFAULT_PUBLIC_NETWORK) {
            Some(public_network) => {
                info!("Creating default network for project {}", project_id);
                self.create_default_network(project_id, &public_network).await
            }
            None => {
                info!(
                    "No public network configured. Skipping default network creation for project {}",
                    project_id
                );
                Ok(())
            }
        }
    }

    async fn get_or_create_federated_user(&self, username: &str) -> Result<FederatedUser> {
        let user = match self.find_federated_user(username).await? {
            Some(user) => user,
            None => {
                let payload = self.federated_user_payload(username)?;
                match self.api.create_user(&payload).await {
                    Ok(user) => {
                        info!("Created federated user {} ({})", username, user.id);
                        user
                    }
                    // Created concurrently since the lookup
                    Err(BackendError::Conflict(reason)) => {
                        debug!("User {} created concurrently, looking it up again", username);
                        self.find_federated_user(username)
                            .await?
                            .ok_or(BackendError::Conflict(reason))?
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        };
        Ok(FederatedUser {
            id: user.id,
            username: username.to_string(),
        })
    }

    async fn assign_role_on_user(&self, username: &str, project_id: &str) -> Result<()> {
        let role = self.api.find_role(&self.settings.member_role).await?;
        let user = self
            .find_federated_user(username)
            .await?
            .ok_or_else(|| BackendError::NotFound(format!("user {}", username)))?;

        self.api.grant_role(&user.id, project_id, &role.id).await?;
        info!("Granted {} on {} to {}", role.name, project_id, username);
        Ok(())
    }

    async fn remove_role_from_user(&self, username: &str, project_id: &str) -> Result<()> {
        let role = self.api.find_role(&self.settings.member_role).await?;
        let Some(user) = self.find_federated_user(username).await? else {
            debug!("User {} does not exist, no role to remove", username);
            return Ok(());
        };

        if self
            .api
            .revoke_role(&user.id, project_id, &role.id)
            .await
            .ok_if_not_found()?
            .is_some()
        {
            info!("Revoked {} on {} from {}", role.name, project_id, username);
        }
        Ok(())
    }

    async fn set_quota(&self, project_id: &str) -> Result<()> {
        for service in QuotaService::ALL {
            let mut payload = BTreeMap::new();
            for (_, dim, key) in QUOTA_KEYS.iter().filter(|(s, _, _)| *s == service) {
                if let Some(value) = self.attributes.get_int(dim.attribute_name()).await? {
                    let value = if service == QuotaService::Object {
                        value.saturating_mul(GB_IN_BYTES)
                    } else {
                        value
                    };
                    payload.insert(key.to_string(), value);
                }
            }
            if payload.is_empty() {
                continue;
            }

            match self.api.update_quota(service, project_id, &payload).await {
                Ok(()) => debug!("Set {:?} quota {:?} on {}", service, payload, project_id),
                Err(BackendError::NotFound(_)) if service == QuotaService::Object => {
                    debug!("No object storage available, skipping its quota");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    async fn get_quota(&self, project_id: &str) -> Result<QuotaSnapshot> {
        let mut snapshot = QuotaSnapshot::new();
        for service in QuotaService::ALL {
            let values = match self.api.get_quota(service, project_id).await {
                Ok(values) => values,
                Err(BackendError::NotFound(_)) if service == QuotaService::Object => {
                    debug!("No object storage available, skipping its quota");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            for (_, dim, key) in QUOTA_KEYS.iter().filter(|(s, _, _)| *s == service) {
                if let Some(value) = values.get(*key) {
                    let value = if service == QuotaService::Object {
                        value / GB_IN_BYTES
                    } else {
                        *value
                    };
                    snapshot.insert(*dim, value);
                }
            }
        }
        Ok(snapshot)
    }

    async fn project_exists(&self, project_id: &str) -> Result<bool> {
        Ok(self.api.get_project(project_id).await.ok_if_not_found()?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloudgrant_common::{
        Allocation, AllocationStatus, AllocationStore, InMemoryAllocationStore, Project, User,
    };
    use tokio_test::{assert_err, assert_ok};

    struct Fixture {
        store: Arc<InMemoryAllocationStore>,
        cloud: Arc<InMemoryOpenStack>,
        allocator: OpenStackAllocator,
    }

    fn resource() -> Resource {
        Resource::new(1, "Devstack", "OpenStack")
            .with_attribute(RESOURCE_PROJECT_DOMAIN, "default")
            .with_attribute(RESOURCE_USER_DOMAIN, "default")
            .with_attribute(RESOURCE_IDP, "sso")
    }

    fn fixture_with(resource: Resource, cloud: InMemoryOpenStack) -> Fixture {
        let store = Arc::new(InMemoryAllocationStore::new());
        let allocation = Allocation {
            id: 1,
            quantity: 1,
            resources: vec![resource.clone()],
            project: Project { id: 1, title: "Lab".into(), pi: User::new("pi@example.org") },
            status: AllocationStatus::New,
        };
        store.insert_allocation(allocation.clone());
        let cloud = Arc::new(cloud);
        let allocator = OpenStackAllocator::new(
            AllocatorContext {
                resource,
                allocation,
                attributes: AllocationAttributes::new(store.clone(), 1),
            },
            cloud.clone(),
            OpenStackSettings::default(),
        );
        Fixture { store, cloud, allocator }
    }

    fn fixture() -> Fixture {
        fixture_with(resource(), InMemoryOpenStack::new())
    }

    #[tokio::test]
    async fn test_disable_and_reactivate() {
        let f = fixture();
        let id = assert_ok!(f.allocator.create_project("lab-fabc123").await);
        assert_eq!(f.cloud.project(&id).unwrap().domain_id.as_deref(), Some("default"));

        assert_ok!(f.allocator.disable_project(&id).await);
        assert!(!f.cloud.project(&id).unwrap().enabled);

        assert_ok!(f.allocator.reactivate_project(&id).await);
        assert_ok!(f.allocator.reactivate_project(&id).await);
        assert!(f.cloud.project(&id).unwrap().enabled);
        assert_eq!(f.cloud.project_create_count(), 1);
    }

    #[tokio::test]
    async fn test_reactivate_missing_project_propagates() {
        let f = fixture();
        let err = assert_err!(f.allocator.reactivate_project("gone").await);
        assert!(err.is_not_found());
        // Disabling a missing project is already satisfied
        assert_ok!(f.allocator.disable_project("gone").await);
    }

    #[test]
    fn test_federated_payload() {
        let f = fixture();
        let payload = f.allocator.federated_user_payload("jane doe@example.org").unwrap();
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["user"]["name"], "jane doe@example.org");
        assert_eq!(json["user"]["email"], "jane doe@example.org");
        assert_eq!(json["user"]["domain_id"], "default");
        assert_eq!(json["user"]["federated"][0]["idp_id"], "sso");
        assert_eq!(json["user"]["federated"][0]["protocols"][0]["protocol_id"], "openid");
        assert_eq!(
            json["user"]["federated"][0]["protocols"][0]["unique_id"],
            "jane+doe%40example.org"
        );
    }

    #[test]
    fn test_payload_requires_identity_provider() {
        let resource = Resource::new(1, "Devstack", "OpenStack");
        let f = fixture_with(resource, InMemoryOpenStack::new());
        assert!(matches!(
            f.allocator.federated_user_payload("jane"),
            Err(AllocatorError::MissingSetting { setting: RESOURCE_IDP, .. })
        ));
    }

    #[tokio::test]
    async fn test_federated_user_idempotent() {
        let f = fixture();
        let first = assert_ok!(f.allocator.get_or_create_federated_user("jane").await);
        let second = assert_ok!(f.allocator.get_or_create_federated_user("jane").await);
        assert_eq!(first, second);
        assert_eq!(f.cloud.user_count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_user_creation() {
        let f = fixture_with(resource(), InMemoryOpenStack::new().interleaved());
        let other = OpenStackAllocator::new(
            AllocatorContext {
                resource: resource(),
                allocation: f.store.allocation(1).await.unwrap(),
                attributes: AllocationAttributes::new(f.store.clone(), 1),
            },
            f.cloud.clone(),
            OpenStackSettings::default(),
        );

        let (first, second) = tokio::join!(
            f.allocator.get_or_create_federated_user("jane"),
            other.get_or_create_federated_user("jane"),
        );
        let (first, second) = (assert_ok!(first), assert_ok!(second));
        assert_eq!(first.id, second.id);
        assert_eq!(f.cloud.user_count(), 1);
    }

    #[tokio::test]
    async fn test_name_fallback_finds_local_user() {
        let f = fixture();
        let local = f.cloud.add_local_user("admin-jane", Some("default"));
        let user = assert_ok!(f.allocator.get_or_create_federated_user("admin-jane").await);
        assert_eq!(user.id, local.id);
        assert_eq!(f.cloud.user_count(), 1);
    }

    #[tokio::test]
    async fn test_roles() {
        let f = fixture();
        let id = f.allocator.create_project("lab-f000001").await.unwrap();

        // Granting to an unknown user is a lookup failure
        let err = assert_err!(f.allocator.assign_role_on_user("jane", &id).await);
        assert!(err.is_not_found());

        f.allocator.get_or_create_federated_user("jane").await.unwrap();
        assert_ok!(f.allocator.assign_role_on_user("jane", &id).await);
        assert_ok!(f.allocator.assign_role_on_user("jane", &id).await);
        assert!(f.cloud.has_role("jane", &id, "member"));
        assert_eq!(f.cloud.grant_count(), 1);

        assert_ok!(f.allocator.remove_role_from_user("jane", &id).await);
        assert_ok!(f.allocator.remove_role_from_user("jane", &id).await);
        assert_ok!(f.allocator.remove_role_from_user("nobody", &id).await);
        assert!(!f.cloud.has_role("jane", &id, "member"));
        assert_eq!(f.cloud.user_count(), 1);
    }

    #[tokio::test]
    async fn test_set_quota_by_service() {
        let f = fixture();
        let id = f.allocator.create_project("lab-f000002").await.unwrap();
        let attrs = AllocationAttributes::new(f.store.clone(), 1);
        attrs.set(QuotaDimension::Instances.attribute_name(), 2).await.unwrap();
        attrs.set(QuotaDimension::Ram.attribute_name(), 8192).await.unwrap();
        attrs.set(QuotaDimension::FloatingIps.attribute_name(), 0).await.unwrap();
        attrs.set(QuotaDimension::ObjectGb.attribute_name(), 3).await.unwrap();
        attrs.set(QuotaDimension::Gpu.attribute_name(), 1).await.unwrap();

        assert_ok!(f.allocator.set_quota(&id).await);

        let compute = f.cloud.quota(QuotaService::Compute, &id);
        assert_eq!(compute.get("instances"), Some(&2));
        assert_eq!(compute.get("ram"), Some(&8192));
        assert_eq!(compute.get("cores"), None);
        assert_eq!(f.cloud.quota(QuotaService::Network, &id).get("floatingip"), Some(&0));
        assert!(f.cloud.quota(QuotaService::Volume, &id).is_empty());
        assert_eq!(
            f.cloud.quota(QuotaService::Object, &id).get(OBJECT_QUOTA_KEY),
            Some(&(3 * GB_IN_BYTES))
        );

        let snapshot = assert_ok!(f.allocator.get_quota(&id).await);
        assert_eq!(snapshot.get(&QuotaDimension::ObjectGb), Some(&3));
        assert_eq!(snapshot.get(&QuotaDimension::Gpu), None);
    }

    #[tokio::test]
    async fn test_set_quota_without_object_storage() {
        let f = fixture_with(resource(), InMemoryOpenStack::new().without_object_storage());
        let id = f.allocator.create_project("lab-f000003").await.unwrap();
        let attrs = AllocationAttributes::new(f.store.clone(), 1);
        attrs.set(QuotaDimension::ObjectGb.attribute_name(), 3).await.unwrap();
        attrs.set(QuotaDimension::Vcpu.attribute_name(), 4).await.unwrap();

        assert_ok!(f.allocator.set_quota(&id).await);
        let snapshot = assert_ok!(f.allocator.get_quota(&id).await);
        assert_eq!(snapshot.get(&QuotaDimension::Vcpu), Some(&4));
        assert_eq!(snapshot.get(&QuotaDimension::ObjectGb), None);
    }

    #[tokio::test]
    async fn test_object_quota_saturates() {
        let f = fixture();
        let id = f.allocator.create_project("lab-f000004").await.unwrap();
        let attrs = AllocationAttributes::new(f.store.clone(), 1);
        attrs.set(QuotaDimension::ObjectGb.attribute_name(), i64::MAX / 2).await.unwrap();

        assert_ok!(f.allocator.set_quota(&id).await);
        assert_eq!(
            f.cloud.quota(QuotaService::Object, &id).get(OBJECT_QUOTA_KEY),
            Some(&i64::MAX)
        );
    }

    #[tokio::test]
    async fn test_set_quota_missing_project() {
        let f = fixture();
        let attrs = AllocationAttributes::new(f.store.clone(), 1);
        attrs.set(QuotaDimension::Vcpu.attribute_name(), 4).await.unwrap();
        let err = assert_err!(f.allocator.set_quota("gone").await);
        assert!(err.is_not_found());
    }
}
