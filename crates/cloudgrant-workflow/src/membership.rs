//! Membership Workflow
//!
//! Users may be added while the project is still being created by a
//! concurrent activation. Adding waits for the project id attribute to show
//! up, polling at a fixed interval up to a maximum wait, and fails with
//! [`WorkflowError::Timeout`] without touching the backend otherwise.
//!
//! Removing only revokes the member role. The federated identity stays.

use crate::config::MembershipConfig;
use crate::error::{Result, WorkflowError};
use cloudgrant_allocator::AllocatorRegistry;
use cloudgrant_common::attributes::ALLOCATION_PROJECT_ID;
use cloudgrant_common::{AllocationAttributes, AllocationStore, AllocationUserId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

/// Result of a membership change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MembershipOutcome {
    /// Resource type has no allocator
    NotManaged,
    /// Allocation has no project, nothing to revoke
    NothingToDo,
    /// Member role granted
    Granted {
        /// Backend project id
        project_id: String,
        /// Username
        username: String,
    },
    /// Member role revoked
    Revoked {
        /// Backend project id
        project_id: String,
        /// Username
        username: String,
    },
}

/// Poll until the allocation has a project id
pub async fn wait_for_project_id(
    attributes: &AllocationAttributes,
    config: &MembershipConfig,
) -> Result<String> {
    let started = Instant::now();
    loop {
        if let Some(project_id) = attributes.get_text(ALLOCATION_PROJECT_ID).await? {
            return Ok(project_id);
        }

        let waited = started.elapsed();
        if waited >= config.max_wait() {
            return Err(WorkflowError::Timeout {
                allocation: attributes.allocation_id(),
                waited,
            });
        }
        debug!(
            "Allocation {} has no project yet, waited {:?}",
            attributes.allocation_id(),
            waited
        );
        sleep(config.poll_interval()).await;
    }
}

/// Grant an allocation user access to the allocation's project
pub async fn add_user_to_allocation(
    store: Arc<dyn AllocationStore>,
    registry: &AllocatorRegistry,
    config: &MembershipConfig,
    allocation_user_id: AllocationUserId,
) -> Result<MembershipOutcome> {
    let allocation_user = store.allocation_user(allocation_user_id).await?;
    let allocation = store.allocation(allocation_user.allocation_id).await?;
    let Some(allocator) = registry.find_allocator(&allocation, store.clone()) else {
        return Ok(MembershipOutcome::NotManaged);
    };
    let attributes = AllocationAttributes::new(store, allocation.id);

    let project_id = wait_for_project_id(&attributes, config).await?;
    let username = allocation_user.user.username;

    allocator.get_or_create_federated_user(&username).await?;
    allocator.assign_role_on_user(&username, &project_id).await?;
    info!("Added {} to project {}", username, project_id);

    Ok(MembershipOutcome::Granted { project_id, username })
}

/// Revoke an allocation user's access
pub async fn remove_user_from_allocation(
    store: Arc<dyn AllocationStore>,
    registry: &AllocatorRegistry,
    allocation_user_id: AllocationUserId,
) -> Result<MembershipOutcome> {
    let allocation_user = store.allocation_user(allocation_user_id).await?;
    let allocation = store.allocation(allocation_user.allocation_id).await?;
    let Some(allocator) = registry.find_allocator(&allocation, store.clone()) else {
        return Ok(MembershipOutcome::NotManaged);
    };
    let attributes = AllocationAttributes::new(store, allocation.id);
    let username = allocation_user.user.username;

    let Some(project_id) = attributes.get_text(ALLOCATION_PROJECT_ID).await? else {
        warn!(
            "Allocation {} has no project id, nothing to remove {} from",
            allocation.id, username
        );
        return Ok(MembershipOutcome::NothingToDo);
    };

    allocator.remove_role_from_user(&username, &project_id).await?;
    info!("Removed {} from project {}", username, project_id);

    Ok(MembershipOutcome::Revoked { project_id, username })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::ActivationOutcome;
    use crate::config::CloudGrantConfig;
    use crate::fixtures::Fixture;
    use std::time::Duration;
    use tokio_test::{assert_err, assert_ok};

    async fn activate(f: &Fixture, id: u64) -> String {
        match f.provisioner.activate(id).await {
            Ok(ActivationOutcome::Activated { project_id, .. }) => project_id,
            other => panic!("activation failed: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_add_and_remove() {
        let f = Fixture::new();
        f.add_allocation(1, "OpenShift", 1);
        f.add_user(10, 1, "jane");
        let project_id = activate(&f, 1).await;

        let outcome = assert_ok!(f.provisioner.add_user(10).await);
        assert_eq!(
            outcome,
            MembershipOutcome::Granted { project_id: project_id.clone(), username: "jane".into() }
        );
        assert!(f.openshift.has_role("jane", &project_id, "edit"));

        assert_ok!(f.provisioner.remove_user(10).await);
        assert!(!f.openshift.has_role("jane", &project_id, "edit"));
        assert!(f.openshift.has_user("jane"));

        // Removing again is already satisfied
        let outcome = assert_ok!(f.provisioner.remove_user(10).await);
        assert!(matches!(outcome, MembershipOutcome::Revoked { .. }));
    }

    #[tokio::test]
    async fn test_add_twice_grants_once() {
        let f = Fixture::new();
        f.add_allocation(1, "OpenStack", 1);
        f.add_user(10, 1, "jane");
        activate(&f, 1).await;

        assert_ok!(f.provisioner.add_user(10).await);
        assert_ok!(f.provisioner.add_user(10).await);
        // PI plus jane
        assert_eq!(f.openstack.grant_count(), 2);
        assert_eq!(f.openstack.user_count(), 2);
    }

    #[tokio::test]
    async fn test_remove_without_project() {
        let f = Fixture::new();
        f.add_allocation(1, "OpenStack", 1);
        f.add_user(10, 1, "jane");

        let outcome = assert_ok!(f.provisioner.remove_user(10).await);
        assert_eq!(outcome, MembershipOutcome::NothingToDo);
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_times_out_without_mutation() {
        let f = Fixture::new();
        f.add_allocation(1, "OpenShift", 1);
        f.add_user(10, 1, "jane");

        let started = Instant::now();
        let err = assert_err!(f.provisioner.add_user(10).await);

        let WorkflowError::Timeout { allocation, waited } = err else {
            panic!("expected timeout, got {:?}", err);
        };
        assert_eq!(allocation, 1);
        assert!(waited >= Duration::from_secs(120));
        assert!(started.elapsed() < Duration::from_secs(125));
        assert!(!f.openshift.has_user("jane"));
        assert_eq!(f.openshift.role_add_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_poll_interval_still_sleeps() {
        let mut config = CloudGrantConfig::default();
        config.membership = MembershipConfig { poll_interval_secs: 0, max_wait_secs: 10 };
        let f = Fixture::with_config(config);
        f.add_allocation(1, "OpenShift", 1);
        f.add_user(10, 1, "jane");

        // Paused time only advances across real sleeps
        let started = Instant::now();
        let attributes = AllocationAttributes::new(f.store.clone(), 1);
        let err = assert_err!(wait_for_project_id(&attributes, &f.provisioner.config().membership).await);
        assert!(matches!(err, WorkflowError::Timeout { allocation: 1, .. }));
        assert!(started.elapsed() >= Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_waits_for_concurrent_activation() {
        let f = Fixture::new();
        f.add_allocation(1, "OpenShift", 1);
        f.add_user(10, 1, "jane");

        let provisioner = f.provisioner.clone();
        let add = tokio::spawn(async move { provisioner.add_user(10).await });

        sleep(Duration::from_secs(7)).await;
        let project_id = activate(&f, 1).await;

        let outcome = assert_ok!(add.await.unwrap());
        assert!(matches!(outcome, MembershipOutcome::Granted { .. }));
        assert!(f.openshift.has_role("jane", &project_id, "edit"));
    }

    #[tokio::test]
    async fn test_concurrent_users_are_independent() {
        let f = Fixture::new();
        f.add_allocation(1, "OpenStack", 1);
        f.add_user(10, 1, "jane");
        f.add_user(11, 1, "john");
        let project_id = activate(&f, 1).await;

        let (jane, john) = tokio::join!(f.provisioner.add_user(10), f.provisioner.add_user(11));
        assert_ok!(jane);
        assert_ok!(john);
        assert!(f.openstack.has_role("jane", &project_id, "member"));
        assert!(f.openstack.has_role("john", &project_id, "member"));

        assert_ok!(f.provisioner.remove_user(10).await);
        assert!(!f.openstack.has_role("jane", &project_id, "member"));
        assert!(f.openstack.has_role("john", &project_id, "member"));
    }

    #[tokio::test]
    async fn test_unmanaged_resource() {
        let f = Fixture::new();
        f.add_allocation(1, "Storage", 1);
        f.add_user(10, 1, "jane");

        assert_eq!(assert_ok!(f.provisioner.add_user(10).await), MembershipOutcome::NotManaged);
        assert_eq!(assert_ok!(f.provisioner.remove_user(10).await), MembershipOutcome::NotManaged);
    }

    #[tokio::test]
    async fn test_unknown_allocation_user() {
        let f = Fixture::new();
        let err = assert_err!(f.provisioner.add_user(99).await);
        assert!(matches!(err, WorkflowError::Store(_)));
    }
}
