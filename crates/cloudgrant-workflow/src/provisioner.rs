//! Provisioner - entry points for allocation lifecycle events
//!
//! The host system reports allocation changes as [`AllocationEvent`]s. Each
//! event is an independent unit of work: [`Provisioner::spawn`] runs it on
//! its own task, and events for the same allocation coordinate only through
//! the attribute store.

use crate::activation::{activate_allocation, disable_allocation, ActivationOutcome, DisableOutcome};
use crate::config::CloudGrantConfig;
use crate::error::Result;
use crate::membership::{add_user_to_allocation, remove_user_from_allocation, MembershipOutcome};
use crate::validation::QuotaValidator;
use cloudgrant_allocator::openshift::{OpenShiftAllocator, OpenShiftApi};
use cloudgrant_allocator::openstack::{OpenStackAllocator, OpenStackApi};
use cloudgrant_allocator::{AllocatorContext, AllocatorRegistry, Backend, ResourceAllocator};
use cloudgrant_common::{AllocationId, AllocationStore, AllocationUserId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Allocation lifecycle event from the host system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AllocationEvent {
    /// Allocation approved or renewed
    Activated(AllocationId),
    /// Allocation expired or revoked
    Disabled(AllocationId),
    /// User added to an allocation
    UserAdded(AllocationUserId),
    /// User removed from an allocation
    UserRemoved(AllocationUserId),
}

/// Outcome of a handled event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventOutcome {
    /// From [`Provisioner::activate`]
    Activation(ActivationOutcome),
    /// From [`Provisioner::disable`]
    Disable(DisableOutcome),
    /// From [`Provisioner::add_user`] or [`Provisioner::remove_user`]
    Membership(MembershipOutcome),
}

/// Registry with the OpenStack and OpenShift allocators bound to the given
/// backend clients
pub fn standard_registry(
    openstack: Arc<dyn OpenStackApi>,
    openshift: Arc<dyn OpenShiftApi>,
    config: &CloudGrantConfig,
) -> AllocatorRegistry {
    let openstack_settings = config.openstack.clone();
    let openshift_settings = config.openshift.clone();

    AllocatorRegistry::new()
        .with(Backend::OpenStack, move |ctx: AllocatorContext| {
            Arc::new(OpenStackAllocator::new(ctx, openstack.clone(), openstack_settings.clone()))
                as Arc<dyn ResourceAllocator>
        })
        .with(Backend::OpenShift, move |ctx: AllocatorContext| {
            Arc::new(OpenShiftAllocator::new(ctx, openshift.clone(), openshift_settings.clone()))
                as Arc<dyn ResourceAllocator>
        })
}

/// Trigger surface over store, registry and configuration
#[derive(Clone)]
pub struct Provisioner {
    store: Arc<dyn AllocationStore>,
    registry: Arc<AllocatorRegistry>,
    config: Arc<CloudGrantConfig>,
}

impl Provisioner {
    /// Create provisioner
    pub fn new(store: Arc<dyn AllocationStore>, registry: AllocatorRegistry, config: CloudGrantConfig) -> Self {
        Self {
            store,
            registry: Arc::new(registry),
            config: Arc::new(config),
        }
    }

    /// Configuration in use
    pub fn config(&self) -> &CloudGrantConfig {
        &self.config
    }

    /// Activate an allocation
    pub async fn activate(&self, allocation_id: AllocationId) -> Result<ActivationOutcome> {
        activate_allocation(self.store.clone(), &self.registry, allocation_id).await
    }

    /// Disable an allocation
    pub async fn disable(&self, allocation_id: AllocationId) -> Result<DisableOutcome> {
        disable_allocation(self.store.clone(), &self.registry, allocation_id).await
    }

    /// Grant an allocation user access
    pub async fn add_user(&self, allocation_user_id: AllocationUserId) -> Result<MembershipOutcome> {
        add_user_to_allocation(
            self.store.clone(),
            &self.registry,
            &self.config.membership,
            allocation_user_id,
        )
        .await
    }

    /// Revoke an allocation user's access
    pub async fn remove_user(&self, allocation_user_id: AllocationUserId) -> Result<MembershipOutcome> {
        remove_user_from_allocation(self.store.clone(), &self.registry, allocation_user_id).await
    }

    /// Dispatch an event to its entry point
    pub async fn handle(&self, event: AllocationEvent) -> Result<EventOutcome> {
        info!("Handling {:?}", event);
        match event {
            AllocationEvent::Activated(id) => self.activate(id).await.map(EventOutcome::Activation),
            AllocationEvent::Disabled(id) => self.disable(id).await.map(EventOutcome::Disable),
            AllocationEvent::UserAdded(id) => self.add_user(id).await.map(EventOutcome::Membership),
            AllocationEvent::UserRemoved(id) => self.remove_user(id).await.map(EventOutcome::Membership),
        }
    }

    /// Handle an event on its own task
    pub fn spawn(&self, event: AllocationEvent) -> JoinHandle<Result<EventOutcome>> {
        let provisioner = self.clone();
        tokio::spawn(async move {
            let result = provisioner.handle(event).await;
            if let Err(e) = &result {
                error!("{:?} failed: {}", event, e);
            }
            result
        })
    }

    /// Quota validator over the same store and registry
    pub fn validator(&self) -> QuotaValidator {
        QuotaValidator::new(self.store.clone(), self.registry.clone())
    }
}
