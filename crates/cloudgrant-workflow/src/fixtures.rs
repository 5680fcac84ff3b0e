//! Shared test fixtures: an in-memory store and both in-memory backends
//! wired into a provisioner.

use crate::config::CloudGrantConfig;
use crate::provisioner::{standard_registry, Provisioner};
use cloudgrant_allocator::openshift::InMemoryOpenShift;
use cloudgrant_allocator::openstack::InMemoryOpenStack;
use cloudgrant_common::attributes::{RESOURCE_IDP, RESOURCE_PROJECT_DOMAIN, RESOURCE_USER_DOMAIN};
use cloudgrant_common::{
    Allocation, AllocationId, AllocationStatus, AllocationUser, AllocationUserId,
    InMemoryAllocationStore, Project, Resource, User,
};
use std::sync::Arc;

pub(crate) const PI: &str = "pi@example.org";

pub(crate) struct Fixture {
    pub store: Arc<InMemoryAllocationStore>,
    pub openstack: Arc<InMemoryOpenStack>,
    pub openshift: Arc<InMemoryOpenShift>,
    pub provisioner: Provisioner,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(CloudGrantConfig::default())
    }

    pub fn with_config(config: CloudGrantConfig) -> Self {
        Self::with_backends(config, InMemoryOpenStack::new(), InMemoryOpenShift::new())
    }

    /// Backends yield on every call, so concurrent workflows interleave
    pub fn interleaved() -> Self {
        Self::with_backends(
            CloudGrantConfig::default(),
            InMemoryOpenStack::new().interleaved(),
            InMemoryOpenShift::new().interleaved(),
        )
    }

    fn with_backends(config: CloudGrantConfig, openstack: InMemoryOpenStack, openshift: InMemoryOpenShift) -> Self {
        let store = Arc::new(InMemoryAllocationStore::new());
        let openstack = Arc::new(openstack);
        let openshift = Arc::new(openshift);
        let registry = standard_registry(openstack.clone(), openshift.clone(), &config);
        let provisioner = Provisioner::new(store.clone(), registry, config);
        Self { store, openstack, openshift, provisioner }
    }

    pub fn add_allocation(&self, id: AllocationId, resource_type: &str, quantity: i64) -> Allocation {
        let resource = match resource_type {
            "OpenStack" => Resource::new(1, "Devstack", resource_type)
                .with_attribute(RESOURCE_PROJECT_DOMAIN, "default")
                .with_attribute(RESOURCE_USER_DOMAIN, "default")
                .with_attribute(RESOURCE_IDP, "sso"),
            other => Resource::new(2, "cluster", other),
        };
        let allocation = Allocation {
            id,
            quantity,
            resources: vec![resource],
            project: Project { id, title: "Ocean Modelling".into(), pi: User::new(PI) },
            status: AllocationStatus::Active,
        };
        self.store.insert_allocation(allocation.clone());
        allocation
    }

    pub fn add_user(&self, id: AllocationUserId, allocation_id: AllocationId, username: &str) {
        self.store.insert_allocation_user(AllocationUser {
            id,
            allocation_id,
            user: User::new(username),
        });
    }
}
