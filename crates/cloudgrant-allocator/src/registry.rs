//! Allocator Registry - resource type to allocator resolution

use crate::allocator::ResourceAllocator;
use crate::backend::Backend;
use cloudgrant_common::{Allocation, AllocationAttributes, AllocationStore, Resource};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Everything an allocator is bound to
#[derive(Clone)]
pub struct AllocatorContext {
    /// Resource the allocation is provisioned on
    pub resource: Resource,
    /// The allocation
    pub allocation: Allocation,
    /// Attribute view of the allocation
    pub attributes: AllocationAttributes,
}

/// Builds an allocator for one backend
pub trait AllocatorFactory: Send + Sync {
    /// Construct an allocator bound to the context
    fn build(&self, ctx: AllocatorContext) -> Arc<dyn ResourceAllocator>;
}

impl<F> AllocatorFactory for F
where
    F: Fn(AllocatorContext) -> Arc<dyn ResourceAllocator> + Send + Sync,
{
    fn build(&self, ctx: AllocatorContext) -> Arc<dyn ResourceAllocator> {
        self(ctx)
    }
}

/// Closed mapping of backend to allocator constructor
#[derive(Default, Clone)]
pub struct AllocatorRegistry {
    factories: HashMap<Backend, Arc<dyn AllocatorFactory>>,
}

impl AllocatorRegistry {
    /// Create empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the constructor for a backend, replacing any previous one
    pub fn register(&mut self, backend: Backend, factory: impl AllocatorFactory + 'static) {
        debug!("Registering allocator for {}", backend);
        self.factories.insert(backend, Arc::new(factory));
    }

    /// Builder form of [`register`](Self::register)
    pub fn with(mut self, backend: Backend, factory: impl AllocatorFactory + 'static) -> Self {
        self.register(backend, factory);
        self
    }

    /// Whether a backend has a constructor
    pub fn is_registered(&self, backend: Backend) -> bool {
        self.factories.contains_key(&backend)
    }

    /// Resolve the allocator for an allocation's first resource.
    ///
    /// `None` means the resource is not managed here; callers treat that as
    /// a no-op.
    pub fn find_allocator(
        &self,
        allocation: &Allocation,
        store: Arc<dyn AllocationStore>,
    ) -> Option<Arc<dyn ResourceAllocator>> {
        let resource = allocation.resource()?;
        let Some(backend) = Backend::from_resource_type(&resource.resource_type) else {
            debug!(
                "Allocation {} uses unmanaged resource type {}",
                allocation.id, resource.resource_type
            );
            return None;
        };
        let factory = self.factories.get(&backend)?;

        Some(factory.build(AllocatorContext {
            resource: resource.clone(),
            allocation: allocation.clone(),
            attributes: AllocationAttributes::new(store, allocation.id),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openshift::{InMemoryOpenShift, OpenShiftAllocator, OpenShiftSettings};
    use cloudgrant_common::{AllocationStatus, InMemoryAllocationStore, Project, User};

    fn allocation(resources: Vec<Resource>) -> Allocation {
        Allocation {
            id: 1,
            quantity: 1,
            resources,
            project: Project { id: 1, title: "Lab".into(), pi: User::new("pi") },
            status: AllocationStatus::New,
        }
    }

    fn registry() -> AllocatorRegistry {
        let api = Arc::new(InMemoryOpenShift::new());
        AllocatorRegistry::new().with(Backend::OpenShift, move |ctx: AllocatorContext| {
            Arc::new(OpenShiftAllocator::new(ctx, api.clone(), OpenShiftSettings::default()))
                as Arc<dyn ResourceAllocator>
        })
    }

    #[test]
    fn test_resolves_case_insensitive() {
        let store: Arc<dyn AllocationStore> = Arc::new(InMemoryAllocationStore::new());
        let alloc = allocation(vec![Resource::new(1, "ocp", "OpenShift")]);
        let allocator = registry().find_allocator(&alloc, store).unwrap();
        assert_eq!(allocator.backend(), Backend::OpenShift);
    }

    #[test]
    fn test_unknown_type_not_managed() {
        let store: Arc<dyn AllocationStore> = Arc::new(InMemoryAllocationStore::new());
        let alloc = allocation(vec![Resource::new(1, "nfs", "Storage")]);
        assert!(registry().find_allocator(&alloc, store).is_none());
    }

    #[test]
    fn test_unregistered_backend_not_managed() {
        let store: Arc<dyn AllocationStore> = Arc::new(InMemoryAllocationStore::new());
        let alloc = allocation(vec![Resource::new(1, "os", "OpenStack")]);
        assert!(registry().find_allocator(&alloc, store).is_none());
    }

    #[test]
    fn test_first_resource_wins() {
        let store: Arc<dyn AllocationStore> = Arc::new(InMemoryAllocationStore::new());
        let alloc = allocation(vec![
            Resource::new(1, "nfs", "Storage"),
            Resource::new(2, "ocp", "OpenShift"),
        ]);
        assert!(registry().find_allocator(&alloc, store.clone()).is_none());
        assert!(registry().find_allocator(&allocation(vec![]), store).is_none());
    }
}
