//! Allocation Store - the host system's allocation and attribute records
//!
//! Workflows never hold allocation state of their own: every read goes to
//! the store, every decision that must survive a crash is written back as
//! an attribute. Concurrent workflows coordinate only through it.

use crate::error::{StoreError, StoreResult};
use crate::model::{Allocation, AllocationId, AllocationUser, AllocationUserId, AttributeValue};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Access to allocations and their attributes
#[async_trait]
pub trait AllocationStore: Send + Sync {
    /// Load allocation by id
    async fn allocation(&self, id: AllocationId) -> StoreResult<Allocation>;

    /// Load allocation user by id
    async fn allocation_user(&self, id: AllocationUserId) -> StoreResult<AllocationUser>;

    /// Ids of all allocations
    async fn list_allocations(&self) -> StoreResult<Vec<AllocationId>>;

    /// Read an attribute, `None` when never set
    async fn get_attribute(
        &self,
        allocation: AllocationId,
        name: &str,
    ) -> StoreResult<Option<AttributeValue>>;

    /// Create or update an attribute
    async fn set_attribute(
        &self,
        allocation: AllocationId,
        name: &str,
        value: AttributeValue,
    ) -> StoreResult<()>;
}

/// Attribute view bound to one allocation
#[derive(Clone)]
pub struct AllocationAttributes {
    store: Arc<dyn AllocationStore>,
    allocation: AllocationId,
}

impl AllocationAttributes {
    /// Bind store to allocation
    pub fn new(store: Arc<dyn AllocationStore>, allocation: AllocationId) -> Self {
        Self { store, allocation }
    }

    /// Bound allocation id
    pub fn allocation_id(&self) -> AllocationId {
        self.allocation
    }

    /// Raw attribute value
    pub async fn get(&self, name: &str) -> StoreResult<Option<AttributeValue>> {
        self.store.get_attribute(self.allocation, name).await
    }

    /// Text attribute, empty text counts as unset
    pub async fn get_text(&self, name: &str) -> StoreResult<Option<String>> {
        Ok(self
            .get(name)
            .await?
            .map(|v| v.as_text())
            .filter(|v| !v.is_empty()))
    }

    /// Integer attribute
    pub async fn get_int(&self, name: &str) -> StoreResult<Option<i64>> {
        match self.get(name).await? {
            None => Ok(None),
            Some(value) => value.as_int().map(Some).ok_or_else(|| StoreError::InvalidAttribute {
                name: name.to_string(),
                value: value.as_text(),
            }),
        }
    }

    /// Create or update
    pub async fn set(&self, name: &str, value: impl Into<AttributeValue>) -> StoreResult<()> {
        let value = value.into();
        tracing::debug!(allocation = self.allocation, attribute = name, %value, "Setting attribute");
        self.store.set_attribute(self.allocation, name, value).await
    }
}

// =============================================================================
// In-memory store
// =============================================================================

/// In-memory allocation store (for testing and development)
pub struct InMemoryAllocationStore {
    allocations: RwLock<HashMap<AllocationId, Allocation>>,
    users: RwLock<HashMap<AllocationUserId, AllocationUser>>,
    attributes: DashMap<(AllocationId, String), AttributeValue>,
    writes: AtomicUsize,
}

impl InMemoryAllocationStore {
    /// Create empty store
    pub fn new() -> Self {
        Self {
            allocations: RwLock::new(HashMap::new()),
            users: RwLock::new(HashMap::new()),
            attributes: DashMap::new(),
            writes: AtomicUsize::new(0),
        }
    }

    /// Insert or replace allocation
    pub fn insert_allocation(&self, allocation: Allocation) {
        self.allocations.write().insert(allocation.id, allocation);
    }

    /// Insert or replace allocation user
    pub fn insert_allocation_user(&self, user: AllocationUser) {
        self.users.write().insert(user.id, user);
    }

    /// Change quantity, as the host does on a change request
    pub fn set_quantity(&self, id: AllocationId, quantity: i64) {
        if let Some(allocation) = self.allocations.write().get_mut(&id) {
            allocation.quantity = quantity;
        }
    }

    /// Remove an attribute, as an administrator would in the host UI
    pub fn clear_attribute(&self, id: AllocationId, name: &str) {
        self.attributes.remove(&(id, name.to_string()));
    }

    /// Snapshot of all attributes of an allocation
    pub fn attributes(&self, id: AllocationId) -> BTreeMap<String, AttributeValue> {
        self.attributes
            .iter()
            .filter(|entry| entry.key().0 == id)
            .map(|entry| (entry.key().1.clone(), entry.value().clone()))
            .collect()
    }

    /// Number of attribute writes so far
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }
}

impl Default for InMemoryAllocationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AllocationStore for InMemoryAllocationStore {
    async fn allocation(&self, id: AllocationId) -> StoreResult<Allocation> {
        self.allocations
            .read()
            .get(&id)
            .cloned()
            .ok_or(StoreError::AllocationNotFound(id))
    }

    async fn allocation_user(&self, id: AllocationUserId) -> StoreResult<AllocationUser> {
        self.users
            .read()
            .get(&id)
            .cloned()
            .ok_or(StoreError::AllocationUserNotFound(id))
    }

    async fn list_allocations(&self) -> StoreResult<Vec<AllocationId>> {
        let mut ids: Vec<_> = self.allocations.read().keys().copied().collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn get_attribute(
        &self,
        allocation: AllocationId,
        name: &str,
    ) -> StoreResult<Option<AttributeValue>> {
        Ok(self
            .attributes
            .get(&(allocation, name.to_string()))
            .map(|v| v.value().clone()))
    }

    async fn set_attribute(
        &self,
        allocation: AllocationId,
        name: &str,
        value: AttributeValue,
    ) -> StoreResult<()> {
        if !self.allocations.read().contains_key(&allocation) {
            return Err(StoreError::AllocationNotFound(allocation));
        }
        self.attributes.insert((allocation, name.to_string()), value);
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
