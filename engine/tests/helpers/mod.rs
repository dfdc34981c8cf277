//! Shared setup for access engine integration tests.
//!
//! Builds an [`AccessHandler`] over the in-memory store, plus stores that
//! fail, count their reads or serve an outdated listing.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use uam_engine::observability::init_tracing;
use uam_engine::{
    AccessConfig, AccessError, AccessGroup, AccessHandler, AccessResult, GroupId, GroupStore,
    HierarchyResolver, MemoryGroupStore, NoHierarchy, ObjectType,
};

/// Handler over a fresh in-memory store.
pub struct TestEngine {
    pub handler: AccessHandler,
    pub store: Arc<MemoryGroupStore>,
}

impl TestEngine {
    pub fn new() -> Self {
        Self::with(AccessConfig::default(), Arc::new(NoHierarchy))
    }

    pub fn with(config: AccessConfig, hierarchy: Arc<dyn HierarchyResolver>) -> Self {
        let _ = init_tracing();
        let store = Arc::new(MemoryGroupStore::new());
        let handler = AccessHandler::new(config, store.clone(), hierarchy);
        Self { handler, store }
    }

    /// Create and persist a group holding the given objects.
    pub async fn group(&self, name: &str, objects: &[(ObjectType, &str)]) -> AccessGroup {
        let mut group = AccessGroup::new(name).expect("valid group name");
        for (object_type, id) in objects {
            group.add_object(*object_type, *id);
        }
        self.handler
            .save_group(&mut group, false)
            .await
            .expect("save group");
        group
    }
}

/// Store whose every call fails as if the database were down.
#[derive(Debug, Default)]
pub struct FailingStore;

fn unavailable<T>() -> AccessResult<T> {
    Err(AccessError::persistence("connection refused"))
}

#[async_trait]
impl GroupStore for FailingStore {
    async fn list_groups(&self) -> AccessResult<Vec<AccessGroup>> {
        unavailable()
    }

    async fn get_group(&self, _id: GroupId) -> AccessResult<Option<AccessGroup>> {
        unavailable()
    }

    async fn save_group(&self, _group: &AccessGroup, _remove_old: bool) -> AccessResult<GroupId> {
        unavailable()
    }

    async fn delete_group(&self, _id: GroupId) -> AccessResult<bool> {
        unavailable()
    }

    async fn clear_objects(&self, _id: GroupId, _object_type: ObjectType) -> AccessResult<()> {
        unavailable()
    }
}

/// In-memory store that counts full listings.
#[derive(Debug, Default)]
pub struct CountingStore {
    pub inner: MemoryGroupStore,
    pub lists: AtomicUsize,
}

impl CountingStore {
    pub fn lists(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GroupStore for CountingStore {
    async fn list_groups(&self) -> AccessResult<Vec<AccessGroup>> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        self.inner.list_groups().await
    }

    async fn get_group(&self, id: GroupId) -> AccessResult<Option<AccessGroup>> {
        self.inner.get_group(id).await
    }

    async fn save_group(&self, group: &AccessGroup, remove_old: bool) -> AccessResult<GroupId> {
        self.inner.save_group(group, remove_old).await
    }

    async fn delete_group(&self, id: GroupId) -> AccessResult<bool> {
        self.inner.delete_group(id).await
    }

    async fn clear_objects(&self, id: GroupId, object_type: ObjectType) -> AccessResult<()> {
        self.inner.clear_objects(id, object_type).await
    }
}

/// In-memory store whose listing can be frozen while single-group reads and
/// writes stay live, like a listing taken just before a concurrent change.
#[derive(Debug, Default)]
pub struct FrozenListStore {
    pub inner: MemoryGroupStore,
    frozen: Mutex<Option<Vec<AccessGroup>>>,
}

impl FrozenListStore {
    pub async fn freeze(&self) {
        let listing = self.inner.list_groups().await.expect("list groups");
        *self.frozen.lock().unwrap_or_else(PoisonError::into_inner) = Some(listing);
    }
}

#[async_trait]
impl GroupStore for FrozenListStore {
    async fn list_groups(&self) -> AccessResult<Vec<AccessGroup>> {
        let frozen = self
            .frozen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match frozen {
            Some(listing) => Ok(listing),
            None => self.inner.list_groups().await,
        }
    }

    async fn get_group(&self, id: GroupId) -> AccessResult<Option<AccessGroup>> {
        self.inner.get_group(id).await
    }

    async fn save_group(&self, group: &AccessGroup, remove_old: bool) -> AccessResult<GroupId> {
        self.inner.save_group(group, remove_old).await
    }

    async fn delete_group(&self, id: GroupId) -> AccessResult<bool> {
        self.inner.delete_group(id).await
    }

    async fn clear_objects(&self, id: GroupId, object_type: ObjectType) -> AccessResult<()> {
        self.inner.clear_objects(id, object_type).await
    }
}
