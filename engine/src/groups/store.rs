//! Group persistence contract and the in-process store.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uam_common::ObjectType;

use super::models::{AccessGroup, GroupId};
use crate::error::{AccessError, AccessResult};

/// Loads and persists access groups.
///
/// Implementations must be thread-safe and treat every call as a single
/// unit: a reader never observes half of a save.
#[async_trait]
pub trait GroupStore: Send + Sync {
    /// All groups with their object associations, ordered by id.
    async fn list_groups(&self) -> AccessResult<Vec<AccessGroup>>;

    async fn get_group(&self, id: GroupId) -> AccessResult<Option<AccessGroup>>;

    /// Upsert a group and its associations, returning its id.
    ///
    /// Assigns a fresh id when `group.id()` is `None`. For every object type,
    /// when `remove_old_assignments` is true or the type has a pending clear,
    /// the stored set becomes exactly the in-memory set; otherwise the
    /// in-memory set is only added to the stored one.
    async fn save_group(
        &self,
        group: &AccessGroup,
        remove_old_assignments: bool,
    ) -> AccessResult<GroupId>;

    /// Delete a group and all its associations.
    ///
    /// Returns `true` if a group was deleted, `false` if none existed.
    async fn delete_group(&self, id: GroupId) -> AccessResult<bool>;

    /// Remove every association of one type from a stored group.
    async fn clear_objects(&self, id: GroupId, object_type: ObjectType) -> AccessResult<()>;
}

/// Compute the association set a save leaves in the store for one type.
pub fn merged_objects(
    stored: &BTreeSet<String>,
    group: &AccessGroup,
    object_type: ObjectType,
    remove_old_assignments: bool,
) -> BTreeSet<String> {
    let current = group.objects_of_type(object_type);
    if remove_old_assignments || group.pending_clears().contains(&object_type) {
        current.clone()
    } else {
        stored.union(current).cloned().collect()
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    last_id: i64,
    groups: BTreeMap<GroupId, AccessGroup>,
}

/// Group store kept in process memory.
///
/// Suitable for hosts without a database and for tests. Every operation runs
/// under a single lock, so saves are atomic for readers.
#[derive(Debug, Default)]
pub struct MemoryGroupStore {
    state: RwLock<MemoryState>,
}

impl MemoryGroupStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GroupStore for MemoryGroupStore {
    async fn list_groups(&self) -> AccessResult<Vec<AccessGroup>> {
        Ok(self.state.read().await.groups.values().cloned().collect())
    }

    async fn get_group(&self, id: GroupId) -> AccessResult<Option<AccessGroup>> {
        Ok(self.state.read().await.groups.get(&id).cloned())
    }

    async fn save_group(
        &self,
        group: &AccessGroup,
        remove_old_assignments: bool,
    ) -> AccessResult<GroupId> {
        let mut state = self.state.write().await;

        let duplicate = state
            .groups
            .values()
            .any(|g| g.name() == group.name() && g.id() != group.id());
        if duplicate {
            return Err(AccessError::persistence(format!(
                "duplicate group name: {}",
                group.name()
            )));
        }

        let id = match group.id() {
            Some(id) => {
                state.last_id = state.last_id.max(id.0);
                id
            }
            None => {
                state.last_id += 1;
                GroupId(state.last_id)
            }
        };

        let mut stored = AccessGroup::restore(
            id,
            group.name(),
            group.description().to_string(),
            group.read_access(),
            group.write_access(),
            group.ip_ranges().to_vec(),
        )?;

        let previous = state.groups.get(&id);
        for object_type in ObjectType::ALL {
            let existing = previous
                .map(|g| g.objects_of_type(object_type).clone())
                .unwrap_or_default();
            for object_id in merged_objects(&existing, group, object_type, remove_old_assignments)
            {
                stored.add_object(object_type, object_id);
            }
        }

        state.groups.insert(id, stored);
        Ok(id)
    }

    async fn delete_group(&self, id: GroupId) -> AccessResult<bool> {
        Ok(self.state.write().await.groups.remove(&id).is_some())
    }

    async fn clear_objects(&self, id: GroupId, object_type: ObjectType) -> AccessResult<()> {
        let mut state = self.state.write().await;
        let group = state
            .groups
            .get_mut(&id)
            .ok_or_else(|| AccessError::NotFound(format!("access group {id}")))?;
        group.unset_objects(object_type);
        group.mark_cleared(object_type);
        Ok(())
    }
}
