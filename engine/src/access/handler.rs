//! Access resolution.
//!
//! Computes the groups of an object, the groups of a requester and the
//! resulting read/write decision.
//!
//! Resolution order for `check_access`:
//! 1. Collect the object's groups (direct, plus ancestors' with recursive lock)
//! 2. No groups: the object is unrestricted, access granted
//! 3. A group opens the requested mode to everyone: access granted
//! 4. Requester at or above the full access level: access granted
//! 5. Requester shares at least one group with the object: access granted
//! 6. Otherwise denied

use std::collections::BTreeSet;
use std::sync::Arc;

use uam_common::{AccessMode, ObjectRef, ObjectType, Requester};

use super::cache::{DecisionKey, ResolutionCache};
use super::context::RequestContext;
use super::decision::{AccessDecision, DecisionReason};
use super::snapshot::GroupSnapshot;
use crate::config::AccessConfig;
use crate::error::{AccessError, AccessResult};
use crate::groups::{AccessGroup, GroupId, GroupStore};
use crate::hierarchy::{ancestors, HierarchyResolver};

/// The access engine.
///
/// Owns the resolution cache and the injected collaborators. Share it across
/// requests behind an `Arc`; all methods take `&self`.
pub struct AccessHandler {
    config: AccessConfig,
    store: Arc<dyn GroupStore>,
    hierarchy: Arc<dyn HierarchyResolver>,
    cache: ResolutionCache,
}

impl std::fmt::Debug for AccessHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessHandler")
            .field("config", &self.config)
            .field("cached_decisions", &self.cache.len())
            .finish_non_exhaustive()
    }
}

impl AccessHandler {
    pub fn new(
        config: AccessConfig,
        store: Arc<dyn GroupStore>,
        hierarchy: Arc<dyn HierarchyResolver>,
    ) -> Self {
        let cache = ResolutionCache::new(&config);
        Self {
            config,
            store,
            hierarchy,
            cache,
        }
    }

    pub const fn config(&self) -> &AccessConfig {
        &self.config
    }

    /// Whether the requester's level grants membership in every group.
    pub fn has_full_access(&self, requester: &Requester) -> bool {
        requester
            .access_level
            .is_some_and(|level| level >= self.config.full_access_level)
    }

    /// Snapshot of the current generation, loading it on a miss.
    async fn snapshot(&self) -> AccessResult<(u64, Arc<GroupSnapshot>)> {
        let generation = self.cache.generation();
        if let Some(snapshot) = self.cache.snapshot(generation) {
            return Ok((generation, snapshot));
        }

        let groups = self.store.list_groups().await?;
        let snapshot = Arc::new(GroupSnapshot::build(groups));
        tracing::debug!(groups = snapshot.len(), generation, "Loaded group snapshot");
        self.cache.store_snapshot(generation, Arc::clone(&snapshot));

        Ok((generation, snapshot))
    }

    async fn object_group_ids(
        &self,
        snapshot: &GroupSnapshot,
        object: &ObjectRef,
    ) -> BTreeSet<GroupId> {
        let mut ids: BTreeSet<GroupId> = snapshot.direct_groups(object).collect();

        if self.config.recursive_lock && object.object_type.has_hierarchy() {
            for ancestor in ancestors(self.hierarchy.as_ref(), object).await {
                ids.extend(snapshot.direct_groups(&ancestor));
            }
        }

        ids
    }

    fn user_group_ids(&self, snapshot: &GroupSnapshot, requester: &Requester) -> BTreeSet<GroupId> {
        if self.has_full_access(requester) {
            return snapshot.all_ids();
        }
        snapshot.membership(requester)
    }

    /// Groups associated with an object, directly or through its ancestors.
    #[tracing::instrument(skip(self), fields(object = %object))]
    pub async fn object_groups(&self, object: &ObjectRef) -> AccessResult<Vec<Arc<AccessGroup>>> {
        let (_, snapshot) = self.snapshot().await?;
        let ids = self.object_group_ids(&snapshot, object).await;
        Ok(snapshot.resolve(&ids))
    }

    /// Groups the requester is a member of.
    #[tracing::instrument(skip(self, requester), fields(user = ?requester.user_id))]
    pub async fn user_groups(&self, requester: &Requester) -> AccessResult<Vec<Arc<AccessGroup>>> {
        let (_, snapshot) = self.snapshot().await?;
        let ids = self.user_group_ids(&snapshot, requester);
        Ok(snapshot.resolve(&ids))
    }

    /// Decide whether the requester may access the object in the given mode.
    ///
    /// Never fails for missing data; only group store failures are returned.
    #[tracing::instrument(skip(self, requester), fields(object = %object, mode = %mode, user = ?requester.user_id))]
    pub async fn check_access(
        &self,
        object: &ObjectRef,
        requester: &Requester,
        mode: AccessMode,
    ) -> AccessResult<AccessDecision> {
        let key = DecisionKey {
            object: object.clone(),
            mode,
            requester: requester.clone(),
        };
        if let Some(decision) = self.cache.decision(&key) {
            tracing::debug!(granted = decision.granted, "Decision cache hit");
            return Ok(decision);
        }

        let (generation, snapshot) = self.snapshot().await?;
        let decision = self.decide(&snapshot, object, requester, mode).await;
        tracing::debug!(
            granted = decision.granted,
            reason = ?decision.reason,
            locking_groups = ?decision.locking_groups,
            "Resolved access"
        );

        self.cache.store_decision(generation, key, decision.clone());
        Ok(decision)
    }

    async fn decide(
        &self,
        snapshot: &GroupSnapshot,
        object: &ObjectRef,
        requester: &Requester,
        mode: AccessMode,
    ) -> AccessDecision {
        let object_groups = self.object_group_ids(snapshot, object).await;
        if object_groups.is_empty() {
            return AccessDecision::granted(DecisionReason::Unrestricted, BTreeSet::new());
        }

        let open_to_all = snapshot
            .resolve(&object_groups)
            .iter()
            .any(|group| !group.access_for(mode).is_restrictive());
        if open_to_all {
            return AccessDecision::granted(DecisionReason::OpenToAll, BTreeSet::new());
        }

        if self.has_full_access(requester) {
            return AccessDecision::granted(DecisionReason::FullAccess, object_groups);
        }

        let user_groups = self.user_group_ids(snapshot, requester);
        if object_groups.is_disjoint(&user_groups) {
            AccessDecision::denied(object_groups)
        } else {
            AccessDecision::granted(DecisionReason::Member, object_groups)
        }
    }

    /// Entry point for content rendering and download gating.
    pub async fn resolve_access(
        &self,
        object_type: ObjectType,
        object_id: &str,
        requester: &Requester,
        mode: AccessMode,
    ) -> AccessResult<AccessDecision> {
        self.check_access(&ObjectRef::new(object_type, object_id), requester, mode)
            .await
    }

    /// Like [`resolve_access`](Self::resolve_access), for the request
    /// described by the host's context.
    pub async fn resolve_for_request(
        &self,
        context: &dyn RequestContext,
        object_type: ObjectType,
        object_id: &str,
        mode: AccessMode,
    ) -> AccessResult<AccessDecision> {
        let requester = context.requester();
        self.resolve_access(object_type, object_id, &requester, mode)
            .await
    }

    /// All groups, ordered by id, read straight from the store.
    pub async fn list_groups(&self) -> AccessResult<Vec<AccessGroup>> {
        self.store.list_groups().await
    }

    pub async fn get_group(&self, id: GroupId) -> AccessResult<Option<AccessGroup>> {
        self.store.get_group(id).await
    }

    /// Persist a group and its associations; returns its (new) id.
    ///
    /// With `remove_old_assignments` the stored associations become exactly
    /// the in-memory ones; without it they are only added to.
    #[tracing::instrument(skip(self, group), fields(group = %group.name(), id = ?group.id()))]
    pub async fn save_group(
        &self,
        group: &mut AccessGroup,
        remove_old_assignments: bool,
    ) -> AccessResult<GroupId> {
        let name_taken = self
            .store
            .list_groups()
            .await?
            .iter()
            .any(|other| other.name() == group.name() && other.id() != group.id());
        if name_taken {
            return Err(AccessError::Conflict(format!(
                "an access group named {:?} already exists",
                group.name()
            )));
        }

        let result = self.store.save_group(group, remove_old_assignments).await;
        self.invalidate();
        let id = result?;

        group.mark_saved(id);
        tracing::info!(%id, remove_old_assignments, "Access group saved");
        Ok(id)
    }

    /// Delete a group and all of its associations.
    #[tracing::instrument(skip(self))]
    pub async fn delete_group(&self, id: GroupId) -> AccessResult<()> {
        let result = self.store.delete_group(id).await;
        self.invalidate();

        if !result? {
            return Err(AccessError::NotFound(format!("access group {id}")));
        }
        tracing::info!(%id, "Access group deleted");
        Ok(())
    }

    /// Clear all associations of one type from a group.
    ///
    /// With `persist_immediately` the clear is written to the store before
    /// returning; otherwise it is applied by the next
    /// [`save_group`](Self::save_group).
    #[tracing::instrument(skip(self, group), fields(group = %group.name()))]
    pub async fn unset_objects(
        &self,
        group: &mut AccessGroup,
        object_type: ObjectType,
        persist_immediately: bool,
    ) -> AccessResult<()> {
        group.unset_objects(object_type);

        if let (true, Some(id)) = (persist_immediately, group.id()) {
            let result = self.store.clear_objects(id, object_type).await;
            self.invalidate();
            result?;
            group.mark_cleared(object_type);
            tracing::info!(%id, %object_type, "Access group associations cleared");
        }

        Ok(())
    }

    /// Forget cached snapshots and decisions.
    ///
    /// Group mutations made through this handler call it automatically. Call
    /// it when the content hierarchy changes or groups are changed behind the
    /// handler's back.
    pub fn invalidate(&self) {
        self.cache.invalidate();
        tracing::debug!("Resolution cache invalidated");
    }
}
