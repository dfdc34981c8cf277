//! Resolution Cache
//!
//! Holds the current [`GroupSnapshot`] and resolved decisions, shared by all
//! requests of the process. Uses `DashMap` for lock-free concurrent access to
//! decisions.
//!
//! A single generation counter guards both: it is bumped on every group
//! mutation, entries remember the generation they were computed at, and an
//! entry from an older generation is never served. A resolution that started
//! before a mutation can therefore neither serve nor store stale results.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use dashmap::DashMap;
use uam_common::{AccessMode, ObjectRef, Requester};

use super::decision::AccessDecision;
use super::snapshot::GroupSnapshot;
use crate::config::AccessConfig;

/// Everything a decision depends on besides the group data.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DecisionKey {
    pub object: ObjectRef,
    pub mode: AccessMode,
    pub requester: Requester,
}

/// Decision paired with the generation it was computed at.
#[derive(Debug)]
struct CachedDecision {
    generation: u64,
    decision: AccessDecision,
}

/// Thread-safe cache of group snapshots and access decisions.
#[derive(Debug)]
pub struct ResolutionCache {
    generation: AtomicU64,
    snapshot: RwLock<Option<(u64, Arc<GroupSnapshot>)>>,
    decisions: DashMap<DecisionKey, CachedDecision>,
    cache_decisions: bool,
    capacity: usize,
}

impl ResolutionCache {
    pub fn new(config: &AccessConfig) -> Self {
        Self {
            generation: AtomicU64::new(0),
            snapshot: RwLock::new(None),
            decisions: DashMap::new(),
            cache_decisions: config.cache_decisions,
            capacity: config.decision_cache_capacity.max(1),
        }
    }

    /// Current generation. Capture it before reading group data.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// The cached snapshot, if it belongs to `generation`.
    pub fn snapshot(&self, generation: u64) -> Option<Arc<GroupSnapshot>> {
        let guard = self.snapshot.read().unwrap_or_else(PoisonError::into_inner);
        guard
            .as_ref()
            .filter(|(built_at, _)| *built_at == generation)
            .map(|(_, snapshot)| Arc::clone(snapshot))
    }

    /// Keep a freshly built snapshot unless a mutation happened meanwhile.
    pub fn store_snapshot(&self, generation: u64, snapshot: Arc<GroupSnapshot>) {
        let mut guard = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        if self.generation() == generation {
            *guard = Some((generation, snapshot));
        }
    }

    pub fn decision(&self, key: &DecisionKey) -> Option<AccessDecision> {
        if !self.cache_decisions {
            return None;
        }
        let current = self.generation();
        self.decisions
            .get(key)
            .filter(|entry| entry.generation == current)
            .map(|entry| entry.decision.clone())
    }

    pub fn store_decision(&self, generation: u64, key: DecisionKey, decision: AccessDecision) {
        if !self.cache_decisions || self.generation() != generation {
            return;
        }
        if self.decisions.len() >= self.capacity {
            tracing::debug!(capacity = self.capacity, "Decision cache full, clearing");
            self.decisions.clear();
        }
        self.decisions.insert(
            key,
            CachedDecision {
                generation,
                decision,
            },
        );
    }

    /// Drop every snapshot and decision computed so far.
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = None;
        self.decisions.clear();
    }

    /// Number of cached decisions, including stale ones not yet evicted.
    pub fn len(&self) -> usize {
        self.decisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::decision::DecisionReason;

    fn key(id: &str) -> DecisionKey {
        DecisionKey {
            object: ObjectRef::post(id),
            mode: AccessMode::Read,
            requester: Requester::user("7"),
        }
    }

    fn granted() -> AccessDecision {
        AccessDecision::granted(DecisionReason::Unrestricted, Default::default())
    }

    #[test]
    fn test_decision_roundtrip_within_generation() {
        let cache = ResolutionCache::new(&AccessConfig::default());
        let generation = cache.generation();

        cache.store_decision(generation, key("1"), granted());
        assert_eq!(cache.decision(&key("1")), Some(granted()));
        assert_eq!(cache.decision(&key("2")), None);
    }

    #[test]
    fn test_invalidate_drops_everything() {
        let cache = ResolutionCache::new(&AccessConfig::default());
        let generation = cache.generation();
        cache.store_snapshot(generation, Arc::new(GroupSnapshot::default()));
        cache.store_decision(generation, key("1"), granted());

        cache.invalidate();

        assert!(cache.decision(&key("1")).is_none());
        assert!(cache.snapshot(cache.generation()).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_stale_generation_not_stored() {
        let cache = ResolutionCache::new(&AccessConfig::default());
        let before = cache.generation();
        cache.invalidate();

        cache.store_decision(before, key("1"), granted());
        cache.store_snapshot(before, Arc::new(GroupSnapshot::default()));

        assert!(cache.decision(&key("1")).is_none());
        assert!(cache.snapshot(before).is_none());
        assert!(cache.snapshot(cache.generation()).is_none());
    }

    #[test]
    fn test_disabled_decision_cache() {
        let config = AccessConfig {
            cache_decisions: false,
            ..AccessConfig::default()
        };
        let cache = ResolutionCache::new(&config);
        cache.store_decision(cache.generation(), key("1"), granted());
        assert!(cache.decision(&key("1")).is_none());
    }

    #[test]
    fn test_capacity_clears_cache() {
        let config = AccessConfig {
            decision_cache_capacity: 2,
            ..AccessConfig::default()
        };
        let cache = ResolutionCache::new(&config);
        let generation = cache.generation();

        cache.store_decision(generation, key("1"), granted());
        cache.store_decision(generation, key("2"), granted());
        cache.store_decision(generation, key("3"), granted());

        assert_eq!(cache.len(), 1);
        assert!(cache.decision(&key("3")).is_some());
    }
}
