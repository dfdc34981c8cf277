//! Content hierarchy lookup and ancestor traversal.
//!
//! The host knows the content tree (parent pages, category trees, the
//! categories of a post); the engine only asks for the immediate parent of
//! an object and walks up from there.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use uam_common::ObjectRef;

/// Parent lookup provided by the hosting integration.
#[async_trait]
pub trait HierarchyResolver: Send + Sync {
    /// The immediate structural parent of `object`, or `None` at the root
    /// and for objects without hierarchy.
    async fn parent(&self, object: &ObjectRef) -> Option<ObjectRef>;
}

/// Resolver for hosts without any content hierarchy.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHierarchy;

#[async_trait]
impl HierarchyResolver for NoHierarchy {
    async fn parent(&self, _object: &ObjectRef) -> Option<ObjectRef> {
        None
    }
}

/// Resolver over a preloaded child → parent map.
#[derive(Debug, Clone, Default)]
pub struct StaticHierarchy {
    parents: HashMap<ObjectRef, ObjectRef>,
}

impl StaticHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_parent(mut self, child: ObjectRef, parent: ObjectRef) -> Self {
        self.set_parent(child, parent);
        self
    }

    pub fn set_parent(&mut self, child: ObjectRef, parent: ObjectRef) {
        self.parents.insert(child, parent);
    }

    pub fn remove_parent(&mut self, child: &ObjectRef) {
        self.parents.remove(child);
    }
}

#[async_trait]
impl HierarchyResolver for StaticHierarchy {
    async fn parent(&self, object: &ObjectRef) -> Option<ObjectRef> {
        self.parents.get(object).cloned()
    }
}

/// Ancestors of `object`, nearest first.
///
/// Stops at the root, at an object whose type has no hierarchy, or when an
/// object repeats. A repeat means the host's tree has a cycle; it is logged
/// and treated as the root.
pub async fn ancestors(resolver: &dyn HierarchyResolver, object: &ObjectRef) -> Vec<ObjectRef> {
    let mut visited = HashSet::from([object.clone()]);
    let mut chain = Vec::new();
    let mut current = object.clone();

    while current.object_type.has_hierarchy() {
        let Some(parent) = resolver.parent(&current).await else {
            break;
        };
        if !visited.insert(parent.clone()) {
            tracing::warn!(
                object = %object,
                repeated = %parent,
                "Cycle in content hierarchy, stopping traversal"
            );
            break;
        }
        chain.push(parent.clone());
        current = parent;
    }

    chain
}
