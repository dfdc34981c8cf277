//! Immutable view of all groups used by one resolution pass.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use uam_common::{ObjectRef, ObjectType, Requester};

use crate::groups::{matches, AccessGroup, GroupId};

/// All persisted groups plus an index from object to the groups it belongs to.
///
/// A snapshot is never mutated after it is built; a group mutation replaces
/// the cached snapshot instead.
#[derive(Debug, Default)]
pub struct GroupSnapshot {
    groups: BTreeMap<GroupId, Arc<AccessGroup>>,
    by_object: HashMap<ObjectRef, BTreeSet<GroupId>>,
    /// Groups with at least one IP range.
    ip_groups: Vec<GroupId>,
}

impl GroupSnapshot {
    pub fn build(groups: Vec<AccessGroup>) -> Self {
        let mut snapshot = Self::default();

        for group in groups {
            let Some(id) = group.id() else {
                tracing::warn!(group = %group.name(), "Ignoring unpersisted group in snapshot");
                continue;
            };

            for (object_type, object_id) in group.objects() {
                snapshot
                    .by_object
                    .entry(ObjectRef::new(object_type, object_id))
                    .or_default()
                    .insert(id);
            }
            if !group.ip_ranges().is_empty() {
                snapshot.ip_groups.push(id);
            }
            snapshot.groups.insert(id, Arc::new(group));
        }

        snapshot
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn group(&self, id: GroupId) -> Option<&Arc<AccessGroup>> {
        self.groups.get(&id)
    }

    pub fn all_ids(&self) -> BTreeSet<GroupId> {
        self.groups.keys().copied().collect()
    }

    /// Groups directly associated with one object.
    pub fn direct_groups(&self, object: &ObjectRef) -> impl Iterator<Item = GroupId> + '_ {
        self.by_object.get(object).into_iter().flatten().copied()
    }

    /// Groups the requester belongs to through explicit user membership,
    /// role affiliation or a matching IP range.
    pub fn membership(&self, requester: &Requester) -> BTreeSet<GroupId> {
        let mut ids = BTreeSet::new();

        if let Some(user_id) = &requester.user_id {
            ids.extend(self.direct_groups(&ObjectRef::new(ObjectType::User, user_id.as_str())));
        }
        for role in &requester.roles {
            ids.extend(self.direct_groups(&ObjectRef::new(ObjectType::Role, role.as_str())));
        }
        if let Some(ip) = requester.ip {
            ids.extend(
                self.ip_groups
                    .iter()
                    .copied()
                    .filter(|id| matches(ip, self.groups[id].ip_ranges())),
            );
        }

        ids
    }

    /// Resolve ids to groups, in id order. Unknown ids are skipped.
    pub fn resolve(&self, ids: &BTreeSet<GroupId>) -> Vec<Arc<AccessGroup>> {
        ids.iter()
            .filter_map(|id| self.groups.get(id).cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn group(id: i64, name: &str, objects: &[(ObjectType, &str)]) -> AccessGroup {
        let mut group = AccessGroup::new(name).unwrap();
        for (ty, object_id) in objects {
            group.add_object(*ty, *object_id);
        }
        group.mark_saved(GroupId(id));
        group
    }

    #[test]
    fn test_index_by_object() {
        let snapshot = GroupSnapshot::build(vec![
            group(1, "A", &[(ObjectType::Post, "42")]),
            group(2, "B", &[(ObjectType::Post, "42"), (ObjectType::Page, "1")]),
        ]);

        let ids: Vec<_> = snapshot.direct_groups(&ObjectRef::post("42")).collect();
        assert_eq!(ids, vec![GroupId(1), GroupId(2)]);
        assert_eq!(snapshot.direct_groups(&ObjectRef::post("43")).count(), 0);
        assert_eq!(snapshot.len(), 2);
    }

    #[test]
    fn test_unpersisted_groups_ignored() {
        let snapshot = GroupSnapshot::build(vec![AccessGroup::new("Draft").unwrap()]);
        assert!(snapshot.is_empty());
    }

    #[test]
    fn test_membership_sources() {
        let mut by_ip = group(3, "Office", &[]);
        by_ip.set_ip_ranges("10.0.0.1-10.0.0.10").unwrap();

        let snapshot = GroupSnapshot::build(vec![
            group(1, "Users", &[(ObjectType::User, "7")]),
            group(2, "Editors", &[(ObjectType::Role, "editor")]),
            by_ip,
        ]);

        let user = Requester::user("7");
        assert_eq!(snapshot.membership(&user), BTreeSet::from([GroupId(1)]));

        let editor = Requester::user("8").with_role("editor");
        assert_eq!(snapshot.membership(&editor), BTreeSet::from([GroupId(2)]));

        let visitor =
            Requester::anonymous().with_ip(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5)));
        assert_eq!(snapshot.membership(&visitor), BTreeSet::from([GroupId(3)]));

        let outsider =
            Requester::anonymous().with_ip(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 11)));
        assert!(snapshot.membership(&outsider).is_empty());
    }
}
