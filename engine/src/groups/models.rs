//! Access group entity.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use uam_common::{AccessMode, AccessScope, ObjectType};

use super::ip_range::{format_ranges, parse_ranges, IpRange};
use crate::error::{AccessError, AccessResult};

/// Store-assigned identifier of a persisted group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub i64);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<i64> for GroupId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// A named access group.
///
/// Binds read/write scopes, optional IP ranges and a per-type set of
/// associated object identifiers. A group without an id has never been
/// persisted; the id is assigned by the store on first save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessGroup {
    id: Option<GroupId>,
    name: String,
    description: String,
    read_access: AccessScope,
    write_access: AccessScope,
    ip_ranges: Vec<IpRange>,
    objects: BTreeMap<ObjectType, BTreeSet<String>>,
    /// Types cleared in memory whose clear has not reached the store yet.
    pending_clears: BTreeSet<ObjectType>,
}

fn validate_name(name: &str) -> AccessResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AccessError::validation("Group name is required"));
    }
    Ok(name.to_string())
}

impl AccessGroup {
    /// Create a new, unpersisted group with restrictive scopes.
    pub fn new(name: &str) -> AccessResult<Self> {
        Ok(Self {
            id: None,
            name: validate_name(name)?,
            description: String::new(),
            read_access: AccessScope::Group,
            write_access: AccessScope::Group,
            ip_ranges: Vec::new(),
            objects: BTreeMap::new(),
            pending_clears: BTreeSet::new(),
        })
    }

    /// Rebuild a persisted group from stored fields.
    ///
    /// Used by [`GroupStore`](super::GroupStore) implementations. The name is
    /// still validated so a corrupt record cannot enter resolution.
    pub fn restore(
        id: GroupId,
        name: &str,
        description: String,
        read_access: AccessScope,
        write_access: AccessScope,
        ip_ranges: Vec<IpRange>,
    ) -> AccessResult<Self> {
        let mut group = Self::new(name)?;
        group.id = Some(id);
        group.description = description;
        group.read_access = read_access;
        group.write_access = write_access;
        group.ip_ranges = ip_ranges;
        Ok(group)
    }

    pub const fn id(&self) -> Option<GroupId> {
        self.id
    }

    pub const fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) -> AccessResult<()> {
        self.name = validate_name(name)?;
        Ok(())
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    pub const fn read_access(&self) -> AccessScope {
        self.read_access
    }

    pub fn set_read_access(&mut self, scope: AccessScope) {
        self.read_access = scope;
    }

    /// Set read access from its textual form; unknown values are rejected.
    pub fn set_read_access_str(&mut self, value: &str) -> AccessResult<()> {
        self.read_access = value.parse()?;
        Ok(())
    }

    pub const fn write_access(&self) -> AccessScope {
        self.write_access
    }

    pub fn set_write_access(&mut self, scope: AccessScope) {
        self.write_access = scope;
    }

    /// Set write access from its textual form; unknown values are rejected.
    pub fn set_write_access_str(&mut self, value: &str) -> AccessResult<()> {
        self.write_access = value.parse()?;
        Ok(())
    }

    /// Scope that applies to the given access mode.
    pub const fn access_for(&self, mode: AccessMode) -> AccessScope {
        match mode {
            AccessMode::Read => self.read_access,
            AccessMode::Write => self.write_access,
        }
    }

    pub fn ip_ranges(&self) -> &[IpRange] {
        &self.ip_ranges
    }

    /// Canonical `;`-separated form of the IP ranges.
    pub fn ip_ranges_string(&self) -> String {
        format_ranges(&self.ip_ranges)
    }

    /// Replace the IP ranges from their textual form.
    ///
    /// On error the current ranges are kept.
    pub fn set_ip_ranges(&mut self, input: &str) -> AccessResult<()> {
        self.ip_ranges = parse_ranges(input)?;
        Ok(())
    }

    /// Associate an object with this group. Adding a present id is a no-op.
    pub fn add_object(&mut self, object_type: ObjectType, id: impl Into<String>) {
        self.objects.entry(object_type).or_default().insert(id.into());
    }

    /// Remove an association. Removing an absent id is a no-op.
    pub fn remove_object(&mut self, object_type: ObjectType, id: &str) {
        if let Some(ids) = self.objects.get_mut(&object_type) {
            ids.remove(id);
            if ids.is_empty() {
                self.objects.remove(&object_type);
            }
        }
    }

    /// Clear every association of a type.
    ///
    /// The clear is recorded and applied by the next save together with the
    /// replacement objects, so the store never exposes the empty
    /// intermediate state. Use
    /// [`AccessHandler::unset_objects`](crate::AccessHandler::unset_objects)
    /// to flush it immediately.
    pub fn unset_objects(&mut self, object_type: ObjectType) {
        self.objects.remove(&object_type);
        self.pending_clears.insert(object_type);
    }

    /// Identifiers associated with this group for one type.
    pub fn objects_of_type(&self, object_type: ObjectType) -> &BTreeSet<String> {
        static EMPTY: BTreeSet<String> = BTreeSet::new();
        self.objects.get(&object_type).unwrap_or(&EMPTY)
    }

    pub fn contains_object(&self, object_type: ObjectType, id: &str) -> bool {
        self.objects
            .get(&object_type)
            .is_some_and(|ids| ids.contains(id))
    }

    /// All associations as `(type, id)` pairs, ordered by type then id.
    pub fn objects(&self) -> impl Iterator<Item = (ObjectType, &str)> {
        self.objects
            .iter()
            .flat_map(|(ty, ids)| ids.iter().map(move |id| (*ty, id.as_str())))
    }

    /// Role names affiliated with this group.
    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.objects_of_type(ObjectType::Role)
            .iter()
            .map(String::as_str)
    }

    pub fn pending_clears(&self) -> &BTreeSet<ObjectType> {
        &self.pending_clears
    }

    /// Record a successful save: assign the id (first save only) and forget
    /// pending clears.
    pub(crate) fn mark_saved(&mut self, id: GroupId) {
        if self.id.is_none() {
            self.id = Some(id);
        }
        self.pending_clears.clear();
    }

    pub(crate) fn mark_cleared(&mut self, object_type: ObjectType) {
        self.pending_clears.remove(&object_type);
    }
}
