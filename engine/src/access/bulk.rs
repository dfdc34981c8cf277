//! Bulk group management.
//!
//! Operations over many groups at once. Each item is handled on its own: a
//! failing item is recorded in the [`BulkReport`] and the rest still run.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uam_common::{AccessScope, ObjectType};
use validator::Validate;

use super::handler::AccessHandler;
use crate::error::{AccessError, AccessResult};
use crate::groups::{AccessGroup, GroupId};

/// What a bulk assignment does with the listed groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkOperation {
    /// Associate the object with each listed group.
    Add,
    /// Make the listed groups exactly the object's groups.
    Update,
    /// Dissociate the object from each listed group.
    Remove,
}

impl fmt::Display for BulkOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Add => "add",
            Self::Update => "update",
            Self::Remove => "remove",
        })
    }
}

impl FromStr for BulkOperation {
    type Err = AccessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add" => Ok(Self::Add),
            "update" => Ok(Self::Update),
            "remove" => Ok(Self::Remove),
            other => Err(AccessError::validation(format!(
                "unknown bulk operation: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkFailure {
    pub group_id: GroupId,
    pub error: AccessError,
}

/// Per-group outcome of a bulk operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkReport {
    pub succeeded: Vec<GroupId>,
    pub failed: Vec<BulkFailure>,
}

impl BulkReport {
    fn record(&mut self, group_id: GroupId, result: AccessResult<()>) {
        match result {
            Ok(()) => self.succeeded.push(group_id),
            Err(error) => {
                tracing::warn!(%group_id, error = %error, "Bulk item failed");
                self.failed.push(BulkFailure { group_id, error });
            }
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// One line per failure, `"<id>: <code>: <message>"`.
    pub fn failure_summary(&self) -> String {
        self.failed
            .iter()
            .map(|f| format!("{}: {}: {}", f.group_id, f.error.code(), f.error))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl AccessHandler {
    /// Apply one operation to the object's association with each group.
    ///
    /// Only fails as a whole when the current groups cannot be listed for an
    /// `update`; item failures end up in the report.
    #[tracing::instrument(skip(self, group_ids), fields(count = group_ids.len()))]
    pub async fn bulk_assign(
        &self,
        operation: BulkOperation,
        object_type: ObjectType,
        object_id: &str,
        group_ids: &[GroupId],
    ) -> AccessResult<BulkReport> {
        let mut report = BulkReport::default();

        match operation {
            BulkOperation::Add | BulkOperation::Remove => {
                for &id in group_ids {
                    let result = self
                        .assign_one(id, operation, object_type, object_id)
                        .await;
                    report.record(id, result);
                }
            }
            BulkOperation::Update => {
                let wanted: BTreeSet<GroupId> = group_ids.iter().copied().collect();
                let holders: BTreeSet<GroupId> = self
                    .list_groups()
                    .await?
                    .iter()
                    .filter(|group| group.contains_object(object_type, object_id))
                    .filter_map(AccessGroup::id)
                    .collect();

                for &id in wanted.union(&holders) {
                    let step = if wanted.contains(&id) {
                        BulkOperation::Add
                    } else {
                        BulkOperation::Remove
                    };
                    let result = self.assign_one(id, step, object_type, object_id).await;

                    // A holder deleted since the listing has nothing left to remove
                    if step == BulkOperation::Remove
                        && matches!(result, Err(AccessError::NotFound(_)))
                    {
                        tracing::debug!(%id, "Group vanished during bulk update");
                        continue;
                    }
                    report.record(id, result);
                }
            }
        }

        tracing::info!(
            %operation,
            %object_type,
            object_id,
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "Bulk assignment finished"
        );
        Ok(report)
    }

    async fn assign_one(
        &self,
        id: GroupId,
        operation: BulkOperation,
        object_type: ObjectType,
        object_id: &str,
    ) -> AccessResult<()> {
        let mut group = self
            .get_group(id)
            .await?
            .ok_or_else(|| AccessError::NotFound(format!("access group {id}")))?;

        let has = group.contains_object(object_type, object_id);
        match operation {
            BulkOperation::Remove if has => {
                group.remove_object(object_type, object_id);
                self.save_group(&mut group, true).await?;
            }
            BulkOperation::Add | BulkOperation::Update if !has => {
                group.add_object(object_type, object_id);
                self.save_group(&mut group, false).await?;
            }
            _ => tracing::debug!(%id, %operation, "Bulk item already applied"),
        }
        Ok(())
    }

    /// Delete several groups; missing ids are reported, not fatal.
    #[tracing::instrument(skip(self, ids), fields(count = ids.len()))]
    pub async fn delete_groups(&self, ids: &[GroupId]) -> BulkReport {
        let mut report = BulkReport::default();
        for &id in ids {
            report.record(id, self.delete_group(id).await);
        }
        report
    }
}

/// Group fields as submitted by a management form.
///
/// Access values are tolerated: anything other than `group` or `all` falls
/// back to `group`. Name, description and IP ranges are validated strictly.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct GroupForm {
    #[validate(length(min = 1, max = 100, message = "Group name must be 1-100 characters"))]
    pub name: String,
    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: String,
    pub read_access: String,
    pub write_access: String,
    pub ip_range: String,
}

fn lenient_scope(field: &str, value: &str) -> AccessScope {
    let value = value.trim();
    if value.is_empty() {
        return AccessScope::Group;
    }
    value.parse().unwrap_or_else(|_| {
        tracing::warn!(field, value, "Unknown access value, using group");
        AccessScope::Group
    })
}

impl GroupForm {
    /// Overwrite the group's fields. On error the group is left unchanged.
    pub fn apply_to(&self, group: &mut AccessGroup) -> AccessResult<()> {
        self.validate()
            .map_err(|e| AccessError::Validation(e.to_string()))?;

        let mut updated = group.clone();
        updated.set_name(&self.name)?;
        updated.set_ip_ranges(&self.ip_range)?;
        updated.set_description(self.description.trim());
        updated.set_read_access(lenient_scope("read_access", &self.read_access));
        updated.set_write_access(lenient_scope("write_access", &self.write_access));

        *group = updated;
        Ok(())
    }

    /// A new, unpersisted group from the form.
    pub fn into_group(self) -> AccessResult<AccessGroup> {
        let mut group = AccessGroup::new(&self.name)?;
        self.apply_to(&mut group)?;
        Ok(group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(name: &str, read: &str, ip_range: &str) -> GroupForm {
        GroupForm {
            name: name.to_string(),
            read_access: read.to_string(),
            write_access: "all".to_string(),
            ip_range: ip_range.to_string(),
            ..GroupForm::default()
        }
    }

    #[test]
    fn test_operation_parse() {
        assert_eq!("add".parse::<BulkOperation>().unwrap(), BulkOperation::Add);
        assert_eq!("update".parse::<BulkOperation>().unwrap(), BulkOperation::Update);
        assert_eq!("remove".parse::<BulkOperation>().unwrap(), BulkOperation::Remove);
        assert!(matches!(
            "del".parse::<BulkOperation>(),
            Err(AccessError::Validation(_))
        ));
    }

    #[test]
    fn test_form_tolerates_unknown_access() {
        let group = form("Fighters", "everyone", "").into_group().unwrap();
        assert_eq!(group.read_access(), AccessScope::Group);
        assert_eq!(group.write_access(), AccessScope::All);
        assert_eq!(group.name(), "Fighters");
    }

    #[test]
    fn test_form_rejects_bad_name_and_ranges() {
        assert!(matches!(
            form("  ", "group", "").into_group(),
            Err(AccessError::Validation(_))
        ));

        let mut group = AccessGroup::new("Office").unwrap();
        let result = form("Renamed", "all", "10.0.0.9-10.0.0.1").apply_to(&mut group);
        assert!(matches!(result, Err(AccessError::Validation(_))));
        assert_eq!(group.name(), "Office");
        assert_eq!(group.read_access(), AccessScope::Group);
    }

    #[test]
    fn test_form_length_limits() {
        let mut group = AccessGroup::new("Office").unwrap();

        let long_name = form(&"n".repeat(101), "group", "");
        let err = long_name.apply_to(&mut group).unwrap_err();
        assert!(matches!(err, AccessError::Validation(_)));
        assert!(err.to_string().contains("Group name"));

        let long_description = GroupForm {
            description: "d".repeat(1001),
            ..form("Office", "group", "")
        };
        let err = long_description.apply_to(&mut group).unwrap_err();
        assert!(err.to_string().contains("Description"));
        assert_eq!(group.description(), "");

        let at_limit = GroupForm {
            description: "d".repeat(1000),
            ..form(&"n".repeat(100), "group", "")
        };
        at_limit.apply_to(&mut group).unwrap();
        assert_eq!(group.name().len(), 100);
    }

    #[test]
    fn test_form_json() {
        let form: GroupForm = serde_json::from_str(
            r#"{"name":"Staff","read_access":"all","ip_range":"192.168.0.1-192.168.0.255"}"#,
        )
        .unwrap();
        let group = form.into_group().unwrap();
        assert_eq!(group.read_access(), AccessScope::All);
        assert_eq!(group.write_access(), AccessScope::Group);
        assert_eq!(group.ip_ranges().len(), 1);
    }

    #[test]
    fn test_report_summary() {
        let mut report = BulkReport::default();
        report.record(GroupId(1), Ok(()));
        report.record(GroupId(2), Err(AccessError::NotFound("access group 2".into())));

        assert!(!report.is_success());
        assert_eq!(report.succeeded, vec![GroupId(1)]);
        assert_eq!(
            report.failure_summary(),
            "2: not_found: Not found: access group 2"
        );
    }
}
