//! `PostgreSQL` group store.
//!
//! Groups live in `access_groups`, their associations in
//! `access_group_objects` (see `engine/migrations`). Saves run in one
//! transaction so a clear-and-replace is never visible half done.

use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uam_common::{AccessScope, ObjectType};

use super::ip_range::parse_ranges;
use super::models::{AccessGroup, GroupId};
use super::store::GroupStore;
use crate::error::{AccessError, AccessResult};

#[derive(Debug, FromRow)]
struct GroupRow {
    id: i64,
    name: String,
    description: String,
    read_access: String,
    write_access: String,
    ip_range: String,
}

#[derive(Debug, FromRow)]
struct ObjectRow {
    group_id: i64,
    object_type: String,
    object_id: String,
}

fn corrupt(id: i64, err: &AccessError) -> AccessError {
    AccessError::persistence(format!("corrupt access group record {id}: {err}"))
}

impl GroupRow {
    fn into_group(self) -> AccessResult<AccessGroup> {
        let id = self.id;
        let read_access: AccessScope = self
            .read_access
            .parse()
            .map_err(|e| corrupt(id, &AccessError::from(e)))?;
        let write_access: AccessScope = self
            .write_access
            .parse()
            .map_err(|e| corrupt(id, &AccessError::from(e)))?;
        let ip_ranges = parse_ranges(&self.ip_range).map_err(|e| corrupt(id, &e))?;

        AccessGroup::restore(
            GroupId(id),
            &self.name,
            self.description,
            read_access,
            write_access,
            ip_ranges,
        )
        .map_err(|e| corrupt(id, &e))
    }
}

fn attach_objects(groups: &mut BTreeMap<GroupId, AccessGroup>, rows: Vec<ObjectRow>) {
    for row in rows {
        let Ok(object_type) = row.object_type.parse::<ObjectType>() else {
            tracing::warn!(
                group_id = row.group_id,
                object_type = %row.object_type,
                "Skipping association with unknown object type"
            );
            continue;
        };
        if let Some(group) = groups.get_mut(&GroupId(row.group_id)) {
            group.add_object(object_type, row.object_id);
        }
    }
}

/// Group store backed by `PostgreSQL`.
#[derive(Debug, Clone)]
pub struct PgGroupStore {
    pool: PgPool,
}

impl PgGroupStore {
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Read-only transaction in which every statement sees the same
    /// committed state.
    async fn begin_read(&self) -> AccessResult<Transaction<'static, Postgres>> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await?;
        Ok(tx)
    }

    async fn upsert_group(
        tx: &mut Transaction<'_, Postgres>,
        group: &AccessGroup,
    ) -> sqlx::Result<i64> {
        let ip_range = group.ip_ranges_string();

        let (id,): (i64,) = match group.id() {
            None => {
                sqlx::query_as(
                    r"
                    INSERT INTO access_groups (name, description, read_access, write_access, ip_range)
                    VALUES ($1, $2, $3, $4, $5)
                    RETURNING id
                    ",
                )
                .bind(group.name())
                .bind(group.description())
                .bind(group.read_access().as_str())
                .bind(group.write_access().as_str())
                .bind(&ip_range)
                .fetch_one(&mut **tx)
                .await?
            }
            Some(id) => {
                sqlx::query_as(
                    r"
                    INSERT INTO access_groups (id, name, description, read_access, write_access, ip_range)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    ON CONFLICT (id) DO UPDATE
                    SET name = EXCLUDED.name,
                        description = EXCLUDED.description,
                        read_access = EXCLUDED.read_access,
                        write_access = EXCLUDED.write_access,
                        ip_range = EXCLUDED.ip_range,
                        updated_at = NOW()
                    RETURNING id
                    ",
                )
                .bind(id.0)
                .bind(group.name())
                .bind(group.description())
                .bind(group.read_access().as_str())
                .bind(group.write_access().as_str())
                .bind(&ip_range)
                .fetch_one(&mut **tx)
                .await?
            }
        };

        Ok(id)
    }

    async fn sync_objects(
        tx: &mut Transaction<'_, Postgres>,
        id: i64,
        group: &AccessGroup,
        object_type: ObjectType,
        replace: bool,
    ) -> sqlx::Result<()> {
        let ids: Vec<String> = group.objects_of_type(object_type).iter().cloned().collect();

        if replace {
            sqlx::query(
                r"
                DELETE FROM access_group_objects
                WHERE group_id = $1 AND object_type = $2 AND object_id <> ALL($3)
                ",
            )
            .bind(id)
            .bind(object_type.as_str())
            .bind(&ids)
            .execute(&mut **tx)
            .await?;
        }

        if !ids.is_empty() {
            sqlx::query(
                r"
                INSERT INTO access_group_objects (group_id, object_type, object_id)
                SELECT $1, $2, UNNEST($3::text[])
                ON CONFLICT DO NOTHING
                ",
            )
            .bind(id)
            .bind(object_type.as_str())
            .bind(&ids)
            .execute(&mut **tx)
            .await?;
        }

        Ok(())
    }
}

#[async_trait]
impl GroupStore for PgGroupStore {
    #[tracing::instrument(skip(self))]
    async fn list_groups(&self) -> AccessResult<Vec<AccessGroup>> {
        let mut tx = self.begin_read().await?;

        let rows: Vec<GroupRow> = sqlx::query_as(
            r"
            SELECT id, name, description, read_access, write_access, ip_range
            FROM access_groups
            ORDER BY id ASC
            ",
        )
        .fetch_all(&mut *tx)
        .await?;

        let objects: Vec<ObjectRow> = sqlx::query_as(
            "SELECT group_id, object_type, object_id FROM access_group_objects",
        )
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        let mut groups = rows
            .into_iter()
            .map(|row| {
                let id = GroupId(row.id);
                row.into_group().map(|group| (id, group))
            })
            .collect::<AccessResult<BTreeMap<_, _>>>()?;
        attach_objects(&mut groups, objects);

        Ok(groups.into_values().collect())
    }

    #[tracing::instrument(skip(self))]
    async fn get_group(&self, id: GroupId) -> AccessResult<Option<AccessGroup>> {
        let mut tx = self.begin_read().await?;

        let row: Option<GroupRow> = sqlx::query_as(
            r"
            SELECT id, name, description, read_access, write_access, ip_range
            FROM access_groups
            WHERE id = $1
            ",
        )
        .bind(id.0)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.commit().await?;
            return Ok(None);
        };

        let mut groups = BTreeMap::from([(id, row.into_group()?)]);
        let objects: Vec<ObjectRow> = sqlx::query_as(
            "SELECT group_id, object_type, object_id FROM access_group_objects WHERE group_id = $1",
        )
        .bind(id.0)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;
        attach_objects(&mut groups, objects);

        Ok(groups.remove(&id))
    }

    #[tracing::instrument(skip(self, group), fields(group = %group.name()))]
    async fn save_group(
        &self,
        group: &AccessGroup,
        remove_old_assignments: bool,
    ) -> AccessResult<GroupId> {
        let mut tx = self.pool.begin().await?;

        let id = Self::upsert_group(&mut tx, group).await?;
        for object_type in ObjectType::ALL {
            let replace =
                remove_old_assignments || group.pending_clears().contains(&object_type);
            Self::sync_objects(&mut tx, id, group, object_type, replace).await?;
        }

        tx.commit().await?;
        Ok(GroupId(id))
    }

    #[tracing::instrument(skip(self))]
    async fn delete_group(&self, id: GroupId) -> AccessResult<bool> {
        // Associations go with the group (ON DELETE CASCADE)
        let result = sqlx::query("DELETE FROM access_groups WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip(self))]
    async fn clear_objects(&self, id: GroupId, object_type: ObjectType) -> AccessResult<()> {
        let mut tx = self.pool.begin().await?;

        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM access_groups WHERE id = $1)")
                .bind(id.0)
                .fetch_one(&mut *tx)
                .await?;
        if !exists {
            return Err(AccessError::NotFound(format!("access group {id}")));
        }

        sqlx::query("DELETE FROM access_group_objects WHERE group_id = $1 AND object_type = $2")
            .bind(id.0)
            .bind(object_type.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}
