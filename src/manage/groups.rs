//! Groups: membership, the subgroup DAG and role assignment.

use std::time::Duration;

use postgres_types::ToSql;
use tokio_postgres::error::SqlState;

use crate::{
    Ctx,
    db::Transaction,
    error,
    model::{Group, Key},
    prelude::*,
    version,
};


/// Handler for groups.
pub struct Groups<'a> {
    pub(crate) ctx: &'a Ctx,
}

/// Data for creating a new group.
#[derive(Debug, Clone)]
pub struct NewGroup {
    pub name: String,
    pub description: Option<String>,
}

/// Partial update. Fields that are `None` are left untouched.
#[derive(Debug, Clone, Default)]
pub struct GroupUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Walks upward from `$1` along subgroup edges and checks whether `$2` is
/// among the ancestors.
const REACHES_UPWARD: &str = "\
    with recursive ancestors(id) as (\
        select parent_group_id from role_manager_group_subgroups \
            where child_group_id = $1 \
        union \
        select s.parent_group_id from role_manager_group_subgroups s \
            join ancestors a on s.child_group_id = a.id\
    ) \
    select exists(select 1 from ancestors where id = $2)";

impl Groups<'_> {
    pub async fn create(&self, new: NewGroup) -> Result<Group> {
        if new.name.trim().is_empty() {
            return Err(Error::Validation("group name must not be empty".into()));
        }

        let db = self.ctx.db().await?;
        let row = db.query_one(
            &format!(
                "insert into role_manager_groups (name, description) \
                    values ($1, $2) returning {}",
                Group::COLS,
            ),
            &[&new.name, &new.description],
        ).await.map_err(|e| match error::unique_violation(&e) {
            Some(_) => Error::Conflict(format!("a group named '{}' already exists", new.name)),
            None => e.into(),
        })?;

        info!("Created group '{}'", new.name);
        Ok(Group::from_row(&row))
    }

    pub async fn by_id(&self, id: Key) -> Result<Group> {
        let db = self.ctx.db().await?;
        let row = db.query_opt(
            &format!("select {} from role_manager_groups where id = $1", Group::COLS),
            &[&id],
        ).await?;
        row.map(|row| Group::from_row(&row))
            .ok_or_else(|| Error::NotFound(format!("no group with id {id}")))
    }

    pub async fn by_name(&self, name: &str) -> Result<Group> {
        let db = self.ctx.db().await?;
        let row = db.query_opt(
            &format!("select {} from role_manager_groups where name = $1", Group::COLS),
            &[&name],
        ).await?;
        row.map(|row| Group::from_row(&row))
            .ok_or_else(|| Error::NotFound(format!("no group named '{name}'")))
    }

    pub async fn list(&self) -> Result<Vec<Group>> {
        let db = self.ctx.db().await?;
        let rows = db.query(
            &format!("select {} from role_manager_groups order by name", Group::COLS),
            &[],
        ).await?;
        Ok(rows.iter().map(Group::from_row).collect())
    }

    pub async fn update(&self, id: Key, update: GroupUpdate) -> Result<Group> {
        if let Some(name) = &update.name {
            if name.trim().is_empty() {
                return Err(Error::Validation("group name must not be empty".into()));
            }
        }

        let mut assignments = Vec::new();
        let mut params: Vec<&(dyn ToSql + Sync)> = vec![&id];
        if let Some(name) = &update.name {
            params.push(name);
            assignments.push(format!("name = ${}", params.len()));
        }
        if let Some(description) = &update.description {
            params.push(description);
            assignments.push(format!("description = ${}", params.len()));
        }
        if assignments.is_empty() {
            return self.by_id(id).await;
        }

        let db = self.ctx.db().await?;
        let row = db.query_opt(
            &format!(
                "update role_manager_groups set {} where id = $1 returning {}",
                assignments.join(", "),
                Group::COLS,
            ),
            &params,
        ).await.map_err(|e| match error::unique_violation(&e) {
            Some(_) => Error::Conflict("another group already uses this name".into()),
            None => e.into(),
        })?;

        row.map(|row| Group::from_row(&row))
            .ok_or_else(|| Error::NotFound(format!("no group with id {id}")))
    }

    /// Deletes a group. Refused while it still has members, subgroup edges
    /// in either direction, or role assignments.
    pub async fn delete(&self, id: Key) -> Result<()> {
        let group = self.by_id(id).await?;
        let db = self.ctx.db().await?;

        let in_use: (bool, bool, bool) = {
            let row = db.query_one(
                "select \
                    exists(select 1 from role_manager_user_groups where group_id = $1), \
                    exists(select 1 from role_manager_group_subgroups \
                        where parent_group_id = $1 or child_group_id = $1), \
                    exists(select 1 from role_manager_group_context_roles where group_id = $1)",
                &[&id],
            ).await?;
            (row.get(0), row.get(1), row.get(2))
        };
        let blocker = match in_use {
            (true, _, _) => Some("members"),
            (_, true, _) => Some("subgroup edges"),
            (_, _, true) => Some("role assignments"),
            _ => None,
        };
        if let Some(blocker) = blocker {
            return Err(Error::Dependency(format!(
                "group '{}' still has {blocker} and cannot be deleted",
                group.name,
            )));
        }

        db.execute("delete from role_manager_groups where id = $1", &[&id])
            .await
            .map_err(|e| match error::foreign_key_violation(&e) {
                Some(_) => Error::Dependency(format!(
                    "group '{}' is still referenced and cannot be deleted",
                    group.name,
                )),
                None => e.into(),
            })?;

        info!("Deleted group '{}'", group.name);
        Ok(())
    }

    /// Adds a user to the group.
    pub async fn add_member(&self, group: Key, user: Key) -> Result<()> {
        let mut db = self.ctx.db().await?;
        let tx = Transaction::begin(&mut db).await?;

        tx.execute(
            "insert into role_manager_user_groups (user_id, group_id) values ($1, $2)",
            &[&user, &group],
        ).await.map_err(|e| {
            if error::unique_violation(&e).is_some() {
                Error::Conflict(format!("user {user} is already a member of group {group}"))
            } else if error::foreign_key_violation(&e).is_some() {
                Error::NotFound("user or group does not exist".into())
            } else {
                e.into()
            }
        })?;

        version::bump(&tx).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn remove_member(&self, group: Key, user: Key) -> Result<()> {
        let mut db = self.ctx.db().await?;
        let tx = Transaction::begin(&mut db).await?;

        let affected = tx.execute(
            "delete from role_manager_user_groups where user_id = $1 and group_id = $2",
            &[&user, &group],
        ).await?;
        if affected == 0 {
            return Err(Error::NotFound(format!(
                "user {user} is not a member of group {group}",
            )));
        }

        version::bump(&tx).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Inserts the subgroup edge `parent ⊃ child`. Self-edges and edges that
    /// would close a cycle are refused. The cycle probe and the insert run
    /// in one serializable transaction so concurrent edge insertions cannot
    /// sneak a cycle past the check; commits that fall victim to the
    /// serialization conflict are retried.
    pub async fn add_subgroup(&self, parent: Key, child: Key) -> Result<()> {
        if parent == child {
            return Err(Error::Validation("a group cannot be its own subgroup".into()));
        }

        let parent_group = self.by_id(parent).await?;
        let child_group = self.by_id(child).await?;

        let mut db = self.ctx.db().await?;
        loop {
            let tx = Transaction::begin_serializable(&mut db).await?;

            // The new edge closes a cycle iff the parent is already below
            // the child, i.e. walking upward from the parent reaches the
            // child.
            let cycle: bool = tx.query_one(REACHES_UPWARD, &[&parent, &child])
                .await?
                .get(0);
            if cycle {
                return Err(Error::Validation(format!(
                    "making '{}' a subgroup of '{}' would create a cycle",
                    child_group.name, parent_group.name,
                )));
            }

            tx.execute(
                "insert into role_manager_group_subgroups (parent_group_id, child_group_id) \
                    values ($1, $2)",
                &[&parent, &child],
            ).await.map_err(|e| match error::unique_violation(&e) {
                Some(_) => Error::Conflict(format!(
                    "'{}' already is a subgroup of '{}'",
                    child_group.name, parent_group.name,
                )),
                None => e.into(),
            })?;

            version::bump(&tx).await?;

            match tx.commit().await {
                Ok(()) => {
                    info!("Added '{}' as subgroup of '{}'", child_group.name, parent_group.name);
                    return Ok(());
                }
                Err(e) if e.code() == Some(&SqlState::T_R_SERIALIZATION_FAILURE) => {
                    let backoff_duration = Duration::from_millis(500);
                    warn!(
                        "Subgroup insertion lost a serialization race, retrying in {:?}",
                        backoff_duration,
                    );
                    tokio::time::sleep(backoff_duration).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub async fn remove_subgroup(&self, parent: Key, child: Key) -> Result<()> {
        let mut db = self.ctx.db().await?;
        let tx = Transaction::begin(&mut db).await?;

        let affected = tx.execute(
            "delete from role_manager_group_subgroups \
                where parent_group_id = $1 and child_group_id = $2",
            &[&parent, &child],
        ).await?;
        if affected == 0 {
            return Err(Error::NotFound(format!(
                "group {child} is not a subgroup of group {parent}",
            )));
        }

        version::bump(&tx).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Assigns a role to the group, in a specific context or globally.
    pub async fn assign_role(
        &self,
        group: Key,
        role: Key,
        context: Option<Key>,
    ) -> Result<()> {
        let mut db = self.ctx.db().await?;
        let tx = Transaction::begin(&mut db).await?;

        tx.execute(
            "insert into role_manager_group_context_roles (group_id, context_id, role_id) \
                values ($1, $2, $3)",
            &[&group, &context, &role],
        ).await.map_err(|e| {
            if error::unique_violation(&e).is_some() {
                Error::Conflict(format!(
                    "group {group} already has role {role} in this context",
                ))
            } else if error::foreign_key_violation(&e).is_some() {
                Error::NotFound("group, role or context does not exist".into())
            } else {
                e.into()
            }
        })?;

        version::bump(&tx).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn unassign_role(
        &self,
        group: Key,
        role: Key,
        context: Option<Key>,
    ) -> Result<()> {
        let mut db = self.ctx.db().await?;
        let tx = Transaction::begin(&mut db).await?;

        let affected = tx.execute(
            "delete from role_manager_group_context_roles \
                where group_id = $1 and role_id = $2 and context_id is not distinct from $3",
            &[&group, &role, &context],
        ).await?;
        if affected == 0 {
            return Err(Error::NotFound(format!(
                "group {group} does not have role {role} in this context",
            )));
        }

        version::bump(&tx).await?;
        tx.commit().await?;
        Ok(())
    }
}
