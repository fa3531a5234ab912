//! Rights: the atomic permissions roles are made of.

use postgres_types::ToSql;

use crate::{
    Ctx,
    db::Transaction,
    error,
    model::{Key, Right, RightType},
    prelude::*,
    version,
};


/// Handler for rights.
pub struct Rights<'a> {
    pub(crate) ctx: &'a Ctx,
}

/// Data for creating a new right. `range` must be set iff `right_type` is
/// [`RightType::Range`].
#[derive(Debug, Clone)]
pub struct NewRight {
    pub name: String,
    pub rightgroup: Key,
    pub right_type: RightType,
    pub range: Option<Key>,
}

/// Partial update. The type of a right is immutable; relinking the range is
/// only possible for range rights.
#[derive(Debug, Clone, Default)]
pub struct RightUpdate {
    pub name: Option<String>,
    pub rightgroup: Option<Key>,
    pub range: Option<Key>,
}

impl Rights<'_> {
    pub async fn create(&self, new: NewRight) -> Result<Right> {
        if new.name.trim().is_empty() {
            return Err(Error::Validation("right name must not be empty".into()));
        }
        match (new.right_type, new.range) {
            (RightType::Boolean, Some(_)) => {
                return Err(Error::Validation(
                    "a boolean right cannot reference a range".into(),
                ));
            }
            (RightType::Range, None) => {
                return Err(Error::Validation(
                    "a range right requires a range id".into(),
                ));
            }
            _ => {}
        }

        let db = self.ctx.db().await?;
        let row = db.query_one(
            &format!(
                "insert into role_manager_rights \
                    (name, rightgroup_id, right_type, righttype_range_id) \
                    values ($1, $2, $3, $4) \
                    returning {}",
                Right::COLS,
            ),
            &[&new.name, &new.rightgroup, &new.right_type, &new.range],
        ).await.map_err(|e| {
            if error::unique_violation(&e).is_some() {
                Error::Conflict(format!("a right named '{}' already exists", new.name))
            } else if error::foreign_key_violation(&e).is_some() {
                Error::NotFound("right group or range does not exist".into())
            } else {
                e.into()
            }
        })?;

        info!("Created right '{}'", new.name);
        Ok(Right::from_row(&row))
    }

    pub async fn by_id(&self, id: Key) -> Result<Right> {
        let db = self.ctx.db().await?;
        let row = db.query_opt(
            &format!("select {} from role_manager_rights where id = $1", Right::COLS),
            &[&id],
        ).await?;
        row.map(|row| Right::from_row(&row))
            .ok_or_else(|| Error::NotFound(format!("no right with id {id}")))
    }

    pub async fn by_name(&self, name: &str) -> Result<Right> {
        let db = self.ctx.db().await?;
        let row = db.query_opt(
            &format!("select {} from role_manager_rights where name = $1", Right::COLS),
            &[&name],
        ).await?;
        row.map(|row| Right::from_row(&row))
            .ok_or_else(|| Error::NotFound(format!("no right named '{name}'")))
    }

    pub async fn list(&self) -> Result<Vec<Right>> {
        let db = self.ctx.db().await?;
        let rows = db.query(
            &format!("select {} from role_manager_rights order by name", Right::COLS),
            &[],
        ).await?;
        Ok(rows.iter().map(Right::from_row).collect())
    }

    /// Applies a partial update. Renames and range relinks change what
    /// existing role grants mean, so the permissions version is bumped.
    pub async fn update(&self, id: Key, update: RightUpdate) -> Result<Right> {
        if let Some(name) = &update.name {
            if name.trim().is_empty() {
                return Err(Error::Validation("right name must not be empty".into()));
            }
        }
        if update.range.is_some() {
            let current = self.by_id(id).await?;
            if current.right_type == RightType::Boolean {
                return Err(Error::Validation(format!(
                    "right '{}' is boolean and cannot reference a range",
                    current.name,
                )));
            }
        }

        let mut assignments = Vec::new();
        let mut params: Vec<&(dyn ToSql + Sync)> = vec![&id];
        if let Some(name) = &update.name {
            params.push(name);
            assignments.push(format!("name = ${}", params.len()));
        }
        if let Some(rightgroup) = &update.rightgroup {
            params.push(rightgroup);
            assignments.push(format!("rightgroup_id = ${}", params.len()));
        }
        if let Some(range) = &update.range {
            params.push(range);
            assignments.push(format!("righttype_range_id = ${}", params.len()));
        }
        if assignments.is_empty() {
            return self.by_id(id).await;
        }

        let mut db = self.ctx.db().await?;
        let tx = Transaction::begin(&mut db).await?;

        let row = tx.query_opt(
            &format!(
                "update role_manager_rights set {} where id = $1 returning {}",
                assignments.join(", "),
                Right::COLS,
            ),
            &params,
        ).await.map_err(|e| {
            if error::unique_violation(&e).is_some() {
                Error::Conflict("another right already uses this name".into())
            } else if error::foreign_key_violation(&e).is_some() {
                Error::NotFound("right group or range does not exist".into())
            } else if error::check_violation(&e).is_some() {
                Error::Validation("range link does not match the right's type".into())
            } else {
                e.into()
            }
        })?;
        let row = row.ok_or_else(|| Error::NotFound(format!("no right with id {id}")))?;

        version::bump(&tx).await?;
        tx.commit().await?;
        Ok(Right::from_row(&row))
    }

    /// Deletes a right. Refused while any role still grants it.
    pub async fn delete(&self, id: Key) -> Result<()> {
        let right = self.by_id(id).await?;

        let mut db = self.ctx.db().await?;
        let tx = Transaction::begin(&mut db).await?;

        let in_use: bool = tx.query_one(
            "select exists(select 1 from role_manager_role_rights where right_id = $1)",
            &[&id],
        ).await?.get(0);
        if in_use {
            return Err(Error::Dependency(format!(
                "right '{}' is still granted by roles and cannot be deleted",
                right.name,
            )));
        }

        tx.execute("delete from role_manager_rights where id = $1", &[&id])
            .await
            .map_err(|e| match error::foreign_key_violation(&e) {
                Some(_) => Error::Dependency(format!(
                    "right '{}' is still granted by roles and cannot be deleted",
                    right.name,
                )),
                None => e.into(),
            })?;

        version::bump(&tx).await?;
        tx.commit().await?;

        info!("Deleted right '{}'", right.name);
        Ok(())
    }
}
