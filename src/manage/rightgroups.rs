//! Right groups: the organisational buckets rights are sorted into.

use crate::{
    Ctx,
    error,
    model::{Key, RightGroup},
    prelude::*,
};


/// Handler for right groups.
pub struct RightGroups<'a> {
    pub(crate) ctx: &'a Ctx,
}

impl RightGroups<'_> {
    pub async fn create(&self, name: &str) -> Result<RightGroup> {
        if name.trim().is_empty() {
            return Err(Error::Validation("right group name must not be empty".into()));
        }

        let db = self.ctx.db().await?;
        let row = db.query_one(
            &format!(
                "insert into role_manager_rightgroups (name) values ($1) returning {}",
                RightGroup::COLS,
            ),
            &[&name],
        ).await.map_err(|e| match error::unique_violation(&e) {
            Some(_) => Error::Conflict(format!("a right group named '{name}' already exists")),
            None => e.into(),
        })?;

        info!("Created right group '{name}'");
        Ok(RightGroup::from_row(&row))
    }

    pub async fn by_id(&self, id: Key) -> Result<RightGroup> {
        let db = self.ctx.db().await?;
        let row = db.query_opt(
            &format!("select {} from role_manager_rightgroups where id = $1", RightGroup::COLS),
            &[&id],
        ).await?;
        row.map(|row| RightGroup::from_row(&row))
            .ok_or_else(|| Error::NotFound(format!("no right group with id {id}")))
    }

    pub async fn by_name(&self, name: &str) -> Result<RightGroup> {
        let db = self.ctx.db().await?;
        let row = db.query_opt(
            &format!("select {} from role_manager_rightgroups where name = $1", RightGroup::COLS),
            &[&name],
        ).await?;
        row.map(|row| RightGroup::from_row(&row))
            .ok_or_else(|| Error::NotFound(format!("no right group named '{name}'")))
    }

    pub async fn list(&self) -> Result<Vec<RightGroup>> {
        let db = self.ctx.db().await?;
        let rows = db.query(
            &format!("select {} from role_manager_rightgroups order by name", RightGroup::COLS),
            &[],
        ).await?;
        Ok(rows.iter().map(RightGroup::from_row).collect())
    }

    pub async fn rename(&self, id: Key, name: &str) -> Result<RightGroup> {
        if name.trim().is_empty() {
            return Err(Error::Validation("right group name must not be empty".into()));
        }

        let db = self.ctx.db().await?;
        let row = db.query_opt(
            &format!(
                "update role_manager_rightgroups set name = $2 where id = $1 returning {}",
                RightGroup::COLS,
            ),
            &[&id, &name],
        ).await.map_err(|e| match error::unique_violation(&e) {
            Some(_) => Error::Conflict(format!("a right group named '{name}' already exists")),
            None => e.into(),
        })?;

        row.map(|row| RightGroup::from_row(&row))
            .ok_or_else(|| Error::NotFound(format!("no right group with id {id}")))
    }

    /// Deletes a right group. Refused while any right references it.
    pub async fn delete(&self, id: Key) -> Result<()> {
        let rightgroup = self.by_id(id).await?;
        let db = self.ctx.db().await?;

        let in_use: bool = db.query_one(
            "select exists(select 1 from role_manager_rights where rightgroup_id = $1)",
            &[&id],
        ).await?.get(0);
        if in_use {
            return Err(Error::Dependency(format!(
                "right group '{}' still contains rights and cannot be deleted",
                rightgroup.name,
            )));
        }

        db.execute("delete from role_manager_rightgroups where id = $1", &[&id])
            .await
            .map_err(|e| match error::foreign_key_violation(&e) {
                Some(_) => Error::Dependency(format!(
                    "right group '{}' still contains rights and cannot be deleted",
                    rightgroup.name,
                )),
                None => e.into(),
            })?;

        info!("Deleted right group '{}'", rightgroup.name);
        Ok(())
    }
}
