//! Contexts: the named scopes role assignments are evaluated in.
//!
//! The Global Context has no row here; it is the `null` context id on the
//! assignment tables.

use crate::{
    Ctx,
    error,
    model::{Context, Key},
    prelude::*,
};


/// Handler for contexts.
pub struct Contexts<'a> {
    pub(crate) ctx: &'a Ctx,
}

impl Contexts<'_> {
    pub async fn create(&self, name: &str) -> Result<Context> {
        if name.trim().is_empty() {
            return Err(Error::Validation("context name must not be empty".into()));
        }

        let db = self.ctx.db().await?;
        let row = db.query_one(
            &format!(
                "insert into role_manager_contexts (name) values ($1) returning {}",
                Context::COLS,
            ),
            &[&name],
        ).await.map_err(|e| match error::unique_violation(&e) {
            Some(_) => Error::Conflict(format!("a context named '{name}' already exists")),
            None => e.into(),
        })?;

        info!("Created context '{name}'");
        Ok(Context::from_row(&row))
    }

    pub async fn by_id(&self, id: Key) -> Result<Context> {
        let db = self.ctx.db().await?;
        let row = db.query_opt(
            &format!("select {} from role_manager_contexts where id = $1", Context::COLS),
            &[&id],
        ).await?;
        row.map(|row| Context::from_row(&row))
            .ok_or_else(|| Error::NotFound(format!("no context with id {id}")))
    }

    pub async fn by_name(&self, name: &str) -> Result<Context> {
        let db = self.ctx.db().await?;
        let row = db.query_opt(
            &format!("select {} from role_manager_contexts where name = $1", Context::COLS),
            &[&name],
        ).await?;
        row.map(|row| Context::from_row(&row))
            .ok_or_else(|| Error::NotFound(format!("no context named '{name}'")))
    }

    pub async fn list(&self) -> Result<Vec<Context>> {
        let db = self.ctx.db().await?;
        let rows = db.query(
            &format!("select {} from role_manager_contexts order by name", Context::COLS),
            &[],
        ).await?;
        Ok(rows.iter().map(Context::from_row).collect())
    }

    pub async fn rename(&self, id: Key, name: &str) -> Result<Context> {
        if name.trim().is_empty() {
            return Err(Error::Validation("context name must not be empty".into()));
        }

        let db = self.ctx.db().await?;
        let row = db.query_opt(
            &format!(
                "update role_manager_contexts set name = $2 where id = $1 returning {}",
                Context::COLS,
            ),
            &[&id, &name],
        ).await.map_err(|e| match error::unique_violation(&e) {
            Some(_) => Error::Conflict(format!("a context named '{name}' already exists")),
            None => e.into(),
        })?;

        row.map(|row| Context::from_row(&row))
            .ok_or_else(|| Error::NotFound(format!("no context with id {id}")))
    }

    /// Deletes a context. Refused while any assignment references it.
    pub async fn delete(&self, id: Key) -> Result<()> {
        let context = self.by_id(id).await?;
        let db = self.ctx.db().await?;

        let in_use: bool = db.query_one(
            "select \
                exists(select 1 from role_manager_user_context_roles where context_id = $1) \
                or exists(select 1 from role_manager_group_context_roles where context_id = $1)",
            &[&id],
        ).await?.get(0);
        if in_use {
            return Err(Error::Dependency(format!(
                "context '{}' is still used by assignments and cannot be deleted",
                context.name,
            )));
        }

        db.execute("delete from role_manager_contexts where id = $1", &[&id])
            .await
            .map_err(|e| match error::foreign_key_violation(&e) {
                Some(_) => Error::Dependency(format!(
                    "context '{}' is still used by assignments and cannot be deleted",
                    context.name,
                )),
                None => e.into(),
            })?;

        info!("Deleted context '{}'", context.name);
        Ok(())
    }
}
