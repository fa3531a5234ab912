//! Roles and the rights they grant.

use rust_decimal::Decimal;
use tokio_postgres::Row;

use crate::{
    Ctx,
    db::Transaction,
    error,
    model::{Key, RightType, Role},
    prelude::*,
    version,
};


/// Handler for roles.
pub struct Roles<'a> {
    pub(crate) ctx: &'a Ctx,
}

/// One right granted by a role, as listed by [`Roles::rights_of`].
#[derive(Debug, Clone, PartialEq)]
pub struct RoleGrant {
    pub right: String,
    pub right_type: RightType,
    pub range_value: Option<Decimal>,
}

impl RoleGrant {
    fn from_row(row: &Row) -> Self {
        Self {
            right: row.get("name"),
            right_type: row.get("right_type"),
            range_value: row.get("range_value"),
        }
    }
}

/// The message for a range value outside its right's bounds. Callers surface
/// it verbatim, so it names the offending value and the interval, both with
/// two decimal places.
fn out_of_range_message(right: &str, value: Decimal, min: Decimal, max: Decimal) -> String {
    format!(
        "value {value:.2} for right '{right}' is outside the allowed range [{min:.2}, {max:.2}]",
    )
}

/// Both bounds are part of the allowed interval.
fn within_bounds(value: Decimal, min: Decimal, max: Decimal) -> bool {
    value >= min && value <= max
}

impl Roles<'_> {
    pub async fn create(&self, name: &str) -> Result<Role> {
        if name.trim().is_empty() {
            return Err(Error::Validation("role name must not be empty".into()));
        }

        let mut db = self.ctx.db().await?;
        let tx = Transaction::begin(&mut db).await?;

        let row = tx.query_one(
            &format!("insert into role_manager_roles (name) values ($1) returning {}", Role::COLS),
            &[&name],
        ).await.map_err(|e| match error::unique_violation(&e) {
            Some(_) => Error::Conflict(format!("a role named '{name}' already exists")),
            None => e.into(),
        })?;

        version::bump(&tx).await?;
        tx.commit().await?;

        info!("Created role '{name}'");
        Ok(Role::from_row(&row))
    }

    pub async fn by_id(&self, id: Key) -> Result<Role> {
        let db = self.ctx.db().await?;
        let row = db.query_opt(
            &format!("select {} from role_manager_roles where id = $1", Role::COLS),
            &[&id],
        ).await?;
        row.map(|row| Role::from_row(&row))
            .ok_or_else(|| Error::NotFound(format!("no role with id {id}")))
    }

    pub async fn by_name(&self, name: &str) -> Result<Role> {
        let db = self.ctx.db().await?;
        let row = db.query_opt(
            &format!("select {} from role_manager_roles where name = $1", Role::COLS),
            &[&name],
        ).await?;
        row.map(|row| Role::from_row(&row))
            .ok_or_else(|| Error::NotFound(format!("no role named '{name}'")))
    }

    pub async fn list(&self) -> Result<Vec<Role>> {
        let db = self.ctx.db().await?;
        let rows = db.query(
            &format!("select {} from role_manager_roles order by name", Role::COLS),
            &[],
        ).await?;
        Ok(rows.iter().map(Role::from_row).collect())
    }

    pub async fn rename(&self, id: Key, name: &str) -> Result<Role> {
        if name.trim().is_empty() {
            return Err(Error::Validation("role name must not be empty".into()));
        }

        let mut db = self.ctx.db().await?;
        let tx = Transaction::begin(&mut db).await?;

        let row = tx.query_opt(
            &format!(
                "update role_manager_roles set name = $2 where id = $1 returning {}",
                Role::COLS,
            ),
            &[&id, &name],
        ).await.map_err(|e| match error::unique_violation(&e) {
            Some(_) => Error::Conflict(format!("a role named '{name}' already exists")),
            None => e.into(),
        })?;
        let row = row.ok_or_else(|| Error::NotFound(format!("no role with id {id}")))?;

        version::bump(&tx).await?;
        tx.commit().await?;
        Ok(Role::from_row(&row))
    }

    /// Deletes a role. Refused while any user or group assignment still
    /// references it.
    pub async fn delete(&self, id: Key) -> Result<()> {
        let role = self.by_id(id).await?;

        let mut db = self.ctx.db().await?;
        let tx = Transaction::begin(&mut db).await?;

        let assigned: bool = tx.query_one(
            "select \
                exists(select 1 from role_manager_user_context_roles where role_id = $1) \
                or exists(select 1 from role_manager_group_context_roles where role_id = $1)",
            &[&id],
        ).await?.get(0);
        if assigned {
            return Err(Error::Dependency(format!(
                "role '{}' is still assigned and cannot be deleted",
                role.name,
            )));
        }

        tx.execute("delete from role_manager_roles where id = $1", &[&id])
            .await
            .map_err(|e| match error::foreign_key_violation(&e) {
                Some(_) => Error::Dependency(format!(
                    "role '{}' is still assigned and cannot be deleted",
                    role.name,
                )),
                None => e.into(),
            })?;

        version::bump(&tx).await?;
        tx.commit().await?;

        info!("Deleted role '{}'", role.name);
        Ok(())
    }

    /// Adds a right to the role. Boolean rights take no value; range rights
    /// require one within the bounds of their range.
    pub async fn add_right(
        &self,
        role: Key,
        right: Key,
        value: Option<Decimal>,
    ) -> Result<()> {
        let mut db = self.ctx.db().await?;
        let tx = Transaction::begin(&mut db).await?;

        let row = tx.query_opt(
            "select ri.name, ri.right_type, rt.min_value, rt.max_value \
                from role_manager_rights ri \
                left join role_manager_righttype_ranges rt on rt.id = ri.righttype_range_id \
                where ri.id = $1",
            &[&right],
        ).await?.ok_or_else(|| Error::NotFound(format!("no right with id {right}")))?;
        let right_name: String = row.get("name");

        match (row.get("right_type"), value) {
            (RightType::Boolean, Some(_)) => {
                return Err(Error::Validation(format!(
                    "right '{right_name}' is boolean and does not take a range value",
                )));
            }
            (RightType::Boolean, None) => {}
            (RightType::Range, None) => {
                return Err(Error::Validation(format!(
                    "right '{right_name}' requires a range value",
                )));
            }
            (RightType::Range, Some(value)) => {
                let min: Decimal = row.get("min_value");
                let max: Decimal = row.get("max_value");
                if !within_bounds(value, min, max) {
                    return Err(Error::Validation(
                        out_of_range_message(&right_name, value, min, max),
                    ));
                }
            }
        }

        tx.execute(
            "insert into role_manager_role_rights (role_id, right_id, range_value) \
                values ($1, $2, $3)",
            &[&role, &right, &value],
        ).await.map_err(|e| {
            if error::unique_violation(&e).is_some() {
                Error::Conflict(format!("role {role} already grants right '{right_name}'"))
            } else if error::foreign_key_violation(&e).is_some() {
                Error::NotFound(format!("no role with id {role}"))
            } else {
                e.into()
            }
        })?;

        version::bump(&tx).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn remove_right(&self, role: Key, right: Key) -> Result<()> {
        let mut db = self.ctx.db().await?;
        let tx = Transaction::begin(&mut db).await?;

        let affected = tx.execute(
            "delete from role_manager_role_rights where role_id = $1 and right_id = $2",
            &[&role, &right],
        ).await?;
        if affected == 0 {
            return Err(Error::NotFound(format!(
                "role {role} does not grant right {right}",
            )));
        }

        version::bump(&tx).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Lists the rights a role grants.
    pub async fn rights_of(&self, role: Key) -> Result<Vec<RoleGrant>> {
        let db = self.ctx.db().await?;
        let rows = db.query(
            "select ri.name, ri.right_type, rr.range_value \
                from role_manager_role_rights rr \
                join role_manager_rights ri on ri.id = rr.right_id \
                where rr.role_id = $1 \
                order by ri.name",
            &[&role],
        ).await?;
        Ok(rows.iter().map(RoleGrant::from_row).collect())
    }
}


#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::{out_of_range_message, within_bounds};

    #[test]
    fn bounds_are_inclusive() {
        assert!(within_bounds(dec!(0), dec!(0), dec!(10000)));
        assert!(within_bounds(dec!(10000), dec!(0), dec!(10000)));
        assert!(!within_bounds(dec!(-0.01), dec!(0), dec!(10000)));
        assert!(!within_bounds(dec!(10000.01), dec!(0), dec!(10000)));
    }

    #[test]
    fn bounds_message_quotes_value_and_interval_with_two_decimals() {
        assert_eq!(
            out_of_range_message("approve_budget", dec!(10000.01), dec!(0), dec!(10000)),
            "value 10000.01 for right 'approve_budget' is outside the allowed range [0.00, 10000.00]",
        );
        assert_eq!(
            out_of_range_message("discount", dec!(-0.5), dec!(0.25), dec!(99.9)),
            "value -0.50 for right 'discount' is outside the allowed range [0.25, 99.90]",
        );
    }
}
