//! Ranges for range-typed rights: named `[min, max]` intervals with two
//! decimal places.

use postgres_types::ToSql;
use rust_decimal::Decimal;

use crate::{
    Ctx,
    error,
    model::{Key, RightTypeRange},
    prelude::*,
};


/// Handler for right type ranges.
pub struct RightTypes<'a> {
    pub(crate) ctx: &'a Ctx,
}

/// Data for creating a new range.
#[derive(Debug, Clone)]
pub struct NewRange {
    pub name: String,
    pub min_value: Decimal,
    pub max_value: Decimal,
}

/// Partial update. Fields that are `None` are left untouched; the resulting
/// bounds still have to satisfy `min <= max`.
#[derive(Debug, Clone, Default)]
pub struct RangeUpdate {
    pub name: Option<String>,
    pub min_value: Option<Decimal>,
    pub max_value: Option<Decimal>,
}

fn validate_bounds(min: Decimal, max: Decimal) -> Result<()> {
    if min > max {
        return Err(Error::Validation(format!(
            "invalid range: min {min:.2} exceeds max {max:.2}",
        )));
    }
    Ok(())
}

impl RightTypes<'_> {
    pub async fn create(&self, new: NewRange) -> Result<RightTypeRange> {
        if new.name.trim().is_empty() {
            return Err(Error::Validation("range name must not be empty".into()));
        }
        validate_bounds(new.min_value, new.max_value)?;

        let db = self.ctx.db().await?;
        let row = db.query_one(
            &format!(
                "insert into role_manager_righttype_ranges (name, min_value, max_value) \
                    values ($1, $2, $3) returning {}",
                RightTypeRange::COLS,
            ),
            &[&new.name, &new.min_value, &new.max_value],
        ).await.map_err(|e| match error::unique_violation(&e) {
            Some(_) => Error::Conflict(format!("a range named '{}' already exists", new.name)),
            None => e.into(),
        })?;

        info!("Created right type range '{}'", new.name);
        Ok(RightTypeRange::from_row(&row))
    }

    pub async fn by_id(&self, id: Key) -> Result<RightTypeRange> {
        let db = self.ctx.db().await?;
        let row = db.query_opt(
            &format!(
                "select {} from role_manager_righttype_ranges where id = $1",
                RightTypeRange::COLS,
            ),
            &[&id],
        ).await?;
        row.map(|row| RightTypeRange::from_row(&row))
            .ok_or_else(|| Error::NotFound(format!("no right type range with id {id}")))
    }

    pub async fn by_name(&self, name: &str) -> Result<RightTypeRange> {
        let db = self.ctx.db().await?;
        let row = db.query_opt(
            &format!(
                "select {} from role_manager_righttype_ranges where name = $1",
                RightTypeRange::COLS,
            ),
            &[&name],
        ).await?;
        row.map(|row| RightTypeRange::from_row(&row))
            .ok_or_else(|| Error::NotFound(format!("no right type range named '{name}'")))
    }

    pub async fn list(&self) -> Result<Vec<RightTypeRange>> {
        let db = self.ctx.db().await?;
        let rows = db.query(
            &format!(
                "select {} from role_manager_righttype_ranges order by name",
                RightTypeRange::COLS,
            ),
            &[],
        ).await?;
        Ok(rows.iter().map(RightTypeRange::from_row).collect())
    }

    pub async fn update(&self, id: Key, update: RangeUpdate) -> Result<RightTypeRange> {
        if let Some(name) = &update.name {
            if name.trim().is_empty() {
                return Err(Error::Validation("range name must not be empty".into()));
            }
        }

        let current = self.by_id(id).await?;
        let min = update.min_value.unwrap_or(current.min_value);
        let max = update.max_value.unwrap_or(current.max_value);
        validate_bounds(min, max)?;

        let mut assignments = Vec::new();
        let mut params: Vec<&(dyn ToSql + Sync)> = vec![&id];
        if let Some(name) = &update.name {
            params.push(name);
            assignments.push(format!("name = ${}", params.len()));
        }
        if let Some(min_value) = &update.min_value {
            params.push(min_value);
            assignments.push(format!("min_value = ${}", params.len()));
        }
        if let Some(max_value) = &update.max_value {
            params.push(max_value);
            assignments.push(format!("max_value = ${}", params.len()));
        }
        if assignments.is_empty() {
            return Ok(current);
        }

        let db = self.ctx.db().await?;
        let row = db.query_opt(
            &format!(
                "update role_manager_righttype_ranges set {} where id = $1 returning {}",
                assignments.join(", "),
                RightTypeRange::COLS,
            ),
            &params,
        ).await.map_err(|e| match error::unique_violation(&e) {
            Some(_) => Error::Conflict("another range already uses this name".into()),
            None => e.into(),
        })?;

        row.map(|row| RightTypeRange::from_row(&row))
            .ok_or_else(|| Error::NotFound(format!("no right type range with id {id}")))
    }

    /// Deletes a range. Refused while any right references it.
    pub async fn delete(&self, id: Key) -> Result<()> {
        let range = self.by_id(id).await?;
        let db = self.ctx.db().await?;

        let in_use: bool = db.query_one(
            "select exists(select 1 from role_manager_rights where righttype_range_id = $1)",
            &[&id],
        ).await?.get(0);
        if in_use {
            return Err(Error::Dependency(format!(
                "range '{}' is still referenced by rights and cannot be deleted",
                range.name,
            )));
        }

        db.execute("delete from role_manager_righttype_ranges where id = $1", &[&id])
            .await
            .map_err(|e| match error::foreign_key_violation(&e) {
                Some(_) => Error::Dependency(format!(
                    "range '{}' is still referenced by rights and cannot be deleted",
                    range.name,
                )),
                None => e.into(),
            })?;

        info!("Deleted right type range '{}'", range.name);
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::validate_bounds;

    #[test]
    fn equal_bounds_are_allowed() {
        assert!(validate_bounds(dec!(5), dec!(5)).is_ok());
        assert!(validate_bounds(dec!(0), dec!(10000)).is_ok());
    }

    #[test]
    fn inverted_bounds_are_rejected_with_both_values() {
        let error = validate_bounds(dec!(10.5), dec!(10.49)).unwrap_err();
        assert_eq!(
            error.to_string(),
            "invalid range: min 10.50 exceeds max 10.49",
        );
    }
}
