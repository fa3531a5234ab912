//! The global permissions version counter.
//!
//! A single persisted integer whose value stamps every cache entry. Any
//! write that can change a permission outcome increments it in the same
//! transaction as the write itself, which renders all existing cache
//! entries stale at once.

use tokio_postgres::GenericClient;

use crate::prelude::*;


const KEY: &str = "permissions_version";

/// Reads the current counter value.
pub(crate) async fn current(db: &impl GenericClient) -> Result<i64> {
    let row = db.query_one(
        "select value from role_manager_config where key = $1",
        &[&KEY],
    ).await?;
    Ok(row.get(0))
}

/// Atomically increments the counter and returns the new value. Callers must
/// run this on the same transaction as the mutation it accounts for.
pub(crate) async fn bump(tx: &crate::db::Transaction<'_>) -> Result<i64> {
    let row = tx.query_one(
        "update role_manager_config set value = value + 1 where key = $1 returning value",
        &[&KEY],
    ).await?;
    let value: i64 = row.get(0);
    trace!("Bumped permissions version to {value}");
    Ok(value)
}
