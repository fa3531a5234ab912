//! Creating the database schema.

use std::collections::HashSet;
use std::time::Duration;

use tokio_postgres::error::SqlState;

use crate::prelude::*;

use super::{Db, Transaction, util::dbargs};


/// All tables the engine owns.
const TABLES: &[&str] = &[
    "role_manager_users",
    "role_manager_groups",
    "role_manager_user_groups",
    "role_manager_group_subgroups",
    "role_manager_rightgroups",
    "role_manager_righttype_ranges",
    "role_manager_rights",
    "role_manager_roles",
    "role_manager_role_rights",
    "role_manager_contexts",
    "role_manager_user_context_roles",
    "role_manager_group_context_roles",
    "role_manager_logs",
    "role_manager_config",
];

/// Makes sure the schema exists, creating it if the database holds none of
/// our tables yet.
///
/// The whole check-then-create runs in one serializable transaction, so when
/// several nodes start up against the same database at once, exactly one of
/// them creates the schema. Serializable transactions can fail when
/// committing, which is why everything is wrapped in a retry loop: a node
/// losing the race is expected to observe the finished schema on its next
/// attempt.
pub(crate) async fn setup(db: &mut Db) -> Result<()> {
    loop {
        let tx = Transaction::begin_serializable(db).await?;

        let existing = existing_tables(&tx).await?;
        if existing.is_empty() {
            info!("Database holds no role manager tables: creating schema");
            tx.batch_execute(crate::SCHEMA).await?;
        } else if TABLES.iter().all(|t| existing.contains(*t)) {
            debug!("Role manager schema already exists");
        } else {
            let missing = TABLES.iter()
                .filter(|t| !existing.contains(**t))
                .copied()
                .collect::<Vec<_>>();
            return Err(Error::Setup(format!(
                "database contains some but not all of the expected tables \
                    (missing: {}); refusing to touch it",
                missing.join(", "),
            )));
        }

        match tx.commit().await {
            Ok(()) => return Ok(()),
            Err(e) if e.code() == Some(&SqlState::T_R_SERIALIZATION_FAILURE) => {
                let backoff_duration = Duration::from_millis(500);
                warn!(
                    "Schema setup transaction failed to commit. This is likely because \
                        of another node which has executed the same transaction concurrently. \
                        Will try again in {:?}.",
                    backoff_duration,
                );
                tokio::time::sleep(backoff_duration).await;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Returns the names of all our tables that exist in the `public` schema.
async fn existing_tables(tx: &Transaction<'_>) -> Result<HashSet<String>> {
    let names = tx.query_mapped(
        "select table_name from information_schema.tables \
            where table_schema = 'public' and table_name like 'role\\_manager\\_%'",
        dbargs![],
        |row| row.get::<_, String>(0),
    ).await?;

    Ok(names.into_iter().collect())
}
