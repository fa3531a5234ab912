//! The error surface of this crate.

use tokio_postgres::error::SqlState;


/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// All errors this crate surfaces to its callers.
///
/// The first four variants carry messages that are safe to show verbatim to
/// whoever issued the offending request; where values are involved, the
/// literal values are part of the message. The remaining variants are
/// infrastructure failures.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A request failed a semantic check: empty required field, malformed
    /// email, out-of-bounds range value, boolean/range mismatch, cyclic or
    /// self-referential subgroup edge.
    #[error("{0}")]
    Validation(String),

    /// A unique natural key or an assignment like it already exists.
    #[error("{0}")]
    Conflict(String),

    /// The entity is still referenced by other entities and cannot be
    /// deleted.
    #[error("{0}")]
    Dependency(String),

    /// A lookup by id or natural key found nothing.
    #[error("{0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    #[error("failed to get DB connection from pool: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    #[error("failed to create DB pool: {0}")]
    CreatePool(#[from] deadpool_postgres::CreatePoolError),

    #[error("invalid configuration: {0}")]
    Config(#[from] confique::Error),

    /// The database is in a state the schema setup cannot fix.
    #[error("schema setup failed: {0}")]
    Setup(String),

    /// The password hashing primitive failed.
    #[error("password hashing failed: {0}")]
    Password(String),
}

/// If `e` is a unique constraint violation, returns the name of the violated
/// constraint. Write paths use this to turn duplicate natural keys and
/// duplicate assignments into [`Error::Conflict`].
pub(crate) fn unique_violation(e: &tokio_postgres::Error) -> Option<&str> {
    db_error_code(e, &SqlState::UNIQUE_VIOLATION)
}

/// Like [`unique_violation`], but for foreign key violations. These show up
/// when a referenced entity does not exist (mapped to [`Error::NotFound`]) or
/// when a delete races a new reference (mapped to [`Error::Dependency`]).
pub(crate) fn foreign_key_violation(e: &tokio_postgres::Error) -> Option<&str> {
    db_error_code(e, &SqlState::FOREIGN_KEY_VIOLATION)
}

/// Like [`unique_violation`], but for check constraint violations.
pub(crate) fn check_violation(e: &tokio_postgres::Error) -> Option<&str> {
    db_error_code(e, &SqlState::CHECK_VIOLATION)
}

fn db_error_code<'a>(e: &'a tokio_postgres::Error, code: &SqlState) -> Option<&'a str> {
    let db_error = e.as_db_error()?;
    (db_error.code() == code).then(|| db_error.constraint().unwrap_or(""))
}
