//! Database related things.
//!
//! The engine does not own the connection: callers hand a
//! [`Pool`](deadpool_postgres::Pool) to [`RoleManager`](crate::RoleManager).
//! [`create_pool`] is a convenience for hosts that don't have their own pool
//! setup yet.

use deadpool_postgres::{Config as PoolConfig, Pool, Runtime};
use secrecy::{ExposeSecret, Secret};
use tokio_postgres::NoTls;

use crate::prelude::*;


mod setup;
mod tx;
pub(crate) mod util;

pub use self::tx::Transaction;
pub(crate) use self::setup::setup;


#[derive(Debug, confique::Config, Clone)]
pub struct DbConfig {
    /// The username of the database user.
    #[config(default = "rolemanager")]
    pub user: String,

    /// The password of the database user.
    pub password: Secret<String>,

    /// The host the database server is running on.
    #[config(default = "127.0.0.1")]
    pub host: String,

    /// The port the database server is listening on. (Just useful if your
    /// database server is not running on the default PostgreSQL port).
    #[config(default = 5432)]
    pub port: u16,

    /// The name of the database to use.
    #[config(default = "rolemanager")]
    pub database: String,
}

/// Convenience type alias. Every function that needs to operate on the
/// database can just accept a `db: &Db` parameter.
pub type Db = deadpool_postgres::ClientWrapper;

/// Type alias for an owned DB connection.
pub type DbConnection = deadpool::managed::Object<deadpool_postgres::Manager>;


/// Creates a new database connection pool.
pub async fn create_pool(config: &DbConfig) -> Result<Pool> {
    let pool_config = PoolConfig {
        user: Some(config.user.clone()),
        password: Some(config.password.expose_secret().clone()),
        host: Some(config.host.clone()),
        port: Some(config.port),
        dbname: Some(config.database.clone()),
        application_name: Some("rolemanager".into()),
        .. PoolConfig::default()
    };

    debug!(
        "Connecting to 'postgresql://{}:*****@{}:{}/{}'",
        config.user,
        config.host,
        config.port,
        config.database,
    );

    let pool = pool_config.create_pool(Some(Runtime::Tokio1), NoTls)?;
    info!("Created database pool");

    // Test the connection by executing a simple query.
    let client = pool.get().await?;
    client.execute("select 1", &[]).await?;
    debug!("Successfully tested database connection with test query");

    Ok(pool)
}
