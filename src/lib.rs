//! An embeddable role-based access control engine.
//!
//! The engine owns the authorization data model (users, groups with nested
//! subgroups, rights, roles, contexts and their assignments), the resolution
//! algorithm deciding which rule wins a right, and a two-level cache kept
//! coherent by a global version counter. Everything else (the database
//! connection, sessions, HTTP) belongs to the host application.
//!
//! The entry point is [`RoleManager`], constructed over a caller-owned
//! connection pool:
//!
//! ```no_run
//! # async fn run() -> rolemanager::Result<()> {
//! use rolemanager::{RoleManager, model::Key};
//!
//! let config = rolemanager::Config::load_from("config.toml")?;
//! let pool = rolemanager::db::create_pool(&config.db).await?;
//! let rm = RoleManager::with_config(pool, &config);
//! rm.setup().await?;
//!
//! // One request scope per incoming request:
//! let mut request = rm.request();
//! if request.has_right(Key(1), "publish_article", Some(Key(7))).await? {
//!     // ...
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Resolution walks the user's direct role assignments and everything
//! inherited through the transitive closure of group memberships, ranks all
//! rules granting a right by specificity (context over source over group
//! distance) and picks one winner per right. A right without a winning rule
//! is denied; there is no explicit deny.

use std::sync::Arc;

use deadpool_postgres::Pool;

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod logger;
pub mod manage;
pub mod model;
mod password;
pub(crate) mod prelude;
mod version;

pub use self::{
    config::Config,
    error::{Error, Result},
};

use self::{
    auth::{Auth, CacheBackend, MemoryCache, RequestScope},
    logger::{Level, Logger},
};


/// The version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The SQL script creating everything the engine persists. Applied by
/// [`RoleManager::setup`]; exported for hosts that run their own migrations.
pub const SCHEMA: &str = include_str!("db/rolemanager-create.sql");


/// Shared state threaded through all handlers: the pool, the event logger
/// and the optional process-wide cache.
pub(crate) struct Ctx {
    pub(crate) pool: Pool,
    pub(crate) logger: Logger,
    pub(crate) cache: Option<Arc<dyn CacheBackend>>,
}

impl Ctx {
    pub(crate) async fn db(&self) -> Result<db::DbConnection> {
        Ok(self.pool.get().await?)
    }
}


/// The engine. Cheap to share behind an `Arc`; all public operations take
/// `&self` except for swapping the cache backend.
pub struct RoleManager {
    ctx: Ctx,
}

impl RoleManager {
    /// Creates an engine with default settings: in-process permission cache,
    /// console events at `notice` and up, persisted events at `warning` and
    /// up.
    pub fn new(pool: Pool) -> Self {
        Self::build(pool, Level::Notice, Level::Warning, true)
    }

    /// Creates an engine from a loaded [`Config`]. The `db` section is not
    /// consumed here; pass it to [`db::create_pool`] to build the pool.
    pub fn with_config(pool: Pool, config: &Config) -> Self {
        Self::build(
            pool,
            config.log.console_level,
            config.log.db_level,
            config.cache.enabled,
        )
    }

    fn build(pool: Pool, console_level: Level, db_level: Level, cache: bool) -> Self {
        let cache = cache.then(|| Arc::new(MemoryCache::default()) as Arc<dyn CacheBackend>);
        Self {
            ctx: Ctx {
                pool,
                logger: Logger::new(console_level, db_level),
                cache,
            },
        }
    }

    /// Replaces the process-wide cache backend, e.g. with one backed by a
    /// networked cache. `None` disables the second cache level entirely.
    pub fn set_cache_backend(&mut self, backend: Option<Arc<dyn CacheBackend>>) {
        self.ctx.cache = backend;
    }

    /// Makes sure the database schema exists (see [`SCHEMA`]).
    pub async fn setup(&self) -> Result<()> {
        let mut db = self.ctx.db().await?;
        db::setup(&mut db).await
    }

    /// The event logger (see [`logger::Logger`]).
    pub fn logger(&self) -> &Logger {
        &self.ctx.logger
    }

    pub fn users(&self) -> manage::Users<'_> {
        manage::Users { ctx: &self.ctx }
    }

    pub fn groups(&self) -> manage::Groups<'_> {
        manage::Groups { ctx: &self.ctx }
    }

    pub fn rights(&self) -> manage::Rights<'_> {
        manage::Rights { ctx: &self.ctx }
    }

    pub fn right_groups(&self) -> manage::RightGroups<'_> {
        manage::RightGroups { ctx: &self.ctx }
    }

    pub fn right_types(&self) -> manage::RightTypes<'_> {
        manage::RightTypes { ctx: &self.ctx }
    }

    pub fn roles(&self) -> manage::Roles<'_> {
        manage::Roles { ctx: &self.ctx }
    }

    pub fn contexts(&self) -> manage::Contexts<'_> {
        manage::Contexts { ctx: &self.ctx }
    }

    pub fn auth(&self) -> Auth<'_> {
        Auth { ctx: &self.ctx }
    }

    /// Opens the scope of one top-level request, carrying the request-local
    /// cache level. Create one per request, drop it at the end.
    pub fn request(&self) -> RequestScope<'_> {
        RequestScope::new(&self.ctx)
    }
}
