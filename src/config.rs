//! Configuration of the engine, loadable from a TOML file.

use std::path::Path;

use crate::prelude::*;


/// Configuration for the role manager engine.
///
/// All of this is optional: hosts that wire the engine up in code can ignore
/// the config machinery entirely and use
/// [`RoleManager::new`](crate::RoleManager::new).
#[derive(Debug, confique::Config)]
pub struct Config {
    #[config(nested)]
    pub db: crate::db::DbConfig,

    #[config(nested)]
    pub log: crate::logger::LogConfig,

    #[config(nested)]
    pub cache: CacheConfig,
}

/// Settings of the process-wide permission cache.
#[derive(Debug, confique::Config)]
pub struct CacheConfig {
    /// Whether resolved permission maps are kept in a process-wide cache
    /// across requests. When disabled, only the per-request cache is used
    /// and every request resolves afresh.
    #[config(default = true)]
    pub enabled: bool,
}

impl Config {
    /// Loads the configuration from a specific TOML file.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        use confique::Config as _;

        let path = path.as_ref();
        debug!("Loading configuration from '{}'", path.display());
        Ok(Self::from_file(path)?)
    }
}
