//! The authorization core: candidate enumeration, specificity ranking,
//! winner selection, the two-level cache and the authentication boundary.

use std::collections::HashMap;
use std::sync::Arc;

use crate::{
    Ctx,
    model::{Key, RightValue, User},
    prelude::*,
    version,
};

mod cache;
mod candidates;
mod closure;
mod rank;
mod resolver;
#[cfg(test)]
mod tests;

pub use self::{
    cache::{CacheBackend, CacheEntry, CacheError, CacheKey, MemoryCache},
    candidates::{Candidate, SourceKind, GLOBAL_CONTEXT},
    rank::Specificity,
    resolver::{Explanation, TraceEntry, TraceStatus},
};

use self::resolver::RightsMap;


/// Handler for the authentication boundary. Created through
/// [`RoleManager::auth`](crate::RoleManager::auth).
pub struct Auth<'a> {
    pub(crate) ctx: &'a Ctx,
}

impl Auth<'_> {
    /// Checks a login/password pair against the stored hash. Returns the
    /// non-secret part of the user record on success and `None` on any
    /// credential failure; unknown login and wrong password are
    /// indistinguishable on purpose. Store failures do propagate.
    pub async fn authenticate(&self, login: &str, password: &str) -> Result<Option<User>> {
        let db = self.ctx.db().await?;
        let row = db.query_opt(
            &format!(
                "select {}, password_hash from role_manager_users where login = $1",
                User::COLS,
            ),
            &[&login],
        ).await?;

        let Some(row) = row else {
            debug!("Authentication failed: unknown login");
            return Ok(None);
        };

        let stored_hash: String = row.get("password_hash");
        if !crate::password::verify(&stored_hash, password) {
            debug!("Authentication failed: password mismatch");
            return Ok(None);
        }

        Ok(Some(User::from_row(&row)))
    }
}


/// The scope of one top-level request, holding the request-local half of the
/// permission cache. Create one per incoming request via
/// [`RoleManager::request`](crate::RoleManager::request) and drop it at the
/// end; everything it cached is considered fresh for its whole lifetime and
/// dies with it.
pub struct RequestScope<'a> {
    ctx: &'a Ctx,
    l1: HashMap<CacheKey, Arc<RightsMap>>,
}

impl<'a> RequestScope<'a> {
    pub(crate) fn new(ctx: &'a Ctx) -> Self {
        Self { ctx, l1: HashMap::new() }
    }

    /// Whether `user` holds `right` in `context` (`None` = Global Context).
    pub async fn has_right(
        &mut self,
        user: Key,
        right: &str,
        context: Option<Key>,
    ) -> Result<bool> {
        Ok(self.right_value(user, right, context).await?.is_some())
    }

    /// Like [`has_right`](Self::has_right), but also hands out the resolved
    /// value: `Some` means granted, and for range rights carries the winning
    /// numeric value.
    pub async fn right_value(
        &mut self,
        user: Key,
        right: &str,
        context: Option<Key>,
    ) -> Result<Option<RightValue>> {
        let rights = self.resolved(user, context).await?;
        Ok(rights.get(right).copied())
    }

    /// Resolves a single right with a full decision trace. Unlike the fast
    /// path this always enumerates freshly: the trace cites current rules,
    /// names included, so serving it from a cached map would be misleading.
    pub async fn explain_right(
        &mut self,
        user: Key,
        right: &str,
        context: Option<Key>,
    ) -> Result<Explanation> {
        let db = self.ctx.db().await?;
        resolver::explain(&**db, &self.ctx.logger, user, right, context).await
    }

    /// The cache read protocol: request scope first, then the process-wide
    /// cache guarded by the version stamp, then a fresh resolution that
    /// back-fills both levels.
    async fn resolved(&mut self, user: Key, context: Option<Key>) -> Result<Arc<RightsMap>> {
        let key = CacheKey { user, context };
        if let Some(rights) = self.l1.get(&key) {
            return Ok(rights.clone());
        }

        let db = self.ctx.db().await?;
        let current_version = version::current(&**db).await?;

        if let Some(l2) = &self.ctx.cache {
            match l2.fetch(&key) {
                Ok(Some(entry)) if entry.is_fresh(current_version) => {
                    trace!("Permission cache hit for user {user} (version {current_version})");
                    let rights = Arc::new(entry.rights);
                    self.l1.insert(key, rights.clone());
                    return Ok(rights);
                }
                Ok(_) => {}
                Err(e) => warn!("Permission cache fetch failed, recomputing: {e}"),
            }
        }

        let rights = resolver::resolve(&**db, &self.ctx.logger, user, context).await?;

        if let Some(l2) = &self.ctx.cache {
            let entry = CacheEntry { version: current_version, rights: rights.clone() };
            if let Err(e) = l2.store(key, entry) {
                warn!("Permission cache store failed: {e}");
            }
        }

        let rights = Arc::new(rights);
        self.l1.insert(key, rights.clone());
        Ok(rights)
    }
}
