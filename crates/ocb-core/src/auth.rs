//! Resolution of Telegram identities to application users.

use std::{sync::Arc, time::Duration};

use moka::{future::Cache, policy::EvictionPolicy};
use tracing::{debug, trace};

use crate::{
    domain::{AppUser, CurrentUser, UserId},
    ports::PlatformSession,
    Result,
};

pub const DEFAULT_CAPACITY: usize = 32;
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// Read-through cache of resolved users, bounded by count and age.
///
/// Entries expire `ttl` after insertion; when full, the least recently used
/// entry goes first. Only linked users are cached: an unlinked identity may
/// link at any moment, so a negative lookup always goes back to the platform.
/// A capacity or TTL of zero turns caching off.
#[derive(Clone)]
pub struct UserCache {
    cache: Option<Cache<UserId, Arc<AppUser>>>,
}

impl Default for UserCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL)
    }
}

impl UserCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let cache = (capacity > 0 && !ttl.is_zero()).then(|| {
            Cache::builder()
                .max_capacity(capacity as u64)
                .time_to_live(ttl)
                .eviction_policy(EvictionPolicy::lru())
                .build()
        });
        Self { cache }
    }

    pub async fn resolve(
        &self,
        session: &dyn PlatformSession,
        id: UserId,
    ) -> Result<CurrentUser> {
        if let Some(cache) = &self.cache {
            if let Some(user) = cache.get(&id).await {
                trace!(user_id = id.0, "User cache hit");
                return Ok(CurrentUser::Linked(user));
            }
        }

        let Some(user) = session.lookup_user(id).await? else {
            debug!(user_id = id.0, "No account linked to Telegram identity");
            return Ok(CurrentUser::Anonymous);
        };

        let user = Arc::new(user);
        if let Some(cache) = &self.cache {
            cache.insert(id, Arc::clone(&user)).await;
        }
        Ok(CurrentUser::Linked(user))
    }

    /// Forget one identity (e.g. after it was linked to another account).
    pub async fn invalidate(&self, id: UserId) {
        if let Some(cache) = &self.cache {
            cache.invalidate(&id).await;
        }
    }

    /// Apply pending evictions and expirations now rather than lazily.
    pub async fn run_pending_tasks(&self) {
        if let Some(cache) = &self.cache {
            cache.run_pending_tasks().await;
        }
    }

    pub async fn len(&self) -> usize {
        let Some(cache) = &self.cache else {
            return 0;
        };
        cache.run_pending_tasks().await;
        cache.entry_count() as usize
    }

    pub async fn contains(&self, id: UserId) -> bool {
        self.cache
            .as_ref()
            .is_some_and(|cache| cache.contains_key(&id))
    }
}

impl std::fmt::Debug for UserCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserCache")
            .field("enabled", &self.cache.is_some())
            .finish()
    }
}
