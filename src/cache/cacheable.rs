use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;

#[derive(Debug)]
struct Slot<T> {
    value: T,
    /// `None` never expires.
    expires_at: Option<Instant>,
}

/// Single-value memoization cell with an optional time-to-live.
///
/// Expiry is checked lazily on access; a value whose expiry is at or before
/// the current instant is reported as absent. Clones share the same slot.
#[derive(Debug)]
pub struct Cacheable<T> {
    inner: Arc<RwLock<Option<Slot<T>>>>,
}

impl<T> Clone for Cacheable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for Cacheable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Cacheable<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(None)),
        }
    }

    /// Stores `value` without expiry.
    pub async fn set(&self, value: T) {
        *self.inner.write().await = Some(Slot {
            value,
            expires_at: None,
        });
    }

    /// Stores `value` until `now + ttl`. A zero `ttl` stores an already stale value.
    pub async fn set_with_ttl(&self, value: T, ttl: Duration) {
        // an expiry beyond the clock's range never comes
        let expires_at = Instant::now().checked_add(ttl);
        *self.inner.write().await = Some(Slot { value, expires_at });
    }

    pub async fn is_set(&self) -> bool {
        self.inner
            .read()
            .await
            .as_ref()
            .is_some_and(|slot| is_fresh(slot.expires_at))
    }
}

impl<T: Clone> Cacheable<T> {
    pub async fn get(&self) -> Option<T> {
        self.inner
            .read()
            .await
            .as_ref()
            .filter(|slot| is_fresh(slot.expires_at))
            .map(|slot| slot.value.clone())
    }
}

fn is_fresh(expires_at: Option<Instant>) -> bool {
    expires_at.map_or(true, |at| at > Instant::now())
}
