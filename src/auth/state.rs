//! OAuth `state` values
//!
//! Each login flow gets its own random value. A value is accepted once,
//! and only within its lifetime.

use base64::{Engine as _, engine::general_purpose};
use rand::RngCore;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

const DEFAULT_MAX_PENDING: usize = 10_000;

/// Pending OAuth state values
pub struct OAuthStateStore {
    /// state -> issued at
    pending: RwLock<HashMap<String, Instant>>,
    ttl: Duration,
    max_pending: usize,
}

impl OAuthStateStore {
    /// Create new state store
    ///
    /// # Arguments
    /// * `ttl` - How long an issued value stays usable
    pub fn new(ttl: Duration) -> Self {
        Self::with_max_pending(ttl, DEFAULT_MAX_PENDING)
    }

    /// Create new state store with explicit in-memory cap.
    pub fn with_max_pending(ttl: Duration, max_pending: usize) -> Self {
        Self {
            pending: RwLock::new(HashMap::new()),
            ttl,
            max_pending: max_pending.max(1),
        }
    }

    /// Issue a fresh state value and remember it
    ///
    /// Expired values are dropped first. If the store is still full,
    /// the oldest pending value is evicted.
    pub async fn issue(&self) -> String {
        let state = generate_state();
        let mut pending = self.pending.write().await;

        prune_expired(&mut pending, self.ttl);
        if pending.len() >= self.max_pending {
            let oldest = pending
                .iter()
                .min_by_key(|(_, issued_at)| **issued_at)
                .map(|(key, _)| key.clone());
            if let Some(oldest) = oldest {
                pending.remove(&oldest);
            }
        }

        pending.insert(state.clone(), Instant::now());
        state
    }

    /// Consume a state value
    ///
    /// # Returns
    /// `true` if the value was issued by this store, has not been used
    /// yet and has not expired
    pub async fn consume(&self, state: &str) -> bool {
        let mut pending = self.pending.write().await;
        match pending.remove(state) {
            Some(issued_at) => issued_at.elapsed() < self.ttl,
            None => false,
        }
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.pending.read().await.len()
    }
}

fn prune_expired(pending: &mut HashMap<String, Instant>, ttl: Duration) {
    let before = pending.len();
    pending.retain(|_, issued_at| issued_at.elapsed() < ttl);
    let removed = before - pending.len();

    if removed > 0 {
        tracing::debug!(removed, "Pruned expired OAuth state values");
    }
}

fn generate_state() -> String {
    let mut bytes = [0_u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn issued_state_is_accepted_once() {
        let store = OAuthStateStore::new(Duration::from_secs(60));
        let state = store.issue().await;

        assert!(store.consume(&state).await);
        assert!(!store.consume(&state).await);
    }

    #[tokio::test]
    async fn unknown_state_is_rejected() {
        let store = OAuthStateStore::new(Duration::from_secs(60));
        store.issue().await;

        assert!(!store.consume("random-state-string").await);
        assert!(!store.consume("").await);
    }

    #[tokio::test]
    async fn issued_values_are_distinct() {
        let store = OAuthStateStore::new(Duration::from_secs(60));
        let first = store.issue().await;
        let second = store.issue().await;

        assert_ne!(first, second);
        assert_eq!(first.len(), 43);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn expired_state_is_rejected_and_pruned() {
        let store = OAuthStateStore::new(Duration::from_millis(50));
        let expired = store.issue().await;
        let also_expired = store.issue().await;

        tokio::time::sleep(Duration::from_millis(80)).await;

        assert!(!store.consume(&expired).await);
        assert_eq!(store.len().await, 1);

        // Issuing sweeps the value nobody came back for
        let fresh = store.issue().await;
        assert_eq!(store.len().await, 1);
        assert!(!store.consume(&also_expired).await);
        assert!(store.consume(&fresh).await);
    }

    #[tokio::test]
    async fn oldest_state_is_evicted_at_capacity() {
        let store = OAuthStateStore::with_max_pending(Duration::from_secs(60), 2);
        let first = store.issue().await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = store.issue().await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        let third = store.issue().await;

        assert_eq!(store.len().await, 2);
        assert!(!store.consume(&first).await);
        assert!(store.consume(&second).await);
        assert!(store.consume(&third).await);
    }
}
