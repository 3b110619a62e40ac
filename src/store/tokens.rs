//! GitHub token store
//!
//! Maps a GitHub user id to the access token obtained at login.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use tokio::sync::RwLock;

/// GitHub access token held for one user
#[derive(Clone)]
pub struct ProviderToken {
    /// GitHub user ID
    pub user_id: u64,
    /// GitHub login at the time of authorization
    pub username: String,
    pub access_token: String,
    /// Token type as reported by GitHub (usually "bearer")
    pub token_type: String,
    /// Granted scopes, comma-separated as GitHub reports them
    pub scope: Option<String>,
    pub obtained_at: DateTime<Utc>,
}

impl fmt::Debug for ProviderToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderToken")
            .field("user_id", &self.user_id)
            .field("username", &self.username)
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("scope", &self.scope)
            .field("obtained_at", &self.obtained_at)
            .finish()
    }
}

/// Token store
///
/// Holds at most one token per user; storing again replaces the
/// previous token. Tokens never expire here: once GitHub stops
/// accepting one, it is dropped and the user has to log in again.
#[derive(Default)]
pub struct TokenStore {
    tokens: RwLock<HashMap<u64, ProviderToken>>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a token, replacing any previous token of the same user
    ///
    /// # Returns
    /// `true` if an older token was replaced
    pub async fn store(&self, token: ProviderToken) -> bool {
        let user_id = token.user_id;
        let mut tokens = self.tokens.write().await;
        let replaced = tokens.insert(user_id, token).is_some();

        use crate::metrics::STORED_TOKENS;
        STORED_TOKENS.set(tokens.len() as i64);

        tracing::debug!(user_id, replaced, "Stored GitHub token");
        replaced
    }

    /// Get token for a user
    pub async fn get(&self, user_id: u64) -> Option<ProviderToken> {
        self.tokens.read().await.get(&user_id).cloned()
    }

    /// Forget a token GitHub no longer accepts
    ///
    /// Only removes the entry while it still holds `access_token`, so a
    /// token stored by a newer login survives a late rejection of the
    /// old one.
    ///
    /// # Returns
    /// `true` if the token was removed
    pub async fn remove_rejected(&self, user_id: u64, access_token: &str) -> bool {
        let mut tokens = self.tokens.write().await;
        let is_current = tokens
            .get(&user_id)
            .is_some_and(|token| token.access_token == access_token);
        if !is_current {
            return false;
        }
        tokens.remove(&user_id);

        use crate::metrics::STORED_TOKENS;
        STORED_TOKENS.set(tokens.len() as i64);

        tracing::info!(user_id, "Dropped GitHub token rejected by GitHub");
        true
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.tokens.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(user_id: u64, access_token: &str) -> ProviderToken {
        ProviderToken {
            user_id,
            username: format!("user{user_id}"),
            access_token: access_token.to_string(),
            token_type: "bearer".to_string(),
            scope: Some("repo".to_string()),
            obtained_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn store_replaces_previous_token_for_same_user() {
        let store = TokenStore::new();

        assert!(!store.store(token(1, "first")).await);
        assert!(store.store(token(1, "second")).await);

        assert_eq!(store.len().await, 1);
        assert_eq!(store.get(1).await.unwrap().access_token, "second");
    }

    #[tokio::test]
    async fn tokens_are_kept_per_user() {
        let store = TokenStore::new();
        store.store(token(1, "one")).await;
        store.store(token(2, "two")).await;

        assert_eq!(store.get(1).await.unwrap().access_token, "one");
        assert_eq!(store.get(2).await.unwrap().access_token, "two");
        assert!(store.get(3).await.is_none());

    }

    #[tokio::test]
    async fn rejected_token_is_removed_only_while_current() {
        let store = TokenStore::new();
        store.store(token(1, "old")).await;
        store.store(token(1, "new")).await;

        // A rejection of the replaced token leaves the newer one alone
        assert!(!store.remove_rejected(1, "old").await);
        assert_eq!(store.get(1).await.unwrap().access_token, "new");

        assert!(store.remove_rejected(1, "new").await);
        assert!(store.get(1).await.is_none());
        assert!(!store.remove_rejected(1, "new").await);
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn concurrent_writers_leave_one_record_per_user() {
        let store = std::sync::Arc::new(TokenStore::new());

        let handles: Vec<_> = (0..32)
            .map(|i| {
                let store = std::sync::Arc::clone(&store);
                tokio::spawn(async move {
                    store.store(token(i % 4, &format!("token-{i}"))).await;
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.len().await, 4);
    }

    #[test]
    fn debug_output_redacts_access_token() {
        let rendered = format!("{:?}", token(7, "gho_supersecret"));
        assert!(!rendered.contains("gho_supersecret"));
        assert!(rendered.contains("<redacted>"));
    }
}
