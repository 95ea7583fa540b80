//! Single-flight access token refresh.

use std::future::Future;

use tokio::sync::Mutex;

use super::ClientError;

#[derive(Debug, Default)]
struct TokenState {
    access_token: Option<String>,
    /// Bumped on every refresh attempt, successful or not.
    generation: u64,
}

/// Holds the current access token and serializes refreshes.
///
/// A request that gets a 401 calls [`TokenRefresher::refresh_after`] with
/// the generation it sent its token under. The first caller runs the
/// refresh while holding the lock; callers queued behind it see the
/// generation moved on and reuse the outcome instead of refreshing again.
#[derive(Debug, Default)]
pub struct TokenRefresher {
    state: Mutex<TokenState>,
}

impl TokenRefresher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current token and the generation it belongs to.
    pub async fn current(&self) -> (Option<String>, u64) {
        let state = self.state.lock().await;
        (state.access_token.clone(), state.generation)
    }

    /// Install a token obtained by login or registration.
    pub async fn set(&self, token: impl Into<String>) {
        let mut state = self.state.lock().await;
        state.access_token = Some(token.into());
        state.generation += 1;
    }

    /// Forget the token.
    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        state.access_token = None;
        state.generation += 1;
    }

    /// Refresh unless someone already did since `seen_generation`.
    ///
    /// When the shared refresh failed, every waiter gets
    /// [`ClientError::Unauthorized`].
    pub async fn refresh_after<F, Fut>(
        &self,
        seen_generation: u64,
        refresh: F,
    ) -> Result<String, ClientError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, ClientError>>,
    {
        let mut state = self.state.lock().await;

        if state.generation != seen_generation {
            return state.access_token.clone().ok_or(ClientError::Unauthorized);
        }

        state.generation += 1;
        match refresh().await {
            Ok(token) => {
                state.access_token = Some(token.clone());
                Ok(token)
            }
            Err(e) => {
                tracing::debug!("Token refresh failed: {}", e);
                state.access_token = None;
                Err(e)
            }
        }
    }
}
