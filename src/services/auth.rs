//! Auth service
//!
//! Session token to user profile lookup for the admin-only endpoints.
//! Credential handling lives elsewhere; this service only trusts sessions
//! already present in the store.

use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{Session, User};
use anyhow::Context;
use std::sync::Arc;

/// Error types for auth service operations
#[derive(Debug, thiserror::Error)]
pub enum AuthServiceError {
    /// The session owner does not exist
    #[error("User not found: {0}")]
    UserNotFound(i64),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Resolves session tokens to user profiles
pub struct AuthService {
    sessions: Arc<dyn SessionRepository>,
    users: Arc<dyn UserRepository>,
}

impl AuthService {
    /// Create a new auth service
    pub fn new(sessions: Arc<dyn SessionRepository>, users: Arc<dyn UserRepository>) -> Self {
        Self { sessions, users }
    }

    /// Start a session for an existing user
    pub async fn create_session(
        &self,
        user_id: i64,
        ttl: chrono::Duration,
    ) -> Result<Session, AuthServiceError> {
        self.users
            .get_by_id(user_id)
            .await
            .context("Failed to get user")?
            .ok_or(AuthServiceError::UserNotFound(user_id))?;

        let session = self
            .sessions
            .create(&Session::new(user_id, ttl))
            .await
            .context("Failed to create session")?;

        tracing::info!(user_id, "Session created");
        Ok(session)
    }

    /// The user behind a live session, or `None`.
    ///
    /// Expired sessions are removed on sight.
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>, AuthServiceError> {
        let session = match self
            .sessions
            .get_by_id(token)
            .await
            .context("Failed to get session")?
        {
            Some(s) => s,
            None => return Ok(None),
        };

        if session.is_expired() {
            let _ = self.sessions.delete(token).await;
            return Ok(None);
        }

        let user = self
            .users
            .get_by_id(session.user_id)
            .await
            .context("Failed to get user")?;

        Ok(user)
    }

    /// Remove every expired session
    pub async fn purge_expired(&self) -> Result<u64, AuthServiceError> {
        let removed = self
            .sessions
            .delete_expired()
            .await
            .context("Failed to purge expired sessions")?;
        if removed > 0 {
            tracing::debug!(removed, "Purged expired sessions");
        }
        Ok(removed)
    }
}
