use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::password::{PasswordError, Passwords};
use crate::secret::ReplicaSecret;
use crate::store::{StoreError, UserStore};
use crate::token::{self, Claims, TokenError};

#[derive(Debug, Error)]
pub enum AuthError {
    /// Wrong password or unknown user; deliberately indistinguishable
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("user not found")]
    UserNotFound,

    /// Bootstrap hasn't adopted a canonical secret yet
    #[error("token issuer not ready")]
    IssuerNotReady,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error(transparent)]
    Token(#[from] TokenError),
}

#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    /// Seconds
    pub expires_in: i64,
}

/// Credential checks and token issuance for the auth service
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    passwords: Passwords,
    secret: ReplicaSecret,
    token_ttl: Duration,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserStore>, passwords: Passwords, secret: ReplicaSecret, token_ttl: Duration) -> Self {
        Self {
            users,
            passwords,
            secret,
            token_ttl,
        }
    }

    pub fn secret(&self) -> &ReplicaSecret {
        &self.secret
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<IssuedToken, AuthError> {
        let secret = self.secret.current().ok_or(AuthError::IssuerNotReady)?;

        let matched = match self.users.find_by_username(username).await? {
            Some(user) => self.passwords.verify(password, &user.password_hash).await?,
            None => self.passwords.verify_decoy(password).await?,
        };
        if !matched {
            warn!(%username, "Rejected login");
            return Err(AuthError::InvalidCredentials);
        }

        let issued_at = Utc::now();
        let claims = Claims::new(username, issued_at, self.token_ttl);
        let token = token::issue(&claims, &secret)?;
        info!(%username, "Issued session token");

        Ok(IssuedToken {
            token,
            expires_at: issued_at + self.token_ttl,
            expires_in: self.token_ttl.num_seconds(),
        })
    }

    pub async fn change_password(&self, username: &str, new_password: &str) -> Result<(), AuthError> {
        let hash = self.passwords.hash(new_password).await?;
        if !self.users.update_password(username, &hash).await? {
            return Err(AuthError::UserNotFound);
        }
        info!(%username, "Password updated");
        Ok(())
    }
}
