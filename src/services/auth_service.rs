use std::net::IpAddr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::auth::{self, Identity, JwtError};
use crate::config::SecurityConfig;
use crate::database::{DatabaseError, HelpdeskStore};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Username and password are required")]
    MissingCredentials,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Token is required")]
    MissingToken,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token is too old to refresh")]
    TokenTooOld,

    #[error("Token generation failed: {0}")]
    Token(JwtError),

    #[error(transparent)]
    Store(#[from] DatabaseError),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// `staff` (default) or `user`
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResult {
    pub token: String,
    pub user: Identity,
}

/// Password login, token refresh and per-request credential resolution.
pub struct AuthService {
    store: Arc<dyn HelpdeskStore>,
    security: SecurityConfig,
}

impl AuthService {
    pub fn new(store: Arc<dyn HelpdeskStore>, security: SecurityConfig) -> Self {
        Self { store, security }
    }

    pub async fn login(&self, request: LoginRequest) -> Result<LoginResult, AuthError> {
        let (username, password) = match (request.username, request.password) {
            (Some(u), Some(p)) if !u.is_empty() && !p.is_empty() => (u, p),
            _ => return Err(AuthError::MissingCredentials),
        };

        let (identity, hash) = if request.kind.as_deref().unwrap_or("staff") == "staff" {
            let staff = self
                .store
                .find_staff_account(&username)
                .await?
                .ok_or(AuthError::InvalidCredentials)?;
            (Identity::from_staff(&staff), staff.passwd)
        } else {
            let account = self
                .store
                .find_user_account(&username)
                .await?
                .ok_or(AuthError::InvalidCredentials)?;
            (Identity::from_user(&account), account.passwd)
        };

        let hash = hash.ok_or(AuthError::InvalidCredentials)?;
        if !verify_password(password, hash).await {
            debug!("Password mismatch for {:?} login '{}'", identity.kind, username);
            return Err(AuthError::InvalidCredentials);
        }

        let token = auth::generate_jwt(identity.clone(), &self.security).map_err(AuthError::Token)?;
        Ok(LoginResult { token, user: identity })
    }

    pub fn refresh(&self, token: Option<&str>) -> Result<String, AuthError> {
        let token = token.filter(|t| !t.is_empty()).ok_or(AuthError::MissingToken)?;
        auth::refresh_jwt(token, &self.security).map_err(|err| match err {
            JwtError::RefreshWindowElapsed => AuthError::TokenTooOld,
            JwtError::InvalidToken(_) => AuthError::InvalidToken,
            other => AuthError::Token(other),
        })
    }

    /// Resolve a bearer token first, then an API key. Invalid credentials
    /// resolve to `None`; the caller decides whether that is an error.
    pub async fn authenticate(&self, bearer: Option<&str>, api_key: Option<&str>, peer: Option<IpAddr>) -> Option<Identity> {
        if let Some(token) = bearer {
            match auth::validate_jwt(token, &self.security.jwt_secret) {
                Ok(identity) => return Some(identity),
                Err(err) => debug!("Rejected bearer token: {}", err),
            }
        }

        let key = api_key.filter(|k| !k.is_empty())?;
        match self.store.find_api_key(key).await {
            Ok(Some(found)) => {
                let peer = peer.map(|ip| ip.to_canonical().to_string());
                if found.allows_ip(peer.as_deref()) {
                    Some(Identity::from_api_key(&found))
                } else {
                    warn!("API key {} used from unexpected address {:?}", found.id, peer);
                    None
                }
            }
            Ok(None) => None,
            Err(err) => {
                warn!("API key verification error: {}", err);
                None
            }
        }
    }
}

/// Runs on the blocking pool. Malformed hashes never verify.
async fn verify_password(password: String, hash: String) -> bool {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash).unwrap_or(false))
        .await
        .unwrap_or(false)
}
