use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::SecurityConfig;
use crate::database::models::{ApiKey, StaffAccount, UserAccount};

/// Kind of authenticated caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityKind {
    User,
    Staff,
    #[serde(rename = "apikey")]
    ApiKey,
}

/// The authenticated caller, carried in JWT claims and request extensions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: IdentityKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "isAdmin", default)]
    pub is_admin: bool,
    #[serde(rename = "deptId", default, skip_serializing_if = "Option::is_none")]
    pub dept_id: Option<i64>,
    #[serde(rename = "roleId", default, skip_serializing_if = "Option::is_none")]
    pub role_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub permissions: Value,
}

impl Identity {
    pub fn from_user(account: &UserAccount) -> Self {
        Self {
            id: account.user_id,
            kind: IdentityKind::User,
            username: account.username.clone(),
            name: account.name.clone(),
            email: account.email.clone(),
            is_admin: false,
            dept_id: None,
            role_id: None,
            permissions: Value::Null,
        }
    }

    pub fn from_staff(staff: &StaffAccount) -> Self {
        Self {
            id: staff.staff_id,
            kind: IdentityKind::Staff,
            username: Some(staff.username.clone()),
            name: Some(staff.display_name()),
            email: staff.email.clone(),
            is_admin: staff.is_admin,
            dept_id: Some(staff.dept_id),
            role_id: Some(staff.role_id),
            permissions: staff.permissions.clone().unwrap_or_else(|| json!({})),
        }
    }

    pub fn from_api_key(key: &ApiKey) -> Self {
        Self {
            id: key.id,
            kind: IdentityKind::ApiKey,
            username: None,
            name: None,
            email: None,
            is_admin: false,
            dept_id: None,
            role_id: None,
            permissions: json!({
                "can_create_tickets": key.can_create_tickets,
                "can_exec_cron": key.can_exec_cron,
            }),
        }
    }

    pub fn is_user(&self) -> bool {
        self.kind == IdentityKind::User
    }

    /// Staff members and API keys see every ticket, topic and department.
    pub fn is_staff_or_key(&self) -> bool {
        matches!(self.kind, IdentityKind::Staff | IdentityKind::ApiKey)
    }

    pub fn has_permission(&self, name: &str) -> bool {
        self.permissions.get(name).and_then(Value::as_bool).unwrap_or(false)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    #[serde(flatten)]
    pub identity: Identity,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(identity: Identity, expiry_hours: u64) -> Self {
        let now = Utc::now();
        let exp = (now + Duration::hours(expiry_hours as i64)).timestamp();

        Self {
            identity,
            exp,
            iat: now.timestamp(),
        }
    }
}

#[derive(Debug)]
pub enum JwtError {
    TokenGeneration(String),
    InvalidSecret,
    InvalidToken(String),
    RefreshWindowElapsed,
}

impl std::fmt::Display for JwtError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JwtError::TokenGeneration(msg) => write!(f, "JWT generation error: {}", msg),
            JwtError::InvalidSecret => write!(f, "Invalid JWT secret"),
            JwtError::InvalidToken(msg) => write!(f, "Invalid JWT token: {}", msg),
            JwtError::RefreshWindowElapsed => write!(f, "Token is too old to refresh"),
        }
    }
}

impl std::error::Error for JwtError {}

pub fn generate_jwt(identity: Identity, security: &SecurityConfig) -> Result<String, JwtError> {
    let secret = &security.jwt_secret;

    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let claims = Claims::new(identity, security.jwt_expiry_hours);
    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    let header = Header::new(Algorithm::HS256);

    encode(&header, &claims, &encoding_key).map_err(|e| JwtError::TokenGeneration(e.to_string()))
}

fn decode_claims(token: &str, secret: &str, check_expiry: bool) -> Result<Claims, JwtError> {
    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = check_expiry;

    decode::<Claims>(token, &decoding_key, &validation)
        .map(|data| data.claims)
        .map_err(|e| JwtError::InvalidToken(e.to_string()))
}

/// Validate signature and expiry, returning the caller identity
pub fn validate_jwt(token: &str, secret: &str) -> Result<Identity, JwtError> {
    decode_claims(token, secret, true).map(|claims| claims.identity)
}

/// Issue a fresh token for a correctly signed one, accepting expired tokens
/// for up to `refresh_window_days` past their expiry.
pub fn refresh_jwt(token: &str, security: &SecurityConfig) -> Result<String, JwtError> {
    let claims = decode_claims(token, &security.jwt_secret, false)?;

    let window = Duration::days(security.refresh_window_days as i64).num_seconds();
    if Utc::now().timestamp() - claims.exp > window {
        return Err(JwtError::RefreshWindowElapsed);
    }

    generate_jwt(claims.identity, security)
}
