use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::middleware::{ApiResponse, ApiResult};
use crate::server::AppState;
use crate::services::{LoginRequest, LoginResult};

#[derive(Debug, Default, Deserialize)]
pub struct RefreshRequest {
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RefreshedToken {
    pub token: String,
}

/// POST /api/v1/auth/login - exchange staff or end-user credentials for a JWT
pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<LoginResult> {
    let Json(request) = body?;
    let result = state.auth.login(request).await?;
    tracing::info!("{:?} {} logged in", result.user.kind, result.user.id);
    Ok(ApiResponse::success(result))
}

/// POST /api/v1/auth/refresh - reissue a token, accepting recently expired ones
pub async fn refresh(
    State(state): State<AppState>,
    body: Result<Json<RefreshRequest>, JsonRejection>,
) -> ApiResult<RefreshedToken> {
    let Json(request) = body?;
    let token = state.auth.refresh(request.token.as_deref())?;
    Ok(ApiResponse::success(RefreshedToken { token }))
}
