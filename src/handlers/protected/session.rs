use axum::Extension;

use crate::auth::Identity;
use crate::middleware::{ApiResponse, ApiResult};

/// GET /api/v1/auth/me - the identity carried by the presented credentials
pub async fn me(Extension(identity): Extension<Identity>) -> ApiResult<Identity> {
    Ok(ApiResponse::success(identity))
}

/// POST /api/v1/auth/logout - tokens are stateless, so this only acknowledges
pub async fn logout(Extension(identity): Extension<Identity>) -> ApiResult<()> {
    tracing::debug!("{:?} {} logged out", identity.kind, identity.id);
    Ok(ApiResponse::message_only("Logged out successfully"))
}
