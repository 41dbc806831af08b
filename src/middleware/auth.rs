use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use crate::auth::Identity;
use crate::error::ApiError;
use crate::server::AppState;

/// Credentials presented on a request, copied out so the request can be moved on.
struct Presented {
    bearer: Option<String>,
    api_key: Option<String>,
    peer: Option<std::net::IpAddr>,
}

impl Presented {
    fn from_request(request: &Request) -> Self {
        let headers = request.headers();
        Self {
            bearer: extract_bearer(headers),
            api_key: headers
                .get("x-api-key")
                .and_then(|v| v.to_str().ok())
                .map(|v| v.trim().to_string()),
            peer: request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip()),
        }
    }

    async fn resolve(self, state: &AppState) -> Option<Identity> {
        state
            .auth
            .authenticate(self.bearer.as_deref(), self.api_key.as_deref(), self.peer)
            .await
    }
}

/// Rejects the request with 401 unless a bearer token or API key resolves to
/// an identity, which is then available as `Extension<Identity>`.
pub async fn require_auth(State(state): State<AppState>, mut request: Request, next: Next) -> Result<Response, ApiError> {
    let presented = Presented::from_request(&request);
    let identity = presented
        .resolve(&state)
        .await
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

/// Attaches the caller identity when credentials resolve; anonymous otherwise.
pub async fn optional_auth(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let presented = Presented::from_request(&request);
    if let Some(identity) = presented.resolve(&state).await {
        request.extensions_mut().insert(identity);
    }
    next.run(request).await
}

/// Extract JWT token from Authorization header
fn extract_bearer(headers: &HeaderMap) -> Option<String> {
    let auth_str = headers.get("authorization")?.to_str().ok()?;
    let token = auth_str.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
