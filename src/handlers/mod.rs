// handlers/mod.rs - Two-tier handler layout
//
// Public (no auth, or optional auth for catalog browsing) → Protected (bearer JWT or API key)
pub mod protected;
pub mod public;

use std::collections::HashMap;

use crate::auth::Identity;
use crate::database::models::PageRequest;
use crate::error::ApiError;
use crate::server::AppState;

/// Raw query string values. Parsed leniently so bad values fall back to defaults
/// instead of rejecting the request.
pub type QueryParams = HashMap<String, String>;

pub(crate) fn page_request(state: &AppState, params: &QueryParams) -> PageRequest {
    PageRequest::from_params(
        params.get("page").map(String::as_str),
        params.get("limit").map(String::as_str),
        state.config.api.default_page_size,
        state.config.api.max_page_size,
    )
}

/// `true` or `1`
pub(crate) fn flag(params: &QueryParams, key: &str) -> Option<bool> {
    params.get(key).map(|v| matches!(v.as_str(), "true" | "1"))
}

pub(crate) fn int_param(params: &QueryParams, key: &str) -> Option<i64> {
    params.get(key).and_then(|v| v.trim().parse().ok())
}

/// Trimmed `search`, absent when blank
pub(crate) fn search_param(params: &QueryParams) -> Option<String> {
    params.get("search").map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Directory and service routes are closed to end users.
pub(crate) fn require_staff(caller: &Identity) -> Result<(), ApiError> {
    if caller.is_staff_or_key() {
        Ok(())
    } else {
        Err(ApiError::forbidden("Staff access required"))
    }
}

/// Numeric `:id`; anything else is reported as a 404 with `message`.
pub(crate) fn path_id(raw: &str, message: &str) -> Result<i64, ApiError> {
    raw.parse().map_err(|_| ApiError::not_found(message))
}
