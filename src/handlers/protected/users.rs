use axum::{
    extract::{Path, Query, State},
    Extension,
};

use crate::auth::Identity;
use crate::database::models::{Organization, TicketSummary, UserDetail, UserQuery, UserSummary};
use crate::error::ApiError;
use crate::handlers::protected::tickets::{ticket_page, ticket_query};
use crate::handlers::{int_param, page_request, path_id, require_staff, search_param, QueryParams};
use crate::middleware::{ApiResponse, ApiResult};
use crate::server::AppState;

/// Parse `:id`; end users may only look at themselves.
fn visible_user(caller: &Identity, raw: &str) -> Result<i64, ApiError> {
    let user_id = path_id(raw, "User not found")?;
    if caller.is_user() && caller.id != user_id {
        return Err(ApiError::forbidden("Access denied"));
    }
    Ok(user_id)
}

/// GET /api/v1/users - staff only
pub async fn list(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Vec<UserSummary>> {
    require_staff(&caller)?;
    let query = UserQuery {
        org_id: int_param(&params, "org_id"),
        search: search_param(&params),
    };
    let page = page_request(&state, &params);

    let users = state.store.list_users(&query, page).await?;
    Ok(ApiResponse::paginated(users.items, page.pagination(users.total)))
}

/// GET /api/v1/users/:id - profile with every address and a ticket count
pub async fn get(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Path(id): Path<String>,
) -> ApiResult<UserDetail> {
    let user_id = visible_user(&caller, &id)?;
    let user = state
        .store
        .get_user(user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(ApiResponse::success(user))
}

/// GET /api/v1/users/:id/tickets
pub async fn tickets(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Path(id): Path<String>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Vec<TicketSummary>> {
    let user_id = visible_user(&caller, &id)?;
    let mut query = ticket_query(&params, &caller);
    query.user_id = Some(user_id);
    ticket_page(&state, &params, &query).await
}

/// GET /api/v1/users/:id/organizations
pub async fn organizations(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Path(id): Path<String>,
) -> ApiResult<Vec<Organization>> {
    let user_id = visible_user(&caller, &id)?;
    Ok(ApiResponse::success(state.store.user_organizations(user_id).await?))
}
