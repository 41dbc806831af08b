use axum::{
    extract::{Path, Query, State},
    Extension,
};

use crate::auth::Identity;
use crate::database::models::{Organization, OrganizationDetail, TicketSummary, UserQuery, UserSummary};
use crate::error::ApiError;
use crate::handlers::protected::tickets::{ticket_page, ticket_query};
use crate::handlers::{page_request, path_id, require_staff, search_param, QueryParams};
use crate::middleware::{ApiResponse, ApiResult};
use crate::server::AppState;

const NOT_FOUND: &str = "Organization not found";

/// GET /api/v1/organizations - staff only, optional name/domain search
pub async fn list(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Vec<Organization>> {
    require_staff(&caller)?;
    let search = search_param(&params);
    let page = page_request(&state, &params);

    let organizations = state.store.list_organizations(search.as_deref(), page).await?;
    Ok(ApiResponse::paginated(organizations.items, page.pagination(organizations.total)))
}

/// GET /api/v1/organizations/:id - with the account manager and ticket count
pub async fn get(
    State(state): State<AppState>,
    Extension(_caller): Extension<Identity>,
    Path(id): Path<String>,
) -> ApiResult<OrganizationDetail> {
    let org_id = path_id(&id, NOT_FOUND)?;
    let organization = state
        .store
        .get_organization(org_id)
        .await?
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
    Ok(ApiResponse::success(organization))
}

/// GET /api/v1/organizations/:id/users
pub async fn users(
    State(state): State<AppState>,
    Extension(_caller): Extension<Identity>,
    Path(id): Path<String>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Vec<UserSummary>> {
    let org_id = path_id(&id, NOT_FOUND)?;
    let query = UserQuery {
        org_id: Some(org_id),
        search: None,
    };
    let page = page_request(&state, &params);

    let users = state.store.list_users(&query, page).await?;
    Ok(ApiResponse::paginated(users.items, page.pagination(users.total)))
}

/// GET /api/v1/organizations/:id/tickets - tickets opened by any member
pub async fn tickets(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Path(id): Path<String>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Vec<TicketSummary>> {
    require_staff(&caller)?;
    let org_id = path_id(&id, NOT_FOUND)?;

    let mut query = ticket_query(&params, &caller);
    query.org_id = Some(org_id);
    ticket_page(&state, &params, &query).await
}
