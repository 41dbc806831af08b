use axum::{
    extract::{Path, Query, State},
    Extension,
};

use crate::auth::Identity;
use crate::database::models::{Department, DepartmentDetail, DepartmentMember, TicketSummary, Visibility};
use crate::error::ApiError;
use crate::handlers::protected::tickets::{ticket_page, ticket_query};
use crate::handlers::{page_request, path_id, require_staff, QueryParams};
use crate::middleware::{ApiResponse, ApiResult};
use crate::server::AppState;

const NOT_FOUND: &str = "Department not found";

/// GET /api/v1/departments - end users see public departments only
pub async fn list(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Vec<Department>> {
    let visibility = if caller.is_staff_or_key() {
        Visibility::Staff(None)
    } else {
        Visibility::PublicOnly
    };
    let page = page_request(&state, &params);

    let departments = state.store.list_departments(visibility, page).await?;
    Ok(ApiResponse::paginated(departments.items, page.pagination(departments.total)))
}

/// GET /api/v1/departments/:id - detail with staff and open ticket counts
pub async fn get(
    State(state): State<AppState>,
    Extension(_caller): Extension<Identity>,
    Path(id): Path<String>,
) -> ApiResult<DepartmentDetail> {
    let dept_id = path_id(&id, NOT_FOUND)?;
    let department = state
        .store
        .get_department(dept_id)
        .await?
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
    Ok(ApiResponse::success(department))
}

/// GET /api/v1/departments/:id/staff - active members, primary ones first
pub async fn staff(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Path(id): Path<String>,
) -> ApiResult<Vec<DepartmentMember>> {
    require_staff(&caller)?;
    let dept_id = path_id(&id, NOT_FOUND)?;
    if state.store.get_department(dept_id).await?.is_none() {
        return Err(ApiError::not_found(NOT_FOUND));
    }

    Ok(ApiResponse::success(state.store.department_staff(dept_id).await?))
}

/// GET /api/v1/departments/:id/tickets
pub async fn tickets(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Path(id): Path<String>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Vec<TicketSummary>> {
    require_staff(&caller)?;
    let dept_id = path_id(&id, NOT_FOUND)?;

    let mut query = ticket_query(&params, &caller);
    query.dept_id = Some(dept_id);
    ticket_page(&state, &params, &query).await
}
