use axum::{
    extract::{Path, Query, State},
    Extension,
};

use crate::auth::Identity;
use crate::database::models::{StaffDepartment, StaffDetail, StaffQuery, StaffSummary, StaffTeam, TicketSummary};
use crate::error::ApiError;
use crate::handlers::protected::tickets::{ticket_page, ticket_query};
use crate::handlers::{flag, int_param, page_request, path_id, require_staff, QueryParams};
use crate::middleware::{ApiResponse, ApiResult};
use crate::server::AppState;

const NOT_FOUND: &str = "Staff member not found";

/// GET /api/v1/staff - filter by dept_id and isactive
pub async fn list(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Vec<StaffSummary>> {
    require_staff(&caller)?;
    let query = StaffQuery {
        dept_id: int_param(&params, "dept_id"),
        isactive: flag(&params, "isactive"),
    };
    let page = page_request(&state, &params);

    let staff = state.store.list_staff(&query, page).await?;
    Ok(ApiResponse::paginated(staff.items, page.pagination(staff.total)))
}

/// GET /api/v1/staff/:id - profile with role permissions, departments and teams
pub async fn get(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Path(id): Path<String>,
) -> ApiResult<StaffDetail> {
    require_staff(&caller)?;
    let staff_id = path_id(&id, NOT_FOUND)?;

    let staff = state
        .store
        .get_staff(staff_id)
        .await?
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
    Ok(ApiResponse::success(staff))
}

/// GET /api/v1/staff/:id/tickets - tickets assigned to the staff member
pub async fn tickets(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Path(id): Path<String>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Vec<TicketSummary>> {
    require_staff(&caller)?;
    let staff_id = path_id(&id, NOT_FOUND)?;

    let mut query = ticket_query(&params, &caller);
    query.staff_id = Some(staff_id);
    ticket_page(&state, &params, &query).await
}

/// GET /api/v1/staff/:id/departments - primary department first
pub async fn departments(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Path(id): Path<String>,
) -> ApiResult<Vec<StaffDepartment>> {
    require_staff(&caller)?;
    let staff_id = path_id(&id, NOT_FOUND)?;

    let departments = state
        .store
        .staff_departments(staff_id)
        .await?
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
    Ok(ApiResponse::success(departments))
}

/// GET /api/v1/staff/:id/teams
pub async fn teams(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Path(id): Path<String>,
) -> ApiResult<Vec<StaffTeam>> {
    require_staff(&caller)?;
    let staff_id = path_id(&id, NOT_FOUND)?;
    Ok(ApiResponse::success(state.store.staff_teams(staff_id).await?))
}
