use axum::{
    extract::{Path, Query, State},
    Extension,
};

use crate::auth::Identity;
use crate::database::models::{Team, TeamDetail, TeamMember};
use crate::error::ApiError;
use crate::handlers::{page_request, path_id, require_staff, QueryParams};
use crate::middleware::{ApiResponse, ApiResult};
use crate::server::AppState;

const NOT_FOUND: &str = "Team not found";

/// GET /api/v1/teams
pub async fn list(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Vec<Team>> {
    require_staff(&caller)?;
    let page = page_request(&state, &params);

    let teams = state.store.list_teams(page).await?;
    Ok(ApiResponse::paginated(teams.items, page.pagination(teams.total)))
}

/// GET /api/v1/teams/:id - team with its active members
pub async fn get(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Path(id): Path<String>,
) -> ApiResult<TeamDetail> {
    require_staff(&caller)?;
    let team_id = path_id(&id, NOT_FOUND)?;

    let team = state
        .store
        .get_team(team_id)
        .await?
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
    Ok(ApiResponse::success(team))
}

/// GET /api/v1/teams/:id/members - every member, active or not
pub async fn members(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Path(id): Path<String>,
) -> ApiResult<Vec<TeamMember>> {
    require_staff(&caller)?;
    let team_id = path_id(&id, NOT_FOUND)?;

    let members = state
        .store
        .team_members(team_id)
        .await?
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
    Ok(ApiResponse::success(members))
}
