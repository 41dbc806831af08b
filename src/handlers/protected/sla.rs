use axum::{
    extract::{Path, State},
    Extension,
};

use crate::auth::Identity;
use crate::database::models::{SlaDetail, SlaPlan};
use crate::error::ApiError;
use crate::handlers::{path_id, require_staff};
use crate::middleware::{ApiResponse, ApiResult};
use crate::server::AppState;

const NOT_FOUND: &str = "SLA plan not found";

/// GET /api/v1/sla - every plan, by name
pub async fn list(State(state): State<AppState>, Extension(caller): Extension<Identity>) -> ApiResult<Vec<SlaPlan>> {
    require_staff(&caller)?;
    Ok(ApiResponse::success(state.store.list_slas().await?))
}

/// GET /api/v1/sla/:id - plan with where it is used
pub async fn get(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Path(id): Path<String>,
) -> ApiResult<SlaDetail> {
    require_staff(&caller)?;
    let sla_id = path_id(&id, NOT_FOUND)?;

    let sla = state
        .store
        .get_sla(sla_id)
        .await?
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
    Ok(ApiResponse::success(sla))
}
