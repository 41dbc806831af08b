use axum::{
    extract::{Path, Query, State},
    Extension,
};

use crate::auth::Identity;
use crate::database::models::{Topic, Visibility};
use crate::error::ApiError;
use crate::handlers::public::is_staff;
use crate::handlers::{flag, page_request, QueryParams};
use crate::middleware::{ApiResponse, ApiResult};
use crate::server::AppState;

/// GET /api/v1/topics - help topics; anonymous callers and end users see public ones only
pub async fn list(
    State(state): State<AppState>,
    caller: Option<Extension<Identity>>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Vec<Topic>> {
    let visibility = if is_staff(&caller) {
        Visibility::Staff(flag(&params, "ispublic"))
    } else {
        Visibility::PublicOnly
    };
    let page = page_request(&state, &params);

    let topics = state.store.list_topics(visibility, page).await?;
    Ok(ApiResponse::paginated(topics.items, page.pagination(topics.total)))
}

/// GET /api/v1/topics/:id - topic detail with attached forms
pub async fn get(
    State(state): State<AppState>,
    caller: Option<Extension<Identity>>,
    Path(id): Path<String>,
) -> ApiResult<Topic> {
    let not_found = || ApiError::not_found("Help topic not found");
    let topic_id: i64 = id.parse().map_err(|_| not_found())?;

    let topic = state.store.get_topic(topic_id).await?.ok_or_else(not_found)?;
    if !topic.ispublic && !is_staff(&caller) {
        return Err(not_found());
    }
    Ok(ApiResponse::success(topic))
}
