use axum::{
    extract::{Path, Query, State},
    Extension,
};

use crate::auth::Identity;
use crate::database::models::{TaskDetail, TaskQuery, TaskSummary, ThreadEntry};
use crate::error::ApiError;
use crate::handlers::{int_param, page_request, path_id, require_staff, QueryParams};
use crate::middleware::{ApiResponse, ApiResult};
use crate::server::AppState;

const NOT_FOUND: &str = "Task not found";

/// GET /api/v1/tasks - filter by staff_id, dept_id and team_id
pub async fn list(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Vec<TaskSummary>> {
    require_staff(&caller)?;
    let query = TaskQuery {
        staff_id: int_param(&params, "staff_id"),
        dept_id: int_param(&params, "dept_id"),
        team_id: int_param(&params, "team_id"),
    };
    let page = page_request(&state, &params);

    let tasks = state.store.list_tasks(&query, page).await?;
    Ok(ApiResponse::paginated(tasks.items, page.pagination(tasks.total)))
}

/// GET /api/v1/tasks/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Path(id): Path<String>,
) -> ApiResult<TaskDetail> {
    require_staff(&caller)?;
    let task_id = path_id(&id, NOT_FOUND)?;

    let task = state
        .store
        .get_task(task_id)
        .await?
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
    Ok(ApiResponse::success(task))
}

/// GET /api/v1/tasks/:id/thread - entries oldest first; 404 when the task has no thread
pub async fn thread(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Path(id): Path<String>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Vec<ThreadEntry>> {
    require_staff(&caller)?;
    let task_id = path_id(&id, NOT_FOUND)?;
    let page = page_request(&state, &params);

    let entries = state
        .store
        .task_thread(task_id, page)
        .await?
        .ok_or_else(|| ApiError::not_found("Thread not found"))?;
    Ok(ApiResponse::paginated(entries.items, page.pagination(entries.total)))
}
