use axum::{extract::State, Extension};
use serde::Serialize;

use crate::auth::{Identity, IdentityKind};
use crate::database::models::{Priority, SystemConfig, SystemStats, TicketStatus};
use crate::error::ApiError;
use crate::handlers::require_staff;
use crate::middleware::{ApiResponse, ApiResult};
use crate::server::AppState;

/// Housekeeping jobs reported by the cron endpoint
const CRON_TASKS: [&str; 3] = ["MailFetcher", "TicketMonitor", "CleanExpiredSessions"];

#[derive(Debug, Serialize)]
pub struct CronTask {
    pub name: &'static str,
    pub status: &'static str,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct CronReport {
    pub tasks: Vec<CronTask>,
}

/// GET /api/v1/statuses - every ticket status in display order
pub async fn statuses(State(state): State<AppState>) -> ApiResult<Vec<TicketStatus>> {
    Ok(ApiResponse::success(state.store.list_statuses().await?))
}

/// GET /api/v1/priorities - most urgent first; end users see public priorities only
pub async fn priorities(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
) -> ApiResult<Vec<Priority>> {
    let priorities = state.store.list_priorities(!caller.is_staff_or_key()).await?;
    Ok(ApiResponse::success(priorities))
}

/// GET /api/v1/system/config - core settings, typed
pub async fn config(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
) -> ApiResult<SystemConfig> {
    require_staff(&caller)?;
    Ok(ApiResponse::success(state.store.system_config().await?))
}

/// GET /api/v1/system/stats - ticket and directory counts
pub async fn stats(State(state): State<AppState>, Extension(caller): Extension<Identity>) -> ApiResult<SystemStats> {
    require_staff(&caller)?;
    Ok(ApiResponse::success(state.store.system_stats().await?))
}

/// POST /api/v1/cron - admin staff or an API key with cron permission
pub async fn cron(Extension(caller): Extension<Identity>) -> ApiResult<CronReport> {
    match caller.kind {
        IdentityKind::ApiKey if !caller.has_permission("can_exec_cron") => {
            return Err(ApiError::forbidden("API key does not have cron permission"));
        }
        IdentityKind::ApiKey => {}
        _ if !caller.is_admin => return Err(ApiError::forbidden("Administrator access required")),
        _ => {}
    }

    tracing::info!("Cron run requested by {:?} {}", caller.kind, caller.id);
    let tasks = CRON_TASKS
        .into_iter()
        .map(|name| CronTask {
            name,
            status: "skipped",
            message: "Not implemented",
        })
        .collect();

    Ok(ApiResponse::success(CronReport { tasks }).with_message("Cron execution completed"))
}
