use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    Extension, Json,
};

use crate::auth::Identity;
use crate::database::models::{ThreadEntry, ThreadEvent, TicketDetail, TicketQuery, TicketRef, TicketSort, TicketSummary};
use crate::database::query_builder::SortDirection;
use crate::error::ApiError;
use crate::handlers::{flag, int_param, page_request, search_param, QueryParams};
use crate::middleware::{ApiResponse, ApiResult};
use crate::server::AppState;
use crate::services::{CreateTicketRequest, CreatedTicket, IntakeError, TicketWrite};

/// Resolve `:id` and check the caller may see the ticket. Staff and API keys
/// may see any ticket; end users only their own.
async fn accessible_ticket(state: &AppState, caller: &Identity, raw: &str) -> Result<TicketRef, ApiError> {
    let ticket = TicketRef::parse(raw);
    let owner = state
        .store
        .ticket_owner(&ticket)
        .await?
        .ok_or_else(|| ApiError::not_found("Ticket not found"))?;

    if caller.is_staff_or_key() || owner == caller.id {
        Ok(ticket)
    } else {
        Err(ApiError::forbidden("Access denied"))
    }
}

/// Filters shared by every ticket listing. End users are always pinned to
/// their own tickets.
pub(crate) fn ticket_query(params: &QueryParams, caller: &Identity) -> TicketQuery {
    TicketQuery {
        state: params.get("status").filter(|s| !s.is_empty()).cloned(),
        dept_id: int_param(params, "dept_id"),
        staff_id: int_param(params, "staff_id"),
        user_id: int_param(params, "user_id"),
        org_id: None,
        topic_id: int_param(params, "topic_id"),
        priority_id: int_param(params, "priority_id"),
        overdue_only: flag(params, "isoverdue").unwrap_or(false),
        search: search_param(params),
        owner: caller.is_user().then_some(caller.id),
        sort: TicketSort::parse(params.get("sort").map(String::as_str)),
        direction: SortDirection::parse_or_desc(params.get("order").map(String::as_str)),
    }
}

/// One page of `query`, wrapped with pagination
pub(crate) async fn ticket_page(
    state: &AppState,
    params: &QueryParams,
    query: &TicketQuery,
) -> ApiResult<Vec<TicketSummary>> {
    let page = page_request(state, params);
    let tickets = state.store.list_tickets(query, page).await?;
    Ok(ApiResponse::paginated(tickets.items, page.pagination(tickets.total)))
}

/// GET /api/v1/tickets - paginated, filtered ticket list
pub async fn list(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Vec<TicketSummary>> {
    let query = ticket_query(&params, &caller);
    ticket_page(&state, &params, &query).await
}

/// POST /api/v1/tickets - open a ticket on behalf of the calling end user.
/// Other callers are refused before the body is looked at.
pub async fn create(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    body: Result<Json<CreateTicketRequest>, JsonRejection>,
) -> ApiResult<CreatedTicket> {
    if !caller.is_user() {
        return Err(IntakeError::NotEndUser.into());
    }
    let Json(request) = body?;
    let created = state.intake.create(&caller, request).await?;
    Ok(ApiResponse::created(created).with_message("Ticket created successfully"))
}

/// GET /api/v1/tickets/:id - detail by numeric id or ticket number
pub async fn get(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Path(id): Path<String>,
) -> ApiResult<TicketDetail> {
    let ticket = accessible_ticket(&state, &caller, &id).await?;
    let detail = state
        .store
        .get_ticket(&ticket)
        .await?
        .ok_or_else(|| ApiError::not_found("Ticket not found"))?;
    Ok(ApiResponse::success(detail))
}

/// GET /api/v1/tickets/:id/thread - thread entries, oldest first
pub async fn thread(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Path(id): Path<String>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Vec<ThreadEntry>> {
    let ticket = accessible_ticket(&state, &caller, &id).await?;
    let page = page_request(&state, &params);

    let entries = state
        .store
        .thread_entries(&ticket, page)
        .await?
        .ok_or_else(|| ApiError::not_found("Thread not found"))?;
    Ok(ApiResponse::paginated(entries.items, page.pagination(entries.total)))
}

/// GET /api/v1/tickets/:id/events - thread events, newest first
pub async fn events(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Path(id): Path<String>,
) -> ApiResult<Vec<ThreadEvent>> {
    let ticket = accessible_ticket(&state, &caller, &id).await?;
    let events = state
        .store
        .thread_events(&ticket)
        .await?
        .ok_or_else(|| ApiError::not_found("Thread not found"))?;
    Ok(ApiResponse::success(events))
}

async fn not_yet_supported(state: &AppState, caller: &Identity, raw: &str, write: TicketWrite) -> ApiError {
    match accessible_ticket(state, caller, raw).await {
        Ok(_) => IntakeError::NotYetSupported(write).into(),
        Err(err) => err,
    }
}

/// PUT /api/v1/tickets/:id
pub async fn update(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Path(id): Path<String>,
) -> ApiError {
    not_yet_supported(&state, &caller, &id, TicketWrite::Update).await
}

/// POST /api/v1/tickets/:id/reply
pub async fn reply(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Path(id): Path<String>,
) -> ApiError {
    not_yet_supported(&state, &caller, &id, TicketWrite::Reply).await
}

/// POST /api/v1/tickets/:id/note
pub async fn note(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Path(id): Path<String>,
) -> ApiError {
    not_yet_supported(&state, &caller, &id, TicketWrite::Note).await
}
