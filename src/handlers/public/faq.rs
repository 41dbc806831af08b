use axum::{
    extract::{Path, Query, State},
    Extension,
};

use crate::auth::Identity;
use crate::database::models::{Faq, FaqCategory, FaqDetail, FaqQuery};
use crate::error::ApiError;
use crate::handlers::public::is_staff;
use crate::handlers::{int_param, page_request, path_id, search_param, QueryParams};
use crate::middleware::{ApiResponse, ApiResult};
use crate::server::AppState;

const NOT_FOUND: &str = "FAQ article not found";

/// GET /api/v1/faq - published articles; private categories are staff only
pub async fn list(
    State(state): State<AppState>,
    caller: Option<Extension<Identity>>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Vec<Faq>> {
    let query = FaqQuery {
        category_id: int_param(&params, "category_id"),
        search: search_param(&params),
        public_only: !is_staff(&caller),
    };
    let page = page_request(&state, &params);

    let faqs = state.store.list_faqs(&query, page).await?;
    Ok(ApiResponse::paginated(faqs.items, page.pagination(faqs.total)))
}

/// GET /api/v1/faq/categories - with published article counts
pub async fn categories(
    State(state): State<AppState>,
    caller: Option<Extension<Identity>>,
) -> ApiResult<Vec<FaqCategory>> {
    let categories = state.store.list_faq_categories(!is_staff(&caller)).await?;
    Ok(ApiResponse::success(categories))
}

/// GET /api/v1/faq/:id - hidden articles read as missing to non-staff
pub async fn get(
    State(state): State<AppState>,
    caller: Option<Extension<Identity>>,
    Path(id): Path<String>,
) -> ApiResult<FaqDetail> {
    let faq_id = path_id(&id, NOT_FOUND)?;
    let faq = state
        .store
        .get_faq(faq_id)
        .await?
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;

    if !faq.is_public() && !is_staff(&caller) {
        return Err(ApiError::not_found(NOT_FOUND));
    }
    Ok(ApiResponse::success(faq))
}
