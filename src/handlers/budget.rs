use crate::auth::AuthenticatedAccount;
use crate::handlers::respond;
use crate::schemas::{compute_error_response, ApiResponse, AppState, CachedData, ErrorResponse, HandlerError};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
};
use axum_valid::Valid;
use chrono::NaiveDate;
use common::{CategoryAverage, CategoryProgress, SpendingComparison};
use compute::budget::{self, TargetInput};
use compute::default_compute;
use model::entities::category_target;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Optional scope narrowing shared by the analytics endpoints
#[derive(Debug, Deserialize, IntoParams)]
pub struct ScopeQuery {
    /// Restrict to one scope; defaults to every accessible scope
    pub scope_id: Option<i32>,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, Validate)]
pub struct TargetRequest {
    #[validate(length(min = 1, max = 100))]
    pub category_name: String,
    pub target_amount: Decimal,
}

/// Replaces every active target of the caller in one scope
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct SaveTargetsRequest {
    pub scope_id: i32,
    #[validate(length(max = 100), nested)]
    pub targets: Vec<TargetRequest>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TargetResponse {
    pub id: i32,
    pub scope_id: i32,
    pub category_name: String,
    pub target_amount: Decimal,
    pub created_at: NaiveDate,
}

impl From<category_target::Model> for TargetResponse {
    fn from(model: category_target::Model) -> Self {
        Self {
            id: model.id,
            scope_id: model.scope_id,
            category_name: model.category_name,
            target_amount: model.target_amount,
            created_at: model.created_at,
        }
    }
}

fn averages_cache_key(account_id: i32, scope_id: Option<i32>) -> String {
    match scope_id {
        Some(scope_id) => format!("averages:{account_id}:{scope_id}"),
        None => format!("averages:{account_id}:all"),
    }
}

/// Get the caller's active category targets
#[utoipa::path(
    get,
    path = "/api/v1/targets",
    tag = "budget",
    security(("account_id" = [])),
    params(ScopeQuery),
    responses(
        (status = 200, description = "Targets retrieved successfully", body = ApiResponse<Vec<TargetResponse>>),
        (status = 403, description = "No access to scope", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_targets(
    State(state): State<AppState>,
    caller: AuthenticatedAccount,
    Query(query): Query<ScopeQuery>,
) -> Result<(StatusCode, Json<ApiResponse<Vec<TargetResponse>>>), HandlerError> {
    trace!("Entering get_targets function");

    let targets = budget::get_category_targets(&state.db, caller.id(), query.scope_id)
        .await
        .map_err(compute_error_response)?;

    let data = targets.into_iter().map(TargetResponse::from).collect();
    Ok(respond(StatusCode::OK, data, "Targets retrieved successfully"))
}

/// Replace the caller's category targets in a scope
#[utoipa::path(
    put,
    path = "/api/v1/targets",
    tag = "budget",
    security(("account_id" = [])),
    request_body = SaveTargetsRequest,
    responses(
        (status = 200, description = "Targets saved successfully", body = ApiResponse<Vec<TargetResponse>>),
        (status = 400, description = "Invalid target set", body = ErrorResponse),
        (status = 403, description = "No access to scope", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn save_targets(
    State(state): State<AppState>,
    caller: AuthenticatedAccount,
    Valid(Json(request)): Valid<Json<SaveTargetsRequest>>,
) -> Result<(StatusCode, Json<ApiResponse<Vec<TargetResponse>>>), HandlerError> {
    trace!("Entering save_targets function");
    debug!("Saving {} targets for scope {}", request.targets.len(), request.scope_id);

    let inputs = request
        .targets
        .into_iter()
        .map(|target| TargetInput {
            category_name: target.category_name,
            target_amount: target.target_amount,
        })
        .collect();

    let saved = budget::save_category_targets(&state.db, caller.id(), request.scope_id, inputs)
        .await
        .map_err(compute_error_response)?;
    state.invalidate_analytics().await;
    info!("Saved {} targets for account {}", saved.len(), caller.id());

    let data = saved.into_iter().map(TargetResponse::from).collect();
    Ok(respond(StatusCode::OK, data, "Targets saved successfully"))
}

/// Average monthly spend per category over the trailing twelve months
#[utoipa::path(
    get,
    path = "/api/v1/analytics/averages",
    tag = "budget",
    security(("account_id" = [])),
    params(ScopeQuery),
    responses(
        (status = 200, description = "Category averages retrieved successfully", body = ApiResponse<Vec<CategoryAverage>>),
        (status = 403, description = "No access to scope", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_category_averages(
    State(state): State<AppState>,
    caller: AuthenticatedAccount,
    Query(query): Query<ScopeQuery>,
) -> Result<(StatusCode, Json<ApiResponse<Vec<CategoryAverage>>>), HandlerError> {
    trace!("Entering get_category_averages function");

    let cache_key = averages_cache_key(caller.id(), query.scope_id);
    if let Some(CachedData::CategoryAverages(averages)) = state.cache.get(&cache_key).await {
        debug!("Returning cached category averages for key: {}", cache_key);
        return Ok(respond(StatusCode::OK, averages, "Category averages retrieved successfully"));
    }

    let averages = default_compute(None)
        .category_averages(&state.db, caller.id(), query.scope_id)
        .await
        .map_err(compute_error_response)?;
    state
        .cache
        .insert(cache_key, CachedData::CategoryAverages(averages.clone()))
        .await;

    Ok(respond(StatusCode::OK, averages, "Category averages retrieved successfully"))
}

/// Current-month progress against each target, plus "Everything Else"
#[utoipa::path(
    get,
    path = "/api/v1/analytics/progress",
    tag = "budget",
    security(("account_id" = [])),
    params(ScopeQuery),
    responses(
        (status = 200, description = "Category progress retrieved successfully", body = ApiResponse<Vec<CategoryProgress>>),
        (status = 403, description = "No access to scope", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_category_progress(
    State(state): State<AppState>,
    caller: AuthenticatedAccount,
    Query(query): Query<ScopeQuery>,
) -> Result<(StatusCode, Json<ApiResponse<Vec<CategoryProgress>>>), HandlerError> {
    trace!("Entering get_category_progress function");

    let progress = default_compute(None)
        .category_progress(&state.db, caller.id(), query.scope_id)
        .await
        .map_err(compute_error_response)?;

    Ok(respond(StatusCode::OK, progress, "Category progress retrieved successfully"))
}

/// Month-to-date spending compared with the historical monthly average
///
/// `data` is null when there is no spending history yet.
#[utoipa::path(
    get,
    path = "/api/v1/analytics/comparison",
    tag = "budget",
    security(("account_id" = [])),
    params(ScopeQuery),
    responses(
        (status = 200, description = "Spending comparison retrieved successfully", body = ApiResponse<Option<SpendingComparison>>),
        (status = 403, description = "No access to scope", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_spending_comparison(
    State(state): State<AppState>,
    caller: AuthenticatedAccount,
    Query(query): Query<ScopeQuery>,
) -> Result<(StatusCode, Json<ApiResponse<Option<SpendingComparison>>>), HandlerError> {
    trace!("Entering get_spending_comparison function");

    let comparison = default_compute(None)
        .spending_comparison(&state.db, caller.id(), query.scope_id)
        .await
        .map_err(compute_error_response)?;

    let message = match comparison {
        Some(_) => "Spending comparison retrieved successfully",
        None => "Not enough spending history for a comparison",
    };
    Ok(respond(StatusCode::OK, comparison, message))
}
