use crate::auth::AuthenticatedAccount;
use crate::handlers::respond;
use crate::schemas::{compute_error_response, ApiResponse, AppState, ErrorResponse, HandlerError};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use axum_valid::Valid;
use chrono::NaiveDate;
use common::{FeedTransaction, IngestSummary};
use compute::error::ComputeError;
use compute::ledger::{
    self, BulkExpenseUpdate, ExpenseFilter, ExpenseRecord, ExpenseUpdate, ManualExpense,
};
use model::entities::{expense, person};
use rust_decimal::Decimal;
use sea_orm::{ActiveEnum, EntityTrait};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace, warn};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Query parameters for listing expenses
#[derive(Debug, Deserialize, ToSchema, IntoParams, Validate)]
pub struct ExpenseQuery {
    /// Restrict to one scope; defaults to every accessible scope
    pub scope_id: Option<i32>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[validate(length(min = 1))]
    pub category: Option<String>,
    /// "manual" or "feed"
    pub source_type: Option<String>,
}

/// One manually entered expense
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, Validate)]
pub struct ManualExpenseRequest {
    pub scope_id: i32,
    /// Person the expense is attributed to; omitted means joint
    pub person_id: Option<i32>,
    pub date: NaiveDate,
    pub amount: Decimal,
    #[validate(length(min = 1, max = 100))]
    pub category: String,
    #[validate(length(max = 200))]
    pub merchant_name: Option<String>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

impl From<ManualExpenseRequest> for ManualExpense {
    fn from(request: ManualExpenseRequest) -> Self {
        Self {
            scope_id: request.scope_id,
            person_id: request.person_id,
            date: request.date,
            amount: request.amount,
            category: request.category,
            merchant_name: request.merchant_name,
            notes: request.notes,
        }
    }
}

/// Batch of manual expenses, recorded all or nothing
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct CreateExpensesRequest {
    #[validate(length(min = 1, max = 500), nested)]
    pub expenses: Vec<ManualExpenseRequest>,
}

/// Partial update of an expense. Omitted fields are left unchanged;
/// `null` clears nullable ones.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema, Validate)]
pub struct UpdateExpenseRequest {
    pub scope_id: Option<i32>,
    #[serde(default, deserialize_with = "common::double_option", skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<i32>)]
    pub person_id: Option<Option<i32>>,
    pub date: Option<NaiveDate>,
    pub amount: Option<Decimal>,
    pub adjusted_amount: Option<Decimal>,
    #[validate(length(min = 1, max = 100))]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "common::double_option", skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub merchant_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "common::double_option", skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub notes: Option<Option<String>>,
}

impl From<UpdateExpenseRequest> for ExpenseUpdate {
    fn from(request: UpdateExpenseRequest) -> Self {
        Self {
            scope_id: request.scope_id,
            person_id: request.person_id,
            date: request.date,
            amount: request.amount,
            adjusted_amount: request.adjusted_amount,
            category: request.category,
            merchant_name: request.merchant_name,
            notes: request.notes,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct BulkUpdateRequest {
    #[validate(length(min = 1, max = 1000))]
    pub expense_ids: Vec<i32>,
    #[validate(length(min = 1, max = 100))]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "common::double_option", skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<i32>)]
    pub person_id: Option<Option<i32>>,
}

#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct DeleteExpensesRequest {
    #[validate(length(min = 1, max = 1000))]
    pub expense_ids: Vec<i32>,
}

/// Feed records pushed directly into a scope
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct ImportRequest {
    #[validate(length(min = 1, max = 5000))]
    pub transactions: Vec<FeedTransaction>,
}

/// Expense response model
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ExpenseResponse {
    pub id: i32,
    pub scope_id: i32,
    pub person_id: Option<i32>,
    /// Name of the person, or "Joint"
    pub person_name: String,
    pub date: NaiveDate,
    pub day_of_week: String,
    pub amount: Decimal,
    pub adjusted_amount: Option<Decimal>,
    pub category: String,
    pub suggested_category: Option<String>,
    pub category_confirmed: bool,
    pub is_income: bool,
    pub currency: Option<String>,
    pub merchant_name: Option<String>,
    pub notes: Option<String>,
    /// "manual" or "feed"
    pub source_type: String,
    pub pending: Option<bool>,
}

impl ExpenseResponse {
    fn new(model: expense::Model, person_name: String) -> Self {
        Self {
            id: model.id,
            scope_id: model.scope_id,
            person_id: model.person_id,
            person_name,
            date: model.expense_date,
            day_of_week: model.day_of_week,
            amount: model.amount,
            adjusted_amount: model.adjusted_amount,
            category: model.category,
            suggested_category: model.suggested_category,
            category_confirmed: model.category_confirmed,
            is_income: model.is_income,
            currency: model.currency,
            merchant_name: model.merchant_name,
            notes: model.notes,
            source_type: model.source_type.to_value(),
            pending: model.feed_pending,
        }
    }
}

impl From<ExpenseRecord> for ExpenseResponse {
    fn from(record: ExpenseRecord) -> Self {
        Self::new(record.expense, record.person_name)
    }
}

/// Person label for a freshly written expense, where only the id is at hand.
async fn person_label(state: &AppState, person_id: Option<i32>) -> Result<String, HandlerError> {
    let Some(person_id) = person_id else {
        return Ok(ledger::JOINT.to_string());
    };
    match person::Entity::find_by_id(person_id).one(&state.db).await {
        Ok(found) => Ok(found.map_or_else(|| ledger::JOINT.to_string(), |person| person.name)),
        Err(e) => Err(compute_error_response(e.into())),
    }
}

/// List expenses in the caller's scopes
#[utoipa::path(
    get,
    path = "/api/v1/expenses",
    tag = "expenses",
    security(("account_id" = [])),
    params(ExpenseQuery),
    responses(
        (status = 200, description = "Expenses retrieved successfully", body = ApiResponse<Vec<ExpenseResponse>>),
        (status = 400, description = "Invalid filter", body = ErrorResponse),
        (status = 403, description = "No access to scope", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_expenses(
    State(state): State<AppState>,
    caller: AuthenticatedAccount,
    Valid(Query(query)): Valid<Query<ExpenseQuery>>,
) -> Result<(StatusCode, Json<ApiResponse<Vec<ExpenseResponse>>>), HandlerError> {
    trace!("Entering get_expenses function");

    let source_type = match query.source_type.as_deref() {
        Some(raw) => Some(expense::SourceType::try_from_value(&raw.to_string()).map_err(|_| {
            compute_error_response(ComputeError::Validation(format!("Unknown source type '{raw}'")))
        })?),
        None => None,
    };

    let filter = ExpenseFilter {
        scope_id: query.scope_id,
        start_date: query.start_date,
        end_date: query.end_date,
        category: query.category,
        source_type,
    };

    let records = ledger::list_expenses(&state.db, caller.id(), filter)
        .await
        .map_err(compute_error_response)?;
    debug!("Found {} expenses for account {}", records.len(), caller.id());

    let data = records.into_iter().map(ExpenseResponse::from).collect();
    Ok(respond(StatusCode::OK, data, "Expenses retrieved successfully"))
}

/// Record one or more manual expenses
#[utoipa::path(
    post,
    path = "/api/v1/expenses",
    tag = "expenses",
    security(("account_id" = [])),
    request_body = CreateExpensesRequest,
    responses(
        (status = 201, description = "Expenses created successfully", body = ApiResponse<Vec<ExpenseResponse>>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 403, description = "No access to scope", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn create_expenses(
    State(state): State<AppState>,
    caller: AuthenticatedAccount,
    Valid(Json(request)): Valid<Json<CreateExpensesRequest>>,
) -> Result<(StatusCode, Json<ApiResponse<Vec<ExpenseResponse>>>), HandlerError> {
    trace!("Entering create_expenses function");
    debug!("Recording {} manual expenses", request.expenses.len());

    let entries = request.expenses.into_iter().map(ManualExpense::from).collect();
    let stored = ledger::record_manual_batch(&state.db, caller.id(), entries)
        .await
        .map_err(|e| {
            warn!("Manual expense batch rejected: {}", e);
            compute_error_response(e)
        })?;
    state.invalidate_analytics().await;
    info!("Recorded {} manual expenses for account {}", stored.len(), caller.id());

    let persons = compute::access::list_persons(&state.db, caller.id())
        .await
        .map_err(compute_error_response)?;
    let data = stored
        .into_iter()
        .map(|model| {
            let name = model
                .person_id
                .and_then(|id| persons.iter().find(|person| person.id == id))
                .map_or_else(|| ledger::JOINT.to_string(), |person| person.name.clone());
            ExpenseResponse::new(model, name)
        })
        .collect();
    Ok(respond(StatusCode::CREATED, data, "Expenses created successfully"))
}

/// Update one expense
#[utoipa::path(
    put,
    path = "/api/v1/expenses/{expense_id}",
    tag = "expenses",
    security(("account_id" = [])),
    params(("expense_id" = i32, Path, description = "Expense id")),
    request_body = UpdateExpenseRequest,
    responses(
        (status = 200, description = "Expense updated successfully", body = ApiResponse<ExpenseResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 404, description = "Expense not found or not authorized", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn update_expense(
    State(state): State<AppState>,
    caller: AuthenticatedAccount,
    Path(expense_id): Path<i32>,
    Valid(Json(request)): Valid<Json<UpdateExpenseRequest>>,
) -> Result<(StatusCode, Json<ApiResponse<ExpenseResponse>>), HandlerError> {
    trace!("Entering update_expense function");

    let updated = ledger::update_expense(&state.db, caller.id(), expense_id, request.into())
        .await
        .map_err(compute_error_response)?;
    state.invalidate_analytics().await;
    info!("Expense {} updated", expense_id);

    let name = person_label(&state, updated.person_id).await?;
    Ok(respond(StatusCode::OK, ExpenseResponse::new(updated, name), "Expense updated successfully"))
}

/// Apply the same category or person to several expenses
#[utoipa::path(
    put,
    path = "/api/v1/expenses/bulk",
    tag = "expenses",
    security(("account_id" = [])),
    request_body = BulkUpdateRequest,
    responses(
        (status = 200, description = "Expenses updated successfully", body = ApiResponse<usize>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 404, description = "An expense was not found or not authorized", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn bulk_update_expenses(
    State(state): State<AppState>,
    caller: AuthenticatedAccount,
    Valid(Json(request)): Valid<Json<BulkUpdateRequest>>,
) -> Result<(StatusCode, Json<ApiResponse<usize>>), HandlerError> {
    trace!("Entering bulk_update_expenses function");

    let update = BulkExpenseUpdate {
        expense_ids: request.expense_ids,
        category: request.category,
        person_id: request.person_id,
    };
    let count = ledger::bulk_update_expenses(&state.db, caller.id(), update)
        .await
        .map_err(compute_error_response)?;
    state.invalidate_analytics().await;

    Ok(respond(StatusCode::OK, count, "Expenses updated successfully"))
}

/// Delete several expenses
#[utoipa::path(
    post,
    path = "/api/v1/expenses/delete",
    tag = "expenses",
    security(("account_id" = [])),
    request_body = DeleteExpensesRequest,
    responses(
        (status = 200, description = "Expenses deleted successfully", body = ApiResponse<u64>),
        (status = 404, description = "An expense was not found or not authorized", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn delete_expenses(
    State(state): State<AppState>,
    caller: AuthenticatedAccount,
    Valid(Json(request)): Valid<Json<DeleteExpensesRequest>>,
) -> Result<(StatusCode, Json<ApiResponse<u64>>), HandlerError> {
    trace!("Entering delete_expenses function");

    let deleted = ledger::delete_expenses(&state.db, caller.id(), &request.expense_ids)
        .await
        .map_err(compute_error_response)?;
    state.invalidate_analytics().await;
    info!("Deleted {} expenses for account {}", deleted, caller.id());

    Ok(respond(StatusCode::OK, deleted, "Expenses deleted successfully"))
}

/// Ingest a batch of feed records into a scope
///
/// Records already present are skipped.
#[utoipa::path(
    post,
    path = "/api/v1/scopes/{scope_id}/imports",
    tag = "expenses",
    security(("account_id" = [])),
    params(("scope_id" = i32, Path, description = "Target scope id")),
    request_body = ImportRequest,
    responses(
        (status = 200, description = "Batch ingested", body = ApiResponse<IngestSummary>),
        (status = 400, description = "A record is missing its identifiers", body = ErrorResponse),
        (status = 403, description = "No access to scope", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request))]
pub async fn import_transactions(
    State(state): State<AppState>,
    caller: AuthenticatedAccount,
    Path(scope_id): Path<i32>,
    Valid(Json(request)): Valid<Json<ImportRequest>>,
) -> Result<(StatusCode, Json<ApiResponse<IngestSummary>>), HandlerError> {
    trace!("Entering import_transactions function");
    debug!("Importing {} feed records into scope {}", request.transactions.len(), scope_id);

    let summary = ledger::import_transactions(&state.db, caller.id(), scope_id, &request.transactions)
        .await
        .map_err(compute_error_response)?;
    if summary.inserted > 0 {
        state.invalidate_analytics().await;
    }

    Ok(respond(StatusCode::OK, summary, "Transactions imported successfully"))
}
