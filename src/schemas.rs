use axum::{http::StatusCode, response::Json};
use common::{
    CategoryAverage, CategoryProgress, FeedPage, FeedTransaction, IngestSummary,
    PersonalFinanceCategory, RemovedTransaction, SpendingComparison, SyncResult,
};
use compute::error::ComputeError;
use compute::feed::TransactionFeed;
use moka::future::Cache;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi, ToSchema};

pub use common::ApiResponse;

use crate::handlers::{accounts, budget, categories, connections, expenses, health, scopes};

/// Application state shared across handlers
#[derive(Clone, Debug)]
pub struct AppState {
    /// Database connection
    pub db: DatabaseConnection,
    /// Cache for expensive operations
    pub cache: Cache<String, CachedData>,
    /// External transaction feed used by connection syncs
    pub feed: Arc<dyn TransactionFeed>,
}

impl AppState {
    /// Drops every cached analytics result. Called after any ledger or target write.
    pub async fn invalidate_analytics(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
    }
}

/// Cached data types
#[derive(Clone, Debug)]
pub enum CachedData {
    CategoryAverages(Vec<CategoryAverage>),
}

/// Error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
    /// Error code
    pub code: String,
    /// Success status (always false for errors)
    pub success: bool,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: &str) -> Self {
        Self {
            error: error.into(),
            code: code.to_string(),
            success: false,
        }
    }
}

pub type HandlerError = (StatusCode, Json<ErrorResponse>);

/// Maps an engine failure onto the HTTP status and error code returned to clients.
pub fn compute_error_response(err: ComputeError) -> HandlerError {
    let (status, message, code) = match err {
        ComputeError::Validation(message) => (StatusCode::BAD_REQUEST, message, "VALIDATION_ERROR"),
        ComputeError::Forbidden(message) => (StatusCode::FORBIDDEN, message, "FORBIDDEN"),
        ComputeError::NotFound(message) => (StatusCode::NOT_FOUND, message, "NOT_FOUND"),
        ComputeError::Feed(message) => {
            error!("Feed error: {}", message);
            (StatusCode::BAD_GATEWAY, message, "FEED_ERROR")
        }
        ComputeError::Database(db_error) => {
            error!("Database error: {}", db_error);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "A database error occurred".to_string(),
                "DATABASE_ERROR",
            )
        }
    };
    (status, Json(ErrorResponse::new(message, code)))
}

/// Health check response
#[derive(Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
    /// Database connection status
    pub database: String,
}

struct AccountHeader;

impl Modify for AccountHeader {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "account_id",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(crate::auth::ACCOUNT_HEADER))),
            );
        }
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        accounts::create_account,
        accounts::get_me,
        accounts::get_persons,
        accounts::create_person,
        scopes::get_scopes,
        scopes::create_household,
        scopes::invite_member,
        scopes::respond_to_invite,
        scopes::get_pending_invites,
        scopes::get_scope_members,
        expenses::get_expenses,
        expenses::create_expenses,
        expenses::update_expense,
        expenses::bulk_update_expenses,
        expenses::delete_expenses,
        expenses::import_transactions,
        connections::register_connection,
        connections::get_connections,
        connections::delete_connection,
        connections::sync_connection,
        connections::get_feed_status,
        budget::get_targets,
        budget::save_targets,
        budget::get_category_averages,
        budget::get_category_progress,
        budget::get_spending_comparison,
        categories::get_categories,
    ),
    components(
        schemas(
            ErrorResponse,
            HealthResponse,
            accounts::CreateAccountRequest,
            accounts::AccountResponse,
            accounts::CreatePersonRequest,
            accounts::PersonResponse,
            scopes::CreateHouseholdRequest,
            scopes::InviteRequest,
            scopes::InviteResponseRequest,
            scopes::ScopeResponse,
            scopes::PendingInviteResponse,
            scopes::MemberResponse,
            expenses::ManualExpenseRequest,
            expenses::CreateExpensesRequest,
            expenses::UpdateExpenseRequest,
            expenses::BulkUpdateRequest,
            expenses::DeleteExpensesRequest,
            expenses::ImportRequest,
            expenses::ExpenseResponse,
            connections::RegisterConnectionRequest,
            connections::ConnectionResponse,
            connections::FeedStatusResponse,
            budget::TargetRequest,
            budget::SaveTargetsRequest,
            budget::TargetResponse,
            FeedTransaction,
            FeedPage,
            PersonalFinanceCategory,
            RemovedTransaction,
            IngestSummary,
            SyncResult,
            CategoryAverage,
            CategoryProgress,
            SpendingComparison,
        )
    ),
    modifiers(&AccountHeader),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "accounts", description = "Account provisioning and persons"),
        (name = "scopes", description = "Personal and household scopes, invitations"),
        (name = "expenses", description = "Expense ledger"),
        (name = "connections", description = "Transaction feed connections"),
        (name = "budget", description = "Category targets and spending analytics"),
        (name = "categories", description = "Category taxonomy"),
    ),
    info(
        title = "HearthLedger API",
        description = "Household expense tracking with shared scopes, feed ingestion and budget analytics",
        version = "0.1.0",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    )
)]
pub struct ApiDoc;
