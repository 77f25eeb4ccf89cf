use crate::handlers::{
    accounts::{create_account, create_person, get_me, get_persons},
    budget::{
        get_category_averages, get_category_progress, get_spending_comparison, get_targets,
        save_targets,
    },
    categories::get_categories,
    connections::{
        delete_connection, get_connections, get_feed_status, register_connection, sync_connection,
    },
    expenses::{
        bulk_update_expenses, create_expenses, delete_expenses, get_expenses, import_transactions,
        update_expense,
    },
    health::health_check,
    scopes::{
        create_household, get_pending_invites, get_scope_members, get_scopes, invite_member,
        respond_to_invite,
    },
};
use crate::schemas::{ApiDoc, AppState};
use axum::{
    routing::{delete, get, post, put},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Create application router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Accounts and persons
        .route("/api/v1/accounts", post(create_account))
        .route("/api/v1/me", get(get_me))
        .route("/api/v1/persons", get(get_persons).post(create_person))
        // Scopes and households
        .route("/api/v1/scopes", get(get_scopes))
        .route("/api/v1/scopes/:scope_id/members", get(get_scope_members))
        .route("/api/v1/households", post(create_household))
        .route("/api/v1/households/:scope_id/invites", post(invite_member))
        .route("/api/v1/households/:scope_id/respond", post(respond_to_invite))
        .route("/api/v1/invites", get(get_pending_invites))
        // Expense ledger
        .route("/api/v1/expenses", get(get_expenses).post(create_expenses))
        .route("/api/v1/expenses/bulk", put(bulk_update_expenses))
        .route("/api/v1/expenses/delete", post(delete_expenses))
        .route("/api/v1/expenses/:expense_id", put(update_expense))
        .route("/api/v1/scopes/:scope_id/imports", post(import_transactions))
        // Feed connections
        .route("/api/v1/connections", get(get_connections).post(register_connection))
        .route("/api/v1/connections/status", get(get_feed_status))
        .route("/api/v1/connections/:item_id", delete(delete_connection))
        .route("/api/v1/connections/:item_id/sync", post(sync_connection))
        // Targets and analytics
        .route("/api/v1/targets", get(get_targets).put(save_targets))
        .route("/api/v1/analytics/averages", get(get_category_averages))
        .route("/api/v1/analytics/progress", get(get_category_progress))
        .route("/api/v1/analytics/comparison", get(get_spending_comparison))
        .route("/api/v1/categories", get(get_categories))
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Add middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(TimeoutLayer::new(Duration::from_secs(30)))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
