use crate::auth::AuthenticatedAccount;
use crate::handlers::respond;
use crate::schemas::{compute_error_response, ApiResponse, AppState, ErrorResponse, HandlerError};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use axum_valid::Valid;
use chrono::{NaiveDate, NaiveDateTime};
use common::SyncResult;
use compute::sync::{self, ConnectionSummary, FeedStatus, NewConnection};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, trace};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Links an institution on the transaction feed to a scope
#[derive(Deserialize, Serialize, ToSchema, Validate)]
pub struct RegisterConnectionRequest {
    pub scope_id: i32,
    /// Provider-side item identifier
    #[validate(length(min = 1, max = 200))]
    pub item_id: String,
    #[validate(length(min = 1, max = 500))]
    pub access_token: String,
    pub institution_id: Option<String>,
    pub institution_name: Option<String>,
}

impl std::fmt::Debug for RegisterConnectionRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterConnectionRequest")
            .field("scope_id", &self.scope_id)
            .field("item_id", &self.item_id)
            .field("access_token", &"<redacted>")
            .field("institution_id", &self.institution_id)
            .field("institution_name", &self.institution_name)
            .finish()
    }
}

/// Connection response model. The access token is never returned.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ConnectionResponse {
    pub id: i32,
    pub item_id: String,
    pub scope_id: i32,
    pub scope_name: String,
    pub institution_id: Option<String>,
    pub institution_name: Option<String>,
    pub last_synced: Option<NaiveDateTime>,
    pub created_at: NaiveDate,
}

impl From<ConnectionSummary> for ConnectionResponse {
    fn from(summary: ConnectionSummary) -> Self {
        let connection = summary.connection;
        Self {
            id: connection.id,
            item_id: connection.item_id,
            scope_id: connection.scope_id,
            scope_name: summary.scope_name,
            institution_id: connection.institution_id,
            institution_name: connection.institution_name,
            last_synced: connection.last_synced,
            created_at: connection.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FeedStatusResponse {
    pub has_connections: bool,
    pub connection_count: u64,
    pub feed_transaction_count: u64,
}

impl From<FeedStatus> for FeedStatusResponse {
    fn from(status: FeedStatus) -> Self {
        Self {
            has_connections: status.has_connections,
            connection_count: status.connection_count,
            feed_transaction_count: status.feed_transaction_count,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct RemoveConnectionQuery {
    /// Also delete the expenses this connection's syncs delivered
    #[serde(default)]
    pub delete_transactions: bool,
}

/// Register a feed connection
#[utoipa::path(
    post,
    path = "/api/v1/connections",
    tag = "connections",
    security(("account_id" = [])),
    request_body = RegisterConnectionRequest,
    responses(
        (status = 201, description = "Connection registered", body = ApiResponse<ConnectionResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 403, description = "No access to scope", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn register_connection(
    State(state): State<AppState>,
    caller: AuthenticatedAccount,
    Valid(Json(request)): Valid<Json<RegisterConnectionRequest>>,
) -> Result<(StatusCode, Json<ApiResponse<ConnectionResponse>>), HandlerError> {
    trace!("Entering register_connection function");

    let new_connection = NewConnection {
        scope_id: request.scope_id,
        item_id: request.item_id,
        access_token: request.access_token,
        institution_id: request.institution_id,
        institution_name: request.institution_name,
    };
    let connection = sync::register_connection(&state.db, caller.id(), new_connection)
        .await
        .map_err(compute_error_response)?;
    info!("Connection {} registered on scope {}", connection.item_id, connection.scope_id);

    let scope_name = sync::list_connections(&state.db, caller.id())
        .await
        .map_err(compute_error_response)?
        .into_iter()
        .find(|summary| summary.connection.id == connection.id)
        .map(|summary| summary.scope_name)
        .unwrap_or_default();

    let data = ConnectionResponse::from(ConnectionSummary { connection, scope_name });
    Ok(respond(StatusCode::CREATED, data, "Connection registered successfully"))
}

/// List feed connections in the caller's scopes
#[utoipa::path(
    get,
    path = "/api/v1/connections",
    tag = "connections",
    security(("account_id" = [])),
    responses(
        (status = 200, description = "Connections retrieved successfully", body = ApiResponse<Vec<ConnectionResponse>>),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_connections(
    State(state): State<AppState>,
    caller: AuthenticatedAccount,
) -> Result<(StatusCode, Json<ApiResponse<Vec<ConnectionResponse>>>), HandlerError> {
    trace!("Entering get_connections function");

    let connections = sync::list_connections(&state.db, caller.id())
        .await
        .map_err(compute_error_response)?;
    debug!("Found {} connections", connections.len());

    let data = connections.into_iter().map(ConnectionResponse::from).collect();
    Ok(respond(StatusCode::OK, data, "Connections retrieved successfully"))
}

/// Remove a feed connection
#[utoipa::path(
    delete,
    path = "/api/v1/connections/{item_id}",
    tag = "connections",
    security(("account_id" = [])),
    params(
        ("item_id" = String, Path, description = "Provider item id"),
        RemoveConnectionQuery
    ),
    responses(
        (status = 200, description = "Connection removed; data is the number of deleted expenses", body = ApiResponse<u64>),
        (status = 403, description = "No access to the connection's scope", body = ErrorResponse),
        (status = 404, description = "Connection not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn delete_connection(
    State(state): State<AppState>,
    caller: AuthenticatedAccount,
    Path(item_id): Path<String>,
    Query(query): Query<RemoveConnectionQuery>,
) -> Result<(StatusCode, Json<ApiResponse<u64>>), HandlerError> {
    trace!("Entering delete_connection function");

    let deleted = sync::remove_connection(&state.db, caller.id(), &item_id, query.delete_transactions)
        .await
        .map_err(compute_error_response)?;
    if deleted > 0 {
        state.invalidate_analytics().await;
    }

    Ok(respond(StatusCode::OK, deleted, "Connection removed successfully"))
}

/// Pull new transactions for a connection from the feed
#[utoipa::path(
    post,
    path = "/api/v1/connections/{item_id}/sync",
    tag = "connections",
    security(("account_id" = [])),
    params(("item_id" = String, Path, description = "Provider item id")),
    responses(
        (status = 200, description = "Sync completed", body = ApiResponse<SyncResult>),
        (status = 403, description = "No access to the connection's scope", body = ErrorResponse),
        (status = 404, description = "Connection not found", body = ErrorResponse),
        (status = 502, description = "Feed request failed", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn sync_connection(
    State(state): State<AppState>,
    caller: AuthenticatedAccount,
    Path(item_id): Path<String>,
) -> Result<(StatusCode, Json<ApiResponse<SyncResult>>), HandlerError> {
    trace!("Entering sync_connection function");

    let result = sync::sync_connection(&state.db, state.feed.as_ref(), caller.id(), &item_id)
        .await
        .map_err(|e| {
            error!("Sync of {} failed: {}", item_id, e);
            compute_error_response(e)
        })?;
    if result.inserted > 0 {
        state.invalidate_analytics().await;
    }
    info!("Sync of {} inserted {} transactions", item_id, result.inserted);

    Ok(respond(StatusCode::OK, result, "Sync completed successfully"))
}

/// Connection and feed transaction counts for the caller
#[utoipa::path(
    get,
    path = "/api/v1/connections/status",
    tag = "connections",
    security(("account_id" = [])),
    responses(
        (status = 200, description = "Feed status retrieved successfully", body = ApiResponse<FeedStatusResponse>),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_feed_status(
    State(state): State<AppState>,
    caller: AuthenticatedAccount,
) -> Result<(StatusCode, Json<ApiResponse<FeedStatusResponse>>), HandlerError> {
    trace!("Entering get_feed_status function");

    let status = sync::feed_status(&state.db, caller.id())
        .await
        .map_err(compute_error_response)?;

    Ok(respond(StatusCode::OK, status.into(), "Feed status retrieved successfully"))
}
