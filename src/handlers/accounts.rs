use crate::auth::AuthenticatedAccount;
use crate::handlers::respond;
use crate::schemas::{compute_error_response, ApiResponse, AppState, ErrorResponse, HandlerError};
use axum::{extract::State, http::StatusCode, response::Json};
use axum_valid::Valid;
use chrono::NaiveDate;
use compute::access::{self, NewAccount};
use model::entities::{account, person};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, trace};
use utoipa::ToSchema;
use validator::Validate;

/// Request body for registering a new account
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct CreateAccountRequest {
    /// Login name, unique across the installation
    #[validate(length(min = 1, max = 100))]
    pub account_name: String,
    /// Email used to receive household invites
    #[validate(email)]
    pub email: Option<String>,
    pub display_name: Option<String>,
    /// ISO 4217 currency code (e.g., "USD", "EUR")
    #[validate(length(equal = 3))]
    pub currency: String,
}

/// Account response model
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AccountResponse {
    pub id: i32,
    pub account_name: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub currency: String,
    pub created_at: NaiveDate,
}

impl From<account::Model> for AccountResponse {
    fn from(model: account::Model) -> Self {
        Self {
            id: model.id,
            account_name: model.account_name,
            email: model.email,
            display_name: model.display_name,
            currency: model.currency,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct CreatePersonRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PersonResponse {
    pub id: i32,
    pub name: String,
}

impl From<person::Model> for PersonResponse {
    fn from(model: person::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
        }
    }
}

/// Register a new account
///
/// Creates the account with its default person and personal scope.
#[utoipa::path(
    post,
    path = "/api/v1/accounts",
    tag = "accounts",
    request_body = CreateAccountRequest,
    responses(
        (status = 201, description = "Account created successfully", body = ApiResponse<AccountResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn create_account(
    State(state): State<AppState>,
    Valid(Json(request)): Valid<Json<CreateAccountRequest>>,
) -> Result<(StatusCode, Json<ApiResponse<AccountResponse>>), HandlerError> {
    trace!("Entering create_account function");
    debug!("Creating account with name: {}, currency: {}", request.account_name, request.currency);

    let new_account = NewAccount {
        account_name: request.account_name,
        email: request.email,
        display_name: request.display_name,
        currency: request.currency,
    };

    match access::provision_account(&state.db, new_account).await {
        Ok(account) => {
            info!("Account created successfully with ID: {}", account.id);
            Ok(respond(StatusCode::CREATED, account.into(), "Account created successfully"))
        }
        Err(e) => {
            error!("Failed to create account: {}", e);
            Err(compute_error_response(e))
        }
    }
}

/// Get the calling account
#[utoipa::path(
    get,
    path = "/api/v1/me",
    tag = "accounts",
    security(("account_id" = [])),
    responses(
        (status = 200, description = "Account retrieved successfully", body = ApiResponse<AccountResponse>),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    )
)]
#[instrument]
pub async fn get_me(
    caller: AuthenticatedAccount,
) -> Result<(StatusCode, Json<ApiResponse<AccountResponse>>), HandlerError> {
    trace!("Entering get_me function");
    Ok(respond(StatusCode::OK, caller.account.into(), "Account retrieved successfully"))
}

/// List persons of the calling account
#[utoipa::path(
    get,
    path = "/api/v1/persons",
    tag = "accounts",
    security(("account_id" = [])),
    responses(
        (status = 200, description = "Persons retrieved successfully", body = ApiResponse<Vec<PersonResponse>>),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_persons(
    State(state): State<AppState>,
    caller: AuthenticatedAccount,
) -> Result<(StatusCode, Json<ApiResponse<Vec<PersonResponse>>>), HandlerError> {
    trace!("Entering get_persons function");

    let persons = access::list_persons(&state.db, caller.id())
        .await
        .map_err(compute_error_response)?;
    debug!("Found {} persons for account {}", persons.len(), caller.id());

    let data = persons.into_iter().map(PersonResponse::from).collect();
    Ok(respond(StatusCode::OK, data, "Persons retrieved successfully"))
}

/// Add a person to the calling account
#[utoipa::path(
    post,
    path = "/api/v1/persons",
    tag = "accounts",
    security(("account_id" = [])),
    request_body = CreatePersonRequest,
    responses(
        (status = 201, description = "Person created successfully", body = ApiResponse<PersonResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn create_person(
    State(state): State<AppState>,
    caller: AuthenticatedAccount,
    Valid(Json(request)): Valid<Json<CreatePersonRequest>>,
) -> Result<(StatusCode, Json<ApiResponse<PersonResponse>>), HandlerError> {
    trace!("Entering create_person function");

    let person = access::add_person(&state.db, caller.id(), &request.name)
        .await
        .map_err(compute_error_response)?;
    info!("Person {} added to account {}", person.id, caller.id());

    Ok(respond(StatusCode::CREATED, person.into(), "Person created successfully"))
}
