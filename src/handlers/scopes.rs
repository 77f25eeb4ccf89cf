use crate::auth::AuthenticatedAccount;
use crate::handlers::respond;
use crate::schemas::{compute_error_response, ApiResponse, AppState, ErrorResponse, HandlerError};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use axum_valid::Valid;
use compute::access::{self, PendingInvite, ScopeMember, ScopeSummary};
use sea_orm::ActiveEnum;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace, warn};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct CreateHouseholdRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
}

#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct InviteRequest {
    /// Email of the account to invite
    #[validate(email)]
    pub email: String,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct InviteResponseRequest {
    /// `true` accepts the invite, `false` rejects it
    pub accept: bool,
}

/// A scope together with the caller's role on it
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ScopeResponse {
    pub id: i32,
    pub name: String,
    /// "personal" or "household"
    pub scope_type: String,
    /// "owner" or "member"
    pub access_type: String,
}

impl From<ScopeSummary> for ScopeResponse {
    fn from(summary: ScopeSummary) -> Self {
        Self {
            id: summary.scope.id,
            name: summary.scope.name,
            scope_type: summary.scope.scope_type.to_value(),
            access_type: summary.access_type.to_value(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PendingInviteResponse {
    pub scope_id: i32,
    pub scope_name: String,
    pub invited_by: Option<String>,
}

impl From<PendingInvite> for PendingInviteResponse {
    fn from(invite: PendingInvite) -> Self {
        Self {
            scope_id: invite.scope_id,
            scope_name: invite.scope_name,
            invited_by: invite.invited_by,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MemberResponse {
    pub account_id: i32,
    pub account_name: String,
    pub email: Option<String>,
    pub access_type: String,
    pub invite_status: String,
}

impl From<ScopeMember> for MemberResponse {
    fn from(member: ScopeMember) -> Self {
        Self {
            account_id: member.account_id,
            account_name: member.account_name,
            email: member.email,
            access_type: member.access_type.to_value(),
            invite_status: member.invite_status.to_value(),
        }
    }
}

/// List scopes the caller has accepted access to
#[utoipa::path(
    get,
    path = "/api/v1/scopes",
    tag = "scopes",
    security(("account_id" = [])),
    responses(
        (status = 200, description = "Scopes retrieved successfully", body = ApiResponse<Vec<ScopeResponse>>),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_scopes(
    State(state): State<AppState>,
    caller: AuthenticatedAccount,
) -> Result<(StatusCode, Json<ApiResponse<Vec<ScopeResponse>>>), HandlerError> {
    trace!("Entering get_scopes function");

    let scopes = access::list_scopes(&state.db, caller.id())
        .await
        .map_err(compute_error_response)?;
    debug!("Account {} can access {} scopes", caller.id(), scopes.len());

    let data = scopes.into_iter().map(ScopeResponse::from).collect();
    Ok(respond(StatusCode::OK, data, "Scopes retrieved successfully"))
}

/// Create a household owned by the caller
#[utoipa::path(
    post,
    path = "/api/v1/households",
    tag = "scopes",
    security(("account_id" = [])),
    request_body = CreateHouseholdRequest,
    responses(
        (status = 201, description = "Household created successfully", body = ApiResponse<ScopeResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn create_household(
    State(state): State<AppState>,
    caller: AuthenticatedAccount,
    Valid(Json(request)): Valid<Json<CreateHouseholdRequest>>,
) -> Result<(StatusCode, Json<ApiResponse<ScopeResponse>>), HandlerError> {
    trace!("Entering create_household function");

    let household = access::create_household(&state.db, caller.id(), &request.name)
        .await
        .map_err(compute_error_response)?;
    info!("Household {} created by account {}", household.id, caller.id());

    let data = ScopeResponse::from(ScopeSummary {
        scope: household,
        access_type: model::entities::scope_access::AccessType::Owner,
    });
    Ok(respond(StatusCode::CREATED, data, "Household created successfully"))
}

/// Invite an account into a household
#[utoipa::path(
    post,
    path = "/api/v1/households/{scope_id}/invites",
    tag = "scopes",
    security(("account_id" = [])),
    params(("scope_id" = i32, Path, description = "Household scope id")),
    request_body = InviteRequest,
    responses(
        (status = 201, description = "Invite sent", body = ApiResponse<MemberResponse>),
        (status = 400, description = "Invalid request or already invited", body = ErrorResponse),
        (status = 403, description = "Caller is not the household owner", body = ErrorResponse),
        (status = 404, description = "No account with that email", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn invite_member(
    State(state): State<AppState>,
    caller: AuthenticatedAccount,
    Path(scope_id): Path<i32>,
    Valid(Json(request)): Valid<Json<InviteRequest>>,
) -> Result<(StatusCode, Json<ApiResponse<MemberResponse>>), HandlerError> {
    trace!("Entering invite_member function");
    debug!("Account {} inviting {} to scope {}", caller.id(), request.email, scope_id);

    let invite = access::invite_member(&state.db, caller.id(), scope_id, &request.email)
        .await
        .map_err(|e| {
            warn!("Invite to scope {} failed: {}", scope_id, e);
            compute_error_response(e)
        })?;

    let members = access::scope_members(&state.db, caller.id(), scope_id)
        .await
        .map_err(compute_error_response)?;
    let invitee = members
        .into_iter()
        .find(|member| member.account_id == invite.account_id)
        .map(MemberResponse::from)
        .ok_or_else(|| {
            compute_error_response(compute::error::ComputeError::NotFound(
                "Invited account not found".to_string(),
            ))
        })?;

    info!("Account {} invited to scope {}", invite.account_id, scope_id);
    Ok(respond(StatusCode::CREATED, invitee, "Invite sent successfully"))
}

/// Accept or reject a pending household invite
#[utoipa::path(
    post,
    path = "/api/v1/households/{scope_id}/respond",
    tag = "scopes",
    security(("account_id" = [])),
    params(("scope_id" = i32, Path, description = "Household scope id")),
    request_body = InviteResponseRequest,
    responses(
        (status = 200, description = "Invite resolved", body = ApiResponse<String>),
        (status = 404, description = "No pending invite", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn respond_to_invite(
    State(state): State<AppState>,
    caller: AuthenticatedAccount,
    Path(scope_id): Path<i32>,
    Json(request): Json<InviteResponseRequest>,
) -> Result<(StatusCode, Json<ApiResponse<String>>), HandlerError> {
    trace!("Entering respond_to_invite function");

    let resolved = access::respond_to_invite(&state.db, caller.id(), scope_id, request.accept)
        .await
        .map_err(compute_error_response)?;
    // Newly visible expenses change the analytics
    state.invalidate_analytics().await;

    let status = resolved.invite_status.to_value();
    info!("Account {} {} invite to scope {}", caller.id(), status, scope_id);
    Ok(respond(StatusCode::OK, status, "Invite resolved successfully"))
}

/// List the caller's pending household invites
#[utoipa::path(
    get,
    path = "/api/v1/invites",
    tag = "scopes",
    security(("account_id" = [])),
    responses(
        (status = 200, description = "Pending invites retrieved successfully", body = ApiResponse<Vec<PendingInviteResponse>>),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_pending_invites(
    State(state): State<AppState>,
    caller: AuthenticatedAccount,
) -> Result<(StatusCode, Json<ApiResponse<Vec<PendingInviteResponse>>>), HandlerError> {
    trace!("Entering get_pending_invites function");

    let invites = access::pending_invites(&state.db, caller.id())
        .await
        .map_err(compute_error_response)?;

    let data = invites.into_iter().map(PendingInviteResponse::from).collect();
    Ok(respond(StatusCode::OK, data, "Pending invites retrieved successfully"))
}

/// List members of a scope
#[utoipa::path(
    get,
    path = "/api/v1/scopes/{scope_id}/members",
    tag = "scopes",
    security(("account_id" = [])),
    params(("scope_id" = i32, Path, description = "Scope id")),
    responses(
        (status = 200, description = "Members retrieved successfully", body = ApiResponse<Vec<MemberResponse>>),
        (status = 403, description = "No access to scope", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_scope_members(
    State(state): State<AppState>,
    caller: AuthenticatedAccount,
    Path(scope_id): Path<i32>,
) -> Result<(StatusCode, Json<ApiResponse<Vec<MemberResponse>>>), HandlerError> {
    trace!("Entering get_scope_members function");

    let members = access::scope_members(&state.db, caller.id(), scope_id)
        .await
        .map_err(compute_error_response)?;

    let data = members.into_iter().map(MemberResponse::from).collect();
    Ok(respond(StatusCode::OK, data, "Members retrieved successfully"))
}
