//! Caller identity. An upstream gateway authenticates the user and forwards the
//! account id in a header; this service only resolves it.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::Json,
};
use model::entities::account;
use sea_orm::EntityTrait;
use tracing::{debug, error, warn};

use crate::schemas::{AppState, ErrorResponse, HandlerError};

pub const ACCOUNT_HEADER: &str = "X-Account-Id";

/// The account on whose behalf the request runs.
#[derive(Debug, Clone)]
pub struct AuthenticatedAccount {
    pub account: account::Model,
}

impl AuthenticatedAccount {
    pub fn id(&self) -> i32 {
        self.account.id
    }
}

fn unauthorized(message: &str) -> HandlerError {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse::new(message, "UNAUTHORIZED")),
    )
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedAccount {
    type Rejection = HandlerError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(raw) = parts.headers.get(ACCOUNT_HEADER) else {
            warn!("Request without {} header", ACCOUNT_HEADER);
            return Err(unauthorized("Authentication required"));
        };

        let account_id: i32 = raw
            .to_str()
            .ok()
            .and_then(|value| value.trim().parse().ok())
            .ok_or_else(|| {
                warn!("Malformed {} header", ACCOUNT_HEADER);
                unauthorized("Invalid account id")
            })?;

        match account::Entity::find_by_id(account_id).one(&state.db).await {
            Ok(Some(account)) => {
                debug!(account_id, "Request authenticated");
                Ok(Self { account })
            }
            Ok(None) => {
                warn!(account_id, "Unknown account in {} header", ACCOUNT_HEADER);
                Err(unauthorized("Unknown account"))
            }
            Err(e) => {
                error!("Failed to look up account {}: {}", account_id, e);
                Err((
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse::new("A database error occurred", "DATABASE_ERROR")),
                ))
            }
        }
    }
}
