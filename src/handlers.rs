pub mod accounts;
pub mod budget;
pub mod categories;
pub mod connections;
pub mod expenses;
pub mod health;
pub mod scopes;

use axum::{http::StatusCode, response::Json};

use crate::schemas::ApiResponse;

/// Wraps `data` in the success envelope.
pub(crate) fn respond<T>(status: StatusCode, data: T, message: &str) -> (StatusCode, Json<ApiResponse<T>>) {
    (
        status,
        Json(ApiResponse {
            data,
            message: message.to_string(),
            success: true,
        }),
    )
}
