use crate::handlers::respond;
use crate::schemas::ApiResponse;
use axum::{http::StatusCode, response::Json};
use compute::categorize::CATEGORIES;
use tracing::instrument;

/// List the category taxonomy
#[utoipa::path(
    get,
    path = "/api/v1/categories",
    tag = "categories",
    responses(
        (status = 200, description = "Categories retrieved successfully", body = ApiResponse<Vec<String>>)
    )
)]
#[instrument]
pub async fn get_categories() -> (StatusCode, Json<ApiResponse<Vec<String>>>) {
    let categories = CATEGORIES.iter().map(|category| category.to_string()).collect();
    respond(StatusCode::OK, categories, "Categories retrieved successfully")
}
