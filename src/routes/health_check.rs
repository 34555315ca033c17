use actix_web::{http::StatusCode, HttpResponse};

use super::ApiResponse;

pub async fn health_check() -> HttpResponse {
    tracing::debug!("Health check endpoint called");
    HttpResponse::Ok().json(ApiResponse::new(
        StatusCode::OK,
        serde_json::json!({ "status": "OK" }),
        "Service is healthy",
    ))
}
