use axum::{Router, http::StatusCode, response::IntoResponse, routing::get};

use crate::{case, notification, payment, progress, state::ApiState, subscription};

pub fn router() -> Router<ApiState> {
    Router::new()
        .route("/health", get(health))
        .merge(case::routes())
        .merge(progress::routes())
        .merge(subscription::routes())
        .merge(payment::routes())
        .merge(notification::routes())
        .fallback(handler_404)
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn handler_404() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        "The requested resource was not found",
    )
}
