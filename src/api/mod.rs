//! REST API under `/api/v1`.

mod auth;
mod bids;
mod cases;
mod chat;
pub mod extract;
mod points;
mod providers;
pub mod response;

use crate::AppState;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::routes())
        .nest("/cases", cases::routes().merge(bids::routes()))
        .nest("/providers", providers::routes())
        .nest("/points", points::routes())
        .nest("/conversations", chat::routes())
}

/// Full application router with middleware
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", routes())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let database = match &state.database {
        Some(db) => match db.ping().await {
            Ok(()) => "up",
            Err(e) => {
                tracing::warn!("Health check database ping failed: {}", e);
                "down"
            }
        },
        None => "not_configured",
    };

    Json(json!({
        "status": "ok",
        "storage": state.config.storage.as_str(),
        "database": database,
    }))
}
