//! Axum routes for the chat UI and the admin pages.

use std::path::Path;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path as UrlPath, State},
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::conversation::Dispatcher;
use crate::error::ApiError;
use crate::orders::{AdminTable, OrderDetail, OrderService, TableDump};

const DEFAULT_SESSION: &str = "default";
const CHAT_FAILURE: &str = "系統處理時發生錯誤，請再試一次。";

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub service: OrderService,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub reply: String,
}

/// Build the full application router. Pages are served from `static_dir`.
pub fn app_router(state: AppState, static_dir: &Path) -> Router {
    Router::new()
        .route("/api/chat", post(chat))
        .route("/api/admin/table/{table_name}", get(get_table))
        .route("/api/admin/order/{order_id}", get(get_order))
        .route("/health", get(health))
        .route_service("/", ServeFile::new(static_dir.join("index.html")))
        .route_service("/admin", ServeFile::new(static_dir.join("admin.html")))
        .route_service("/products", ServeFile::new(static_dir.join("products.html")))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Health ──────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "order-assist"
    }))
}

// ── Chat ────────────────────────────────────────────────────────────

/// POST /api/chat
///
/// Failures are reported as a reply string, never as an HTTP error.
async fn chat(State(state): State<AppState>, Json(req): Json<ChatRequest>) -> Json<ChatResponse> {
    let session_id = req
        .session_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_SESSION);

    let reply = match state.dispatcher.handle_message(session_id, &req.message).await {
        Ok(reply) => reply,
        Err(e) => {
            error!(session = %session_id, error = %e, "Chat turn failed");
            CHAT_FAILURE.to_string()
        }
    };
    Json(ChatResponse { reply })
}

// ── Admin ───────────────────────────────────────────────────────────

/// GET /api/admin/table/{table_name}
async fn get_table(
    State(state): State<AppState>,
    UrlPath(table_name): UrlPath<String>,
) -> Result<Json<TableDump>, ApiError> {
    let table: AdminTable = table_name
        .parse()
        .map_err(|_| ApiError::InvalidTable(table_name))?;
    Ok(Json(state.service.dump_table(table).await?))
}

/// GET /api/admin/order/{order_id}
async fn get_order(
    State(state): State<AppState>,
    UrlPath(order_id): UrlPath<i64>,
) -> Result<Json<OrderDetail>, ApiError> {
    state
        .service
        .order_detail(order_id)
        .await?
        .map(Json)
        .ok_or(ApiError::OrderNotFound(order_id))
}
