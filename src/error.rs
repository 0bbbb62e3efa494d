//! Error types for Order Assist.

use std::time::Duration;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Order error: {0}")]
    Order(#[from] OrderError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Transaction failed: {0}")]
    Transaction(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Extraction produced no usable data: {0}")]
    Extraction(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Domain operation failures.
///
/// Every variant except `Database` is a validation failure whose message is
/// shown to the customer as-is.
#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("找不到客戶「{0}」，請先建立客戶資料。")]
    CustomerNotFound(String),

    #[error("找不到產品「{0}」。請先查詢可訂購的產品。")]
    ProductNotFound(String),

    #[error("產品名稱「{query}」符合多項產品（{}），請提供更完整的名稱。", .candidates.join("、"))]
    AmbiguousProduct {
        query: String,
        candidates: Vec<String>,
    },

    #[error("產品「{product}」庫存不足（庫存: {stock}，需要: {requested}）。")]
    InsufficientStock {
        product: String,
        stock: i64,
        requested: i64,
    },

    #[error("損耗數量 ({requested}) 超過目前庫存 ({stock})，請確認數量。")]
    WastageExceedsStock { stock: i64, requested: i64 },

    #[error("「{product}」的數量必須大於 0（收到: {quantity}）。")]
    InvalidQuantity { product: String, quantity: i64 },

    #[error("訂單沒有任何品項。")]
    EmptyOrder,

    #[error("找不到訂單編號 {0}。")]
    OrderNotFound(i64),

    #[error("請提供客戶名稱或訂單編號來查詢。")]
    MissingQuery,

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl OrderError {
    /// Whether this failure should be shown to the customer so they can retry
    /// the current step.
    pub fn is_validation(&self) -> bool {
        !matches!(self, Self::Database(_))
    }
}

/// Errors returned by the admin REST endpoints.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid table name")]
    InvalidTable(String),

    #[error("Order not found")]
    OrderNotFound(i64),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::InvalidTable(_) => StatusCode::BAD_REQUEST,
            ApiError::OrderNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Database(e) => {
                tracing::error!(error = %e, "Admin endpoint database failure");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(serde_json::json!({ "detail": self.to_string() }))).into_response()
    }
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_are_user_facing() {
        let err = OrderError::InsufficientStock {
            product: "蘋果".into(),
            stock: 3,
            requested: 5,
        };
        assert!(err.is_validation());
        assert_eq!(err.to_string(), "產品「蘋果」庫存不足（庫存: 3，需要: 5）。");
    }

    #[test]
    fn database_errors_are_not_validation() {
        let err = OrderError::from(DatabaseError::Query("boom".into()));
        assert!(!err.is_validation());
    }

    #[test]
    fn ambiguous_lists_candidates() {
        let err = OrderError::AmbiguousProduct {
            query: "果".into(),
            candidates: vec!["蘋果".into(), "芒果".into()],
        };
        assert!(err.to_string().contains("蘋果、芒果"));
    }
}
