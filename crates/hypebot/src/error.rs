//! Application error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use hypebot_engine::EngineError;
use hypebot_store::StoreError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration source error: {0}")]
    ConfigSource(#[from] config::ConfigError),

    #[error("Invalid input: {0}")]
    Invalid(#[from] hypebot_core::CoreError),

    #[error("Exchange error: {0}")]
    Exchange(#[from] hypebot_exchange::ExchangeError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] hypebot_telemetry::TelemetryError),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Invalid(_) | Self::Engine(EngineError::Invalid(_)) => StatusCode::BAD_REQUEST,
            Self::Store(e) | Self::Engine(EngineError::Store(e)) if e.is_not_found() => {
                StatusCode::NOT_FOUND
            }
            Self::Store(StoreError::Invalid(_))
            | Self::Engine(EngineError::Store(StoreError::Invalid(_))) => StatusCode::BAD_REQUEST,
            Self::Exchange(_) | Self::Engine(EngineError::Exchange(_)) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use hypebot_core::{BotId, CoreError};

    #[test]
    fn test_status_mapping() {
        let missing = AppError::Engine(EngineError::Store(StoreError::NotFound(BotId::new())));
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let invalid = AppError::Invalid(CoreError::InvalidPair(String::new()));
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);

        let config = AppError::Config("bad".to_string());
        assert_eq!(config.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
