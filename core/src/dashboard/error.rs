use crate::WorldwatchError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// JSON body of every failed interaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub code: String,
    pub message: String,
}

pub fn map_error(err: &WorldwatchError) -> (StatusCode, ErrorEnvelope) {
    let (status, code) = match err {
        WorldwatchError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "invalid_input"),
        WorldwatchError::Extraction(_) => (StatusCode::UNPROCESSABLE_ENTITY, "extraction_failed"),
        WorldwatchError::MalformedEvent(_) => {
            (StatusCode::UNPROCESSABLE_ENTITY, "malformed_event")
        }
        WorldwatchError::StreamError(_) => (StatusCode::BAD_GATEWAY, "stream_error"),
        WorldwatchError::VectorStoreError(_) => (StatusCode::BAD_GATEWAY, "vector_store_error"),
        WorldwatchError::LlmError(_) => (StatusCode::BAD_GATEWAY, "llm_error"),
        WorldwatchError::ProxyError(_) => (StatusCode::BAD_GATEWAY, "chat_proxy_error"),
        WorldwatchError::MissingResponseField(_) => {
            (StatusCode::BAD_GATEWAY, "missing_response_field")
        }
        WorldwatchError::HttpError(_) => (StatusCode::BAD_GATEWAY, "upstream_http_error"),
        WorldwatchError::ConfigError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
        WorldwatchError::IoError(_) | WorldwatchError::SerializationError(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
        }
    };

    (
        status,
        ErrorEnvelope {
            code: code.to_string(),
            message: err.to_string(),
        },
    )
}

/// Handler error rendered as a status code plus `ErrorEnvelope`
#[derive(Debug)]
pub struct ApiError(pub WorldwatchError);

impl From<WorldwatchError> for ApiError {
    fn from(err: WorldwatchError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, envelope) = map_error(&self.0);
        warn!(
            target: "dashboard",
            %status,
            code = %envelope.code,
            error = %envelope.message,
            "Request failed"
        );
        (status, Json(envelope)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ExtractionError;

    #[test]
    fn statuses_follow_error_kind() {
        let (s, e) = map_error(&WorldwatchError::InvalidInput("bad date".into()));
        assert_eq!(s, StatusCode::BAD_REQUEST);
        assert_eq!(e.code, "invalid_input");

        let (s, _) = map_error(&WorldwatchError::Extraction(
            ExtractionError::SentimentOutOfRange(120.0),
        ));
        assert_eq!(s, StatusCode::UNPROCESSABLE_ENTITY);

        let (s, e) = map_error(&WorldwatchError::MissingResponseField("text".into()));
        assert_eq!(s, StatusCode::BAD_GATEWAY);
        assert!(e.message.contains("text"));
    }
}
