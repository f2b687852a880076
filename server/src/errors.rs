use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response}
};
use errors::SessionError;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Error generating ambience: {0}")]
    Session(#[from] SessionError),

    #[error("Internal error: {0}")]
    InternalError(String)
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Session(err) => match err {
                SessionError::UpstreamModel { .. } | SessionError::MalformedHandoff { .. } => {
                    StatusCode::BAD_GATEWAY
                }
                SessionError::ToolBudgetExceeded { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                SessionError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                SessionError::Cancelled { .. } => StatusCode::CONFLICT,
                SessionError::Persistence { .. } | SessionError::MergeInputMissing { .. } => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            }
        }
    }

    pub fn error_code(&self) -> String {
        match self {
            ApiError::InvalidRequest(_) => "INVALID_REQUEST",
            ApiError::Unavailable(_) => "UNAVAILABLE",
            ApiError::InternalError(_) => "INTERNAL_ERROR",
            ApiError::Session(err) => err.code()
        }
        .to_string()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();
        let message = self.to_string();

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::InternalError(err.to_string())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_errors_keep_their_code() {
        let err = ApiError::from(SessionError::ToolBudgetExceeded {
            stage: "music_generation_agent".to_string(),
            tool: "generate_music".to_string(),
            limit: 4,
            reason: "track budget spent".to_string()
        });
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.error_code(), "TOOL_BUDGET_EXCEEDED");
        assert!(err.to_string().contains("music_generation_agent"));
    }
}
