//! Common error type and result alias.
//!
//! `AppError` doubles as the HTTP error response: client mistakes and upstream
//! failures surface their text, everything else becomes a bare 500.
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// Client input violates a precondition (missing prompt, missing file, ...).
    #[error("{0}")]
    InvalidRequest(String),

    /// A backend call failed and no fallback recovered it.
    #[error("{detail}")]
    Upstream { status: StatusCode, detail: String },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Rendering cancelled")]
    Cancelled,

    #[error("Server error: {0}")]
    ServerFault(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Upstream failure reported as `502 Bad Gateway`.
    pub fn bad_gateway(detail: impl Into<String>) -> Self {
        AppError::Upstream { status: StatusCode::BAD_GATEWAY, detail: detail.into() }
    }

    /// Upstream failure reported as a plain `500`.
    pub fn upstream(detail: impl Into<String>) -> Self {
        AppError::Upstream { status: StatusCode::INTERNAL_SERVER_ERROR, detail: detail.into() }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Upstream { status, .. } => *status,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            AppError::InvalidRequest(reason) => (status, reason).into_response(),
            AppError::Upstream { detail, .. } => (status, detail).into_response(),
            other => {
                tracing::error!("Request failed: {}", other);
                (status, "Server error").into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(AppError::InvalidRequest("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::bad_gateway("x").status(), StatusCode::BAD_GATEWAY);
        assert_eq!(AppError::upstream("x").status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(AppError::ServerFault("boom".into()).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn server_fault_does_not_leak_detail() {
        let resp = AppError::ServerFault("secret path /etc/x".into()).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = hyper::body::to_bytes(resp.into_body()).await.unwrap();
        assert_eq!(&body[..], b"Server error");
    }
}
