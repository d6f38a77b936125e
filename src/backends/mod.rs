//! Thin HTTP clients for the two upstream image services.
//!
//! - `huggingface`: keyed inference API, used first.
//! - `pollinations`: keyless public service, used directly or as fallback.
pub mod huggingface;
pub mod pollinations;

use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;

pub use huggingface::HuggingFaceClient;
pub use pollinations::PollinationsClient;

/// Why a single upstream attempt failed.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Missing HUGGINGFACE_API_KEY in environment")]
    MissingCredential,

    #[error("{backend} {status}: {body}")]
    Status { backend: &'static str, status: StatusCode, body: String },

    #[error("{0}")]
    Transport(#[from] reqwest::Error),
}

impl BackendError {
    /// Upstream diagnostic text, preferring the response body when there is one.
    pub fn detail(&self) -> String {
        match self {
            BackendError::Status { body, .. } => body.clone(),
            other => other.to_string(),
        }
    }
}

/// Shared HTTP client; every outbound call is bounded by `timeout`.
pub fn http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder().timeout(timeout).build()
}

async fn error_from_response(backend: &'static str, response: reqwest::Response) -> BackendError {
    let status = response.status();
    let body = response.text().await.unwrap_or_else(|_| "Unable to read error body".to_string());
    BackendError::Status { backend, status, body }
}
