// src/error.rs
// Typed errors for upstream calls and the HTTP boundary.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Failure of one upstream provider call. Recovered per-client by the
/// aggregator; never aborts sibling calls.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Fast-fail while the provider's circuit is open.
    #[error("circuit open for {provider}")]
    CircuitOpen { provider: &'static str },

    /// Transport or HTTP-level failure, carrying the upstream's message.
    #[error("{provider} request failed: {message}")]
    Http {
        provider: &'static str,
        message: String,
    },

    /// The upstream answered but the body was not the shape we expect.
    #[error("{provider} returned an unexpected payload: {message}")]
    BadPayload {
        provider: &'static str,
        message: String,
    },

    /// Capability gap: the provider has no endpoint for this operation.
    #[error("{provider} does not support {capability}")]
    Unsupported {
        provider: &'static str,
        capability: &'static str,
    },
}

impl UpstreamError {
    pub fn http(provider: &'static str, err: &reqwest::Error) -> Self {
        UpstreamError::Http {
            provider,
            message: err.to_string(),
        }
    }
}

/// Errors surfaced at the HTTP boundary. Upstream failures never reach
/// this type: they are recovered per-client into `AggregateResult.errors`,
/// so the only rejection a handler itself produces is input validation.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Input validation failure; rejected before any upstream work.
    #[error("{0}")]
    InvalidRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        let body = Json(json!({ "error": message }));
        (status, body).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
