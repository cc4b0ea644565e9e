//! Error types for dashgate
//!
//! This module provides the gateway's error hierarchy using thiserror.
//! Every failure that can reach a browser maps to an HTTP status through
//! [`GatewayError::status_code`].

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Main error type for gateway operations
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Token exchange failed: {0}")]
    Exchange(String),

    #[error("Invalid token received from provider: {0}")]
    InvalidToken(String),

    #[error("{provider} cannot get user information without an access token")]
    MissingToken { provider: String },

    #[error("{provider} responded with a {status} while trying to fetch user information")]
    ProfileFetch { provider: String, status: u16 },

    #[error("{provider} user information could not be fetched: {reason}")]
    ProfileFetchFailed { provider: String, reason: String },

    #[error("OAuth state mismatch")]
    StateMismatch,

    #[error("No login in progress for this session")]
    NoAuthInProgress,

    #[error("Invalid redirect target: {0}")]
    OpenRedirectRejected(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Upstream fetch failed: {0}")]
    UpstreamFetch(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Convenient result type for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

impl GatewayError {
    /// Create a config error
    #[inline]
    pub fn config<S: Into<String>>(msg: S) -> Self {
        GatewayError::Config(msg.into())
    }

    /// Create a token exchange error
    #[inline]
    pub fn exchange<S: Into<String>>(msg: S) -> Self {
        GatewayError::Exchange(msg.into())
    }

    /// Create an upstream fetch error
    #[inline]
    pub fn upstream<S: Into<String>>(msg: S) -> Self {
        GatewayError::UpstreamFetch(msg.into())
    }

    /// Create a session error
    #[inline]
    pub fn session<S: Into<String>>(msg: S) -> Self {
        GatewayError::Session(msg.into())
    }

    /// HTTP status this error is surfaced as
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::OpenRedirectRejected(_) => StatusCode::BAD_REQUEST,
            GatewayError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, status = %status, "request rejected");
        }
        crate::http::response::plain_error(status, self.to_string())
    }
}
