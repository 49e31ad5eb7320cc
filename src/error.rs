//! Error types for the mail-otp crate.
//!
//! All errors implement [`std::error::Error`] and provide context about what went wrong.
//! Errors are categorized by their retryability - see [`Error::is_retryable`].
//!
//! The OTP core ([`crate::matcher`], [`crate::pipeline`]) never fails; errors only
//! come from configuration, caller input and the upstream Microsoft endpoints.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::net::SocketAddr;
use thiserror::Error;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while serving OTP lookups.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    // ─────────────────────────────────────────────────────────────────────────
    // Configuration / startup errors (NOT retryable)
    // ─────────────────────────────────────────────────────────────────────────
    /// Invalid configuration provided.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the configuration error.
        message: String,
    },

    /// The SOCKS5 proxy could not be turned into a client proxy.
    #[error("invalid proxy configuration for {proxy_host}")]
    InvalidProxy {
        /// The SOCKS5 proxy hostname.
        proxy_host: String,
        /// The underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// Failed to build the outbound HTTP client.
    #[error("failed to build HTTP client")]
    HttpClient {
        /// The underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// Failed to bind the listening socket.
    #[error("failed to bind {addr}")]
    Bind {
        /// The address that could not be bound.
        addr: SocketAddr,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The HTTP server stopped with an error.
    #[error("HTTP server error")]
    Serve {
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Caller errors (NOT retryable)
    // ─────────────────────────────────────────────────────────────────────────
    /// `refresh_token` or `client_id` was missing or empty.
    #[error("Missing refresh_token or client_id")]
    MissingCredentials,

    // ─────────────────────────────────────────────────────────────────────────
    // Token exchange errors (mixed retryability)
    // ─────────────────────────────────────────────────────────────────────────
    /// The token request could not be sent or its response not read.
    #[error("token request to {endpoint} failed")]
    TokenRequest {
        /// The token endpoint.
        endpoint: String,
        /// The underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// The token endpoint rejected the refresh token.
    #[error("token endpoint returned {status}")]
    TokenRejected {
        /// HTTP status returned by the token endpoint.
        status: StatusCode,
    },

    /// The token endpoint answered 2xx without an access token.
    #[error("token response did not contain an access_token")]
    MissingAccessToken,

    // ─────────────────────────────────────────────────────────────────────────
    // Message fetch errors (RETRYABLE - swallowed into an empty mailbox)
    // ─────────────────────────────────────────────────────────────────────────
    /// The message request could not be sent or its body not decoded.
    #[error("message request to {endpoint} failed")]
    FetchRequest {
        /// The messages endpoint.
        endpoint: String,
        /// The underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// The messages endpoint returned a non-success status.
    #[error("messages endpoint returned {status}")]
    FetchRejected {
        /// HTTP status returned by the messages endpoint.
        status: StatusCode,
    },
}

impl Error {
    /// Returns `true` if this error represents a transient failure that might succeed on retry.
    ///
    /// The service itself never retries; this is exposed for callers embedding
    /// [`crate::OtpService`] in their own loop.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::TokenRequest { .. } | Error::FetchRequest { .. } => true,
            Error::TokenRejected { status } | Error::FetchRejected { status } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }

            Error::InvalidConfig { .. }
            | Error::InvalidProxy { .. }
            | Error::HttpClient { .. }
            | Error::Bind { .. }
            | Error::Serve { .. }
            | Error::MissingCredentials
            | Error::MissingAccessToken => false,
        }
    }

    /// Returns the error category for metrics/logging purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InvalidConfig { .. }
            | Error::InvalidProxy { .. }
            | Error::HttpClient { .. }
            | Error::Bind { .. }
            | Error::Serve { .. } => ErrorCategory::Configuration,

            Error::MissingCredentials => ErrorCategory::Caller,

            Error::TokenRejected { .. } | Error::MissingAccessToken => {
                ErrorCategory::Authentication
            }

            Error::TokenRequest { .. } | Error::FetchRequest { .. } => ErrorCategory::Network,

            Error::FetchRejected { .. } => ErrorCategory::Upstream,
        }
    }

    /// HTTP status this error is reported with by the server.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self.category() {
            ErrorCategory::Caller => StatusCode::BAD_REQUEST,
            ErrorCategory::Authentication => StatusCode::UNAUTHORIZED,
            ErrorCategory::Network | ErrorCategory::Upstream => match self {
                // Token transport failures also surface as 401.
                Error::TokenRequest { .. } => StatusCode::UNAUTHORIZED,
                _ => StatusCode::BAD_GATEWAY,
            },
            ErrorCategory::Configuration => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message returned to HTTP callers in the `error` field.
    ///
    /// Upstream details stay in the logs.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Error::TokenRequest { .. } | Error::TokenRejected { .. } | Error::MissingAccessToken => {
                "Failed to get access_token".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.public_message() });
        (self.status_code(), Json(body)).into_response()
    }
}

/// Error categories for metrics and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Configuration or startup errors.
    Configuration,
    /// Invalid caller input.
    Caller,
    /// Credentials rejected by the identity platform.
    Authentication,
    /// Network connectivity errors.
    Network,
    /// Upstream API answered with an error.
    Upstream,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Configuration => write!(f, "configuration"),
            ErrorCategory::Caller => write!(f, "caller"),
            ErrorCategory::Authentication => write!(f, "authentication"),
            ErrorCategory::Network => write!(f, "network"),
            ErrorCategory::Upstream => write!(f, "upstream"),
        }
    }
}
