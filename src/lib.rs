//! # mail-otp
//!
//! Reads the newest messages of an Outlook / Hotmail mailbox through Microsoft
//! Graph and extracts one-time passcodes from them.
//!
//! This crate provides:
//! - An OTP extractor: a labeled 6-digit pattern (`code`, `OTP`, `mã`) with a
//!   bare 6-digit fallback ([`matcher`])
//! - A filtering pipeline: time window, keyword, extraction, and a
//!   `{"code": "0"}` sentinel when nothing matches ([`pipeline`])
//! - A refresh-token lookup service and its HTTP surface ([`OtpService`], [`server`])
//!
//! ## Quick Start
//!
//! ```no_run
//! use mail_otp::{FilterParams, OtpRequest, OtpService, ServiceConfig};
//!
//! # async fn example() -> mail_otp::Result<()> {
//! let service = OtpService::new(&ServiceConfig::builder().build()?)?;
//!
//! let request = OtpRequest::new("refresh-token", "client-id")?
//!     .with_params(FilterParams::default().keyword("facebook").time_window_minutes(10));
//!
//! let results = service.read_mail_otp(request).await?;
//! println!("Got OTP: {}", results[0].code());
//! # Ok(())
//! # }
//! ```
//!
//! ## Offline Extraction
//!
//! ```
//! use chrono::Utc;
//! use mail_otp::{FilterParams, Message, OtpPipeline};
//!
//! let now = Utc::now();
//! let messages = vec![
//!     Message::new("Your Facebook login", "Order 555111. Code: 482913").received_at_time(now),
//! ];
//!
//! let results = OtpPipeline::new(FilterParams::default().keyword("facebook")).run(&messages, now);
//! assert_eq!(results[0].code(), "482913");
//! ```
//!
//! ## Error Handling
//!
//! Only the lookup glue can fail. Use [`Error::is_retryable`] to tell
//! transient upstream failures from bad input:
//!
//! ```
//! use mail_otp::Error;
//!
//! fn handle_error(error: &Error) {
//!     if error.is_retryable() {
//!         println!("Transient error, can retry: {}", error);
//!     } else {
//!         println!("Permanent error: {}", error);
//!     }
//! }
//! ```
//!
//! ## Observability
//!
//! The crate uses `tracing` for instrumentation. Credentials are never recorded.
//!
//! ### Span Naming Convention
//!
//! - `OtpService::read_mail_otp` - One lookup
//! - `GraphClient::exchange_refresh_token` - Token exchange
//! - `GraphClient::fetch_messages` - Message fetch
//! - `OtpPipeline::extract_matches` - Filtering and extraction
//!
//! ### Standard Fields
//!
//! - `client_id` - Application id
//! - `max_email` - Number of messages requested
//! - `time_window_minutes` - Maximum message age
//! - `keyword` - Lowercased keyword filter
//! - `status` - Upstream HTTP status
//! - `matched` - Number of codes found

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Public modules
pub mod config;
pub mod error;
pub mod graph;
pub mod matcher;
pub mod message;
pub mod pipeline;
pub mod proxy;
pub mod server;
pub mod service;

// Re-exports for ergonomic API
pub use config::{Endpoints, ServiceConfig, ServiceConfigBuilder, TimeoutConfig};
pub use error::{Error, ErrorCategory, Result};
pub use graph::GraphClient;
pub use matcher::{extract_otp, Matcher, OtpExtractor};
pub use message::Message;
pub use pipeline::{FilterParams, OtpMatch, OtpPipeline, OtpResult, SENTINEL_CODE};
pub use proxy::{ProxyAuth, Socks5Proxy};
pub use service::{OtpQuery, OtpRequest, OtpService};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_api_accessible() {
        // Ensure all public types are accessible
        let _ = ServiceConfig::builder();
        let _ = Socks5Proxy::new("localhost", 1080);
        let _ = OtpExtractor::default();
        let _ = FilterParams::default();
        assert_eq!(OtpResult::sentinel().code(), SENTINEL_CODE);
    }
}
