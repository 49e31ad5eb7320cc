//! OTP lookup orchestration.
//!
//! [`OtpService`] validates a lookup request, redeems the refresh token,
//! fetches the newest messages and runs the [`OtpPipeline`] over them.
//!
//! Failure policy:
//!
//! - missing credentials fail before any network call ([`Error::MissingCredentials`]);
//! - a failed token exchange fails the lookup;
//! - a failed message fetch does not: the mailbox is treated as empty and the
//!   lookup resolves to the `{"code": "0"}` sentinel.

use crate::config::ServiceConfig;
use crate::error::{Error, Result};
use crate::graph::GraphClient;
use crate::matcher::OtpExtractor;
use crate::pipeline::{
    FilterParams, OtpPipeline, OtpResult, DEFAULT_MAX_COUNT, DEFAULT_TIME_WINDOW_MINUTES,
};
use chrono::Utc;
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, instrument};

/// Raw lookup parameters, as received in a query string or JSON body.
///
/// Every field is optional here; [`OtpQuery::validate`] applies defaults and
/// rejects missing credentials.
#[derive(Default, Deserialize)]
pub struct OtpQuery {
    /// OAuth refresh token (required).
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Application (client) id the refresh token was issued to (required).
    #[serde(default)]
    pub client_id: Option<String>,
    /// Number of newest messages to inspect. Number or digit string.
    #[serde(default)]
    pub max_email: Option<Value>,
    /// Case-insensitive keyword that subject or body must contain.
    #[serde(default)]
    pub keyword: Option<String>,
    /// Maximum message age in minutes. Number or digit string.
    #[serde(default)]
    pub time_window: Option<Value>,
}

impl std::fmt::Debug for OtpQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OtpQuery")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("client_id", &self.client_id)
            .field("max_email", &self.max_email)
            .field("keyword", &self.keyword)
            .field("time_window", &self.time_window)
            .finish()
    }
}

impl OtpQuery {
    /// Validates credentials and resolves defaults.
    ///
    /// Integer fields that are absent, empty, non-numeric or not positive fall
    /// back to their defaults (1 message, 5 minutes).
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingCredentials`] if `refresh_token` or `client_id`
    /// is absent or empty.
    pub fn validate(self) -> Result<OtpRequest> {
        let refresh_token = non_empty(self.refresh_token).ok_or(Error::MissingCredentials)?;
        let client_id = non_empty(self.client_id).ok_or(Error::MissingCredentials)?;

        let params = FilterParams::default()
            .keyword(self.keyword.unwrap_or_default())
            .max_count(lenient_count(self.max_email.as_ref(), DEFAULT_MAX_COUNT))
            .time_window_minutes(lenient_count(
                self.time_window.as_ref(),
                DEFAULT_TIME_WINDOW_MINUTES,
            ));

        Ok(OtpRequest {
            refresh_token: SecretString::from(refresh_token),
            client_id,
            params,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Reads a positive count from a JSON number or a digit-only string.
fn lenient_count(value: Option<&Value>, default: u32) -> u32 {
    let parsed = match value {
        Some(Value::Number(number)) => number.as_u64().and_then(|n| u32::try_from(n).ok()),
        Some(Value::String(text)) if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) => {
            text.parse::<u32>().ok()
        }
        _ => None,
    };
    parsed.filter(|n| *n > 0).unwrap_or(default)
}

/// A validated lookup request.
pub struct OtpRequest {
    refresh_token: SecretString,
    client_id: String,
    params: FilterParams,
}

impl OtpRequest {
    /// Creates a request with default filter parameters.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingCredentials`] if either credential is empty.
    pub fn new(refresh_token: impl Into<String>, client_id: impl Into<String>) -> Result<Self> {
        OtpQuery {
            refresh_token: Some(refresh_token.into()),
            client_id: Some(client_id.into()),
            ..OtpQuery::default()
        }
        .validate()
    }

    /// Replaces the filter parameters.
    #[must_use]
    pub fn with_params(mut self, params: FilterParams) -> Self {
        self.params = params;
        self
    }

    /// The application (client) id.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// The resolved filter parameters.
    #[must_use]
    pub fn params(&self) -> &FilterParams {
        &self.params
    }
}

impl std::fmt::Debug for OtpRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OtpRequest")
            .field("refresh_token", &"[REDACTED]")
            .field("client_id", &self.client_id)
            .field("params", &self.params)
            .finish()
    }
}

/// Reads recent mail and extracts OTP codes.
///
/// Holds only immutable state and can be shared across request handlers.
///
/// # Example
///
/// ```no_run
/// use mail_otp::{OtpRequest, OtpService, ServiceConfig};
///
/// # async fn example() -> mail_otp::Result<()> {
/// let service = OtpService::new(&ServiceConfig::builder().build()?)?;
/// let request = OtpRequest::new("refresh-token", "client-id")?;
///
/// let results = service.read_mail_otp(request).await?;
/// if results[0].is_sentinel() {
///     println!("no code yet");
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct OtpService {
    graph: GraphClient,
    extractor: OtpExtractor,
}

impl OtpService {
    /// Creates a service with the default extractor.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built from `config`.
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        Ok(Self {
            graph: GraphClient::new(config)?,
            extractor: OtpExtractor::default(),
        })
    }

    /// Replaces the extractor chain.
    #[must_use]
    pub fn with_extractor(mut self, extractor: OtpExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    /// Validates raw parameters and performs the lookup.
    ///
    /// # Errors
    ///
    /// See [`OtpQuery::validate`] and [`OtpService::read_mail_otp`].
    pub async fn handle(&self, query: OtpQuery) -> Result<Vec<OtpResult>> {
        let request = query.validate()?;
        self.read_mail_otp(request).await
    }

    /// Performs a lookup.
    ///
    /// Always returns at least one entry; `[{"code": "0"}]` means no code was found.
    ///
    /// # Errors
    ///
    /// Returns an error if the refresh token cannot be exchanged.
    #[instrument(
        name = "OtpService::read_mail_otp",
        skip_all,
        fields(
            client_id = %request.client_id,
            max_email = request.params.max_count,
            time_window_minutes = request.params.time_window_minutes,
            keyword = %request.params.keyword_lowercase()
        )
    )]
    pub async fn read_mail_otp(&self, request: OtpRequest) -> Result<Vec<OtpResult>> {
        let access_token = self
            .graph
            .exchange_refresh_token(&request.refresh_token, &request.client_id)
            .await?;

        let messages = self
            .graph
            .fetch_messages_or_empty(&access_token, request.params.max_count)
            .await;

        let now = Utc::now();
        let results = OtpPipeline::with_extractor(request.params, self.extractor.clone())
            .run(&messages, now);

        info!(
            fetched = messages.len(),
            found = !results.iter().any(OtpResult::is_sentinel),
            "OTP lookup finished"
        );
        Ok(results)
    }
}
