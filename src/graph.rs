//! Microsoft identity platform and Graph mail calls.
//!
//! Two calls per lookup, made once each with no retry:
//!
//! - [`GraphClient::exchange_refresh_token`] redeems a refresh token for an
//!   access token;
//! - [`GraphClient::fetch_messages`] lists the newest messages of the mailbox.

use crate::config::{Endpoints, ServiceConfig, TimeoutConfig};
use crate::error::{Error, Result};
use crate::message::{GraphMessagePage, Message};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

/// Fields requested from Graph for each message.
const MESSAGE_SELECT_FIELDS: &str = "from,subject,body,receivedDateTime";

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
}

/// HTTP client for the token endpoint and the Graph messages endpoint.
///
/// Cheap to clone; the connection pool is shared.
#[derive(Debug, Clone)]
pub struct GraphClient {
    http: Client,
    endpoints: Endpoints,
    timeouts: TimeoutConfig,
}

impl GraphClient {
    /// Builds a client from the service configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the proxy is invalid or the HTTP client cannot be built.
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .connect_timeout(config.timeouts.connect)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")));

        if let Some(proxy) = &config.proxy {
            debug!(proxy = %proxy, "Routing outbound calls through proxy");
            builder = builder.proxy(proxy.to_client_proxy()?);
        }

        let http = builder
            .build()
            .map_err(|source| Error::HttpClient { source })?;

        Ok(Self {
            http,
            endpoints: config.endpoints.clone(),
            timeouts: config.timeouts.clone(),
        })
    }

    /// Redeems a refresh token for an access token.
    ///
    /// # Errors
    ///
    /// - [`Error::TokenRequest`] if the request fails in transit or the body is not JSON
    /// - [`Error::TokenRejected`] if the endpoint answers with a non-success status
    /// - [`Error::MissingAccessToken`] if the answer carries no `access_token`
    #[instrument(
        name = "GraphClient::exchange_refresh_token",
        skip_all,
        fields(client_id = %client_id, status)
    )]
    pub async fn exchange_refresh_token(
        &self,
        refresh_token: &SecretString,
        client_id: &str,
    ) -> Result<SecretString> {
        let endpoint = self.endpoints.token_url.clone();
        let params = [
            ("client_id", client_id),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.expose_secret()),
            ("scope", self.endpoints.scope.as_str()),
        ];

        let response = self
            .http
            .post(endpoint.clone())
            .form(&params)
            .timeout(self.timeouts.token)
            .send()
            .await
            .map_err(|source| Error::TokenRequest {
                endpoint: endpoint.to_string(),
                source,
            })?;

        let status = response.status();
        tracing::Span::current().record("status", status.as_u16());

        if !status.is_success() {
            warn!(status = status.as_u16(), "Token endpoint rejected refresh token");
            return Err(Error::TokenRejected { status });
        }

        let token: TokenResponse =
            response
                .json()
                .await
                .map_err(|source| Error::TokenRequest {
                    endpoint: endpoint.to_string(),
                    source,
                })?;

        match token.access_token {
            Some(access_token) if !access_token.is_empty() => {
                debug!("Access token obtained");
                Ok(SecretString::from(access_token))
            }
            _ => {
                warn!("Token response without access_token");
                Err(Error::MissingAccessToken)
            }
        }
    }

    /// Fetches up to `max_count` messages, newest first.
    ///
    /// # Errors
    ///
    /// - [`Error::FetchRequest`] if the request fails in transit or the body cannot be decoded
    /// - [`Error::FetchRejected`] if Graph answers with a non-success status
    #[instrument(
        name = "GraphClient::fetch_messages",
        skip(self, access_token),
        fields(status, fetched)
    )]
    pub async fn fetch_messages(
        &self,
        access_token: &SecretString,
        max_count: u32,
    ) -> Result<Vec<Message>> {
        let endpoint = self.endpoints.messages_url();
        let top = max_count.to_string();

        let response = self
            .http
            .get(&endpoint)
            .bearer_auth(access_token.expose_secret())
            .query(&[
                ("$top", top.as_str()),
                ("$orderby", "receivedDateTime desc"),
                ("$select", MESSAGE_SELECT_FIELDS),
            ])
            .timeout(self.timeouts.fetch)
            .send()
            .await
            .map_err(|source| Error::FetchRequest {
                endpoint: endpoint.clone(),
                source,
            })?;

        let status = response.status();
        tracing::Span::current().record("status", status.as_u16());

        if !status.is_success() {
            return Err(Error::FetchRejected { status });
        }

        let page: GraphMessagePage = response
            .json()
            .await
            .map_err(|source| Error::FetchRequest { endpoint, source })?;

        let messages: Vec<Message> = page.value.into_iter().map(Message::from).collect();
        tracing::Span::current().record("fetched", messages.len());
        debug!(fetched = messages.len(), "Messages fetched");

        Ok(messages)
    }

    /// Fetches messages, treating any failure as an empty mailbox.
    ///
    /// A failed fetch never fails the lookup; it resolves to the "no OTP"
    /// sentinel downstream.
    pub async fn fetch_messages_or_empty(
        &self,
        access_token: &SecretString,
        max_count: u32,
    ) -> Vec<Message> {
        match self.fetch_messages(access_token, max_count).await {
            Ok(messages) => messages,
            Err(e) => {
                warn!(
                    error = %e,
                    category = %e.category(),
                    retryable = e.is_retryable(),
                    "Message fetch failed, treating mailbox as empty"
                );
                Vec::new()
            }
        }
    }

    /// Upstream endpoints this client talks to.
    #[must_use]
    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }
}
