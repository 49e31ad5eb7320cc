//! Configuration for the OTP service.
//!
//! Use [`ServiceConfigBuilder`] to create a configuration with sensible defaults:
//!
//! ```
//! use mail_otp::ServiceConfig;
//!
//! let config = ServiceConfig::builder()
//!     .bind_addr("127.0.0.1:3000".parse().unwrap())
//!     .build()
//!     .expect("valid config");
//!
//! assert_eq!(config.bind_addr.port(), 3000);
//! ```
//!
//! The binary reads the same settings from the environment, see
//! [`ServiceConfig::from_env`].

use crate::error::{Error, Result};
use crate::proxy::Socks5Proxy;
use reqwest::Url;
use std::net::SocketAddr;
use std::time::Duration;

/// Microsoft identity platform token endpoint (multi-tenant).
pub const DEFAULT_TOKEN_URL: &str = "https://login.microsoftonline.com/common/oauth2/v2.0/token";

/// Microsoft Graph v1.0 base URL.
pub const DEFAULT_GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";

/// Scope requested when redeeming a refresh token.
pub const DEFAULT_SCOPE: &str = "https://graph.microsoft.com/.default";

/// Default listening address.
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

const ENV_PREFIX: &str = "MAIL_OTP_";

/// Configuration for the OTP service.
///
/// Create using [`ServiceConfig::builder()`].
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address the HTTP server listens on.
    pub bind_addr: SocketAddr,
    /// Upstream endpoints.
    pub endpoints: Endpoints,
    /// Timeout configuration.
    pub timeouts: TimeoutConfig,
    /// Optional SOCKS5 proxy for outbound calls.
    pub proxy: Option<Socks5Proxy>,
}

/// Upstream endpoints, overridable for tests and sovereign clouds.
#[derive(Debug, Clone)]
pub struct Endpoints {
    /// OAuth 2.0 token endpoint.
    pub token_url: Url,
    /// Graph API base URL, without trailing slash.
    pub graph_base_url: String,
    /// Scope sent with the refresh token grant.
    pub scope: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            token_url: Url::parse(DEFAULT_TOKEN_URL).expect("valid default token URL"),
            graph_base_url: DEFAULT_GRAPH_BASE_URL.to_string(),
            scope: DEFAULT_SCOPE.to_string(),
        }
    }
}

impl Endpoints {
    /// URL of the `me/messages` collection.
    #[must_use]
    pub fn messages_url(&self) -> String {
        format!("{}/me/messages", self.graph_base_url)
    }
}

/// Timeout configuration for outbound calls.
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    /// Timeout for establishing a connection.
    pub connect: Duration,
    /// Timeout for the whole token exchange request.
    pub token: Duration,
    /// Timeout for the whole message fetch request.
    pub fetch: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(10),
            token: Duration::from_secs(30),
            fetch: Duration::from_secs(30),
        }
    }
}

impl ServiceConfig {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder::default()
    }

    /// Reads configuration from `MAIL_OTP_*` environment variables.
    ///
    /// | Variable | Meaning |
    /// |----------|---------|
    /// | `MAIL_OTP_BIND` | listen address, default `0.0.0.0:8080` |
    /// | `MAIL_OTP_TOKEN_URL` | token endpoint |
    /// | `MAIL_OTP_GRAPH_BASE_URL` | Graph base URL |
    /// | `MAIL_OTP_SCOPE` | requested scope |
    /// | `MAIL_OTP_CONNECT_TIMEOUT_SECS` | connect timeout |
    /// | `MAIL_OTP_TOKEN_TIMEOUT_SECS` | token request timeout |
    /// | `MAIL_OTP_FETCH_TIMEOUT_SECS` | message request timeout |
    /// | `MAIL_OTP_PROXY_HOST`, `MAIL_OTP_PROXY_PORT` | SOCKS5 proxy |
    /// | `MAIL_OTP_PROXY_USER`, `MAIL_OTP_PROXY_PASS` | proxy credentials |
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but invalid.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(format!("{ENV_PREFIX}{key}")).ok())
    }

    /// Builds a configuration from an arbitrary key lookup (keys without prefix).
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut builder = Self::builder();

        if let Some(bind) = lookup("BIND") {
            builder = builder.bind_addr(parse_var("BIND", &bind)?);
        }
        if let Some(url) = lookup("TOKEN_URL") {
            builder = builder.token_url(url);
        }
        if let Some(url) = lookup("GRAPH_BASE_URL") {
            builder = builder.graph_base_url(url);
        }
        if let Some(scope) = lookup("SCOPE") {
            builder = builder.scope(scope);
        }
        if let Some(secs) = lookup("CONNECT_TIMEOUT_SECS") {
            builder = builder.connect_timeout(Duration::from_secs(parse_var(
                "CONNECT_TIMEOUT_SECS",
                &secs,
            )?));
        }
        if let Some(secs) = lookup("TOKEN_TIMEOUT_SECS") {
            builder = builder.token_timeout(Duration::from_secs(parse_var(
                "TOKEN_TIMEOUT_SECS",
                &secs,
            )?));
        }
        if let Some(secs) = lookup("FETCH_TIMEOUT_SECS") {
            builder = builder.fetch_timeout(Duration::from_secs(parse_var(
                "FETCH_TIMEOUT_SECS",
                &secs,
            )?));
        }

        if let Some(host) = lookup("PROXY_HOST") {
            let port = match lookup("PROXY_PORT") {
                Some(port) => parse_var("PROXY_PORT", &port)?,
                None => 1080,
            };
            let proxy = match (lookup("PROXY_USER"), lookup("PROXY_PASS")) {
                (Some(user), Some(pass)) => Socks5Proxy::with_auth(host, port, user, pass),
                _ => Socks5Proxy::new(host, port),
            };
            builder = builder.proxy(proxy);
        }

        builder.build()
    }
}

fn parse_var<T>(key: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e| Error::InvalidConfig {
        message: format!("{ENV_PREFIX}{key}={value:?}: {e}"),
    })
}

/// Builder for [`ServiceConfig`].
#[derive(Debug, Default)]
pub struct ServiceConfigBuilder {
    bind_addr: Option<SocketAddr>,
    token_url: Option<String>,
    graph_base_url: Option<String>,
    scope: Option<String>,
    timeouts: Option<TimeoutConfig>,
    proxy: Option<Socks5Proxy>,
}

impl ServiceConfigBuilder {
    /// Sets the listening address.
    ///
    /// Default is `0.0.0.0:8080`.
    #[must_use]
    pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = Some(addr);
        self
    }

    /// Sets the OAuth 2.0 token endpoint.
    #[must_use]
    pub fn token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = Some(url.into());
        self
    }

    /// Sets the Graph API base URL (e.g. a mock server in tests).
    #[must_use]
    pub fn graph_base_url(mut self, url: impl Into<String>) -> Self {
        self.graph_base_url = Some(url.into());
        self
    }

    /// Sets the scope sent with the refresh token grant.
    #[must_use]
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Sets timeout configuration.
    #[must_use]
    pub fn timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = Some(timeouts);
        self
    }

    /// Sets the connect timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts
            .get_or_insert_with(TimeoutConfig::default)
            .connect = timeout;
        self
    }

    /// Sets the token request timeout.
    #[must_use]
    pub fn token_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts
            .get_or_insert_with(TimeoutConfig::default)
            .token = timeout;
        self
    }

    /// Sets the message fetch timeout.
    #[must_use]
    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts
            .get_or_insert_with(TimeoutConfig::default)
            .fetch = timeout;
        self
    }

    /// Routes outbound calls through a SOCKS5 proxy.
    #[must_use]
    pub fn proxy(mut self, proxy: Socks5Proxy) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if an endpoint URL is invalid or a timeout is zero.
    pub fn build(self) -> Result<ServiceConfig> {
        let defaults = Endpoints::default();

        let token_url = match self.token_url {
            Some(raw) => parse_http_url("token_url", &raw)?,
            None => defaults.token_url,
        };

        let graph_base_url = match self.graph_base_url {
            Some(raw) => {
                parse_http_url("graph_base_url", &raw)?;
                raw.trim_end_matches('/').to_string()
            }
            None => defaults.graph_base_url,
        };

        let scope = self.scope.unwrap_or(defaults.scope);
        if scope.trim().is_empty() {
            return Err(Error::InvalidConfig {
                message: "scope must not be empty".into(),
            });
        }

        let timeouts = self.timeouts.unwrap_or_default();
        if timeouts.connect.is_zero() || timeouts.token.is_zero() || timeouts.fetch.is_zero() {
            return Err(Error::InvalidConfig {
                message: "timeouts must be greater than zero".into(),
            });
        }

        let bind_addr = match self.bind_addr {
            Some(addr) => addr,
            None => DEFAULT_BIND_ADDR.parse().map_err(|_| Error::InvalidConfig {
                message: format!("invalid default bind address {DEFAULT_BIND_ADDR}"),
            })?,
        };

        Ok(ServiceConfig {
            bind_addr,
            endpoints: Endpoints {
                token_url,
                graph_base_url,
                scope,
            },
            timeouts,
            proxy: self.proxy,
        })
    }
}

fn parse_http_url(field: &str, raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| Error::InvalidConfig {
        message: format!("{field} {raw:?}: {e}"),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::InvalidConfig {
            message: format!("{field} {raw:?}: scheme must be http or https"),
        });
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_builder_defaults() {
        let config = ServiceConfig::builder().build().unwrap();

        assert_eq!(config.bind_addr, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(config.endpoints.token_url.as_str(), DEFAULT_TOKEN_URL);
        assert_eq!(
            config.endpoints.messages_url(),
            "https://graph.microsoft.com/v1.0/me/messages"
        );
        assert_eq!(config.endpoints.scope, DEFAULT_SCOPE);
        assert_eq!(config.timeouts.token, Duration::from_secs(30));
        assert!(config.proxy.is_none());
    }

    #[test]
    fn test_builder_full() {
        let config = ServiceConfig::builder()
            .bind_addr("127.0.0.1:9000".parse().unwrap())
            .token_url("http://127.0.0.1:1234/token")
            .graph_base_url("http://127.0.0.1:1234/v1.0/")
            .scope("Mail.Read")
            .fetch_timeout(Duration::from_secs(5))
            .proxy(Socks5Proxy::new("proxy.local", 1080))
            .build()
            .unwrap();

        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(
            config.endpoints.messages_url(),
            "http://127.0.0.1:1234/v1.0/me/messages"
        );
        assert_eq!(config.endpoints.scope, "Mail.Read");
        assert_eq!(config.timeouts.fetch, Duration::from_secs(5));
        assert_eq!(config.timeouts.token, Duration::from_secs(30));
        assert!(config.proxy.is_some());
    }

    #[test]
    fn test_builder_rejects_bad_urls() {
        assert!(ServiceConfig::builder().token_url("not a url").build().is_err());
        assert!(ServiceConfig::builder()
            .graph_base_url("ftp://example.com")
            .build()
            .is_err());
    }

    #[test]
    fn test_builder_rejects_zero_timeout() {
        let result = ServiceConfig::builder()
            .token_timeout(Duration::ZERO)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_from_lookup() {
        let config = ServiceConfig::from_lookup(lookup_from(&[
            ("BIND", "127.0.0.1:8181"),
            ("FETCH_TIMEOUT_SECS", "7"),
            ("PROXY_HOST", "proxy.local"),
            ("PROXY_USER", "user"),
            ("PROXY_PASS", "super-secret"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:8181".parse().unwrap());
        assert_eq!(config.timeouts.fetch, Duration::from_secs(7));
        let proxy = config.proxy.as_ref().unwrap();
        assert_eq!(proxy.port, 1080);
        assert!(proxy.requires_auth());
        assert!(!format!("{config:?}").contains("super-secret"));
    }

    #[test]
    fn test_from_lookup_invalid_value() {
        let result = ServiceConfig::from_lookup(lookup_from(&[("TOKEN_TIMEOUT_SECS", "soon")]));
        assert!(matches!(result, Err(Error::InvalidConfig { .. })));
    }
}
