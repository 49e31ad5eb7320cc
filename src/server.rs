//! HTTP surface.
//!
//! | Route | Method | Body |
//! |-------|--------|------|
//! | `/read_mail_otp` | `GET` | query parameters, see [`OtpQuery`] |
//! | `/read_mail_otp` | `POST` | JSON object with the same fields |
//! | `/` | `GET` | HTML form for manual lookups |
//!
//! Successful lookups answer `200` with a JSON array of results (the
//! `[{"code": "0"}]` sentinel when nothing was found). Missing credentials
//! answer `400`, a failed token exchange `401`, both as `{"error": "..."}`.

use crate::config::ServiceConfig;
use crate::error::{Error, Result};
use crate::pipeline::OtpResult;
use crate::service::{OtpQuery, OtpService};
use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::get;
use axum::{Json, Router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

const INDEX_HTML: &str = include_str!("../static/index.html");

/// Builds the application router around a shared service.
pub fn router(service: Arc<OtpService>) -> Router {
    Router::new()
        .route("/", get(index))
        .route(
            "/read_mail_otp",
            get(read_mail_otp_query).post(read_mail_otp_json),
        )
        .with_state(service)
        .layer(TraceLayer::new_for_http())
}

/// Binds the configured address and serves until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the service cannot be built, the address cannot be
/// bound, or the server fails.
pub async fn serve(config: ServiceConfig) -> Result<()> {
    let service = Arc::new(OtpService::new(&config)?);

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .map_err(|source| Error::Bind {
            addr: config.bind_addr,
            source,
        })?;

    info!(
        addr = %config.bind_addr,
        graph = %config.endpoints.graph_base_url,
        proxy_enabled = config.proxy.is_some(),
        "Listening"
    );

    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|source| Error::Serve { source })
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            warn!(error = %e, "Cannot listen for Ctrl-C, running until killed");
            std::future::pending::<()>().await;
        }
    }
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn read_mail_otp_query(
    State(service): State<Arc<OtpService>>,
    Query(query): Query<OtpQuery>,
) -> Result<Json<Vec<OtpResult>>> {
    lookup(&service, query).await
}

async fn read_mail_otp_json(
    State(service): State<Arc<OtpService>>,
    Json(query): Json<OtpQuery>,
) -> Result<Json<Vec<OtpResult>>> {
    lookup(&service, query).await
}

async fn lookup(service: &OtpService, query: OtpQuery) -> Result<Json<Vec<OtpResult>>> {
    match service.handle(query).await {
        Ok(results) => Ok(Json(results)),
        Err(e) => {
            warn!(
                error = %e,
                category = %e.category(),
                status = e.status_code().as_u16(),
                "OTP lookup failed"
            );
            Err(e)
        }
    }
}
