//! `mail-otp` server binary.
//!
//! Reads `MAIL_OTP_*` settings from the environment (and a `.env` file if
//! present) and serves the lookup API. Log levels follow `RUST_LOG`.

use mail_otp::{server, ServiceConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> mail_otp::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("mail_otp=info,tower_http=info")),
        )
        .with_target(true)
        .init();

    let config = ServiceConfig::from_env()?;
    tracing::debug!(?config, "Configuration loaded");

    server::serve(config).await
}
