//! Example: Look up the newest OTP in a real Outlook mailbox.
//!
//! Redeems a refresh token for a Graph access token, reads the newest
//! messages and prints what the pipeline extracts.
//!
//! # Usage
//!
//! ```bash
//! export MAIL_OTP_REFRESH_TOKEN="..."
//! export MAIL_OTP_CLIENT_ID="..."
//! # Optional
//! export MAIL_OTP_KEYWORD="facebook"
//! export RUST_LOG=mail_otp=debug
//!
//! cargo run --example fetch_otp
//! ```
//!
//! Proxy and endpoint settings are read from the same `MAIL_OTP_*`
//! variables as the server.

use mail_otp::{FilterParams, OtpRequest, OtpService, ServiceConfig};
use std::env;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> mail_otp::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mail_otp=info")),
        )
        .init();

    let refresh_token = env::var("MAIL_OTP_REFRESH_TOKEN")
        .expect("MAIL_OTP_REFRESH_TOKEN environment variable required");
    let client_id =
        env::var("MAIL_OTP_CLIENT_ID").expect("MAIL_OTP_CLIENT_ID environment variable required");
    let keyword = env::var("MAIL_OTP_KEYWORD").unwrap_or_default();

    let service = OtpService::new(&ServiceConfig::from_env()?)?;

    let request = OtpRequest::new(refresh_token, client_id)?.with_params(
        FilterParams::default()
            .keyword(&keyword)
            .max_count(5)
            .time_window_minutes(15),
    );

    println!("Reading the 5 newest messages for client {}...", request.client_id());

    match service.read_mail_otp(request).await {
        Ok(results) => {
            for result in &results {
                match result.as_match() {
                    Some(m) => println!("{} from {} ({})", m.code, m.from, m.subject),
                    None => println!("No OTP in the last 15 minutes"),
                }
            }
        }
        Err(e) if e.is_retryable() => println!("Transient failure, try again: {e}"),
        Err(e) => println!("Lookup failed ({}): {e}", e.category()),
    }

    Ok(())
}
