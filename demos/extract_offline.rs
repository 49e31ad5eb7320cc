//! Example: Run the filtering pipeline over in-memory messages.
//!
//! No network access is needed. This shows how the time window, the keyword
//! filter and the extractor chain decide which messages yield a code.
//!
//! # Usage
//!
//! ```bash
//! # Set log level (trace, debug, info, warn, error)
//! export RUST_LOG=mail_otp=debug
//!
//! cargo run --example extract_offline
//! ```

use chrono::{Duration, Utc};
use mail_otp::matcher::OtpMatcher;
use mail_otp::{FilterParams, Message, OtpExtractor, OtpPipeline};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mail_otp=debug")),
        )
        .with_span_events(FmtSpan::CLOSE)
        .with_target(true)
        .init();

    let now = Utc::now();
    let inbox = vec![
        Message::new("Welcome aboard", "Your member number is 123456")
            .from_address("news@shop.example")
            .received_at_time(now - Duration::minutes(1)),
        Message::new("Your Facebook login", "Order 555111. Mã: 482913")
            .from_address("security@facebookmail.com")
            .received_at_time(now - Duration::minutes(2)),
        Message::new("Facebook login", "OTP 777888")
            .from_address("security@facebookmail.com")
            .received_at_time(now - Duration::minutes(30)),
    ];

    // Defaults: 5 minute window, no keyword.
    let pipeline = OtpPipeline::new(FilterParams::default());
    println!("Default filters:");
    for result in pipeline.run(&inbox, now) {
        println!("  {}", serde_json::to_string(&result).unwrap_or_default());
    }

    // Keyword narrows the set; the labeled code wins over the order number.
    let pipeline = OtpPipeline::new(FilterParams::default().keyword("facebook"));
    println!("\nkeyword=facebook:");
    for result in pipeline.run(&inbox, now) {
        println!("  {}", serde_json::to_string(&result).unwrap_or_default());
    }

    // A wider window lets the older message through too.
    let pipeline = OtpPipeline::new(
        FilterParams::default()
            .keyword("facebook")
            .time_window_minutes(60),
    );
    println!("\nkeyword=facebook, time_window=60:");
    for result in pipeline.run(&inbox, now) {
        println!("  {}", result.code());
    }

    // Custom chain: only 8-digit codes. Nothing matches, so the sentinel comes back.
    let extractor = OtpExtractor::new().then(OtpMatcher::n_digit(8));
    let pipeline = OtpPipeline::with_extractor(FilterParams::default(), extractor);
    let results = pipeline.run(&inbox, now);
    println!(
        "\n8-digit chain: {} (sentinel: {})",
        results[0].code(),
        results[0].is_sentinel()
    );
}
