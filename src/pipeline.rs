//! Message filtering and OTP selection.
//!
//! [`OtpPipeline::run`] walks messages in the order given (newest first, as
//! fetched) and, for each one:
//!
//! 1. skips it if it is older than the time window,
//! 2. skips it if a keyword is set and appears in neither subject nor body,
//! 3. skips it if no code can be extracted,
//! 4. otherwise emits an [`OtpMatch`].
//!
//! When nothing survives, the result is a single sentinel entry whose code is
//! `"0"` ([`OtpResult::NotFound`]), so the output is never empty.
//!
//! # Example
//!
//! ```
//! use chrono::Utc;
//! use mail_otp::{FilterParams, Message, OtpPipeline};
//!
//! let now = Utc::now();
//! let messages = vec![Message::new("Your OTP is 123456", "").received_at_time(now)];
//!
//! let results = OtpPipeline::new(FilterParams::default()).run(&messages, now);
//! assert_eq!(results[0].code(), "123456");
//!
//! let results = OtpPipeline::new(FilterParams::default()).run(&[], now);
//! assert!(results[0].is_sentinel());
//! ```

use crate::matcher::OtpExtractor;
use crate::message::Message;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, instrument, trace};

/// Code carried by the "nothing found" sentinel.
pub const SENTINEL_CODE: &str = "0";

/// Default time window in minutes.
pub const DEFAULT_TIME_WINDOW_MINUTES: u32 = 5;

/// Default number of messages to consider.
pub const DEFAULT_MAX_COUNT: u32 = 1;

/// Filter parameters for one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterParams {
    keyword: String,
    /// Messages older than this many minutes are skipped.
    pub time_window_minutes: u32,
    /// How many messages to fetch upstream. The pipeline itself does not truncate.
    pub max_count: u32,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            keyword: String::new(),
            time_window_minutes: DEFAULT_TIME_WINDOW_MINUTES,
            max_count: DEFAULT_MAX_COUNT,
        }
    }
}

impl FilterParams {
    /// Sets the keyword filter. Matching is case-insensitive; empty disables it.
    #[must_use]
    pub fn keyword(mut self, keyword: impl AsRef<str>) -> Self {
        self.keyword = keyword.as_ref().to_lowercase();
        self
    }

    /// Sets the time window in minutes.
    #[must_use]
    pub fn time_window_minutes(mut self, minutes: u32) -> Self {
        self.time_window_minutes = minutes;
        self
    }

    /// Sets the number of messages to consider.
    #[must_use]
    pub fn max_count(mut self, count: u32) -> Self {
        self.max_count = count;
        self
    }

    /// The lowercased keyword, empty when keyword filtering is off.
    #[must_use]
    pub fn keyword_lowercase(&self) -> &str {
        &self.keyword
    }

    /// The time window as a duration.
    #[must_use]
    pub fn time_window(&self) -> Duration {
        Duration::minutes(i64::from(self.time_window_minutes))
    }
}

/// An OTP found in one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OtpMatch {
    /// Sender address, empty when unknown.
    pub from: String,
    /// Subject line of the message.
    pub subject: String,
    /// The extracted code.
    pub code: String,
    /// Raw received time, `null` when the message had none.
    pub received: Option<String>,
}

/// The "no OTP found" marker, serialized as `{"code": "0"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NotFound {
    code: &'static str,
}

impl Default for NotFound {
    fn default() -> Self {
        Self {
            code: SENTINEL_CODE,
        }
    }
}

/// One entry of a pipeline result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum OtpResult {
    /// A code extracted from a message.
    Found(OtpMatch),
    /// Nothing was found in the considered messages.
    NotFound(NotFound),
}

impl OtpResult {
    /// The sentinel result.
    #[must_use]
    pub fn sentinel() -> Self {
        OtpResult::NotFound(NotFound::default())
    }

    /// The code, `"0"` for the sentinel.
    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            OtpResult::Found(found) => &found.code,
            OtpResult::NotFound(not_found) => not_found.code,
        }
    }

    /// Returns `true` for the "nothing found" sentinel.
    #[must_use]
    pub fn is_sentinel(&self) -> bool {
        matches!(self, OtpResult::NotFound(_))
    }

    /// The match, if this is not the sentinel.
    #[must_use]
    pub fn as_match(&self) -> Option<&OtpMatch> {
        match self {
            OtpResult::Found(found) => Some(found),
            OtpResult::NotFound(_) => None,
        }
    }
}

/// Filters messages and extracts OTP codes.
///
/// Holds no mutable state; one instance can serve any number of runs.
#[derive(Debug, Clone)]
pub struct OtpPipeline {
    params: FilterParams,
    extractor: OtpExtractor,
}

impl OtpPipeline {
    /// Creates a pipeline with the default extractor.
    #[must_use]
    pub fn new(params: FilterParams) -> Self {
        Self::with_extractor(params, OtpExtractor::default())
    }

    /// Creates a pipeline with a custom extractor chain.
    #[must_use]
    pub fn with_extractor(params: FilterParams, extractor: OtpExtractor) -> Self {
        Self { params, extractor }
    }

    /// The filter parameters.
    #[must_use]
    pub fn params(&self) -> &FilterParams {
        &self.params
    }

    /// Runs the pipeline, falling back to the sentinel when nothing matches.
    ///
    /// `now` is the reference time for the whole batch.
    #[must_use]
    pub fn run(&self, messages: &[Message], now: DateTime<Utc>) -> Vec<OtpResult> {
        let matches = self.extract_matches(messages, now);
        if matches.is_empty() {
            return vec![OtpResult::sentinel()];
        }
        matches.into_iter().map(OtpResult::Found).collect()
    }

    /// Runs the filters and extraction without the sentinel fallback.
    #[instrument(
        name = "OtpPipeline::extract_matches",
        skip_all,
        fields(
            messages = messages.len(),
            keyword = %self.params.keyword,
            time_window_minutes = self.params.time_window_minutes,
            matched
        )
    )]
    pub fn extract_matches(&self, messages: &[Message], now: DateTime<Utc>) -> Vec<OtpMatch> {
        let window = self.params.time_window();

        let matches: Vec<OtpMatch> = messages
            .iter()
            .enumerate()
            .filter_map(|(index, message)| self.process(index, message, now, window))
            .collect();

        tracing::Span::current().record("matched", matches.len());
        debug!(matched = matches.len(), "Pipeline finished");
        matches
    }

    fn process(
        &self,
        index: usize,
        message: &Message,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Option<OtpMatch> {
        if let Some(received_at) = message.received_at() {
            if now - received_at > window {
                trace!(index, received = %received_at, "Outside time window");
                return None;
            }
        }

        if !self.keyword_matches(message) {
            trace!(index, "Keyword not found");
            return None;
        }

        let text = message.search_text();
        let Some(code) = self.extractor.extract(&text) else {
            trace!(index, "No code in message");
            return None;
        };

        debug!(index, code_len = code.len(), "Found code in message");
        Some(OtpMatch {
            from: message.sender_address().to_string(),
            subject: message.subject().to_string(),
            code: code.into_owned(),
            received: message.received_raw().map(str::to_string),
        })
    }

    fn keyword_matches(&self, message: &Message) -> bool {
        let keyword = self.params.keyword_lowercase();
        keyword.is_empty()
            || message.subject().to_lowercase().contains(keyword)
            || message.body_text().to_lowercase().contains(keyword)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::OtpMatcher;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 8, 30, 0).unwrap()
    }

    fn minutes_ago(minutes: i64) -> DateTime<Utc> {
        now() - Duration::minutes(minutes)
    }

    #[test]
    fn test_single_fresh_message() {
        let messages = vec![Message::new("Your OTP is 123456", "").received_at_time(now())];
        let results = OtpPipeline::new(FilterParams::default()).run(&messages, now());

        assert_eq!(
            results,
            vec![OtpResult::Found(OtpMatch {
                from: String::new(),
                subject: "Your OTP is 123456".into(),
                code: "123456".into(),
                received: Some("2024-05-10T08:30:00Z".into()),
            })]
        );
    }

    #[test]
    fn test_empty_batch_yields_sentinel() {
        let results = OtpPipeline::new(FilterParams::default()).run(&[], now());
        assert_eq!(results, vec![OtpResult::sentinel()]);
        assert_eq!(results[0].code(), SENTINEL_CODE);
    }

    #[test]
    fn test_old_message_excluded() {
        let messages = vec![Message::new("code 123456", "").received_at_time(minutes_ago(10))];
        let results = OtpPipeline::new(FilterParams::default()).run(&messages, now());
        assert!(results[0].is_sentinel());
    }

    #[test]
    fn test_window_boundary_is_inclusive() {
        let messages = vec![Message::new("code 123456", "").received_at_time(minutes_ago(5))];
        let results = OtpPipeline::new(FilterParams::default()).run(&messages, now());
        assert_eq!(results[0].code(), "123456");
    }

    #[test]
    fn test_future_message_within_window() {
        let messages = vec![Message::new("code 123456", "").received_at_time(minutes_ago(-3))];
        let results = OtpPipeline::new(FilterParams::default()).run(&messages, now());
        assert_eq!(results[0].code(), "123456");
    }

    #[test]
    fn test_missing_or_unparsable_received_never_time_filtered() {
        let messages = vec![
            Message::new("code 111111", ""),
            Message::new("code 222222", "").received("not a date"),
        ];
        let results = OtpPipeline::new(FilterParams::default()).run(&messages, now());

        let codes: Vec<&str> = results.iter().map(OtpResult::code).collect();
        assert_eq!(codes, vec!["111111", "222222"]);
        assert_eq!(results[0].as_match().unwrap().received, None);
        assert_eq!(
            results[1].as_match().unwrap().received.as_deref(),
            Some("not a date")
        );
    }

    #[test]
    fn test_keyword_filter_case_insensitive() {
        let messages = vec![
            Message::new("Twitter login", "code 111111").received_at_time(now()),
            Message::new("Your FACEBOOK code", "482913").received_at_time(now()),
            Message::new("Hello", "code 333333").received_at_time(now()),
        ];
        let params = FilterParams::default().keyword("Facebook");
        let results = OtpPipeline::new(params).run(&messages, now());

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].code(), "482913");
    }

    #[test]
    fn test_keyword_in_body() {
        let messages = vec![Message::new("Login", "Sent by facebook: 654321")];
        let params = FilterParams::default().keyword("facebook");
        let results = OtpPipeline::new(params).run(&messages, now());
        assert_eq!(results[0].code(), "654321");
    }

    #[test]
    fn test_messages_without_code_are_skipped() {
        let messages = vec![
            Message::new("Newsletter", "nothing here"),
            Message::new("Verify", "code: 777888").from_address("a@example.com"),
        ];
        let results = OtpPipeline::new(FilterParams::default()).run(&messages, now());

        assert_eq!(results.len(), 1);
        let found = results[0].as_match().unwrap();
        assert_eq!(found.from, "a@example.com");
        assert_eq!(found.code, "777888");
    }

    #[test]
    fn test_output_preserves_input_order() {
        let messages = vec![
            Message::new("code 300000", ""),
            Message::new("code 100000", ""),
            Message::new("code 200000", ""),
        ];
        let results = OtpPipeline::new(FilterParams::default().max_count(3)).run(&messages, now());
        let codes: Vec<&str> = results.iter().map(OtpResult::code).collect();
        assert_eq!(codes, vec!["300000", "100000", "200000"]);
    }

    #[test]
    fn test_run_is_idempotent() {
        let messages = vec![
            Message::new("code 123456", "").received_at_time(minutes_ago(1)),
            Message::new("old 654321", "").received_at_time(minutes_ago(30)),
        ];
        let pipeline = OtpPipeline::new(FilterParams::default());
        assert_eq!(
            pipeline.run(&messages, now()),
            pipeline.run(&messages, now())
        );
    }

    #[test]
    fn test_custom_extractor() {
        let extractor = OtpExtractor::new().then(OtpMatcher::n_digit(4));
        let pipeline = OtpPipeline::with_extractor(FilterParams::default(), extractor);
        let results = pipeline.run(&[Message::new("PIN 4321", "")], now());
        assert_eq!(results[0].code(), "4321");
    }

    #[test]
    fn test_custom_pattern_with_keyword() {
        let extractor = OtpExtractor::new().then(OtpMatcher::custom(r"(?i)pin\s*(\d{4})").unwrap());
        let params = FilterParams::default().keyword("bank");
        let pipeline = OtpPipeline::with_extractor(params.clone(), extractor);
        assert_eq!(pipeline.params(), &params);

        let messages = vec![
            Message::new("Shop", "PIN 1111").received_at_time(now()),
            Message::new("Bank alert", "Ref 20240510, your pin 8642").received_at_time(now()),
            Message::new("Bank news", "code 123456").received_at_time(now()),
        ];
        let results = pipeline.run(&messages, now());

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].code(), "8642");
        assert_eq!(results[0].as_match().unwrap().subject, "Bank alert");
    }

    #[test]
    fn test_serialization_shapes() {
        let found = OtpResult::Found(OtpMatch {
            from: String::new(),
            subject: "Your OTP is 123456".into(),
            code: "123456".into(),
            received: None,
        });
        assert_eq!(
            serde_json::to_value(&found).unwrap(),
            serde_json::json!({
                "from": "",
                "subject": "Your OTP is 123456",
                "code": "123456",
                "received": null
            })
        );
        assert_eq!(
            serde_json::to_value(vec![OtpResult::sentinel()]).unwrap(),
            serde_json::json!([{ "code": "0" }])
        );
    }
}
