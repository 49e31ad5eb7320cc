//! OTP extraction from message text.
//!
//! This module provides a [`Matcher`] trait, regex-based implementations, and the
//! ordered [`OtpExtractor`] chain used by the pipeline.
//!
//! The default chain tries two patterns, case-insensitively, in order:
//!
//! 1. a label (`code`, `OTP`, `mã`) followed by up to 10 non-digit characters and
//!    exactly 6 digits;
//! 2. any standalone run of exactly 6 digits.
//!
//! # Example
//!
//! ```
//! use mail_otp::matcher::{Matcher, OtpExtractor, OtpMatcher};
//!
//! let otp = OtpMatcher::six_digit();
//! assert_eq!(otp.find_match("Your code is 123456.").as_deref(), Some("123456"));
//!
//! // The labeled code wins over an earlier bare number.
//! let extractor = OtpExtractor::default();
//! let text = "Order 555111 shipped. Your OTP: 482913";
//! assert_eq!(extractor.extract(text).as_deref(), Some("482913"));
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;
use std::sync::Arc;

/// Label tokens recognized in front of a code by [`OtpExtractor::default`].
///
/// `mã` is Vietnamese for "code".
pub const DEFAULT_LABELS: &[&str] = &["code", "OTP", "mã"];

/// Maximum number of non-digit characters allowed between a label and its code.
pub const MAX_LABEL_GAP: usize = 10;

/// Number of digits in an OTP code.
pub const OTP_DIGITS: usize = 6;

static DEFAULT_EXTRACTOR: Lazy<OtpExtractor> =
    Lazy::new(|| OtpExtractor::with_labels(DEFAULT_LABELS.iter().copied()));

/// Trait for matching and extracting content from message text.
///
/// Implement this trait to plug custom logic into an [`OtpExtractor`].
///
/// # Example
///
/// ```
/// use mail_otp::matcher::Matcher;
/// use std::borrow::Cow;
///
/// struct PinLineMatcher;
///
/// impl Matcher for PinLineMatcher {
///     fn find_match<'a>(&self, text: &'a str) -> Option<Cow<'a, str>> {
///         text.lines()
///             .find_map(|line| line.strip_prefix("PIN="))
///             .map(Cow::Borrowed)
///     }
///
///     fn description(&self) -> &str {
///         "PIN= line"
///     }
/// }
/// ```
pub trait Matcher: Send + Sync {
    /// Attempts to find and extract matching content from the text.
    ///
    /// Returns `Some(matched_value)` if found, `None` otherwise.
    /// Uses `Cow<str>` to avoid allocations when the match can be borrowed
    /// directly from the input text.
    fn find_match<'a>(&self, text: &'a str) -> Option<Cow<'a, str>>;

    /// Returns a human-readable description of what this matcher looks for.
    ///
    /// Used in logging.
    fn description(&self) -> &str;
}

/// Regex-based matcher that extracts the first capture group.
///
/// # Example
///
/// ```
/// use mail_otp::matcher::{RegexMatcher, Matcher};
///
/// let matcher = RegexMatcher::new(r"code:\s*(\d+)").unwrap();
/// assert_eq!(matcher.find_match("Your code: 42"), Some("42".into()));
/// ```
#[derive(Debug, Clone)]
pub struct RegexMatcher {
    regex: Regex,
    description: String,
}

impl RegexMatcher {
    /// Creates a new regex matcher.
    ///
    /// The regex should contain at least one capture group. The first capture group
    /// will be extracted as the match result.
    ///
    /// # Errors
    ///
    /// Returns an error if the regex pattern is invalid.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(pattern)?;
        Ok(Self {
            description: format!("regex pattern: {pattern}"),
            regex,
        })
    }

    /// Creates a new regex matcher with a custom description.
    ///
    /// # Errors
    ///
    /// Returns an error if the regex pattern is invalid.
    pub fn with_description(
        pattern: &str,
        description: impl Into<String>,
    ) -> Result<Self, regex::Error> {
        let regex = Regex::new(pattern)?;
        Ok(Self {
            description: description.into(),
            regex,
        })
    }
}

impl Matcher for RegexMatcher {
    fn find_match<'a>(&self, text: &'a str) -> Option<Cow<'a, str>> {
        self.regex
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| Cow::Borrowed(m.as_str()))
    }

    fn description(&self) -> &str {
        &self.description
    }
}

/// Matcher for OTP codes.
///
/// # Example
///
/// ```
/// use mail_otp::matcher::{OtpMatcher, Matcher};
///
/// let otp = OtpMatcher::six_digit();
/// assert_eq!(otp.find_match("Your code is 123456."), Some("123456".into()));
/// assert_eq!(otp.find_match("Code: 12345"), None); // Only 5 digits
///
/// let labeled = OtpMatcher::labeled(["code"], 6);
/// assert_eq!(labeled.find_match("ref 111222, CODE - 987654"), Some("987654".into()));
/// ```
#[derive(Debug, Clone)]
pub struct OtpMatcher {
    inner: RegexMatcher,
}

impl OtpMatcher {
    /// Creates a matcher for bare 6-digit OTP codes.
    #[must_use]
    pub fn six_digit() -> Self {
        Self::n_digit(OTP_DIGITS)
    }

    /// Creates a matcher for bare N-digit OTP codes.
    ///
    /// Uses word boundaries to match exactly N digits.
    ///
    /// # Panics
    ///
    /// Panics if `digits` is 0.
    #[must_use]
    pub fn n_digit(digits: usize) -> Self {
        assert!(digits > 0, "digits must be > 0");
        let pattern = format!(r"\b(\d{{{digits}}})\b");
        Self {
            inner: RegexMatcher::with_description(&pattern, format!("{digits}-digit OTP code"))
                .expect("valid regex"),
        }
    }

    /// Creates a matcher for N-digit codes that follow one of the given labels.
    ///
    /// Labels are matched case-insensitively at a word boundary and may be
    /// separated from the code by up to [`MAX_LABEL_GAP`] non-digit characters.
    /// Labels are escaped, so they are taken literally.
    ///
    /// # Panics
    ///
    /// Panics if `digits` is 0 or `labels` is empty.
    #[must_use]
    pub fn labeled<I, S>(labels: I, digits: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        assert!(digits > 0, "digits must be > 0");
        let labels: Vec<String> = labels
            .into_iter()
            .map(|label| regex::escape(label.as_ref()))
            .filter(|label| !label.is_empty())
            .collect();
        assert!(!labels.is_empty(), "at least one label is required");

        let alternation = labels.join("|");
        let pattern =
            format!(r"(?i)\b(?:{alternation})[^\d]{{0,{MAX_LABEL_GAP}}}(\d{{{digits}}})\b");
        Self {
            inner: RegexMatcher::with_description(
                &pattern,
                format!("{digits}-digit code after label ({})", labels.join(", ")),
            )
            .expect("valid regex"),
        }
    }

    /// Creates a matcher for OTP codes with custom regex.
    ///
    /// # Errors
    ///
    /// Returns an error if the regex pattern is invalid.
    pub fn custom(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            inner: RegexMatcher::with_description(pattern, "custom OTP pattern")?,
        })
    }
}

impl Matcher for OtpMatcher {
    fn find_match<'a>(&self, text: &'a str) -> Option<Cow<'a, str>> {
        self.inner.find_match(text)
    }

    fn description(&self) -> &str {
        self.inner.description()
    }
}

/// Matcher using a closure for custom matching logic.
///
/// # Example
///
/// ```
/// use mail_otp::matcher::{ClosureMatcher, Matcher};
/// use std::borrow::Cow;
///
/// let matcher = ClosureMatcher::new(
///     |text| {
///         text.lines()
///             .find(|line| line.starts_with("Code:"))
///             .map(|line| Cow::Owned(line.trim_start_matches("Code:").trim().to_string()))
///     },
///     "code line extractor"
/// );
///
/// let text = "Hello\nCode: ABC123\nThanks";
/// assert_eq!(matcher.find_match(text).as_deref(), Some("ABC123"));
/// ```
pub struct ClosureMatcher<F>
where
    F: for<'a> Fn(&'a str) -> Option<Cow<'a, str>> + Send + Sync,
{
    matcher_fn: F,
    description: String,
}

impl<F> ClosureMatcher<F>
where
    F: for<'a> Fn(&'a str) -> Option<Cow<'a, str>> + Send + Sync,
{
    /// Creates a new closure-based matcher.
    #[must_use]
    pub fn new(matcher_fn: F, description: impl Into<String>) -> Self {
        Self {
            matcher_fn,
            description: description.into(),
        }
    }
}

impl<F> Matcher for ClosureMatcher<F>
where
    F: for<'a> Fn(&'a str) -> Option<Cow<'a, str>> + Send + Sync,
{
    fn find_match<'a>(&self, text: &'a str) -> Option<Cow<'a, str>> {
        (self.matcher_fn)(text)
    }

    fn description(&self) -> &str {
        &self.description
    }
}

impl<F> std::fmt::Debug for ClosureMatcher<F>
where
    F: for<'a> Fn(&'a str) -> Option<Cow<'a, str>> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClosureMatcher")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Ordered chain of matchers; the first one that matches wins.
///
/// Cloning is cheap, matchers are shared.
///
/// # Example
///
/// ```
/// use mail_otp::matcher::{OtpExtractor, OtpMatcher};
///
/// let extractor = OtpExtractor::with_labels(["code", "pin"]);
/// assert_eq!(extractor.extract("PIN 246810").as_deref(), Some("246810"));
///
/// let empty = OtpExtractor::new();
/// assert_eq!(empty.extract("123456"), None);
///
/// let bare = OtpExtractor::new().then(OtpMatcher::six_digit());
/// assert_eq!(bare.extract("123456").as_deref(), Some("123456"));
/// ```
#[derive(Clone)]
pub struct OtpExtractor {
    matchers: Vec<Arc<dyn Matcher>>,
}

impl OtpExtractor {
    /// Creates an empty chain that matches nothing.
    #[must_use]
    pub fn new() -> Self {
        Self {
            matchers: Vec::new(),
        }
    }

    /// Creates the standard two-step chain with a custom label set.
    ///
    /// # Panics
    ///
    /// Panics if `labels` yields no non-empty label.
    #[must_use]
    pub fn with_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new()
            .then(OtpMatcher::labeled(labels, OTP_DIGITS))
            .then(OtpMatcher::six_digit())
    }

    /// Appends a matcher, tried after every matcher already in the chain.
    #[must_use]
    pub fn then(mut self, matcher: impl Matcher + 'static) -> Self {
        self.matchers.push(Arc::new(matcher));
        self
    }

    /// Returns the first match of the first matcher (in chain order) that matches.
    #[must_use]
    pub fn extract<'a>(&self, text: &'a str) -> Option<Cow<'a, str>> {
        self.matchers
            .iter()
            .find_map(|matcher| matcher.find_match(text))
    }

    /// Descriptions of the chained matchers, in order.
    pub fn descriptions(&self) -> impl Iterator<Item = &str> + '_ {
        self.matchers.iter().map(|matcher| matcher.description())
    }

    /// Number of matchers in the chain.
    #[must_use]
    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    /// Returns `true` if the chain has no matchers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }

    /// Returns the process-wide default extractor (see [`DEFAULT_LABELS`]).
    #[must_use]
    pub fn shared_default() -> &'static OtpExtractor {
        &DEFAULT_EXTRACTOR
    }
}

impl Default for OtpExtractor {
    /// The labeled 6-digit matcher over [`DEFAULT_LABELS`], then the bare 6-digit fallback.
    fn default() -> Self {
        DEFAULT_EXTRACTOR.clone()
    }
}

impl std::fmt::Debug for OtpExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.descriptions()).finish()
    }
}

/// Extracts a code with the default extractor.
///
/// ```
/// assert_eq!(mail_otp::matcher::extract_otp("Mã: 654321").as_deref(), Some("654321"));
/// assert_eq!(mail_otp::matcher::extract_otp("no digits here"), None);
/// ```
#[must_use]
pub fn extract_otp(text: &str) -> Option<Cow<'_, str>> {
    DEFAULT_EXTRACTOR.extract(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regex_matcher() {
        let matcher = RegexMatcher::new(r"code:\s*(\d+)").unwrap();
        assert_eq!(
            matcher.find_match("Your code: 12345").as_deref(),
            Some("12345")
        );
        assert_eq!(matcher.find_match("No code here"), None);
    }

    #[test]
    fn test_otp_six_digit() {
        let otp = OtpMatcher::six_digit();
        assert_eq!(
            otp.find_match("Your code is 123456.").as_deref(),
            Some("123456")
        );
        assert_eq!(otp.find_match("Code: 12345"), None); // Only 5 digits
        assert_eq!(otp.find_match("Code: 1234567"), None); // 7 digits
    }

    #[test]
    fn test_labeled_prefers_label_over_earlier_number() {
        let text = "Invoice 777888 - your code: 482913";
        assert_eq!(extract_otp(text).as_deref(), Some("482913"));
    }

    #[test]
    fn test_labeled_is_case_insensitive() {
        assert_eq!(extract_otp("YOUR OTP IS 135790").as_deref(), Some("135790"));
        assert_eq!(extract_otp("Mã: 246802").as_deref(), Some("246802"));
        assert_eq!(extract_otp("MÃ 246802").as_deref(), Some("246802"));
    }

    #[test]
    fn test_labeled_gap_limit() {
        // 10 non-digit characters between label and code are allowed
        let matcher = OtpMatcher::labeled(["code"], 6);
        assert_eq!(
            matcher.find_match("code----------123456").as_deref(),
            Some("123456")
        );
        // 11 are not
        assert_eq!(matcher.find_match("code-----------123456"), None);
    }

    #[test]
    fn test_labeled_requires_word_boundary_before_label() {
        let matcher = OtpMatcher::labeled(["code"], 6);
        assert_eq!(matcher.find_match("barcode 123456"), None);
        // The fallback still picks the bare number
        assert_eq!(extract_otp("barcode 123456").as_deref(), Some("123456"));
    }

    #[test]
    fn test_labeled_rejects_longer_runs() {
        // 7 digits after the label: neither pattern matches
        assert_eq!(extract_otp("code 1234567"), None);
    }

    #[test]
    fn test_fallback_takes_leftmost_run() {
        assert_eq!(
            extract_otp("Ref 111111 then 222222").as_deref(),
            Some("111111")
        );
    }

    #[test]
    fn test_no_six_digit_run() {
        assert_eq!(extract_otp("Your PIN is 1234"), None);
        assert_eq!(extract_otp(""), None);
    }

    #[test]
    fn test_custom_labels_are_escaped() {
        let extractor = OtpExtractor::with_labels(["pin(1)"]);
        assert_eq!(
            extractor.extract("ref 111222 PIN(1) = 908172").as_deref(),
            Some("908172")
        );
        assert_eq!(extractor.len(), 2);
    }

    #[test]
    fn test_chain_order() {
        let extractor = OtpExtractor::new()
            .then(ClosureMatcher::new(
                |text| text.contains("magic").then_some(Cow::Borrowed("000000")),
                "magic word",
            ))
            .then(OtpMatcher::six_digit());
        assert_eq!(extractor.extract("magic 123456").as_deref(), Some("000000"));
        assert_eq!(extractor.extract("plain 123456").as_deref(), Some("123456"));
        assert_eq!(
            extractor.descriptions().collect::<Vec<_>>(),
            vec!["magic word", "6-digit OTP code"]
        );
    }

    #[test]
    fn test_default_extractor_returns_borrowed() {
        let result = extract_otp("code: 654321");
        assert!(matches!(result, Some(Cow::Borrowed("654321"))));
    }

    #[test]
    fn test_closure_matcher() {
        let matcher = ClosureMatcher::new(
            |text| {
                text.lines()
                    .find(|line| line.contains("SECRET"))
                    .map(|line| Cow::Owned(line.replace("SECRET:", "").trim().to_string()))
            },
            "secret extractor",
        );

        let text = "Header\nSECRET: my-value\nFooter";
        assert_eq!(matcher.find_match(text).as_deref(), Some("my-value"));
    }
}
