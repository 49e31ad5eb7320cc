//! Mail messages as seen by the OTP pipeline.
//!
//! A [`Message`] is built either directly (tests, demos, other mail sources) or
//! decoded from a Microsoft Graph `message` resource via [`GraphMessage`].

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::warn;

/// A fetched mail message.
///
/// Immutable once built; the builder-style setters consume `self`.
///
/// # Example
///
/// ```
/// use mail_otp::Message;
///
/// let message = Message::new("Your OTP is 123456", "")
///     .from_address("no-reply@example.com")
///     .received("2024-05-10T08:30:00Z");
///
/// assert_eq!(message.sender_address(), "no-reply@example.com");
/// assert!(message.received_at().is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    sender_address: String,
    subject: String,
    body_text: String,
    received_raw: Option<String>,
    received_at: Option<DateTime<Utc>>,
}

impl Message {
    /// Creates a message with no sender and no received time.
    #[must_use]
    pub fn new(subject: impl Into<String>, body_text: impl Into<String>) -> Self {
        Self {
            sender_address: String::new(),
            subject: subject.into(),
            body_text: body_text.into(),
            received_raw: None,
            received_at: None,
        }
    }

    /// Sets the sender address.
    #[must_use]
    pub fn from_address(mut self, address: impl Into<String>) -> Self {
        self.sender_address = address.into();
        self
    }

    /// Sets the received time from its ISO-8601 wire form.
    ///
    /// The raw string is kept verbatim. A value that does not parse as an
    /// instant with an offset leaves [`received_at`](Self::received_at) unset,
    /// so the message is never excluded by the time window.
    #[must_use]
    pub fn received(mut self, raw: impl Into<String>) -> Self {
        let raw = raw.into();
        self.received_at = parse_received(&raw);
        self.received_raw = Some(raw);
        self
    }

    /// Sets the received time from an instant.
    #[must_use]
    pub fn received_at_time(mut self, at: DateTime<Utc>) -> Self {
        self.received_raw = Some(at.to_rfc3339_opts(chrono::SecondsFormat::Secs, true));
        self.received_at = Some(at);
        self
    }

    /// Sender address, empty when unknown.
    #[must_use]
    pub fn sender_address(&self) -> &str {
        &self.sender_address
    }

    /// Subject line.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Body content, HTML or plain text as delivered.
    #[must_use]
    pub fn body_text(&self) -> &str {
        &self.body_text
    }

    /// Received time as delivered on the wire.
    #[must_use]
    pub fn received_raw(&self) -> Option<&str> {
        self.received_raw.as_deref()
    }

    /// Parsed received time, if present and valid.
    #[must_use]
    pub fn received_at(&self) -> Option<DateTime<Utc>> {
        self.received_at
    }

    /// Subject and body joined by a space; the text OTP extraction runs on.
    #[must_use]
    pub fn search_text(&self) -> String {
        format!("{} {}", self.subject, self.body_text)
    }
}

fn parse_received(raw: &str) -> Option<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(at) => Some(at.with_timezone(&Utc)),
        Err(e) => {
            warn!(received = raw, error = %e, "Unparsable received time, ignoring time window");
            None
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Microsoft Graph wire model
// ─────────────────────────────────────────────────────────────────────────────

/// Page of messages returned by `GET /me/messages`.
#[derive(Debug, Default, Deserialize)]
pub struct GraphMessagePage {
    /// Messages on this page, newest first when ordered by `receivedDateTime desc`.
    #[serde(default)]
    pub value: Vec<GraphMessage>,
}

/// A Graph `message` resource, restricted to the fields the pipeline reads.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphMessage {
    /// Sender.
    #[serde(default)]
    pub from: Option<GraphRecipient>,
    /// Subject line.
    #[serde(default)]
    pub subject: Option<String>,
    /// Body content.
    #[serde(default)]
    pub body: Option<GraphItemBody>,
    /// ISO-8601 received time, e.g. `2024-05-10T08:30:00Z`.
    #[serde(default)]
    pub received_date_time: Option<String>,
}

/// Graph `recipient` resource.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphRecipient {
    /// Address of the recipient.
    #[serde(default)]
    pub email_address: Option<GraphEmailAddress>,
}

/// Graph `emailAddress` resource.
#[derive(Debug, Default, Deserialize)]
pub struct GraphEmailAddress {
    /// SMTP address.
    #[serde(default)]
    pub address: Option<String>,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
}

/// Graph `itemBody` resource.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphItemBody {
    /// `text` or `html`.
    #[serde(default)]
    pub content_type: Option<String>,
    /// Body content.
    #[serde(default)]
    pub content: Option<String>,
}

impl From<GraphMessage> for Message {
    fn from(graph: GraphMessage) -> Self {
        let sender = graph
            .from
            .and_then(|from| from.email_address)
            .and_then(|address| address.address)
            .unwrap_or_default();
        let body = graph
            .body
            .and_then(|body| body.content)
            .unwrap_or_default();

        let message = Message::new(graph.subject.unwrap_or_default(), body).from_address(sender);
        match graph.received_date_time {
            Some(raw) => message.received(raw),
            None => message,
        }
    }
}
