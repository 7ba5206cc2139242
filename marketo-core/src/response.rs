//! Common response envelope returned by every Marketo REST and bulk endpoint.

use serde::{Deserialize, Deserializer};
use std::fmt;

/// Vendor error code for an expired access token.
pub const TOKEN_EXPIRED_CODE: i64 = 602;

/// Vendor error code for a bulk export rejected because of queue or quota limits.
pub const TOO_MANY_JOBS_CODE: i64 = 1029;

/// Code assigned to warnings the vendor sends as bare strings.
pub const UNCODED_WARNING: i64 = -1;

/// A single `(code, message)` pair from the `errors` or `warnings` list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Message {
    /// Numeric vendor code. The API sends it as a string, so both forms are accepted.
    #[serde(deserialize_with = "deserialize_code")]
    pub code: i64,
    /// Human readable description.
    #[serde(default)]
    pub message: String,
}

impl Message {
    /// Creates a message.
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "code: {}, message: {}", self.code, self.message)
    }
}

fn deserialize_code<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse::<i64>().map_err(serde::de::Error::custom),
    }
}

/// Warnings arrive either as `{code, message}` objects or as bare strings.
fn deserialize_warnings<'de, D>(deserializer: D) -> Result<Vec<Message>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Coded(Message),
    }

    let raw = Option::<Vec<Raw>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .into_iter()
        .map(|w| match w {
            Raw::Text(message) => Message::new(UNCODED_WARNING, message),
            Raw::Coded(message) => message,
        })
        .collect())
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Decoded response body.
///
/// When `success` is `false` the `result` list must not be trusted. Missing
/// fields take their defaults, so an empty object decodes to an unsuccessful
/// envelope with no errors.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "T: Deserialize<'de>"))]
pub struct ResponseEnvelope<T> {
    /// Whether the request succeeded at the business level.
    #[serde(default)]
    pub success: bool,
    /// Errors, in the order the vendor reported them.
    #[serde(default, deserialize_with = "null_as_default")]
    pub errors: Vec<Message>,
    /// Non-fatal warnings.
    #[serde(default, deserialize_with = "deserialize_warnings")]
    pub warnings: Vec<Message>,
    /// Vendor request id, useful when contacting support.
    #[serde(default)]
    pub request_id: Option<String>,
    /// Whether more results are available.
    #[serde(default)]
    pub more_result: bool,
    /// Continuation token for the next page.
    #[serde(default)]
    pub next_page_token: Option<String>,
    /// Payload items.
    #[serde(default, deserialize_with = "null_as_default")]
    pub result: Vec<T>,
}

impl<T> ResponseEnvelope<T> {
    /// Returns the continuation token if it is present and non-empty.
    pub fn next_page(&self) -> Option<&str> {
        self.next_page_token.as_deref().filter(|t| !t.is_empty())
    }

    /// Returns `true` when the only error is an expired access token.
    pub fn is_token_expired(&self) -> bool {
        !self.success && matches!(self.errors.as_slice(), [e] if e.code == TOKEN_EXPIRED_CODE)
    }

    /// Returns `true` when the only error is the export queue being full.
    ///
    /// Code 1029 is also used for an exhausted daily export quota, which will
    /// not clear by waiting, so the message is checked as well.
    pub fn is_too_many_jobs(&self) -> bool {
        !self.success
            && matches!(
                self.errors.as_slice(),
                [e] if e.code == TOO_MANY_JOBS_CODE && e.message.contains("many jobs")
            )
    }
}

/// Joins messages as `code: C, message: M; code: C, message: M`.
pub(crate) fn join_messages(messages: &[Message]) -> String {
    messages
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
