use crate::bulkapi::JobStatus;
use crate::client;
use crate::response::{join_messages, Message};
use std::time::Duration;

/// Error type for REST and bulk export operations.
///
/// Only [`Error::TooManyJobs`] is transient; see [`Error::is_retryable`].
/// URIs carried by these variants never contain the access token.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Token acquisition or refresh failed.
    #[error("Authentication error: {source}")]
    Auth {
        #[source]
        source: client::Error,
    },

    /// The server answered with an HTTP status of 300 or above.
    #[error("Failed '{method}' '{uri}' - Http code '{status}', response '{body}'")]
    Http {
        /// HTTP method.
        method: &'static str,
        /// Request URI with credentials removed.
        uri: String,
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// The request could not be sent or the response body could not be read.
    #[error("Failed '{method}' '{uri}' - {source}")]
    Transport {
        /// HTTP method.
        method: &'static str,
        /// Request URI with credentials removed.
        uri: String,
        #[source]
        source: reqwest::Error,
    },

    /// The response body is not a valid response envelope.
    #[error("Failed '{method}' '{uri}' - invalid response body: {source}")]
    Decode {
        /// HTTP method.
        method: &'static str,
        /// Request URI with credentials removed.
        uri: String,
        #[source]
        source: serde_json::Error,
    },

    /// The vendor reported a business-level failure.
    #[error("Errors when calling '{method} {uri}' - {}", join_messages(.errors))]
    Request {
        /// HTTP method.
        method: &'static str,
        /// Request URI with credentials removed.
        uri: String,
        /// Vendor errors in the order they were reported.
        errors: Vec<Message>,
    },

    /// The bulk export queue is full. Retryable.
    #[error("Too many bulk export jobs in queue when calling '{method} {uri}': {message}")]
    TooManyJobs {
        /// HTTP method.
        method: &'static str,
        /// Request URI with credentials removed.
        uri: String,
        /// Vendor message.
        message: String,
    },

    /// An operation was invoked in a state that does not allow it, or the
    /// vendor reported a transition that should not happen.
    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// A bulk export job ended in a state other than `Completed`.
    #[error("Bulk export job '{job_id}' finished with status '{status}': {}", .message.as_deref().unwrap_or("no error message"))]
    JobFailed {
        /// Export id.
        job_id: String,
        /// Terminal status.
        status: JobStatus,
        /// Vendor `errorMsg`.
        message: Option<String>,
    },

    /// No export queue slot became free in time.
    #[error("No bulk export queue slot became available within {waited:?}")]
    QueueTimeout {
        /// How long the caller allowed.
        waited: Duration,
    },

    /// A bulk export job did not finish within the configured bound.
    #[error("Bulk export job '{job_id}' did not finish within {waited:?}")]
    WaitTimeout {
        /// Export id.
        job_id: String,
        /// The configured bound.
        waited: Duration,
    },

    /// A page iterator was advanced past its last item.
    #[error("No more elements")]
    NoSuchElement,

    /// Range start is after its end.
    #[error("Start date {start} cannot be greater than the end date {end}")]
    InvalidDateRange {
        /// Range start.
        start: String,
        /// Range end.
        end: String,
    },

    /// A timestamp is not valid RFC 3339.
    #[error("Invalid timestamp '{value}': {source}")]
    ParseDate {
        /// The rejected input.
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    /// A request URI could not be built.
    #[error("'{uri}' is invalid URI: {source}")]
    InvalidUrl {
        /// The rejected input.
        uri: String,
        #[source]
        source: url::ParseError,
    },

    /// A successful response did not contain the expected result shape.
    #[error("Unexpected result when calling '{method} {uri}': {message}")]
    UnexpectedResult {
        /// HTTP method.
        method: &'static str,
        /// Request URI with credentials removed.
        uri: String,
        /// What was wrong.
        message: String,
    },

    /// An export file is not valid CSV.
    #[error("Failed to parse export file: {source}")]
    Csv {
        #[source]
        source: csv::Error,
    },
}

impl Error {
    /// Returns `true` for failures that may succeed when retried later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::TooManyJobs { .. })
    }
}

impl From<client::Error> for Error {
    fn from(source: client::Error) -> Self {
        Error::Auth { source }
    }
}
