//! Bulk Export API client that wraps the authentication client.

use super::admission::ExportQueueAdmission;
use super::export::{ActivitiesClient, LeadsClient};
use crate::client;
use crate::http::{build_http_client, Transport};
use crate::rest::RestClient;
use crate::Error;
use std::time::Duration;

/// Timing and capacity settings of bulk export jobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkOptions {
    /// Pause between job status polls.
    pub job_poll_interval: Duration,
    /// Pause between export queue depth checks.
    pub queue_poll_interval: Duration,
    /// Pause before the first export queue depth check.
    pub queue_initial_delay: Duration,
    /// Queue depth at which no more jobs are enqueued.
    pub max_queued_jobs: usize,
    /// Upper bound of the random pause after a "too many jobs" rejection.
    pub queue_jitter: Duration,
    /// Maximum time to wait for a job to finish. Unbounded when `None`.
    pub completion_timeout: Option<Duration>,
}

impl Default for BulkOptions {
    fn default() -> Self {
        Self {
            job_poll_interval: Duration::from_secs(crate::DEFAULT_JOB_POLL_INTERVAL_SECS),
            queue_poll_interval: Duration::from_secs(crate::DEFAULT_QUEUE_POLL_INTERVAL_SECS),
            queue_initial_delay: Duration::from_secs(crate::DEFAULT_QUEUE_INITIAL_DELAY_SECS),
            max_queued_jobs: crate::DEFAULT_MAX_QUEUED_JOBS,
            queue_jitter: Duration::from_secs(crate::DEFAULT_QUEUE_JITTER_SECS),
            completion_timeout: None,
        }
    }
}

/// Client for the Marketo Bulk Export API.
///
/// Cloning is cheap; clones share the token and the connection pool.
///
/// # Example
///
/// ```no_run
/// use marketo_core::client::{self, Credentials};
/// use marketo_core::bulkapi::ClientBuilder;
/// use std::time::Duration;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let auth_client = client::Builder::new()
///     .credentials(Credentials {
///         client_id: "...".to_string(),
///         client_secret: "...".to_string(),
///         endpoint: "https://123-ABC-456.mktorest.com".to_string(),
///     })
///     .build()?
///     .connect()
///     .await?;
///
/// let bulk_client = ClientBuilder::new(auth_client)
///     .job_poll_interval(Duration::from_secs(60))
///     .completion_timeout(Duration::from_secs(6 * 3600))
///     .build()?;
///
/// let leads = bulk_client.leads();
/// let activities = bulk_client.activities();
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Client {
    transport: Transport,
    options: BulkOptions,
}

impl Client {
    /// Creates a client with default options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] if the auth client is not connected.
    pub fn new(auth_client: client::Client) -> Result<Self, Error> {
        ClientBuilder::new(auth_client).build()
    }

    /// Returns the authenticated transport.
    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Returns a reference to the authentication client.
    pub fn auth_client(&self) -> &client::Client {
        self.transport.auth_client()
    }

    /// Returns the job options.
    pub fn options(&self) -> &BulkOptions {
        &self.options
    }

    /// Creates a client for leads exports.
    pub fn leads(&self) -> LeadsClient {
        LeadsClient::leads(self.clone())
    }

    /// Creates a client for activities exports.
    pub fn activities(&self) -> ActivitiesClient {
        ActivitiesClient::activities(self.clone())
    }

    /// Creates the admission gate of the shared export queue.
    pub fn admission(&self) -> ExportQueueAdmission {
        ExportQueueAdmission::new(self.transport.clone(), &self.options)
    }

    /// Creates a REST client sharing this client's transport.
    pub fn rest(&self) -> RestClient {
        RestClient::new(self.transport.clone())
    }
}

/// Builder for [`Client`].
#[derive(Debug)]
pub struct ClientBuilder {
    auth_client: client::Client,
    options: BulkOptions,
    connect_timeout: Duration,
    request_timeout: Duration,
}

impl ClientBuilder {
    /// Creates a builder with default options.
    pub fn new(auth_client: client::Client) -> Self {
        Self {
            auth_client,
            options: BulkOptions::default(),
            connect_timeout: Duration::from_secs(crate::DEFAULT_CONNECT_TIMEOUT_SECS),
            request_timeout: Duration::from_secs(crate::DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    /// Replaces every job option at once.
    pub fn options(mut self, options: BulkOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the pause between job status polls.
    pub fn job_poll_interval(mut self, interval: Duration) -> Self {
        self.options.job_poll_interval = interval;
        self
    }

    /// Sets the pause between export queue depth checks.
    pub fn queue_poll_interval(mut self, interval: Duration) -> Self {
        self.options.queue_poll_interval = interval;
        self
    }

    /// Sets the pause before the first export queue depth check.
    pub fn queue_initial_delay(mut self, delay: Duration) -> Self {
        self.options.queue_initial_delay = delay;
        self
    }

    /// Sets the queue depth at which no more jobs are enqueued.
    pub fn max_queued_jobs(mut self, max: usize) -> Self {
        self.options.max_queued_jobs = max;
        self
    }

    /// Sets the upper bound of the random pause after a "too many jobs"
    /// rejection. Zero disables the pause.
    pub fn queue_jitter(mut self, jitter: Duration) -> Self {
        self.options.queue_jitter = jitter;
        self
    }

    /// Bounds the time spent waiting for a job to finish.
    pub fn completion_timeout(mut self, timeout: Duration) -> Self {
        self.options.completion_timeout = Some(timeout);
        self
    }

    /// Sets the connection timeout of API requests.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the request timeout of API requests, file downloads included.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] if the auth client is not connected or the HTTP
    /// client cannot be built.
    pub fn build(self) -> Result<Client, Error> {
        let http_client = build_http_client(self.connect_timeout, self.request_timeout)?;
        let transport = Transport::with_http_client(self.auth_client, http_client)?;
        Ok(Client {
            transport,
            options: self.options,
        })
    }
}
