//! Unofficial Rust SDK for the Marketo REST and Bulk Export APIs.
//!
//! This crate provides token management, paginated REST reads and the bulk
//! export job lifecycle (create, enqueue, wait, download) for leads and
//! activities.
//!
//! # Examples
//!
//! ```no_run
//! use marketo_core::client::{self, Credentials};
//! use marketo_core::bulkapi::ClientBuilder;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let auth_client = client::Builder::new()
//!     .credentials(Credentials {
//!         client_id: "...".to_string(),
//!         client_secret: "...".to_string(),
//!         endpoint: "https://123-ABC-456.mktorest.com".to_string(),
//!     })
//!     .build()?
//!     .connect()
//!     .await?;
//!
//! let bulk_client = ClientBuilder::new(auth_client).build()?;
//! let leads = bulk_client.leads();
//! # Ok(())
//! # }
//! ```

/// Maximum span of a single bulk export filter (30 days).
pub const MAX_EXPORT_RANGE_DAYS: i64 = 30;

/// Maximum number of bulk export jobs in `queued` or `processing` status,
/// shared by leads and activities exports.
pub const DEFAULT_MAX_QUEUED_JOBS: usize = 10;

/// Default interval between job status polls (30 seconds).
pub const DEFAULT_JOB_POLL_INTERVAL_SECS: u64 = 30;

/// Default interval between export queue depth checks (60 seconds).
pub const DEFAULT_QUEUE_POLL_INTERVAL_SECS: u64 = 60;

/// Default delay before the first export queue depth check (10 seconds).
pub const DEFAULT_QUEUE_INITIAL_DELAY_SECS: u64 = 10;

/// Default upper bound of the random pause after the vendor rejects an
/// enqueue with "too many jobs" (15 seconds).
pub const DEFAULT_QUEUE_JITTER_SECS: u64 = 15;

/// Default connection timeout for HTTP requests (30 seconds).
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default request timeout for HTTP requests (300 seconds).
///
/// Export files are downloaded in a single response, so this is generous.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;

/// Default connection timeout for identity endpoint requests (15 seconds).
pub const DEFAULT_AUTH_CONNECT_TIMEOUT_SECS: u64 = 15;

/// Default request timeout for identity endpoint requests (30 seconds).
pub const DEFAULT_AUTH_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default TCP keepalive for pooled connections (60 seconds).
pub const DEFAULT_TCP_KEEPALIVE_SECS: u64 = 60;

/// Default maximum idle connections kept per host.
pub const DEFAULT_POOL_MAX_IDLE_PER_HOST: usize = 8;

/// Default idle timeout for pooled connections (90 seconds).
pub const DEFAULT_POOL_IDLE_TIMEOUT_SECS: u64 = 90;

/// Identity endpoint client-credentials exchange and token caching.
pub mod client;

/// Authenticated HTTP transport and response validation.
pub mod http;

/// Response envelope shared by every REST and bulk endpoint.
pub mod response;

/// Lazy iteration over paginated REST resources.
pub mod page;

/// Date ranges and splitting into export-sized windows.
pub mod date_range;

/// REST metadata endpoints (lead fields, activity types).
pub mod rest;

/// Bulk Export API for leads and activities.
pub mod bulkapi;

mod error;

pub use error::Error;
