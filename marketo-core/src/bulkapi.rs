//! Marketo Bulk Export API for leads and activities.
//!
//! An export goes through four steps:
//! - **Create**: register the job with its fields and filter
//! - **Enqueue**: wait for a free slot in the export queue, then submit
//! - **Wait**: poll the job status until it reaches a terminal state
//! - **Download**: fetch the CSV file of a completed job
//!
//! The vendor allows at most ten jobs in `queued` or `processing` status per
//! instance, shared by leads and activities exports. Enqueueing waits for a
//! free slot ([`ExportQueueAdmission`]) and retries when the vendor still
//! rejects the job because the queue is full.
//!
//! # Example
//!
//! ```no_run
//! use marketo_core::client::{self, Credentials};
//! use marketo_core::bulkapi::{ClientBuilder, ExportRequest, LeadsExportFilter};
//! use marketo_core::date_range::DateRange;
//! use std::time::Duration;
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
//!
//! let range = DateRange::parse("2019-01-01T00:00:00Z", "2019-01-15T00:00:00Z")?;
//! let request = ExportRequest::new(
//!     vec!["id".to_string(), "email".to_string()],
//!     LeadsExportFilter::new().created_at(range),
//! );
//!
//! let file = bulk_client
//!     .leads()
//!     .export(&request, Duration::from_secs(3600))
//!     .await?;
//! for record in file.records()? {
//!     println!("{:?}", record.get("email"));
//! }
//! # Ok(())
//! # }
//! ```

mod admission;
mod client;
pub mod export;
pub mod job;
mod types;

pub use admission::ExportQueueAdmission;
pub use client::{BulkOptions, Client, ClientBuilder};
pub use export::{ActivitiesClient, ExportClient, LeadsClient};
pub use job::{BulkExportJob, ExportKind};
pub use types::{
    ActivitiesExportFilter, ExportFile, ExportJobInfo, ExportRequest, JobStatus,
    LeadsExportFilter,
};
