//! Admission control for the shared bulk export queue.

use super::client::BulkOptions;
use super::job::ExportKind;
use super::types::JobStatus;
use crate::http::Transport;
use crate::page::PageIterator;
use crate::Error;
use serde::de::IgnoredAny;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

/// Statuses that occupy a slot of the export queue.
const PENDING_STATUSES: [JobStatus; 2] = [JobStatus::Queued, JobStatus::Processing];

/// Waits until the export queue has room for another job.
///
/// The vendor caps the number of `queued` and `processing` export jobs per
/// instance, leads and activities combined. The depth is only observable
/// through the job list endpoints, so this polls. Several callers may see the
/// same free slot at once; the vendor then rejects the extra enqueue with
/// [`Error::TooManyJobs`], which [`BulkExportJob::enqueue`](super::BulkExportJob::enqueue)
/// retries.
#[derive(Clone, Debug)]
pub struct ExportQueueAdmission {
    transport: Transport,
    max_jobs: usize,
    poll_interval: Duration,
    initial_delay: Duration,
}

impl ExportQueueAdmission {
    pub(crate) fn new(transport: Transport, options: &BulkOptions) -> Self {
        Self {
            transport,
            max_jobs: options.max_queued_jobs,
            poll_interval: options.queue_poll_interval,
            initial_delay: options.queue_initial_delay,
        }
    }

    /// Queue depth at which no slot is free.
    pub fn max_jobs(&self) -> usize {
        self.max_jobs
    }

    /// Number of leads and activities export jobs currently queued or processing.
    ///
    /// # Errors
    ///
    /// Returns any error from the job list endpoints.
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn queue_depth(&self) -> Result<usize, Error> {
        let status_filter = PENDING_STATUSES
            .iter()
            .map(|s| s.as_filter())
            .collect::<Vec<_>>()
            .join(",");

        let mut depth = 0;
        for kind in [ExportKind::LEADS, ExportKind::ACTIVITIES] {
            let url = self
                .transport
                .url(&kind.list_path(), &[("status", status_filter.as_str())])?;
            let mut jobs = PageIterator::<IgnoredAny>::new(self.transport.clone(), url).await?;
            while jobs.has_next().await? {
                jobs.next().await?;
                depth += 1;
            }
        }
        Ok(depth)
    }

    /// Returns `true` if the queue depth is below the limit.
    ///
    /// # Errors
    ///
    /// Returns any error from the job list endpoints.
    pub async fn has_free_slot(&self) -> Result<bool, Error> {
        let depth = self.queue_depth().await?;
        debug!(depth, max = self.max_jobs, "Checked bulk export queue depth");
        Ok(depth < self.max_jobs)
    }

    /// Waits until a slot is free, checking at least once.
    ///
    /// Sleeps the initial delay, then checks the queue depth every poll
    /// interval until a slot is free.
    ///
    /// # Errors
    ///
    /// Returns [`Error::QueueTimeout`] when the next check would happen after
    /// `timeout`, or any error from the job list endpoints.
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn when_slot_available(&self, timeout: Duration) -> Result<(), Error> {
        let started = Instant::now();
        sleep(self.initial_delay).await;
        self.poll_until_free(started, timeout).await
    }

    /// Same as [`when_slot_available`](Self::when_slot_available) without the
    /// initial delay.
    pub(crate) async fn when_slot_available_now(&self, timeout: Duration) -> Result<(), Error> {
        self.poll_until_free(Instant::now(), timeout).await
    }

    async fn poll_until_free(&self, started: Instant, timeout: Duration) -> Result<(), Error> {
        loop {
            if self.has_free_slot().await? {
                return Ok(());
            }

            if started.elapsed() + self.poll_interval > timeout {
                return Err(Error::QueueTimeout { waited: timeout });
            }

            info!(
                "Bulk export queue is full ({} jobs), checking again in {:?}",
                self.max_jobs, self.poll_interval
            );
            sleep(self.poll_interval).await;
        }
    }
}
