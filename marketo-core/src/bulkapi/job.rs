//! Lifecycle of a single bulk export job.

use super::admission::ExportQueueAdmission;
use super::client::BulkOptions;
use super::types::{ExportFile, ExportJobInfo, JobStatus};
use crate::http::{redact, Method, Transport};
use crate::response::ResponseEnvelope;
use crate::Error;
use rand::Rng;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{info, warn};

/// The kind of records an export job produces.
///
/// Both kinds share the job protocol and differ only in the URL segment and
/// in how they are named in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExportKind {
    segment: &'static str,
    label: &'static str,
}

impl ExportKind {
    /// Leads exports, `/bulk/v1/leads/...`.
    pub const LEADS: ExportKind = ExportKind {
        segment: "leads",
        label: "BULK LEADS EXPORT",
    };

    /// Activities exports, `/bulk/v1/activities/...`.
    pub const ACTIVITIES: ExportKind = ExportKind {
        segment: "activities",
        label: "BULK ACTIVITIES EXPORT",
    };

    /// URL segment, `leads` or `activities`.
    pub fn segment(&self) -> &'static str {
        self.segment
    }

    /// Prefix used in log messages.
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Path of the job list endpoint.
    pub fn list_path(&self) -> String {
        format!("/bulk/v1/{}/export.json", self.segment)
    }

    /// Path of the job creation endpoint.
    pub fn create_path(&self) -> String {
        format!("/bulk/v1/{}/export/create.json", self.segment)
    }

    /// Path of a per-job endpoint such as `status`, `enqueue`, `cancel` or `file`.
    pub fn job_path(&self, job_id: &str, action: &str) -> String {
        format!("/bulk/v1/{}/export/{}/{}.json", self.segment, job_id, action)
    }
}

/// Takes the single job state out of a successful envelope.
pub(crate) fn single_job(
    envelope: ResponseEnvelope<ExportJobInfo>,
    method: &'static str,
    uri: String,
) -> Result<ExportJobInfo, Error> {
    let count = envelope.result.len();
    let mut result = envelope.result.into_iter();
    match (result.next(), count) {
        (Some(info), 1) => Ok(info),
        _ => Err(Error::UnexpectedResult {
            method,
            uri,
            message: format!("expected exactly one export job, got {count}"),
        }),
    }
}

/// One bulk export job, from creation to file download.
///
/// The job moves `Created → Queued/Processing → Completed/Failed/Cancelled`.
/// Each operation checks the current status first and fails with
/// [`Error::IllegalState`] without any network call when it does not apply.
/// The vendor state is replaced as a whole after every request.
#[derive(Debug)]
pub struct BulkExportJob {
    transport: Transport,
    admission: ExportQueueAdmission,
    options: BulkOptions,
    kind: ExportKind,
    state: ExportJobInfo,
}

impl BulkExportJob {
    pub(crate) fn new(
        transport: Transport,
        admission: ExportQueueAdmission,
        options: BulkOptions,
        kind: ExportKind,
        state: ExportJobInfo,
    ) -> Self {
        Self {
            transport,
            admission,
            options,
            kind,
            state,
        }
    }

    /// Export id.
    pub fn job_id(&self) -> &str {
        &self.state.export_id
    }

    /// Kind of the export.
    pub fn kind(&self) -> ExportKind {
        self.kind
    }

    /// Last known status.
    pub fn status(&self) -> JobStatus {
        self.state.status
    }

    /// Last known vendor state.
    pub fn state(&self) -> &ExportJobInfo {
        &self.state
    }

    fn replace_state(&mut self, new_state: ExportJobInfo) {
        if new_state.status != self.state.status {
            info!(
                "{} - job '{}' changed state '{}' -> '{}'",
                self.kind.label(),
                self.state.export_id,
                self.state.status,
                new_state.status
            );
        }
        self.state = new_state;
    }

    async fn fetch(&self, action: &str, method: Method) -> Result<ExportJobInfo, Error> {
        let url = self.transport.url(&self.kind.job_path(self.job_id(), action), &[])?;
        let envelope = self.transport.send(method, &url, None).await?;
        single_job(envelope, method.as_str(), redact(&url))
    }

    /// Fetches the current vendor state and stores it.
    ///
    /// # Errors
    ///
    /// Returns any transport or validation error.
    pub async fn refresh(&mut self) -> Result<&ExportJobInfo, Error> {
        let fresh = self.fetch("status", Method::Get).await?;
        self.replace_state(fresh);
        Ok(&self.state)
    }

    /// Submits the job to the export queue.
    ///
    /// Waits for a free queue slot, then issues the enqueue request. If the
    /// vendor still reports the queue as full, pauses for a random duration
    /// up to the configured jitter and waits for a slot again. Everything
    /// happens within `queue_timeout`.
    ///
    /// # Errors
    ///
    /// - [`Error::IllegalState`] if the job is not `Created`, or the vendor
    ///   answers with a status other than `Queued` or `Processing`
    /// - [`Error::QueueTimeout`] if no slot could be obtained in time
    /// - any other transport or validation error
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all, fields(job_id = %self.state.export_id)))]
    pub async fn enqueue(&mut self, queue_timeout: Duration) -> Result<(), Error> {
        if self.state.status != JobStatus::Created {
            return Err(Error::IllegalState(format!(
                "Job must be in Created status before enqueuing, but was in {}",
                self.state.status
            )));
        }

        let deadline = Instant::now() + queue_timeout;
        let mut first_attempt = true;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let admitted = if first_attempt {
                self.admission.when_slot_available(remaining).await
            } else {
                self.admission.when_slot_available_now(remaining).await
            };
            first_attempt = false;
            admitted.map_err(|err| match err {
                Error::QueueTimeout { .. } => Error::QueueTimeout {
                    waited: queue_timeout,
                },
                other => other,
            })?;

            match self.fetch("enqueue", Method::Post).await {
                Ok(new_state) => {
                    if !new_state.status.is_pending() {
                        return Err(Error::IllegalState(format!(
                            "Expected Queued|Processing state for job '{}' but got '{}'",
                            self.state.export_id, new_state.status
                        )));
                    }
                    self.replace_state(new_state);
                    return Ok(());
                }
                Err(err) if err.is_retryable() => {
                    let pause = self.jitter();
                    if Instant::now() + pause >= deadline {
                        return Err(Error::QueueTimeout {
                            waited: queue_timeout,
                        });
                    }
                    warn!(
                        "{} - job '{}' rejected, queue is full; retrying in {:?}",
                        self.kind.label(),
                        self.state.export_id,
                        pause
                    );
                    sleep(pause).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn jitter(&self) -> Duration {
        let max_millis = u64::try_from(self.options.queue_jitter.as_millis()).unwrap_or(u64::MAX);
        if max_millis == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=max_millis))
    }

    /// Polls the job status until it leaves `Queued`/`Processing`.
    ///
    /// # Errors
    ///
    /// - [`Error::IllegalState`] if the job has not been enqueued
    /// - [`Error::JobFailed`] if the job ends in any status but `Completed`,
    ///   carrying the vendor's error message
    /// - [`Error::WaitTimeout`] if a completion timeout is configured and
    ///   passes first
    /// - any transport or validation error
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all, fields(job_id = %self.state.export_id)))]
    pub async fn wait_completion(&mut self) -> Result<(), Error> {
        if !self.state.status.is_pending() {
            return Err(Error::IllegalState(format!(
                "Job must be enqueued before waiting for completion, but was in {}",
                self.state.status
            )));
        }

        let started = Instant::now();
        loop {
            sleep(self.options.job_poll_interval).await;
            self.refresh().await?;

            if !self.state.status.is_pending() {
                break;
            }
            if let Some(limit) = self.options.completion_timeout {
                if started.elapsed() >= limit {
                    return Err(Error::WaitTimeout {
                        job_id: self.state.export_id.clone(),
                        waited: limit,
                    });
                }
            }
        }

        match self.state.status {
            JobStatus::Completed => Ok(()),
            status => Err(Error::JobFailed {
                job_id: self.state.export_id.clone(),
                status,
                message: self.state.error_msg.clone(),
            }),
        }
    }

    /// Downloads the export file of a completed job.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IllegalState`] unless the job is `Completed`,
    /// [`Error::Request`] if the vendor answers with an error envelope instead
    /// of the file, or any transport error.
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all, fields(job_id = %self.state.export_id)))]
    pub async fn file(&self) -> Result<ExportFile, Error> {
        if self.state.status != JobStatus::Completed {
            return Err(Error::IllegalState(format!(
                "Job must be Completed before downloading its file, but was in {}",
                self.state.status
            )));
        }

        let body = self
            .transport
            .download(&self.kind.job_path(self.job_id(), "file"))
            .await?;
        info!(
            "{} - job '{}' downloaded {} bytes",
            self.kind.label(),
            self.state.export_id,
            body.len()
        );
        Ok(ExportFile::new(String::from_utf8_lossy(&body)))
    }

    /// Cancels the job.
    ///
    /// # Errors
    ///
    /// Returns any transport or validation error.
    pub async fn cancel(&mut self) -> Result<(), Error> {
        let new_state = self.fetch("cancel", Method::Post).await?;
        self.replace_state(new_state);
        Ok(())
    }
}
