//! Leads and activities export operations.

use super::client::Client as BulkClient;
use super::job::{single_job, BulkExportJob, ExportKind};
use super::types::{
    ActivitiesExportFilter, ExportFile, ExportJobInfo, ExportRequest, JobStatus, LeadsExportFilter,
};
use crate::http::{redact, Method};
use crate::page::PageIterator;
use crate::Error;
use serde::Serialize;
use std::marker::PhantomData;
use std::time::Duration;
use tracing::info;

/// Client for leads exports.
pub type LeadsClient = ExportClient<LeadsExportFilter>;

/// Client for activities exports.
pub type ActivitiesClient = ExportClient<ActivitiesExportFilter>;

/// Export operations of one [`ExportKind`], typed by its filter.
#[derive(Clone, Debug)]
pub struct ExportClient<F> {
    bulk_client: BulkClient,
    kind: ExportKind,
    _filter: PhantomData<fn() -> F>,
}

impl ExportClient<LeadsExportFilter> {
    pub(crate) fn leads(bulk_client: BulkClient) -> Self {
        Self::new(bulk_client, ExportKind::LEADS)
    }
}

impl ExportClient<ActivitiesExportFilter> {
    pub(crate) fn activities(bulk_client: BulkClient) -> Self {
        Self::new(bulk_client, ExportKind::ACTIVITIES)
    }
}

impl<F> ExportClient<F>
where
    F: Serialize,
{
    fn new(bulk_client: BulkClient, kind: ExportKind) -> Self {
        Self {
            bulk_client,
            kind,
            _filter: PhantomData,
        }
    }

    /// Kind of export handled by this client.
    pub fn kind(&self) -> ExportKind {
        self.kind
    }

    fn job(&self, state: ExportJobInfo) -> BulkExportJob {
        BulkExportJob::new(
            self.bulk_client.transport().clone(),
            self.bulk_client.admission(),
            self.bulk_client.options().clone(),
            self.kind,
            state,
        )
    }

    async fn job_call(&self, method: Method, path: &str, body: Option<&[u8]>) -> Result<ExportJobInfo, Error> {
        let transport = self.bulk_client.transport();
        let url = transport.url(path, &[])?;
        let envelope = transport.send(method, &url, body).await?;
        single_job(envelope, method.as_str(), redact(&url))
    }

    /// Creates an export job in `Created` status.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Request`] if the vendor rejects the request, or any
    /// transport error.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use marketo_core::bulkapi::{ActivitiesExportFilter, ClientBuilder, ExportRequest};
    /// use marketo_core::date_range::DateRange;
    /// # use marketo_core::client::{self, Credentials};
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// # let auth_client = client::Builder::new()
    /// #     .credentials(Credentials {
    /// #         client_id: "...".to_string(),
    /// #         client_secret: "...".to_string(),
    /// #         endpoint: "https://123-ABC-456.mktorest.com".to_string(),
    /// #     })
    /// #     .build()?
    /// #     .connect()
    /// #     .await?;
    /// let bulk_client = ClientBuilder::new(auth_client).build()?;
    ///
    /// let range = DateRange::parse("2019-01-01T00:00:00Z", "2019-01-31T00:00:00Z")?;
    /// let request = ExportRequest::new(
    ///     Vec::new(),
    ///     ActivitiesExportFilter::new(range).activity_type_ids([1, 12]),
    /// );
    /// let job = bulk_client.activities().create_job(&request).await?;
    /// println!("Created job: {}", job.job_id());
    /// # Ok(())
    /// # }
    /// ```
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn create_job(&self, request: &ExportRequest<F>) -> Result<BulkExportJob, Error> {
        let path = self.kind.create_path();
        let transport = self.bulk_client.transport();
        let url = transport.url(&path, &[])?;
        let body = serde_json::to_vec(request).map_err(|source| Error::Decode {
            method: Method::Post.as_str(),
            uri: redact(&url),
            source,
        })?;

        let state = self.job_call(Method::Post, &path, Some(body.as_slice())).await?;
        info!("{} - created job '{}'", self.kind.label(), state.export_id);
        Ok(self.job(state))
    }

    /// Fetches the state of an existing job.
    ///
    /// # Errors
    ///
    /// Returns any transport or validation error.
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn get_job(&self, job_id: &str) -> Result<ExportJobInfo, Error> {
        self.job_call(Method::Get, &self.kind.job_path(job_id, "status"), None)
            .await
    }

    /// Attaches to an existing job, for example one created by another process.
    ///
    /// # Errors
    ///
    /// Same as [`get_job`](Self::get_job).
    pub async fn resume_job(&self, job_id: &str) -> Result<BulkExportJob, Error> {
        Ok(self.job(self.get_job(job_id).await?))
    }

    /// Lists jobs of this kind, optionally restricted to some statuses.
    ///
    /// # Errors
    ///
    /// Returns any transport or validation error.
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn list_jobs(&self, statuses: &[JobStatus]) -> Result<Vec<ExportJobInfo>, Error> {
        let transport = self.bulk_client.transport();
        let filter = statuses
            .iter()
            .map(|s| s.as_filter())
            .collect::<Vec<_>>()
            .join(",");

        let params: Vec<(&str, &str)> = if filter.is_empty() {
            Vec::new()
        } else {
            vec![("status", filter.as_str())]
        };
        let url = transport.url(&self.kind.list_path(), &params)?;
        PageIterator::new(transport.clone(), url)
            .await?
            .collect_all()
            .await
    }

    /// Cancels a job.
    ///
    /// # Errors
    ///
    /// Returns any transport or validation error.
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn cancel_job(&self, job_id: &str) -> Result<ExportJobInfo, Error> {
        let state = self
            .job_call(Method::Post, &self.kind.job_path(job_id, "cancel"), None)
            .await?;
        info!("{} - cancelled job '{}'", self.kind.label(), job_id);
        Ok(state)
    }

    /// Runs a whole export: create, enqueue within `queue_timeout`, wait for
    /// completion and download the file.
    ///
    /// # Errors
    ///
    /// Any error of [`create_job`](Self::create_job),
    /// [`BulkExportJob::enqueue`], [`BulkExportJob::wait_completion`] or
    /// [`BulkExportJob::file`].
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn export(&self, request: &ExportRequest<F>, queue_timeout: Duration) -> Result<ExportFile, Error> {
        let mut job = self.create_job(request).await?;
        job.enqueue(queue_timeout).await?;
        job.wait_completion().await?;
        job.file().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bulkapi::client::tests::{connected_client, fast_options, mount_queue_depth};
    use crate::date_range::DateRange;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const JOB_ID: &str = "3c6a7b07-1a2e-4bd3-9e66-d0a8a1f79dd5";

    fn job_body(status: &str) -> serde_json::Value {
        json!({
            "requestId": "e42b#14272d07d78",
            "success": true,
            "result": [{"exportId": JOB_ID, "format": "CSV", "status": status, "createdAt": "2017-01-21T11:47:30Z"}]
        })
    }

    fn range() -> DateRange {
        DateRange::parse("2017-01-01T00:00:00Z", "2017-01-31T00:00:00Z").unwrap()
    }

    #[tokio::test]
    async fn test_create_job_posts_request() {
        let server = MockServer::start().await;
        let client = connected_client(&server, fast_options()).await;
        let request = ExportRequest::new(
            vec!["id".to_string(), "email".to_string()],
            LeadsExportFilter::new().created_at(range()),
        );
        Mock::given(method("POST"))
            .and(path("/bulk/v1/leads/export/create.json"))
            .and(query_param("access_token", "niceToken"))
            .and(body_json(serde_json::to_value(&request).unwrap()))
            .respond_with(ResponseTemplate::new(200).set_body_json(job_body("Created")))
            .expect(1)
            .mount(&server)
            .await;

        let job = client.leads().create_job(&request).await.unwrap();
        assert_eq!(job.job_id(), JOB_ID);
        assert_eq!(job.status(), JobStatus::Created);
        assert_eq!(job.kind(), ExportKind::LEADS);
    }

    #[tokio::test]
    async fn test_create_job_rejected() {
        let server = MockServer::start().await;
        let client = connected_client(&server, fast_options()).await;
        Mock::given(method("POST"))
            .and(path("/bulk/v1/activities/export/create.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "errors": [{"code": "1003", "message": "Invalid filter"}]
            })))
            .mount(&server)
            .await;

        let request = ExportRequest::new(Vec::new(), ActivitiesExportFilter::new(range()));
        let err = client.activities().create_job(&request).await.unwrap_err();
        assert!(err.to_string().contains("Invalid filter"));
        assert!(err.to_string().contains("/bulk/v1/activities/export/create.json"));
        assert!(!err.to_string().contains("niceToken"));
    }

    #[tokio::test]
    async fn test_get_and_list_jobs() {
        let server = MockServer::start().await;
        let client = connected_client(&server, fast_options()).await;
        Mock::given(method("GET"))
            .and(path(format!("/bulk/v1/activities/export/{JOB_ID}/status.json")))
            .respond_with(ResponseTemplate::new(200).set_body_json(job_body("Processing")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/bulk/v1/activities/export.json"))
            .and(query_param("status", "completed,failed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "result": [
                    {"exportId": "a", "status": "Completed"},
                    {"exportId": "b", "status": "Failed", "errorMsg": "boom"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let activities = client.activities();
        let info = activities.get_job(JOB_ID).await.unwrap();
        assert_eq!(info.status, JobStatus::Processing);

        let resumed = activities.resume_job(JOB_ID).await.unwrap();
        assert_eq!(resumed.status(), JobStatus::Processing);

        let jobs = activities
            .list_jobs(&[JobStatus::Completed, JobStatus::Failed])
            .await
            .unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[1].error_msg.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_cancel_job() {
        let server = MockServer::start().await;
        let client = connected_client(&server, fast_options()).await;
        Mock::given(method("POST"))
            .and(path(format!("/bulk/v1/leads/export/{JOB_ID}/cancel.json")))
            .respond_with(ResponseTemplate::new(200).set_body_json(job_body("Cancelled")))
            .expect(1)
            .mount(&server)
            .await;

        let info = client.leads().cancel_job(JOB_ID).await.unwrap();
        assert_eq!(info.status, JobStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_export_end_to_end() {
        let server = MockServer::start().await;
        let client = connected_client(&server, fast_options()).await;
        mount_queue_depth(&server, 2, 3).await;
        Mock::given(method("POST"))
            .and(path("/bulk/v1/leads/export/create.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(job_body("Created")))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("/bulk/v1/leads/export/{JOB_ID}/enqueue.json")))
            .respond_with(ResponseTemplate::new(200).set_body_json(job_body("Queued")))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/bulk/v1/leads/export/{JOB_ID}/status.json")))
            .respond_with(ResponseTemplate::new(200).set_body_json(job_body("Processing")))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/bulk/v1/leads/export/{JOB_ID}/status.json")))
            .respond_with(ResponseTemplate::new(200).set_body_json(job_body("Completed")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/bulk/v1/leads/export/{JOB_ID}/file.json")))
            .respond_with(ResponseTemplate::new(200).set_body_string("id,email\n7,x@example.com\n"))
            .expect(1)
            .mount(&server)
            .await;

        let request = ExportRequest::new(
            vec!["id".to_string(), "email".to_string()],
            LeadsExportFilter::new().updated_at(range()),
        );
        let file = client
            .leads()
            .export(&request, Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(file.as_str(), "id,email\n7,x@example.com\n");
        assert_eq!(file.records().unwrap()[0]["id"], "7");
    }
}
