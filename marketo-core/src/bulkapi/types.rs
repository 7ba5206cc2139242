//! Request and response types of the Bulk Export API.

use crate::date_range::DateRange;
use crate::Error;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Status of a bulk export job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    /// Created, not yet enqueued.
    Created,
    /// Waiting in the export queue.
    Queued,
    /// Being processed.
    Processing,
    /// Finished; the file can be downloaded.
    Completed,
    /// Finished with an error.
    Failed,
    /// Cancelled before completion.
    #[serde(alias = "Canceled")]
    Cancelled,
    /// Status not known to this client.
    #[serde(other)]
    Unknown,
}

impl JobStatus {
    /// Returns `true` for `Queued` and `Processing`, the statuses that count
    /// against the export queue limit.
    pub fn is_pending(self) -> bool {
        matches!(self, JobStatus::Queued | JobStatus::Processing)
    }

    /// Value used by the `status` filter of the job list endpoint.
    pub fn as_filter(self) -> &'static str {
        match self {
            JobStatus::Created => "created",
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
            JobStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobStatus::Created => "Created",
            JobStatus::Queued => "Queued",
            JobStatus::Processing => "Processing",
            JobStatus::Completed => "Completed",
            JobStatus::Failed => "Failed",
            JobStatus::Cancelled => "Cancelled",
            JobStatus::Unknown => "Unknown",
        };
        f.write_str(name)
    }
}

/// State of an export job as reported by the vendor.
///
/// Timestamps are kept as the vendor sends them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportJobInfo {
    /// Export id.
    pub export_id: String,
    /// Current status.
    pub status: JobStatus,
    /// Output format, always `CSV` for jobs created by this crate.
    #[serde(default)]
    pub format: Option<String>,
    /// Creation time.
    #[serde(default)]
    pub created_at: Option<String>,
    /// Time the job entered the queue.
    #[serde(default)]
    pub queued_at: Option<String>,
    /// Time processing started.
    #[serde(default)]
    pub started_at: Option<String>,
    /// Time the job reached a terminal status.
    #[serde(default)]
    pub finished_at: Option<String>,
    /// File size in bytes.
    #[serde(default)]
    pub file_size: Option<u64>,
    /// File checksum, e.g. `sha256:...`.
    #[serde(default)]
    pub file_checksum: Option<String>,
    /// Number of exported records.
    #[serde(default)]
    pub number_of_records: Option<u64>,
    /// Error description for failed jobs.
    #[serde(default)]
    pub error_msg: Option<String>,
}

/// Filter of a leads export. At least one criterion is required by the vendor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadsExportFilter {
    /// Leads created within the range.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateRange>,
    /// Leads updated within the range.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateRange>,
    /// Members of a static list, by id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_list_id: Option<i64>,
    /// Members of a static list, by name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_list_name: Option<String>,
    /// Members of a smart list, by id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smart_list_id: Option<i64>,
    /// Members of a smart list, by name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smart_list_name: Option<String>,
}

impl LeadsExportFilter {
    /// Creates an empty filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the creation date range.
    pub fn created_at(mut self, range: DateRange) -> Self {
        self.created_at = Some(range);
        self
    }

    /// Sets the update date range.
    pub fn updated_at(mut self, range: DateRange) -> Self {
        self.updated_at = Some(range);
        self
    }

    /// Restricts the export to a static list, by id.
    pub fn static_list_id(mut self, id: i64) -> Self {
        self.static_list_id = Some(id);
        self
    }

    /// Restricts the export to a static list, by name.
    pub fn static_list_name(mut self, name: impl Into<String>) -> Self {
        self.static_list_name = Some(name.into());
        self
    }

    /// Restricts the export to a smart list, by id.
    pub fn smart_list_id(mut self, id: i64) -> Self {
        self.smart_list_id = Some(id);
        self
    }

    /// Restricts the export to a smart list, by name.
    pub fn smart_list_name(mut self, name: impl Into<String>) -> Self {
        self.smart_list_name = Some(name.into());
        self
    }
}

/// Filter of an activities export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivitiesExportFilter {
    /// Activities created within the range. Required.
    pub created_at: DateRange,
    /// Restricts the export to these activity type ids.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_type_ids: Option<Vec<i64>>,
}

impl ActivitiesExportFilter {
    /// Creates a filter for activities created within `created_at`.
    pub fn new(created_at: DateRange) -> Self {
        Self {
            created_at,
            activity_type_ids: None,
        }
    }

    /// Restricts the export to the given activity types.
    pub fn activity_type_ids(mut self, ids: impl IntoIterator<Item = i64>) -> Self {
        self.activity_type_ids = Some(ids.into_iter().collect());
        self
    }
}

/// Body of an export `create.json` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequest<F> {
    /// Fields to export. May be empty for activities, which then use the
    /// vendor's default columns.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
    /// Output format.
    pub format: String,
    /// Renames of CSV column headers, keyed by field name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_header_names: Option<BTreeMap<String, String>>,
    /// Record filter.
    pub filter: F,
}

impl<F> ExportRequest<F> {
    /// Creates a CSV export request.
    pub fn new(fields: Vec<String>, filter: F) -> Self {
        Self {
            fields,
            format: "CSV".to_string(),
            column_header_names: None,
            filter,
        }
    }

    /// Sets the column header renames.
    pub fn column_header_names(mut self, names: BTreeMap<String, String>) -> Self {
        self.column_header_names = Some(names);
        self
    }
}

/// Downloaded export file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFile {
    text: String,
}

impl ExportFile {
    /// Wraps the raw CSV text.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Raw CSV text, header row included.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Consumes the file and returns the raw text.
    pub fn into_string(self) -> String {
        self.text
    }

    /// Parses the CSV using its header row, returning one map per record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Csv`] for malformed input, including rows whose length
    /// differs from the header.
    pub fn records(&self) -> Result<Vec<HashMap<String, String>>, Error> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(self.text.as_bytes());

        let mut records = Vec::new();
        for result in reader.deserialize() {
            let record: HashMap<String, String> = result.map_err(|source| Error::Csv { source })?;
            records.push(record);
        }
        Ok(records)
    }
}

impl fmt::Display for ExportFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_job_status_decoding() {
        let statuses: Vec<JobStatus> =
            serde_json::from_value(json!(["Created", "Queued", "Processing", "Completed", "Failed", "Cancelled", "Canceled", "Archived"]))
                .unwrap();
        assert_eq!(
            statuses,
            vec![
                JobStatus::Created,
                JobStatus::Queued,
                JobStatus::Processing,
                JobStatus::Completed,
                JobStatus::Failed,
                JobStatus::Cancelled,
                JobStatus::Cancelled,
                JobStatus::Unknown,
            ]
        );
        assert!(JobStatus::Queued.is_pending());
        assert!(!JobStatus::Created.is_pending());
    }

    #[test]
    fn test_export_job_info_decoding() {
        let info: ExportJobInfo = serde_json::from_value(json!({
            "exportId": "ce45a7a1-f19d-4ce2-882c-a3c795940a7d",
            "status": "Completed",
            "createdAt": "2017-01-21T11:47:30Z",
            "queuedAt": "2017-01-21T11:48:30Z",
            "startedAt": "2017-01-21T11:51:30Z",
            "finishedAt": "2017-01-21T12:59:30Z",
            "format": "CSV",
            "numberOfRecords": 122323,
            "fileSize": 123424,
            "fileChecksum": "sha256:aeb4b1e7..."
        }))
        .unwrap();
        assert_eq!(info.status, JobStatus::Completed);
        assert_eq!(info.number_of_records, Some(122323));
        assert_eq!(info.error_msg, None);
    }

    #[test]
    fn test_leads_request_serialization() {
        let range = DateRange::parse("2017-01-01T00:00:00Z", "2017-01-31T00:00:00Z").unwrap();
        let request = ExportRequest::new(
            vec!["firstName".to_string(), "lastName".to_string()],
            LeadsExportFilter::new().created_at(range).static_list_id(1024),
        )
        .column_header_names(BTreeMap::from([("firstName".to_string(), "First Name".to_string())]));

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["format"], "CSV");
        assert_eq!(value["fields"], json!(["firstName", "lastName"]));
        assert_eq!(value["columnHeaderNames"]["firstName"], "First Name");
        assert_eq!(value["filter"]["staticListId"], 1024);
        assert!(value["filter"]["createdAt"]["startAt"].is_string());
        assert!(value["filter"].get("updatedAt").is_none());
    }

    #[test]
    fn test_activities_request_serialization() {
        let range = DateRange::parse("2017-01-01T00:00:00Z", "2017-01-31T00:00:00Z").unwrap();
        let request = ExportRequest::new(
            Vec::new(),
            ActivitiesExportFilter::new(range).activity_type_ids([1, 12]),
        );

        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("fields").is_none());
        assert!(value.get("columnHeaderNames").is_none());
        assert_eq!(value["filter"]["activityTypeIds"], json!([1, 12]));
    }

    #[test]
    fn test_export_file_records() {
        let file = ExportFile::new("id,email\n1,a@example.com\n2,\"b,c@example.com\"\n");
        let records = file.records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["id"], "1");
        assert_eq!(records[1]["email"], "b,c@example.com");
    }

    #[test]
    fn test_export_file_ragged_rows_fail() {
        let file = ExportFile::new("id,email\n1\n");
        assert!(matches!(file.records(), Err(Error::Csv { .. })));
    }
}
