//! REST metadata endpoints.
//!
//! These resources are small and paginated; they are read through
//! [`PageIterator`] and fully collected.

use crate::http::Transport;
use crate::page::PageIterator;
use crate::Error;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

const LEADS_DESCRIBE_PATH: &str = "/rest/v1/leads/describe.json";
const ACTIVITY_TYPES_PATH: &str = "/rest/v1/activities/types.json";

/// Field name of a lead attribute in one of the API flavours.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadFieldName {
    /// Field name.
    pub name: String,
    /// Whether the field is read only. Defaults to `true` when absent.
    #[serde(default = "default_read_only")]
    pub read_only: bool,
}

fn default_read_only() -> bool {
    true
}

/// Description of a lead field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadAttribute {
    /// Field id.
    pub id: i64,
    /// Display name shown in the UI.
    #[serde(default)]
    pub display_name: String,
    /// Vendor data type, e.g. `string`, `datetime`, `integer`.
    #[serde(default)]
    pub data_type: String,
    /// Maximum length, for string types.
    #[serde(default)]
    pub length: Option<i64>,
    /// Name in the REST API. Only fields with a REST name can be exported.
    #[serde(default)]
    pub rest: Option<LeadFieldName>,
    /// Name in the SOAP API.
    #[serde(default)]
    pub soap: Option<LeadFieldName>,
}

impl LeadAttribute {
    /// REST field name, if the field is exposed through REST.
    pub fn rest_name(&self) -> Option<&str> {
        self.rest.as_ref().map(|r| r.name.as_str())
    }
}

/// Attribute of an activity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityTypeAttribute {
    /// Attribute name.
    #[serde(default)]
    pub name: String,
    /// API name.
    #[serde(default)]
    pub api_name: Option<String>,
    /// Vendor data type.
    #[serde(default)]
    pub data_type: String,
}

/// An activity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityType {
    /// Activity type id, usable in an activities export filter.
    pub id: i64,
    /// Name.
    #[serde(default)]
    pub name: String,
    /// API name.
    #[serde(default)]
    pub api_name: Option<String>,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Primary attribute.
    #[serde(default)]
    pub primary_attribute: Option<ActivityTypeAttribute>,
    /// Secondary attributes.
    #[serde(default)]
    pub attributes: Vec<ActivityTypeAttribute>,
}

/// Client for REST metadata endpoints.
#[derive(Clone, Debug)]
pub struct RestClient {
    transport: Transport,
}

impl RestClient {
    /// Creates a REST client on top of `transport`.
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }

    /// Returns the underlying transport.
    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Opens a page iterator over any paginated REST resource.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the first page fails.
    pub async fn pages<T>(&self, path: &str, params: &[(&str, &str)]) -> Result<PageIterator<T>, Error>
    where
        T: DeserializeOwned,
    {
        let url = self.transport.url(path, params)?;
        PageIterator::new(self.transport.clone(), url).await
    }

    /// Lists every lead field.
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn describe_leads(&self) -> Result<Vec<LeadAttribute>, Error> {
        self.pages(LEADS_DESCRIBE_PATH, &[]).await?.collect_all().await
    }

    /// Lists every activity type.
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn activity_types(&self) -> Result<Vec<ActivityType>, Error> {
        self.pages(ACTIVITY_TYPES_PATH, &[]).await?.collect_all().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::tests::connected_transport;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_describe_leads() {
        let server = MockServer::start().await;
        let transport = connected_transport(&server, "niceToken").await;
        Mock::given(method("GET"))
            .and(path(LEADS_DESCRIBE_PATH))
            .and(query_param("access_token", "niceToken"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "requestId": "37ca#1475b74e276",
                "success": true,
                "result": [
                    {
                        "id": 2,
                        "displayName": "Company Name",
                        "dataType": "string",
                        "length": 255,
                        "rest": {"name": "company", "readOnly": false},
                        "soap": {"name": "Company", "readOnly": false}
                    },
                    {
                        "id": 3,
                        "displayName": "Site",
                        "dataType": "string",
                        "length": 255,
                        "soap": {"name": "Site"}
                    }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let fields = RestClient::new(transport).describe_leads().await.unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].rest_name(), Some("company"));
        assert!(!fields[0].rest.as_ref().unwrap().read_only);
        assert_eq!(fields[1].rest_name(), None);
        assert!(fields[1].soap.as_ref().unwrap().read_only);
    }

    #[tokio::test]
    async fn test_activity_types() {
        let server = MockServer::start().await;
        let transport = connected_transport(&server, "niceToken").await;
        Mock::given(method("GET"))
            .and(path(ACTIVITY_TYPES_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "result": [{
                    "id": 1,
                    "name": "Visit Webpage",
                    "description": "User visits a web page",
                    "primaryAttribute": {"name": "Webpage ID", "dataType": "integer"},
                    "attributes": [
                        {"name": "Client IP Address", "dataType": "string"},
                        {"name": "Query Parameters", "dataType": "string"}
                    ]
                }]
            })))
            .mount(&server)
            .await;

        let types = RestClient::new(transport).activity_types().await.unwrap();
        assert_eq!(types.len(), 1);
        assert_eq!(types[0].id, 1);
        assert_eq!(types[0].primary_attribute.as_ref().unwrap().name, "Webpage ID");
        assert_eq!(types[0].attributes.len(), 2);
    }
}
