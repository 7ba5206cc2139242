//! Authenticated HTTP transport and response validation.
//!
//! [`Transport`] performs the raw GET/POST calls, appending the current access
//! token as the `access_token` query parameter, and turns HTTP-level failures
//! into [`Error::Http`]. On top of it, [`Transport::call`] validates the
//! decoded [`ResponseEnvelope`]: it re-authenticates once when the vendor
//! reports an expired token and classifies every other business-level failure.
//!
//! Nothing here retries beyond that single re-authentication; queue-full
//! retries belong to [`crate::bulkapi`].

use crate::client;
use crate::response::{join_messages, ResponseEnvelope};
use crate::Error;
use bytes::Bytes;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};
use url::Url;

/// Query parameter carrying the access token.
pub const ACCESS_TOKEN_PARAM: &str = "access_token";

/// Query parameters stripped from URIs before they appear in errors or logs.
const SECRET_PARAMS: [&str; 2] = [ACCESS_TOKEN_PARAM, "client_secret"];

/// HTTP methods used by the Marketo API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// `GET`
    Get,
    /// `POST`
    Post,
}

impl Method {
    /// Returns the method name as sent on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        }
    }
}

/// Returns `url` as a string without `access_token` or `client_secret`.
pub fn redact(url: &Url) -> String {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(name, _)| !SECRET_PARAMS.iter().any(|secret| *name == *secret))
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect();

    let mut redacted = url.clone();
    if kept.is_empty() {
        redacted.set_query(None);
    } else {
        redacted.query_pairs_mut().clear().extend_pairs(kept);
    }
    redacted.to_string()
}

/// Builds the pooled HTTP client used for API calls.
pub(crate) fn build_http_client(
    connect_timeout: Duration,
    request_timeout: Duration,
) -> Result<reqwest::Client, client::Error> {
    reqwest::ClientBuilder::new()
        .redirect(reqwest::redirect::Policy::none())
        .connect_timeout(connect_timeout)
        .timeout(request_timeout)
        .tcp_keepalive(Duration::from_secs(crate::DEFAULT_TCP_KEEPALIVE_SECS))
        .pool_max_idle_per_host(crate::DEFAULT_POOL_MAX_IDLE_PER_HOST)
        .pool_idle_timeout(Duration::from_secs(crate::DEFAULT_POOL_IDLE_TIMEOUT_SECS))
        .build()
        .map_err(|source| client::Error::HttpClientBuild { source })
}

/// Authenticated transport shared by REST calls, page iterators and bulk jobs.
///
/// Cloning is cheap; clones share the token provider and connection pool.
#[derive(Clone, Debug)]
pub struct Transport {
    auth_client: Arc<client::Client>,
    http_client: reqwest::Client,
    base_url: String,
}

impl Transport {
    /// Creates a transport with default HTTP timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] if the auth client is not connected or the
    /// HTTP client cannot be built.
    pub fn new(auth_client: client::Client) -> Result<Self, Error> {
        let http_client = build_http_client(
            Duration::from_secs(crate::DEFAULT_CONNECT_TIMEOUT_SECS),
            Duration::from_secs(crate::DEFAULT_REQUEST_TIMEOUT_SECS),
        )?;
        Self::with_http_client(auth_client, http_client)
    }

    /// Creates a transport that sends requests through `http_client`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] if the auth client is not connected.
    pub fn with_http_client(
        auth_client: client::Client,
        http_client: reqwest::Client,
    ) -> Result<Self, Error> {
        let base_url = auth_client.endpoint()?.to_string();
        Ok(Self {
            auth_client: Arc::new(auth_client),
            http_client,
            base_url,
        })
    }

    /// Returns a reference to the token provider.
    pub fn auth_client(&self) -> &client::Client {
        &self.auth_client
    }

    /// Returns the instance base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Builds an absolute URL from an API path and query parameters.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] if the result is not a valid URL.
    pub fn url(&self, path: &str, params: &[(&str, &str)]) -> Result<Url, Error> {
        let raw = format!("{}{}", self.base_url, path);
        let mut url = Url::parse(&raw).map_err(|source| Error::InvalidUrl { uri: raw, source })?;
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }
        Ok(url)
    }

    /// Appends the current access token unless the URL already carries one.
    async fn authorize(&self, url: &Url) -> Result<Url, Error> {
        let mut url = url.clone();
        if url.query_pairs().any(|(name, _)| name == ACCESS_TOKEN_PARAM) {
            return Ok(url);
        }
        let token = self.auth_client.access_token().await?;
        url.query_pairs_mut()
            .append_pair(ACCESS_TOKEN_PARAM, token.secret());
        Ok(url)
    }

    /// Sends one request and returns the raw body. Never retries.
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all, fields(method = method.as_str())))]
    pub async fn execute(&self, method: Method, url: &Url, body: Option<&[u8]>) -> Result<Bytes, Error> {
        let request_url = self.authorize(url).await?;

        let mut request = self.http_client.request(method.into(), request_url);
        if let Some(body) = body {
            request = request
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body.to_vec());
        }

        let response = request.send().await.map_err(|e| Error::Transport {
            method: method.as_str(),
            uri: redact(url),
            source: e.without_url(),
        })?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| Error::Transport {
            method: method.as_str(),
            uri: redact(url),
            source: e.without_url(),
        })?;

        if status.as_u16() >= 300 {
            return Err(Error::Http {
                method: method.as_str(),
                uri: redact(url),
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        Ok(bytes)
    }

    /// Performs an authenticated GET and returns the raw body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] for statuses of 300 and above and
    /// [`Error::Transport`] when the request cannot be completed.
    pub async fn get(&self, path: &str, params: &[(&str, &str)]) -> Result<Bytes, Error> {
        let url = self.url(path, params)?;
        self.execute(Method::Get, &url, None).await
    }

    /// Performs an authenticated POST with an optional JSON body and returns
    /// the raw response body.
    ///
    /// # Errors
    ///
    /// Same as [`get`](Self::get).
    pub async fn post<B>(&self, path: &str, params: &[(&str, &str)], body: Option<&B>) -> Result<Bytes, Error>
    where
        B: Serialize + ?Sized,
    {
        let url = self.url(path, params)?;
        let body = encode_body(&url, body)?;
        self.execute(Method::Post, &url, body.as_deref()).await
    }

    async fn fetch_envelope<T>(
        &self,
        method: Method,
        url: &Url,
        body: Option<&[u8]>,
    ) -> Result<ResponseEnvelope<T>, Error>
    where
        T: DeserializeOwned,
    {
        let bytes = self.execute(method, url, body).await?;
        serde_json::from_slice(&bytes).map_err(|source| Error::Decode {
            method: method.as_str(),
            uri: redact(url),
            source,
        })
    }

    /// Sends a request and validates the decoded envelope with [`call`](Self::call).
    pub async fn send<T>(
        &self,
        method: Method,
        url: &Url,
        body: Option<&[u8]>,
    ) -> Result<ResponseEnvelope<T>, Error>
    where
        T: DeserializeOwned,
    {
        let log_uri = redact(url);
        self.call(method, &log_uri, move || self.fetch_envelope(method, url, body))
            .await
    }

    /// Validated GET returning the decoded envelope.
    ///
    /// # Errors
    ///
    /// Any transport error, plus [`Error::Request`] or [`Error::TooManyJobs`]
    /// when the vendor reports a failure.
    pub async fn get_json<T>(&self, path: &str, params: &[(&str, &str)]) -> Result<ResponseEnvelope<T>, Error>
    where
        T: DeserializeOwned,
    {
        let url = self.url(path, params)?;
        self.send(Method::Get, &url, None).await
    }

    /// Validated POST with an optional JSON body returning the decoded envelope.
    ///
    /// # Errors
    ///
    /// Same as [`get_json`](Self::get_json).
    pub async fn post_json<T, B>(
        &self,
        path: &str,
        params: &[(&str, &str)],
        body: Option<&B>,
    ) -> Result<ResponseEnvelope<T>, Error>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = self.url(path, params)?;
        let body = encode_body(&url, body)?;
        self.send(Method::Post, &url, body.as_deref()).await
    }

    /// Runs `supplier` and validates the envelope it produces.
    ///
    /// 1. The supplier is invoked once.
    /// 2. If the only error is an expired token (code 602), the token is
    ///    refreshed and the supplier is invoked exactly once more. Its result
    ///    is validated below, so a second expiry fails as [`Error::Request`].
    /// 3. Warnings are logged.
    /// 4. An unsuccessful envelope becomes [`Error::TooManyJobs`] or
    ///    [`Error::Request`].
    ///
    /// `uri` is only used for messages and must already be redacted.
    pub async fn call<T, F, Fut>(&self, method: Method, uri: &str, supplier: F) -> Result<ResponseEnvelope<T>, Error>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<ResponseEnvelope<T>, Error>>,
    {
        let mut envelope = supplier().await?;

        if envelope.is_token_expired() {
            debug!(method = method.as_str(), uri, "Access token expired, refreshing");
            self.auth_client.refresh().await?;
            envelope = supplier().await?;
        }

        validate(method, uri, envelope)
    }

    /// GET of a raw payload such as an export file.
    ///
    /// Some endpoints answer a failed download with HTTP 200 and a JSON
    /// envelope instead of the payload. Such a body goes through the same
    /// validation as [`call`](Self::call), single token refresh included.
    ///
    /// # Errors
    ///
    /// Any transport error, plus [`Error::Request`] when the body is an
    /// unsuccessful envelope.
    pub async fn download(&self, path: &str) -> Result<Bytes, Error> {
        let url = self.url(path, &[])?;
        let mut bytes = self.execute(Method::Get, &url, None).await?;
        let mut failure = failed_envelope(&bytes);

        if failure.as_ref().is_some_and(ResponseEnvelope::is_token_expired) {
            debug!(uri = %redact(&url), "Access token expired, refreshing");
            self.auth_client.refresh().await?;
            bytes = self.execute(Method::Get, &url, None).await?;
            failure = failed_envelope(&bytes);
        }

        if let Some(envelope) = failure {
            validate(Method::Get, &redact(&url), envelope)?;
        }
        Ok(bytes)
    }
}

/// Decodes `bytes` as an envelope only if it is a JSON object reporting a failure.
fn failed_envelope(bytes: &[u8]) -> Option<ResponseEnvelope<IgnoredAny>> {
    let first = bytes.iter().find(|b| !b.is_ascii_whitespace())?;
    if *first != b'{' {
        return None;
    }
    serde_json::from_slice::<ResponseEnvelope<IgnoredAny>>(bytes)
        .ok()
        .filter(|envelope| !envelope.success)
}

/// Logs warnings and turns an unsuccessful envelope into an error.
fn validate<T>(method: Method, uri: &str, envelope: ResponseEnvelope<T>) -> Result<ResponseEnvelope<T>, Error> {
    if !envelope.warnings.is_empty() {
        warn!(
            "Warnings when calling '{} {}' - {}",
            method.as_str(),
            uri,
            join_messages(&envelope.warnings)
        );
    }

    if envelope.success {
        return Ok(envelope);
    }

    if envelope.is_too_many_jobs() {
        let message = envelope
            .errors
            .into_iter()
            .next()
            .map(|e| e.message)
            .unwrap_or_default();
        return Err(Error::TooManyJobs {
            method: method.as_str(),
            uri: uri.to_string(),
            message,
        });
    }

    let err = Error::Request {
        method: method.as_str(),
        uri: uri.to_string(),
        errors: envelope.errors,
    };
    error!("{err}");
    Err(err)
}

fn encode_body<B>(url: &Url, body: Option<&B>) -> Result<Option<Vec<u8>>, Error>
where
    B: Serialize + ?Sized,
{
    body.map(serde_json::to_vec)
        .transpose()
        .map_err(|source| Error::Decode {
            method: Method::Post.as_str(),
            uri: redact(url),
            source,
        })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::response::Message;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Mounts an identity endpoint issuing `token` and returns a connected transport.
    pub(crate) async fn connected_transport(server: &MockServer, token: &str) -> Transport {
        Mock::given(method("GET"))
            .and(path("/identity/oauth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": token,
                "scope": "api@example.com",
                "expires_in": 3599,
                "token_type": "bearer"
            })))
            .mount(server)
            .await;

        let auth_client = client::Builder::new()
            .credentials(client::Credentials {
                client_id: "clientNiceId".to_string(),
                client_secret: "clientNiceSecret".to_string(),
                endpoint: server.uri(),
            })
            .build()
            .unwrap()
            .connect()
            .await
            .unwrap();

        Transport::new(auth_client).unwrap()
    }

    fn expired() -> serde_json::Value {
        json!({
            "requestId": "1",
            "success": false,
            "errors": [{"code": "602", "message": "Access token expired"}]
        })
    }

    #[test]
    fn test_redact_strips_secrets() {
        let url = Url::parse(
            "https://host/bulk/v1/leads/export.json?status=queued&access_token=abc&client_secret=s",
        )
        .unwrap();
        assert_eq!(redact(&url), "https://host/bulk/v1/leads/export.json?status=queued");

        let url = Url::parse("https://host/rest/v1/leads/describe.json?access_token=abc").unwrap();
        assert_eq!(redact(&url), "https://host/rest/v1/leads/describe.json");
    }

    #[tokio::test]
    async fn test_get_appends_token() {
        let server = MockServer::start().await;
        let transport = connected_transport(&server, "niceToken").await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/stub.json"))
            .and(query_param("access_token", "niceToken"))
            .and(query_param("batchSize", "10"))
            .respond_with(ResponseTemplate::new(200).set_body_string("raw"))
            .expect(1)
            .mount(&server)
            .await;

        let body = transport.get("/rest/v1/stub.json", &[("batchSize", "10")]).await.unwrap();
        assert_eq!(&body[..], b"raw");
    }

    #[tokio::test]
    async fn test_existing_token_is_not_duplicated() {
        let server = MockServer::start().await;
        let transport = connected_transport(&server, "niceToken").await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/stub.json"))
            .and(query_param("access_token", "callerToken"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let url = transport
            .url("/rest/v1/stub.json", &[("access_token", "callerToken")])
            .unwrap();
        transport.execute(Method::Get, &url, None).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let last = requests.last().unwrap();
        let tokens = last
            .url
            .query_pairs()
            .filter(|(name, _)| name == ACCESS_TOKEN_PARAM)
            .count();
        assert_eq!(tokens, 1);
    }

    #[tokio::test]
    async fn test_http_error_redacts_token() {
        let server = MockServer::start().await;
        let transport = connected_transport(&server, "niceToken").await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/broken.json"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = transport.get("/rest/v1/broken.json", &[]).await.unwrap_err();
        match &err {
            Error::Http { method, uri, status, body } => {
                assert_eq!(*method, "GET");
                assert_eq!(*status, 500);
                assert_eq!(body, "boom");
                assert!(uri.ends_with("/rest/v1/broken.json"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!err.to_string().contains("niceToken"));
    }

    #[tokio::test]
    async fn test_redirect_status_is_an_error() {
        let server = MockServer::start().await;
        let transport = connected_transport(&server, "niceToken").await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/moved.json"))
            .respond_with(ResponseTemplate::new(304))
            .mount(&server)
            .await;

        let err = transport.get("/rest/v1/moved.json", &[]).await.unwrap_err();
        assert!(matches!(err, Error::Http { status: 304, .. }));
    }

    #[tokio::test]
    async fn test_post_sends_json_body() {
        let server = MockServer::start().await;
        let transport = connected_transport(&server, "niceToken").await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/post.json"))
            .and(body_json(json!({"value": "body"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
            .expect(1)
            .mount(&server)
            .await;

        let envelope: ResponseEnvelope<serde_json::Value> = transport
            .post_json("/rest/v1/post.json", &[], Some(&json!({"value": "body"})))
            .await
            .unwrap();
        assert!(envelope.success);
    }

    #[tokio::test]
    async fn test_token_refresh_retries_once() {
        let server = MockServer::start().await;
        let transport = connected_transport(&server, "niceToken").await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/stub.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(expired()))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/stub.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "result": [1, 2]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let envelope: ResponseEnvelope<i64> = transport.get_json("/rest/v1/stub.json", &[]).await.unwrap();
        assert_eq!(envelope.result, vec![1, 2]);

        let token_requests = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|r| r.url.path() == "/identity/oauth/token")
            .count();
        // One for connect, one for the refresh.
        assert_eq!(token_requests, 2);
    }

    #[tokio::test]
    async fn test_download_returns_raw_body() {
        let server = MockServer::start().await;
        let transport = connected_transport(&server, "niceToken").await;
        Mock::given(method("GET"))
            .and(path("/bulk/v1/leads/export/abc/file.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("id,email\n1,a@b.c\n"))
            .expect(1)
            .mount(&server)
            .await;

        let body = transport.download("/bulk/v1/leads/export/abc/file.json").await.unwrap();
        assert_eq!(&body[..], b"id,email\n1,a@b.c\n");
    }

    #[tokio::test]
    async fn test_download_error_envelope_is_request_error() {
        let server = MockServer::start().await;
        let transport = connected_transport(&server, "niceToken").await;
        Mock::given(method("GET"))
            .and(path("/bulk/v1/leads/export/abc/file.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "requestId": "7",
                "success": false,
                "errors": [{"code": "1003", "message": "Export file not available"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = transport
            .download("/bulk/v1/leads/export/abc/file.json")
            .await
            .unwrap_err();
        match err {
            Error::Request { errors, uri, .. } => {
                assert_eq!(errors, vec![Message::new(1003, "Export file not available")]);
                assert!(!uri.contains("niceToken"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_download_refreshes_expired_token_once() {
        let server = MockServer::start().await;
        let transport = connected_transport(&server, "niceToken").await;
        Mock::given(method("GET"))
            .and(path("/bulk/v1/leads/export/abc/file.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(expired()))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/bulk/v1/leads/export/abc/file.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("id\n1\n"))
            .expect(1)
            .mount(&server)
            .await;

        let body = transport.download("/bulk/v1/leads/export/abc/file.json").await.unwrap();
        assert_eq!(&body[..], b"id\n1\n");
    }

    #[tokio::test]
    async fn test_second_expiry_is_not_retried_again() {
        let server = MockServer::start().await;
        let transport = connected_transport(&server, "niceToken").await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/stub.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(expired()))
            .expect(2)
            .mount(&server)
            .await;

        let err = transport
            .get_json::<serde_json::Value>("/rest/v1/stub.json", &[])
            .await
            .unwrap_err();
        match err {
            Error::Request { method, errors, .. } => {
                assert_eq!(method, "GET");
                assert_eq!(errors, vec![Message::new(602, "Access token expired")]);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let token_requests = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|r| r.url.path() == "/identity/oauth/token")
            .count();
        assert_eq!(token_requests, 2);
    }

    #[tokio::test]
    async fn test_refreshed_token_is_used_on_retry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/identity/oauth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "old"})))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/identity/oauth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "new"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/stub.json"))
            .and(query_param("access_token", "old"))
            .respond_with(ResponseTemplate::new(200).set_body_json(expired()))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/stub.json"))
            .and(query_param("access_token", "new"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
            .expect(1)
            .mount(&server)
            .await;

        let auth_client = client::Builder::new()
            .credentials(client::Credentials {
                client_id: "id".to_string(),
                client_secret: "secret".to_string(),
                endpoint: server.uri(),
            })
            .build()
            .unwrap()
            .connect()
            .await
            .unwrap();
        let transport = Transport::new(auth_client).unwrap();

        let envelope: ResponseEnvelope<serde_json::Value> =
            transport.get_json("/rest/v1/stub.json", &[]).await.unwrap();
        assert!(envelope.success);
    }

    #[tokio::test]
    async fn test_multiple_errors_are_request_error() {
        let server = MockServer::start().await;
        let transport = connected_transport(&server, "niceToken").await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/stub.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "errors": [
                    {"code": "1029", "message": "Too many jobs (10) in queue"},
                    {"code": "1003", "message": "Invalid filter"}
                ]
            })))
            .mount(&server)
            .await;

        let err = transport
            .get_json::<serde_json::Value>("/rest/v1/stub.json", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Request { ref errors, .. } if errors.len() == 2));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_too_many_jobs_is_classified() {
        let server = MockServer::start().await;
        let transport = connected_transport(&server, "niceToken").await;
        Mock::given(method("POST"))
            .and(path("/bulk/v1/leads/export/abc/enqueue.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "errors": [{"code": "1029", "message": "Too many jobs (10) in queue"}]
            })))
            .mount(&server)
            .await;

        let err = transport
            .post_json::<serde_json::Value, ()>("/bulk/v1/leads/export/abc/enqueue.json", &[], None)
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert!(!err.to_string().contains("niceToken"));
    }

    #[tokio::test]
    async fn test_warnings_do_not_fail_the_call() {
        let server = MockServer::start().await;
        let transport = connected_transport(&server, "niceToken").await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/justWarnings.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "warnings": ["No assets found for the given search criteria."],
                "result": []
            })))
            .mount(&server)
            .await;

        let envelope: ResponseEnvelope<serde_json::Value> =
            transport.get_json("/rest/v1/justWarnings.json", &[]).await.unwrap();
        assert_eq!(envelope.warnings.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_body_is_decode_error() {
        let server = MockServer::start().await;
        let transport = connected_transport(&server, "niceToken").await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/garbage.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = transport
            .get_json::<serde_json::Value>("/rest/v1/garbage.json", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Decode { method: "GET", .. }));
    }
}
