use oauth2::{AccessToken, ClientSecret};
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info};
use url::Url;

/// Identity endpoint path for the client-credentials exchange.
const DEFAULT_TOKEN_PATH: &str = "/identity/oauth/token";

/// Token lifetime assumed when the identity endpoint omits `expires_in`.
const DEFAULT_TOKEN_LIFETIME_SECONDS: u64 = 3600;

/// Access token issued by the Marketo identity endpoint.
///
/// The token secret is wrapped in [`AccessToken`], so `Debug` output never
/// contains it.
#[derive(Debug, Clone, Deserialize)]
pub struct Token {
    access_token: AccessToken,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default, deserialize_with = "deserialize_expires_in")]
    expires_in: Option<u64>,
    #[serde(default)]
    token_type: Option<String>,
}

impl Token {
    /// Creates a token from its parts.
    pub fn new(
        access_token: impl Into<String>,
        scope: Option<String>,
        expires_in: Option<u64>,
        token_type: Option<String>,
    ) -> Self {
        Self {
            access_token: AccessToken::new(access_token.into()),
            scope,
            expires_in,
            token_type,
        }
    }

    /// Returns the bearer token secret.
    pub fn secret(&self) -> &str {
        self.access_token.secret()
    }

    /// Returns the scope the token was issued for (the API user's email).
    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    /// Returns the lifetime hint sent with the token.
    pub fn expires_in(&self) -> Option<Duration> {
        self.expires_in.map(Duration::from_secs)
    }

    /// Returns the token type, normally `bearer`.
    pub fn token_type(&self) -> Option<&str> {
        self.token_type.as_deref()
    }
}

/// Accepts `expires_in` either as a number or as a numeric string.
fn deserialize_expires_in<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Number(n)) => Ok(Some(n)),
        Some(Raw::Text(s)) => s
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// Internal state for managing token lifecycle.
#[derive(Debug, Clone)]
pub(crate) struct TokenState {
    /// The current token.
    token: Token,
    /// Unix timestamp (seconds) when the token expires.
    expires_at: u64,
}

impl TokenState {
    /// Creates a new token state from a freshly issued token.
    pub(crate) fn new(token: Token) -> Result<Self, Error> {
        let now = unix_now()?;
        let lifetime = token.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECONDS);
        let expires_at = now
            .checked_add(lifetime)
            .ok_or(Error::TokenExpiryOverflow)?;

        Ok(Self { token, expires_at })
    }

    /// Checks if the token is expired or will expire within the buffer time.
    fn is_expired(&self, buffer_seconds: u64) -> Result<bool, Error> {
        let threshold = unix_now()?
            .checked_add(buffer_seconds)
            .ok_or(Error::TimeThresholdOverflow)?;

        Ok(threshold >= self.expires_at)
    }
}

fn unix_now() -> Result<u64, Error> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|source| Error::SystemTimeError { source })?
        .as_secs())
}

/// Errors that can occur while loading credentials or exchanging them for a token.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Failed to read credentials file from disk.
    #[error("Failed to read credentials file at {path}: {source}")]
    ReadCredentials {
        /// Path to the credentials file that failed to read.
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Failed to parse credentials JSON.
    #[error("Failed to parse credentials JSON: {source}")]
    ParseCredentials {
        #[source]
        source: serde_json::Error,
    },
    /// Invalid URL format in credentials.
    #[error("Invalid URL format: {source}")]
    ParseUrl {
        #[source]
        source: url::ParseError,
    },
    /// A credential field is present but unusable.
    #[error("Invalid credentials: {message}")]
    InvalidCredentials {
        /// Description of what's missing or invalid.
        message: String,
    },
    /// Required builder parameter was not provided.
    #[error("Missing required attribute: {}", _0)]
    MissingRequiredAttribute(String),
    /// Failed to build the HTTP client.
    #[error("Failed to build HTTP client: {source}")]
    HttpClientBuild {
        #[source]
        source: reqwest::Error,
    },
    /// The identity endpoint could not be reached.
    #[error("Token exchange failed: {source}")]
    TokenExchange {
        #[source]
        source: reqwest::Error,
    },
    /// The identity endpoint answered with a non-success status.
    #[error("Token exchange rejected with HTTP {status}: {body}")]
    TokenEndpoint {
        /// HTTP status code.
        status: u16,
        /// Response body as returned by the identity endpoint.
        body: String,
    },
    /// The identity endpoint answered with a body that is not a token.
    #[error("Failed to parse token response: {source}")]
    ParseToken {
        #[source]
        source: serde_json::Error,
    },
    /// The client has not been connected yet.
    #[error("Client is not connected")]
    NotConnected,
    /// Failed to get current system time.
    #[error("Failed to get current system time: {source}")]
    SystemTimeError {
        #[source]
        source: std::time::SystemTimeError,
    },
    /// Token expiry time calculation resulted in arithmetic overflow.
    #[error("Token expiry time calculation overflow")]
    TokenExpiryOverflow,
    /// Time threshold calculation resulted in arithmetic overflow.
    #[error("Time threshold calculation overflow")]
    TimeThresholdOverflow,
    /// Failed to acquire lock on token state.
    #[error("Failed to acquire lock on token state")]
    LockError,
}

/// Marketo API credentials.
///
/// Obtained from a LaunchPoint custom service in Marketo Admin. The endpoint
/// is the REST API base URL shown under Admin > Web Services, without the
/// `/rest` suffix.
///
/// # Example
///
/// ```
/// use marketo_core::client::Credentials;
///
/// let creds = Credentials {
///     client_id: "your_client_id".to_string(),
///     client_secret: "your_client_secret".to_string(),
///     endpoint: "https://123-ABC-456.mktorest.com".to_string(),
/// };
/// ```
#[derive(Serialize, Deserialize, Clone)]
pub struct Credentials {
    /// Client ID of the custom service.
    pub client_id: String,
    /// Client secret of the custom service.
    pub client_secret: String,
    /// Marketo instance base URL (e.g., `https://123-ABC-456.mktorest.com`).
    pub endpoint: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &ClientSecret::new(self.client_secret.clone()))
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// Source for loading credentials.
#[derive(Debug, Clone)]
pub enum CredentialsFrom {
    /// Load credentials from a JSON file.
    Path(PathBuf),
    /// Use credentials provided directly.
    Value(Credentials),
}

/// Token provider for the Marketo identity endpoint.
///
/// Use [`Builder`] to construct a client instance, then [`connect`](Self::connect)
/// to perform the first exchange. Clones share the cached token, so a refresh
/// through any clone is visible to all of them.
///
/// The token is never refreshed in the background: callers (normally the
/// response validator in [`crate::http`]) call [`refresh`](Self::refresh)
/// when the API reports an expired token.
///
/// # Examples
///
/// ```no_run
/// use marketo_core::client::{self, Credentials};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let client = client::Builder::new()
///     .credentials(Credentials {
///         client_id: "your_client_id".to_string(),
///         client_secret: "your_client_secret".to_string(),
///         endpoint: "https://123-ABC-456.mktorest.com".to_string(),
///     })
///     .build()?
///     .connect()
///     .await?;
/// # Ok(())
/// # }
/// ```
///
/// ## Loading Credentials from File
///
/// ```no_run
/// use marketo_core::client;
/// use std::path::PathBuf;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let client = client::Builder::new()
///     .credentials_path(PathBuf::from("credentials.json"))
///     .build()?
///     .connect()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Client {
    /// Source of credentials (file path or direct value).
    credentials_from: CredentialsFrom,
    /// Credentials resolved by the last successful load.
    credentials: Option<Credentials>,
    /// HTTP client used for the identity endpoint only.
    http_client: reqwest::Client,
    /// Shared token state, replaced wholesale on refresh.
    pub(crate) token_state: Arc<RwLock<Option<TokenState>>>,
    /// Marketo instance base URL, without trailing slash.
    pub(crate) endpoint: Option<String>,
}

impl Client {
    fn load_credentials(&self) -> Result<Credentials, Error> {
        if let Some(credentials) = &self.credentials {
            return Ok(credentials.clone());
        }

        let credentials: Credentials = match &self.credentials_from {
            CredentialsFrom::Value(creds) => creds.clone(),
            CredentialsFrom::Path(path) => {
                let credentials_string =
                    fs::read_to_string(path).map_err(|e| Error::ReadCredentials {
                        path: path.clone(),
                        source: e,
                    })?;
                serde_json::from_str(&credentials_string)
                    .map_err(|e| Error::ParseCredentials { source: e })?
            }
        };

        validate_credentials(&credentials)?;
        Ok(credentials)
    }

    /// Connects to Marketo and exchanges credentials for an access token.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Credentials file cannot be read ([`Error::ReadCredentials`])
    /// - Credentials JSON is invalid ([`Error::ParseCredentials`])
    /// - Endpoint is malformed ([`Error::ParseUrl`])
    /// - The identity endpoint is unreachable ([`Error::TokenExchange`])
    /// - The identity endpoint rejects the credentials ([`Error::TokenEndpoint`])
    pub async fn connect(mut self) -> Result<Self, Error> {
        let credentials = self.load_credentials()?;
        let token = self.exchange_client_credentials(&credentials).await?;

        let token_state = TokenState::new(token)?;
        *self.token_state.write().map_err(|_| Error::LockError)? = Some(token_state);
        self.endpoint = Some(normalize_endpoint(&credentials.endpoint));
        self.credentials = Some(credentials);

        Ok(self)
    }

    /// Performs the client-credentials exchange against the identity endpoint.
    async fn exchange_client_credentials(&self, credentials: &Credentials) -> Result<Token, Error> {
        let mut token_url = Url::parse(&format!(
            "{}{}",
            normalize_endpoint(&credentials.endpoint),
            DEFAULT_TOKEN_PATH
        ))
        .map_err(|e| Error::ParseUrl { source: e })?;
        token_url
            .query_pairs_mut()
            .append_pair("grant_type", "client_credentials")
            .append_pair("client_id", &credentials.client_id)
            .append_pair("client_secret", &credentials.client_secret);

        debug!("Requesting Marketo access token");

        // The request URL carries the client secret, keep it out of errors.
        let response = self
            .http_client
            .get(token_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| Error::TokenExchange {
                source: e.without_url(),
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| Error::TokenExchange {
            source: e.without_url(),
        })?;

        if !status.is_success() {
            return Err(Error::TokenEndpoint {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|source| Error::ParseToken { source })
    }

    /// Forces a new client-credentials exchange and replaces the cached token.
    ///
    /// Every call performs exactly one round trip to the identity endpoint.
    /// Concurrent refreshes through clones are harmless: the last one to
    /// finish wins.
    ///
    /// # Errors
    ///
    /// Returns an error if credentials cannot be loaded, the identity endpoint
    /// is unreachable or rejects the credentials, or the token lock is poisoned.
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn refresh(&self) -> Result<Token, Error> {
        let credentials = self.load_credentials()?;
        let token = self.exchange_client_credentials(&credentials).await?;

        let new_state = TokenState::new(token.clone())?;
        *self.token_state.write().map_err(|_| Error::LockError)? = Some(new_state);
        info!("Refreshed Marketo access token");

        Ok(token)
    }

    /// Returns the cached token, performing the first exchange if none is cached.
    ///
    /// # Errors
    ///
    /// Returns an error if the first exchange fails or the token lock is poisoned.
    pub async fn access_token(&self) -> Result<Token, Error> {
        if let Some(token) = self.current_token()? {
            return Ok(token);
        }
        self.refresh().await
    }

    /// Returns the cached token without contacting the identity endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the token lock is poisoned.
    pub fn current_token(&self) -> Result<Option<Token>, Error> {
        let state = self.token_state.read().map_err(|_| Error::LockError)?;
        Ok(state.as_ref().map(|s| s.token.clone()))
    }

    /// Returns whether the cached token is past (or within `buffer` of) its
    /// lifetime hint. Returns `true` when no token is cached.
    ///
    /// # Errors
    ///
    /// Returns an error if the system clock is unusable or the lock is poisoned.
    pub fn is_token_expired(&self, buffer: Duration) -> Result<bool, Error> {
        let state = self.token_state.read().map_err(|_| Error::LockError)?;
        match state.as_ref() {
            Some(state) => state.is_expired(buffer.as_secs()),
            None => Ok(true),
        }
    }

    /// Returns the instance base URL of a connected client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] before [`connect`](Self::connect).
    pub fn endpoint(&self) -> Result<&str, Error> {
        self.endpoint.as_deref().ok_or(Error::NotConnected)
    }
}

fn validate_credentials(credentials: &Credentials) -> Result<(), Error> {
    if credentials.client_id.trim().is_empty() {
        return Err(Error::InvalidCredentials {
            message: "client_id is required".to_string(),
        });
    }
    if credentials.client_secret.trim().is_empty() {
        return Err(Error::InvalidCredentials {
            message: "client_secret is required".to_string(),
        });
    }
    Url::parse(&credentials.endpoint).map_err(|e| Error::ParseUrl { source: e })?;
    Ok(())
}

fn normalize_endpoint(endpoint: &str) -> String {
    endpoint.trim_end_matches('/').to_string()
}

/// Builder for constructing a [`Client`].
///
/// # Examples
///
/// ```no_run
/// use marketo_core::client::{self, Credentials};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let client = client::Builder::new()
///     .credentials(Credentials {
///         client_id: "your_client_id".to_string(),
///         client_secret: "your_client_secret".to_string(),
///         endpoint: "https://123-ABC-456.mktorest.com".to_string(),
///     })
///     .build()?
///     .connect()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct Builder {
    credentials_from: Option<CredentialsFrom>,
    connect_timeout: Option<Duration>,
    request_timeout: Option<Duration>,
}

impl Builder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets credentials to load from a JSON file.
    ///
    /// ```json
    /// {
    ///   "client_id": "your_client_id",
    ///   "client_secret": "your_client_secret",
    ///   "endpoint": "https://123-ABC-456.mktorest.com"
    /// }
    /// ```
    pub fn credentials_path(mut self, path: PathBuf) -> Self {
        self.credentials_from = Some(CredentialsFrom::Path(path));
        self
    }

    /// Sets credentials directly.
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials_from = Some(CredentialsFrom::Value(credentials));
        self
    }

    /// Sets the connect timeout for identity endpoint requests.
    ///
    /// Defaults to [`crate::DEFAULT_AUTH_CONNECT_TIMEOUT_SECS`].
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Sets the request timeout for identity endpoint requests.
    ///
    /// Defaults to [`crate::DEFAULT_AUTH_REQUEST_TIMEOUT_SECS`].
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// Returns an error if credentials were not provided via either
    /// [`credentials_path`](Self::credentials_path) or [`credentials`](Self::credentials),
    /// or if the HTTP client cannot be built.
    pub fn build(self) -> Result<Client, Error> {
        let credentials_from = self.credentials_from.ok_or_else(|| {
            Error::MissingRequiredAttribute("credentials or credentials_path".to_string())
        })?;

        let http_client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(self.connect_timeout.unwrap_or(Duration::from_secs(
                crate::DEFAULT_AUTH_CONNECT_TIMEOUT_SECS,
            )))
            .timeout(self.request_timeout.unwrap_or(Duration::from_secs(
                crate::DEFAULT_AUTH_REQUEST_TIMEOUT_SECS,
            )))
            .build()
            .map_err(|source| Error::HttpClientBuild { source })?;

        Ok(Client {
            credentials_from,
            credentials: None,
            http_client,
            token_state: Arc::new(RwLock::new(None)),
            endpoint: None,
        })
    }
}
