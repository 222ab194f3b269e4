//! External collaborators: shortlinks, click analytics and email.
//!
//! Each collaborator is a dyn-compatible trait returning boxed futures, so
//! services and effects can hold them as `Arc<dyn Trait>`. The HTTP client
//! in this module talks to the platform's callable endpoints; tests and the
//! demo use the in-memory versions in [`crate::mocks`].

use crate::config::{CollaboratorConfig, Config};
use crate::error::NaksError;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;

/// Collaborator result
pub type CollaboratorResult<T> = Result<T, CollaboratorError>;

/// Boxed future returned by collaborator methods
pub type CollaboratorFuture<T> = BoxFuture<'static, CollaboratorResult<T>>;

/// Collaborator failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollaboratorError {
    /// The request never got a response
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// The endpoint answered with a non-success status
    #[error("Endpoint returned {status}: {message}")]
    Endpoint {
        /// HTTP status code
        status: u16,
        /// Response body
        message: String,
    },

    /// The response body did not match the expected shape
    #[error("Unexpected response: {0}")]
    ResponseParseFailed(String),

    /// The requested short identifier is already taken
    #[error("Short id already in use: {0}")]
    ShortIdTaken(String),

    /// The client could not be constructed
    #[error("Client setup failed: {0}")]
    Setup(String),
}

impl From<CollaboratorError> for NaksError {
    fn from(error: CollaboratorError) -> Self {
        Self::Collaborator(error.to_string())
    }
}

// ============================================================================
// Shortlinks
// ============================================================================

/// Request to create a shortlink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortlinkRequest {
    /// Site path the link redirects to (`/events/{id}`)
    pub destination_path: String,
    /// Vanity identifier; generated when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_short_id: Option<String>,
    /// Interstitial message shown before redirecting
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ShortlinkRequest {
    /// Link to `destination_path` with a generated id
    #[must_use]
    pub fn new(destination_path: impl Into<String>) -> Self {
        Self {
            destination_path: destination_path.into(),
            custom_short_id: None,
            message: None,
        }
    }

    /// Ask for a specific short id
    #[must_use]
    pub fn with_short_id(mut self, short_id: impl Into<String>) -> Self {
        self.custom_short_id = Some(short_id.into());
        self
    }

    /// Show `message` before redirecting
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// A created shortlink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shortlink {
    /// Short identifier
    pub short_id: String,
    /// Full public URL
    pub short_url: String,
}

impl Shortlink {
    /// Build from the endpoint's `shortUrl`; the id is its last path segment
    #[must_use]
    pub fn from_url(short_url: impl Into<String>) -> Self {
        let short_url = short_url.into();
        let short_id = short_url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        Self { short_id, short_url }
    }
}

/// One recorded click
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Click {
    /// When the link was followed
    pub clicked_at: DateTime<Utc>,
    /// Referring page, when known
    #[serde(default)]
    pub referrer: Option<String>,
}

/// Click statistics of a shortlink
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortlinkAnalytics {
    /// Total clicks
    pub clicks: u64,
    /// Most recent clicks, newest first
    #[serde(default)]
    pub recent_clicks: Vec<Click>,
}

/// Shortlink creation collaborator
pub trait ShortlinkClient: Send + Sync {
    /// Create a shortlink
    ///
    /// # Errors
    ///
    /// - `ShortIdTaken`: the custom id is in use
    /// - `RequestFailed` / `Endpoint` / `ResponseParseFailed`: transport failures
    fn create(&self, request: ShortlinkRequest) -> CollaboratorFuture<Shortlink>;
}

/// Click analytics collaborator
pub trait AnalyticsClient: Send + Sync {
    /// Read click statistics for `short_id`
    ///
    /// # Errors
    ///
    /// Transport failures.
    fn analytics(&self, short_id: String) -> CollaboratorFuture<ShortlinkAnalytics>;
}

// ============================================================================
// Email
// ============================================================================

/// A transactional email
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailMessage {
    /// Recipient
    pub to_email: String,
    /// Subject line
    pub subject: String,
    /// HTML body
    pub content: String,
}

/// Email delivery collaborator
pub trait EmailSender: Send + Sync {
    /// Send one email
    ///
    /// # Errors
    ///
    /// Transport failures.
    fn send(&self, message: EmailMessage) -> CollaboratorFuture<()>;
}

// ============================================================================
// HTTP implementation
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OutgoingEmail<'a> {
    #[serde(flatten)]
    message: &'a EmailMessage,
    from: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyticsQuery<'a> {
    short_id: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShortlinkResponse {
    short_url: String,
}

/// Collaborators reached over HTTP, one JSON POST per call
#[derive(Clone, Debug)]
pub struct HttpCollaborators {
    client: Client,
    endpoints: CollaboratorConfig,
}

impl HttpCollaborators {
    /// Create a client for the endpoints in `config`
    ///
    /// # Errors
    ///
    /// `Setup` if the HTTP client cannot be built.
    pub fn new(config: &Config) -> CollaboratorResult<Self> {
        let client = Client::builder()
            .timeout(config.collaborator_timeout())
            .build()
            .map_err(|e| CollaboratorError::Setup(e.to_string()))?;

        Ok(Self {
            client,
            endpoints: config.collaborators.clone(),
        })
    }

    async fn post<B, T>(client: Client, url: String, body: &B) -> CollaboratorResult<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let response = client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| CollaboratorError::RequestFailed(e.to_string()))?;

        match response.status() {
            status if status.is_success() => response
                .json::<T>()
                .await
                .map_err(|e| CollaboratorError::ResponseParseFailed(e.to_string())),
            status => {
                let message = response.text().await.unwrap_or_default();
                Err(CollaboratorError::Endpoint {
                    status: status.as_u16(),
                    message,
                })
            },
        }
    }
}

impl ShortlinkClient for HttpCollaborators {
    fn create(&self, request: ShortlinkRequest) -> CollaboratorFuture<Shortlink> {
        let client = self.client.clone();
        let url = self.endpoints.shortlink_url.clone();

        Box::pin(async move {
            match Self::post::<_, ShortlinkResponse>(client, url, &request).await {
                Ok(response) => Ok(Shortlink::from_url(response.short_url)),
                Err(CollaboratorError::Endpoint { status, .. })
                    if status == StatusCode::CONFLICT.as_u16() =>
                {
                    Err(CollaboratorError::ShortIdTaken(
                        request.custom_short_id.unwrap_or_default(),
                    ))
                },
                Err(error) => Err(error),
            }
        })
    }
}

impl AnalyticsClient for HttpCollaborators {
    fn analytics(&self, short_id: String) -> CollaboratorFuture<ShortlinkAnalytics> {
        let client = self.client.clone();
        let url = self.endpoints.analytics_url.clone();

        Box::pin(async move {
            Self::post(client, url, &AnalyticsQuery { short_id: &short_id }).await
        })
    }
}

impl EmailSender for HttpCollaborators {
    fn send(&self, message: EmailMessage) -> CollaboratorFuture<()> {
        let client = self.client.clone();
        let url = self.endpoints.email_url.clone();
        let from = self.endpoints.email_from.clone();

        Box::pin(async move {
            let body = OutgoingEmail {
                message: &message,
                from: &from,
            };
            Self::post::<_, serde_json::Value>(client, url, &body)
                .await
                .map(|_| ())
        })
    }
}
