//! Cold-start hydration from the REST backend.
//!
//! The backend is only consulted before the live stream takes over. Its
//! results are folded into the store by set union on message id; see
//! [`chat_core::apply_hydration`].

use async_trait::async_trait;
use chat_types::{ConversationRecord, Message};
use reqwest::{Client, StatusCode, Url};
use thiserror::Error;
use tracing::debug;

/// Hydration errors.
#[derive(Debug, Error)]
pub enum HydrationError {
    /// Request could not be sent or the body could not be decoded.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with a non-success status.
    #[error("{url} returned {status}")]
    Status {
        /// Requested URL.
        url: String,
        /// Response status.
        status: StatusCode,
    },

    /// A request URL could not be built.
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

/// Read-only REST backing store.
#[async_trait]
pub trait BackingStore: Send + Sync {
    /// All conversations of the authenticated user.
    async fn conversations(&self) -> Result<Vec<ConversationRecord>, HydrationError>;

    /// Messages of one conversation, keyed by the backend's own id.
    async fn messages(&self, conversation_id: &str) -> Result<Vec<Message>, HydrationError>;
}

/// [`BackingStore`] over HTTP + JSON.
///
/// - `GET {api}/conversations`
/// - `GET {api}/conversations/{id}/messages`
#[derive(Debug, Clone)]
pub struct HttpBackingStore {
    client: Client,
    api_url: String,
    auth_token: Option<String>,
}

impl HttpBackingStore {
    /// Create a backing store rooted at `api_url`.
    pub fn new(api_url: impl Into<String>, auth_token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_url: api_url.into(),
            auth_token,
        }
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, HydrationError> {
        let mut url =
            Url::parse(&self.api_url).map_err(|e| HydrationError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| HydrationError::InvalidUrl(self.api_url.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<R>(&self, url: Url) -> Result<R, HydrationError>
    where
        R: serde::de::DeserializeOwned,
    {
        debug!(%url, "hydration request");
        let mut request = self.client.get(url.clone());
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(HydrationError::Status {
                url: url.to_string(),
                status,
            });
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl BackingStore for HttpBackingStore {
    async fn conversations(&self) -> Result<Vec<ConversationRecord>, HydrationError> {
        let url = self.endpoint(&["conversations"])?;
        self.get_json(url).await
    }

    async fn messages(&self, conversation_id: &str) -> Result<Vec<Message>, HydrationError> {
        let url = self.endpoint(&["conversations", conversation_id, "messages"])?;
        self.get_json(url).await
    }
}
