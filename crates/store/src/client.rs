//! HTTP client for the TutorLink message store
//!
//! Conversation history and unread state live behind the store's REST API;
//! the realtime channel only carries deltas. Idempotent reads retry with
//! exponential backoff, writes are single-shot.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use tutorlink_shared::{Conversation, ConversationId, Message, MessageId, UserId};

use crate::error::{StoreError, StoreResult};

/// Timeout for store requests (30 seconds)
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum number of retry attempts for transient failures
const MAX_RETRIES: usize = 3;

/// Initial backoff duration for retries (100ms)
const RETRY_BASE_DELAY: Duration = Duration::from_millis(100);

/// Maximum backoff duration for retries (5 seconds)
const RETRY_MAX_DELAY: Duration = Duration::from_secs(5);

// =============================================================================
// Response payloads
// =============================================================================

/// One page of conversation history, oldest first
#[derive(Debug, Clone, Deserialize)]
pub struct MessagePage {
    pub messages: Vec<Message>,
    #[serde(default)]
    pub has_more: bool,
}

/// Unread totals across every conversation of one user
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct UnreadCount {
    pub total: u32,
}

/// How many messages a read-all sweep touched
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct MarkedCount {
    pub marked: u32,
}

#[derive(Serialize)]
struct ReadAllBody<'a> {
    user_id: &'a UserId,
}

#[derive(Serialize)]
struct ArchiveBody {
    archived: bool,
}

#[derive(Serialize)]
struct PresenceBody {
    is_online: bool,
}

// =============================================================================
// Client
// =============================================================================

/// Client for the message store REST API
pub struct StoreClient {
    http: Client,
    base_url: String,
    auth_token: Option<String>,
}

impl StoreClient {
    #[allow(clippy::expect_used)] // HTTP client creation failure is a fatal system error
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            http,
            base_url,
            auth_token: None,
        }
    }

    /// Attach a bearer token to every request
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// All conversations `user` participates in
    pub async fn conversations(&self, user: &UserId) -> StoreResult<Vec<Conversation>> {
        let url = format!("{}/api/users/{}/conversations", self.base_url, user);
        self.get_with_retry(&url, &[]).await
    }

    /// One page of messages in `conversation`
    ///
    /// `before` pages backwards from a message id; omit both for the most
    /// recent page at the server's default size.
    pub async fn messages(
        &self,
        conversation: &ConversationId,
        limit: Option<u32>,
        before: Option<&MessageId>,
    ) -> StoreResult<MessagePage> {
        let url = format!(
            "{}/api/conversations/{}/messages",
            self.base_url, conversation
        );
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(limit) = limit {
            query.push(("limit", limit.to_string()));
        }
        if let Some(before) = before {
            query.push(("before", before.to_string()));
        }
        self.get_with_retry(&url, &query).await
    }

    /// Total unread messages across all of `user`'s conversations
    pub async fn unread_count(&self, user: &UserId) -> StoreResult<UnreadCount> {
        let url = format!("{}/api/users/{}/unread-count", self.base_url, user);
        self.get_with_retry(&url, &[]).await
    }

    /// Mark every message in `conversation` read for `user`
    pub async fn mark_all_read(
        &self,
        conversation: &ConversationId,
        user: &UserId,
    ) -> StoreResult<MarkedCount> {
        let url = format!(
            "{}/api/conversations/{}/read-all",
            self.base_url, conversation
        );
        self.post_json(&url, &ReadAllBody { user_id: user }).await
    }

    /// Archive or unarchive `conversation`; returns the updated record
    pub async fn set_archived(
        &self,
        conversation: &ConversationId,
        archived: bool,
    ) -> StoreResult<Conversation> {
        let url = format!(
            "{}/api/conversations/{}/archive",
            self.base_url, conversation
        );
        self.post_json(&url, &ArchiveBody { archived }).await
    }

    /// Eagerly flag `user` on- or offline
    ///
    /// The server also infers presence from the socket, so this is only
    /// needed when a client wants the flip observable before teardown.
    pub async fn set_presence(&self, user: &UserId, is_online: bool) -> StoreResult<()> {
        let url = format!("{}/api/users/{}/presence", self.base_url, user);
        let request = self
            .authorized(self.http.post(&url))
            .json(&PresenceBody { is_online });
        let response = request.send().await?;
        Self::check_status(response).await?;
        Ok(())
    }

    /// GET with retry on transient failures
    async fn get_with_retry<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> StoreResult<T> {
        use tokio_retry::strategy::{jitter, ExponentialBackoff};
        use tokio_retry::Retry;

        // Exponential backoff strategy with jitter
        let retry_strategy = ExponentialBackoff::from_millis(RETRY_BASE_DELAY.as_millis() as u64)
            .max_delay(RETRY_MAX_DELAY)
            .take(MAX_RETRIES)
            .map(jitter);

        Retry::spawn(retry_strategy, || async {
            let result = self.get_once(url, query).await;
            match &result {
                Ok(_) => Ok(result),
                Err(err) if err.is_transient() => {
                    tracing::debug!(
                        url = %url,
                        error = %err,
                        "Transient store error - will retry"
                    );
                    Err(result) // Return error to trigger retry
                }
                Err(err) => {
                    tracing::debug!(
                        url = %url,
                        error = %err,
                        "Permanent store error - will not retry"
                    );
                    Ok(result) // Return error wrapped in Ok to stop retrying
                }
            }
        })
        .await
        .unwrap_or_else(|e| e) // Extract the inner result
    }

    async fn get_once<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> StoreResult<T> {
        let request = self.authorized(self.http.get(url)).query(query);
        let response = request.send().await?;
        let response = Self::check_status(response).await?;
        Self::decode(response).await
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> StoreResult<T> {
        let request = self.authorized(self.http.post(url)).json(body);
        let response = request.send().await?;
        let response = Self::check_status(response).await?;
        Self::decode(response).await
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn check_status(response: Response) -> StoreResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(StoreError::Status {
            status: status.as_u16(),
            message,
        })
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> StoreResult<T> {
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}
