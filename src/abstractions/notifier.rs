//! Notification dispatch abstraction
//!
//! The real implementation posts to LINE Notify: a form-encoded body with a
//! `message` field and a bearer token identifying the target chat.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::config::DEFAULT_NOTIFY_ENDPOINT;
use crate::error::ErrorReport;

/// Status used when a failure carries no HTTP status of its own
pub const FALLBACK_STATUS: u16 = 500;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    /// Rejected locally, before any request was made
    #[error("{0}")]
    Validation(String),

    /// The request failed or the provider refused it
    #[error("{message}")]
    Transport { message: String, status: u16 },
}

impl NotifyError {
    /// Status of the failure; local rejections use [`FALLBACK_STATUS`]
    pub fn status(&self) -> u16 {
        match self {
            NotifyError::Validation(_) => FALLBACK_STATUS,
            NotifyError::Transport { status, .. } => *status,
        }
    }

    pub fn report(&self) -> ErrorReport {
        let kind = match self {
            NotifyError::Validation(_) => "ValidationError",
            NotifyError::Transport { .. } => "NotifyTransportError",
        };
        ErrorReport::new(kind, self).with_status(self.status())
    }
}

pub type NotifyResult<T> = Result<T, NotifyError>;

/// Form body of a notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotifyBody {
    pub message: String,
}

impl NotifyBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Error payload returned by the provider, e.g.
/// `{"status":401,"message":"Invalid access token"}`
#[derive(Debug, Deserialize)]
struct ProviderError {
    message: Option<String>,
}

/// Sends a single notification
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send `body` on behalf of `token`.
    ///
    /// An empty token fails with [`NotifyError::Validation`] without touching
    /// the network.
    async fn send(&self, token: &str, body: &NotifyBody) -> NotifyResult<()>;
}

fn validate_token(token: &str) -> NotifyResult<()> {
    if token.is_empty() {
        return Err(NotifyError::Validation("token is required".to_string()));
    }
    Ok(())
}

/// LINE Notify client
pub struct LineNotifyClient {
    client: Client,
    endpoint: String,
}

impl LineNotifyClient {
    pub fn new(client: Client) -> Self {
        Self::with_endpoint(client, DEFAULT_NOTIFY_ENDPOINT)
    }

    pub fn with_endpoint(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    /// Turn a non-success response into a [`NotifyError`], preferring the
    /// provider's own message over the generic status text.
    async fn rejected(response: reqwest::Response) -> NotifyError {
        let status = response.status();
        let fallback = match response.error_for_status_ref() {
            Err(e) => e.to_string(),
            Ok(_) => format!("HTTP status {status}"),
        };

        let provider_message = response
            .json::<ProviderError>()
            .await
            .ok()
            .and_then(|body| body.message)
            .filter(|message| !message.is_empty());

        NotifyError::Transport {
            message: provider_message.unwrap_or(fallback),
            status: status.as_u16(),
        }
    }
}

#[async_trait]
impl Notifier for LineNotifyClient {
    async fn send(&self, token: &str, body: &NotifyBody) -> NotifyResult<()> {
        validate_token(token)?;

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(token)
            .form(body)
            .send()
            .await
            .map_err(|e| NotifyError::Transport {
                status: e.status().map_or(FALLBACK_STATUS, |s| s.as_u16()),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(Self::rejected(response).await);
        }

        Ok(())
    }
}

/// Mock implementation of `Notifier` for testing
pub struct MockNotifier {
    /// `(token, message)` of every accepted notification
    pub sent: Arc<Mutex<Vec<(String, String)>>>,
    /// Failures to return, consumed in order before succeeding again
    pub failures: Arc<Mutex<Vec<NotifyError>>>,
    /// Number of calls that got past token validation
    pub attempts: Arc<Mutex<usize>>,
}

impl MockNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            failures: Arc::new(Mutex::new(Vec::new())),
            attempts: Arc::new(Mutex::new(0)),
        }
    }

    pub async fn add_failure(&self, error: NotifyError) {
        self.failures.lock().await.push(error);
    }

    pub async fn get_sent(&self) -> Vec<(String, String)> {
        self.sent.lock().await.clone()
    }

    pub async fn get_attempts(&self) -> usize {
        *self.attempts.lock().await
    }
}

impl Default for MockNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn send(&self, token: &str, body: &NotifyBody) -> NotifyResult<()> {
        validate_token(token)?;
        *self.attempts.lock().await += 1;

        let mut failures = self.failures.lock().await;
        if !failures.is_empty() {
            return Err(failures.remove(0));
        }

        self.sent
            .lock()
            .await
            .push((token.to_string(), body.message.clone()));
        Ok(())
    }
}
