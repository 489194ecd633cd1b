//! Context document storage abstraction
//!
//! The document lives as a single file inside a GitHub gist. Reads and
//! writes always move the whole list; there is no merging and no
//! concurrency check, so the last writer wins.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::config::{DEFAULT_STORE_API_BASE, DEFAULT_STORE_FILE};
use crate::context::{parse_document, render_document, Context, ContextList};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Store answered HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("File {0} not found in gist")]
    MissingFile(String),

    #[error("Context document is malformed: {0}")]
    Parse(#[from] json5::Error),

    #[error("Failed to serialize context document: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence of the full context list
#[async_trait]
pub trait ContextStore: Send + Sync {
    /// Load the whole list, in document order
    async fn read(&self) -> StoreResult<ContextList>;

    /// Replace the stored list with `contexts`
    async fn write(&self, contexts: &[Context]) -> StoreResult<()>;
}

/// Connection settings for [`GistContextStore`]
#[derive(Debug, Clone)]
pub struct GistSettings {
    pub api_base: String,
    pub gist_id: String,
    pub file_name: String,
    pub token: Option<String>,
}

impl GistSettings {
    pub fn new(gist_id: impl Into<String>) -> Self {
        Self {
            api_base: DEFAULT_STORE_API_BASE.to_string(),
            gist_id: gist_id.into(),
            file_name: DEFAULT_STORE_FILE.to_string(),
            token: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Gist {
    #[serde(default)]
    files: HashMap<String, Option<GistFile>>,
}

#[derive(Debug, Deserialize)]
struct GistFile {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    truncated: bool,
    #[serde(default)]
    raw_url: Option<String>,
}

/// Context store backed by a GitHub gist
pub struct GistContextStore {
    client: Client,
    settings: GistSettings,
}

impl GistContextStore {
    pub fn new(client: Client, settings: GistSettings) -> Self {
        Self { client, settings }
    }

    fn gist_url(&self) -> String {
        format!(
            "{}/gists/{}",
            self.settings.api_base.trim_end_matches('/'),
            self.settings.gist_id
        )
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28");
        match &self.settings.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn checked(response: reqwest::Response) -> StoreResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(StoreError::Status {
            status: status.as_u16(),
            body,
        })
    }

    /// Content of the document file, following `raw_url` when the API
    /// truncated it
    async fn file_content(&self, gist: Gist) -> StoreResult<String> {
        let file_name = &self.settings.file_name;
        let file = gist
            .files
            .into_iter()
            .find(|(name, _)| name == file_name)
            .and_then(|(_, file)| file)
            .ok_or_else(|| StoreError::MissingFile(file_name.clone()))?;

        match (file.truncated, file.raw_url, file.content) {
            (true, Some(raw_url), _) => {
                tracing::debug!(raw_url = %raw_url, "Context document truncated, fetching raw content");
                let response = self.authorized(self.client.get(&raw_url)).send().await?;
                Ok(Self::checked(response).await?.text().await?)
            }
            (_, _, Some(content)) => Ok(content),
            _ => Err(StoreError::MissingFile(file_name.clone())),
        }
    }
}

#[async_trait]
impl ContextStore for GistContextStore {
    async fn read(&self) -> StoreResult<ContextList> {
        let response = self
            .authorized(self.client.get(self.gist_url()))
            .send()
            .await?;
        let gist: Gist = Self::checked(response).await?.json().await?;

        let content = self.file_content(gist).await?;
        Ok(parse_document(&content)?)
    }

    async fn write(&self, contexts: &[Context]) -> StoreResult<()> {
        let content = render_document(contexts)?;
        let mut files = serde_json::Map::new();
        files.insert(
            self.settings.file_name.clone(),
            serde_json::json!({ "content": content }),
        );
        let payload = serde_json::json!({ "files": files });

        let response = self
            .authorized(self.client.patch(self.gist_url()))
            .json(&payload)
            .send()
            .await?;
        Self::checked(response).await?;
        Ok(())
    }
}

/// Mock implementation of `ContextStore` for testing
pub struct MockContextStore {
    /// Current stored list; `None` makes reads fail
    pub contexts: Arc<Mutex<Option<ContextList>>>,
    /// Whether writes fail
    pub fail_writes: bool,
    /// Every list passed to `write`, in order
    pub written: Arc<Mutex<Vec<ContextList>>>,
    pub reads: Arc<Mutex<usize>>,
}

impl MockContextStore {
    #[must_use]
    pub fn new(contexts: ContextList) -> Self {
        Self {
            contexts: Arc::new(Mutex::new(Some(contexts))),
            fail_writes: false,
            written: Arc::new(Mutex::new(Vec::new())),
            reads: Arc::new(Mutex::new(0)),
        }
    }

    /// A store whose reads always fail
    #[must_use]
    pub fn unreadable() -> Self {
        Self {
            contexts: Arc::new(Mutex::new(None)),
            ..Self::new(Vec::new())
        }
    }

    pub async fn get_written(&self) -> Vec<ContextList> {
        self.written.lock().await.clone()
    }

    pub async fn get_reads(&self) -> usize {
        *self.reads.lock().await
    }
}

#[async_trait]
impl ContextStore for MockContextStore {
    async fn read(&self) -> StoreResult<ContextList> {
        *self.reads.lock().await += 1;
        self.contexts
            .lock()
            .await
            .clone()
            .ok_or_else(|| StoreError::Unavailable("mock read failure".to_string()))
    }

    async fn write(&self, contexts: &[Context]) -> StoreResult<()> {
        if self.fail_writes {
            return Err(StoreError::Unavailable("mock write failure".to_string()));
        }
        self.written.lock().await.push(contexts.to_vec());
        *self.contexts.lock().await = Some(contexts.to_vec());
        Ok(())
    }
}
