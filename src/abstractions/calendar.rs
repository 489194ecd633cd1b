//! Calendar source abstraction
//!
//! Fetches a remote day-of-month calendar and parses it into rows.

use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::calendar::{cache_bucket, parse_rows, CalendarRow};
use crate::clock::Clock;
use crate::config::DEFAULT_CACHE_WINDOW_MS;
use crate::error::ErrorReport;

/// Name of the query parameter carrying the cache-bust bucket
pub const CACHE_BUST_PARAM: &str = "cachebust";

#[derive(Error, Debug)]
pub enum CalendarError {
    #[error("Calendar request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Calendar source answered HTTP {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Calendar is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),

    #[error("Calendar is not valid CSV: {0}")]
    Parse(#[from] csv::Error),
}

impl CalendarError {
    pub fn report(&self) -> ErrorReport {
        let report = ErrorReport::new("CalendarFetchError", self);
        match self {
            CalendarError::Status { status, .. } => report.with_status(*status),
            _ => report,
        }
    }
}

pub type CalendarResult<T> = Result<T, CalendarError>;

/// Source of day-of-month calendars
#[async_trait]
pub trait CalendarSource: Send + Sync {
    /// Fetch and parse the calendar at `url`, rows in file order
    async fn load(&self, url: &str) -> CalendarResult<Vec<CalendarRow>>;
}

/// Calendar source reading CSV over HTTP
pub struct HttpCalendarSource {
    client: Client,
    clock: Arc<dyn Clock>,
    cache_window_ms: u64,
}

impl HttpCalendarSource {
    pub fn new(client: Client, clock: Arc<dyn Clock>) -> Self {
        Self {
            client,
            clock,
            cache_window_ms: DEFAULT_CACHE_WINDOW_MS,
        }
    }

    /// Granularity of the cache-bust parameter
    pub fn with_cache_window_ms(mut self, cache_window_ms: u64) -> Self {
        self.cache_window_ms = cache_window_ms;
        self
    }
}

#[async_trait]
impl CalendarSource for HttpCalendarSource {
    async fn load(&self, url: &str) -> CalendarResult<Vec<CalendarRow>> {
        let bucket = cache_bucket(self.clock.now().timestamp_millis(), self.cache_window_ms);
        tracing::debug!(url, bucket, "Fetching calendar");

        let response = self
            .client
            .get(url)
            .query(&[(CACHE_BUST_PARAM, bucket)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CalendarError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = String::from_utf8(response.bytes().await?.to_vec())?;
        let rows = parse_rows(&body)?;
        tracing::debug!(url, rows = rows.len(), "Parsed calendar");
        Ok(rows)
    }
}

/// Mock implementation of `CalendarSource` for testing
pub struct MockCalendarSource {
    /// Rows served per URL; a `u16` entry fails with that HTTP status
    pub calendars: Arc<Mutex<HashMap<String, Result<Vec<CalendarRow>, u16>>>>,
    /// URLs requested so far, in order
    pub requested: Arc<Mutex<Vec<String>>>,
}

impl MockCalendarSource {
    #[must_use]
    pub fn new() -> Self {
        Self {
            calendars: Arc::new(Mutex::new(HashMap::new())),
            requested: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub async fn add_calendar(&self, url: &str, rows: Vec<CalendarRow>) {
        self.calendars.lock().await.insert(url.to_string(), Ok(rows));
    }

    pub async fn add_failure(&self, url: &str, status: u16) {
        self.calendars
            .lock()
            .await
            .insert(url.to_string(), Err(status));
    }

    pub async fn get_requested(&self) -> Vec<String> {
        self.requested.lock().await.clone()
    }
}

impl Default for MockCalendarSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CalendarSource for MockCalendarSource {
    async fn load(&self, url: &str) -> CalendarResult<Vec<CalendarRow>> {
        self.requested.lock().await.push(url.to_string());

        // Unknown URLs behave like a missing file
        match self.calendars.lock().await.get(url) {
            Some(Ok(rows)) => Ok(rows.clone()),
            Some(Err(status)) => Err(CalendarError::Status {
                status: *status,
                url: url.to_string(),
            }),
            None => Err(CalendarError::Status {
                status: 404,
                url: url.to_string(),
            }),
        }
    }
}
