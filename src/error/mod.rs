//! Crate level error types
//!
//! Errors raised inside a single context (calendar fetch, notification
//! dispatch) never reach this type; they are projected into an
//! [`ErrorReport`] and logged by the processor. Only failures that end the
//! whole run are represented here.

mod report;

pub use report::ErrorReport;

use crate::abstractions::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to read context document")]
    StoreRead(#[source] StoreError),

    #[error("Failed to write context document")]
    StoreWrite(#[source] StoreError),

    #[error("Failed to create HTTP client")]
    HttpClient(#[from] reqwest::Error),
}

impl Error {
    /// Short, stable name of the variant, used as the `kind` of log lines
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Config(_) => "ConfigError",
            Error::StoreRead(_) => "StoreReadError",
            Error::StoreWrite(_) => "StoreWriteError",
            Error::HttpClient(_) => "HttpClientError",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
