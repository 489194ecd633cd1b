//! Loggable projection of caught errors

use serde::Serialize;
use std::error::Error as StdError;

/// The fields of a caught error that survive into logs.
///
/// Nothing else is retained: no request bodies, headers or tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    /// Error class, e.g. `ValidationError` or `NotifyTransportError`
    pub kind: String,
    /// Human readable message of the outermost error
    pub message: String,
    /// HTTP-like status code, when the error carries one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Messages of the `source()` chain, outermost first
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub causes: Vec<String>,
}

impl ErrorReport {
    pub fn new(kind: impl Into<String>, err: &(dyn StdError + 'static)) -> Self {
        let mut causes = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            causes.push(cause.to_string());
            source = cause.source();
        }

        Self {
            kind: kind.into(),
            message: err.to_string(),
            status: None,
            causes,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Emit this report as a single ERROR line
    pub fn log(&self, what: &str) {
        let causes = (!self.causes.is_empty()).then(|| self.causes.join(": "));
        tracing::error!(
            kind = %self.kind,
            status = self.status,
            causes = causes.as_deref(),
            "{what}: {}",
            self.message
        );
    }
}
