//! # calendar-notify
//!
//! A scheduled job that sends at most one push notification per day per
//! configured context. Each context points at a small CSV calendar mapping
//! day-of-month to a message; when tomorrow has a message and the context has
//! not run today, the message is dispatched through LINE Notify.
//!
//! ## Modules
//!
//! - `abstractions` - Traits and HTTP implementations for the calendar host, the
//!   notification endpoint and the context document store
//! - `calendar` - Calendar rows, day lookup and CSV parsing
//! - `clock` - Time source and UTC+8 day arithmetic
//! - `config` - Environment-driven configuration
//! - `context` - Context document types
//! - `error` - Crate errors and the loggable error projection
//! - `logging` - Severity-tagged JSON log lines
//! - `orchestrator` - Whole-run driver with failure isolation
//! - `processor` - Per-context dedup, lookup and dispatch
pub mod abstractions;
pub mod calendar;
pub mod clock;
pub mod config;
pub mod context;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod processor;

pub use config::Config;
pub use context::{Context, ContextList};
pub use error::{Error, Result};
pub use orchestrator::{Orchestrator, ReadFailurePolicy, RunReport};
pub use processor::{ContextProcessor, Dispatch, ProcessOutcome};
