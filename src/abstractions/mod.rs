//! Abstraction layers for external systems
//!
//! Each network collaborator (calendar host, notification endpoint, context
//! document store) sits behind a trait with a real HTTP implementation and a
//! mock for tests.

pub mod calendar;
pub mod notifier;
pub mod store;

pub use calendar::{CalendarError, CalendarSource, HttpCalendarSource, MockCalendarSource};
pub use notifier::{LineNotifyClient, MockNotifier, NotifyBody, NotifyError, Notifier};
pub use store::{ContextStore, GistContextStore, GistSettings, MockContextStore, StoreError};
