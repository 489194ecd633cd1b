//! Structured log output
//!
//! Every event becomes one JSON object on its own line:
//!
//! ```text
//! {"count":2,"message":"Loaded contexts","severity":"INFO"}
//! ```
//!
//! Tracing levels map onto a syslog-like severity scale. An event can pick
//! any severity of that scale with an explicit `severity = "NOTICE"` field.

use serde_json::{Map, Value};
use std::fmt;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

/// Log severities, least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Default,
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Critical,
    Alert,
    Emergency,
}

impl Severity {
    pub const ALL: [Severity; 9] = [
        Severity::Default,
        Severity::Debug,
        Severity::Info,
        Severity::Notice,
        Severity::Warning,
        Severity::Error,
        Severity::Critical,
        Severity::Alert,
        Severity::Emergency,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Default => "DEFAULT",
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Notice => "NOTICE",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
            Severity::Alert => "ALERT",
            Severity::Emergency => "EMERGENCY",
        }
    }

    /// Case-insensitive lookup by name
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|s| s.as_str().eq_ignore_ascii_case(name.trim()))
    }

    pub fn from_level(level: &Level) -> Self {
        match *level {
            Level::TRACE => Severity::Default,
            Level::DEBUG => Severity::Debug,
            Level::INFO => Severity::Info,
            Level::WARN => Severity::Warning,
            Level::ERROR => Severity::Error,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct JsonVisitor<'a> {
    out: &'a mut Map<String, Value>,
}

impl Visit for JsonVisitor<'_> {
    fn record_bool(&mut self, field: &Field, value: bool) {
        self.out.insert(field.name().to_string(), Value::Bool(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.out.insert(field.name().to_string(), Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.out.insert(field.name().to_string(), Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        if let Some(n) = serde_json::Number::from_f64(value) {
            self.out.insert(field.name().to_string(), Value::Number(n));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.out
            .insert(field.name().to_string(), Value::String(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.out
            .insert(field.name().to_string(), Value::String(format!("{value:?}")));
    }
}

/// Build the JSON line for an event at `level` with recorded `fields`
pub fn render_line(level: &Level, mut fields: Map<String, Value>, target: Option<&str>) -> String {
    let severity = fields
        .remove("severity")
        .and_then(|v| v.as_str().and_then(Severity::parse))
        .unwrap_or_else(|| Severity::from_level(level));

    let mut line = Map::new();
    line.insert("severity".to_string(), Value::from(severity.as_str()));
    if let Some(target) = target {
        line.insert("target".to_string(), Value::from(target));
    }
    line.extend(fields);

    Value::Object(line).to_string()
}

/// Event formatter producing one severity-tagged JSON object per line
#[derive(Debug, Clone, Copy, Default)]
pub struct SeverityJsonFormat {
    with_target: bool,
}

impl SeverityJsonFormat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_target(mut self, with_target: bool) -> Self {
        self.with_target = with_target;
        self
    }
}

impl<S, N> FormatEvent<S, N> for SeverityJsonFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut fields = Map::new();
        event.record(&mut JsonVisitor { out: &mut fields });

        let metadata = event.metadata();
        let target = self.with_target.then(|| metadata.target());
        writeln!(writer, "{}", render_line(metadata.level(), fields, target))
    }
}

/// Install the global subscriber writing JSON lines to stdout.
///
/// `RUST_LOG` takes precedence over `verbose` when set.
pub fn init(verbose: u8) {
    let default_filter = match verbose {
        0 => "info",
        1 => "debug,hyper=info,reqwest=info",
        _ => "trace,hyper=debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stdout)
        .event_format(SeverityJsonFormat::new().with_target(verbose >= 2))
        .init();
}
