//! Day-of-month calendars
//!
//! A calendar is a CSV file with a header row containing at least a `date`
//! column (day of month) and a `message` column:
//!
//! ```text
//! date,message
//! 1,Pay rent
//! 15,Water the plants
//! ```

use std::collections::HashMap;

/// One data row of a calendar file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarRow {
    /// Day of month; 0 when the `date` cell is not a usable number
    pub day: u32,
    pub message: String,
}

impl CalendarRow {
    pub fn new(day: u32, message: impl Into<String>) -> Self {
        Self {
            day,
            message: message.into(),
        }
    }
}

/// Day of month to trimmed message.
///
/// Built by folding rows in file order, so when a day appears twice the later
/// row wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalendarMap {
    entries: HashMap<u32, String>,
}

impl CalendarMap {
    pub fn from_rows<'a, I>(rows: I) -> Self
    where
        I: IntoIterator<Item = &'a CalendarRow>,
    {
        let entries = rows
            .into_iter()
            .map(|row| (row.day, row.message.trim().to_string()))
            .collect();
        Self { entries }
    }

    /// Message scheduled for `day`, if it has any non-blank text
    pub fn message_for(&self, day: u32) -> Option<&str> {
        self.entries
            .get(&day)
            .map(String::as_str)
            .filter(|message| !message.is_empty())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parse a calendar body into rows, in file order.
///
/// Short records are accepted; missing cells read as empty strings.
pub fn parse_rows(body: &str) -> Result<Vec<CalendarRow>, csv::Error> {
    let body = body.trim_start_matches('\u{feff}').trim();
    if body.is_empty() {
        return Ok(Vec::new());
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(body.as_bytes());

    let headers = reader.headers()?.clone();
    let position = |name: &str| headers.iter().position(|h| h.trim() == name);
    let date_idx = position("date");
    let message_idx = position("message");

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        let cell = |idx: Option<usize>| idx.and_then(|i| record.get(i)).unwrap_or("");

        rows.push(CalendarRow {
            day: parse_day(cell(date_idx)),
            message: cell(message_idx).trim().to_string(),
        });
    }

    Ok(rows)
}

/// Lenient day-of-month parsing: `" 7 "`, `"7.0"` and `"7.9"` all give 7,
/// anything else gives 0.
pub fn parse_day(raw: &str) -> u32 {
    match raw.trim().parse::<f64>() {
        Ok(n) if n.is_finite() && n >= 1.0 && n < f64::from(u32::MAX) => n.trunc() as u32,
        _ => 0,
    }
}

/// Cache-bust value for `now_ms`: the index of the `window_ms` bucket it
/// falls in. Zero-width windows are treated as one millisecond.
pub fn cache_bucket(now_ms: i64, window_ms: u64) -> i64 {
    let window = i64::try_from(window_ms.max(1)).unwrap_or(i64::MAX);
    now_ms.div_euclid(window)
}
