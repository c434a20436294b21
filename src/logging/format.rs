//! Log line rendering
//!
//! Turns positional values or a `format_args!` template into a single physical line
//! of the form `[<timestamp>][<Tag>][<message>]`.

use std::fmt::{self, Display, Write as _};

use chrono::{DateTime, Local, SecondsFormat, TimeZone};

use super::level::TraceLevel;

/// Separator placed between positional values
pub const VALUE_SEPARATOR: &str = ", ";

/// Render positional values with their `Display` form, joined by `", "`
pub fn join_values(values: &[&dyn Display]) -> String {
    let mut out = String::new();
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            out.push_str(VALUE_SEPARATOR);
        }
        // Writing into a String cannot fail
        let _ = write!(out, "{}", value);
    }
    out
}

/// Render a template
pub fn render_template(args: fmt::Arguments<'_>) -> String {
    fmt::format(args)
}

/// Replace every newline with a single space
pub fn normalize_body(body: &str) -> String {
    body.replace('\n', " ")
}

/// RFC3339 timestamp used in log lines
pub fn line_timestamp<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Build a full log line, terminator included
pub fn render_line<Tz: TimeZone>(at: &DateTime<Tz>, level: TraceLevel, body: &str) -> String
where
    Tz::Offset: Display,
{
    format!(
        "[{}][{}][{}]\n",
        line_timestamp(at),
        level.tag(),
        normalize_body(body)
    )
}

/// Build a log line stamped with the current local time
pub fn render_line_now(level: TraceLevel, body: &str) -> String {
    render_line(&Local::now(), level, body)
}
