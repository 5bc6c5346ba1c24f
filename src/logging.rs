//! One JSON object per line: `timestamp`, `level`, `target`, `message` and the
//! event's own fields.

use serde_json::{Map, Value};
use std::fmt::{self, Write};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::{self, FormatEvent, FormatFields};
use tracing_subscriber::fmt::time::{ChronoUtc, FormatTime};
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::registry::LookupSpan;

/// Field that promotes an `error!` record to the CRITICAL level.
pub const CRITICAL_FIELD: &str = "critical";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

pub struct JsonLogFormat {
    timer: ChronoUtc,
}

impl JsonLogFormat {
    pub fn new() -> Self {
        Self {
            timer: ChronoUtc::new(TIMESTAMP_FORMAT.to_string()),
        }
    }
}

impl Default for JsonLogFormat {
    fn default() -> Self {
        Self::new()
    }
}

fn level_name(level: &Level, critical: bool) -> &'static str {
    match *level {
        Level::ERROR if critical => "CRITICAL",
        Level::ERROR => "ERROR",
        Level::WARN => "WARN",
        Level::INFO => "INFO",
        Level::DEBUG => "DEBUG",
        Level::TRACE => "TRACE",
    }
}

#[derive(Default)]
struct JsonVisitor {
    fields: Map<String, Value>,
    critical: bool,
}

impl JsonVisitor {
    fn insert(&mut self, field: &Field, value: Value) {
        self.fields.insert(field.name().to_string(), value);
    }
}

impl Visit for JsonVisitor {
    fn record_bool(&mut self, field: &Field, value: bool) {
        if field.name() == CRITICAL_FIELD {
            self.critical = value;
        } else {
            self.insert(field, Value::Bool(value));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, Value::from(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, Value::from(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, Value::String(format!("{:?}", value)));
    }
}

impl<S, N> FormatEvent<S, N> for JsonLogFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut visitor = JsonVisitor::default();
        event.record(&mut visitor);

        let mut timestamp = String::new();
        self.timer.format_time(&mut format::Writer::new(&mut timestamp))?;

        let metadata = event.metadata();
        let mut record = Map::new();
        record.insert("timestamp".to_string(), Value::String(timestamp));
        record.insert(
            "level".to_string(),
            Value::from(level_name(metadata.level(), visitor.critical)),
        );
        record.insert("target".to_string(), Value::from(metadata.target()));
        record.extend(visitor.fields);

        let line = serde_json::to_string(&record).map_err(|_| fmt::Error)?;
        writeln!(writer, "{}", line)
    }
}
