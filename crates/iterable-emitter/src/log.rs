//! Structured diagnostics.
//!
//! Every lifecycle step is reported twice: as a `tracing` event tagged with
//! the adapter's instance id, and, when a sink is configured, as a
//! [`LogRecord`] handed to that sink if it meets the minimum [`LogLevel`].

use crate::error::StreamError;
use crate::state::Stats;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;
use uuid::Uuid;

/// Severity of a [`LogRecord`], ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        };
        f.write_str(name)
    }
}

/// A structured log entry delivered to a [`LogSink`].
#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    pub level: LogLevel,
    pub message: &'static str,
    pub timestamp: SystemTime,
    /// Identifies the adapter that produced the record.
    pub instance_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    /// Present on `Debug` records only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<Stats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<StreamError>,
}

/// Callback receiving log records.
///
/// The sink runs on whichever task or thread triggered the event. It must not
/// block for long, since it is called inline with upstream event dispatch.
pub type LogSink = Arc<dyn Fn(LogRecord) + Send + Sync>;

/// Per-instance log routing.
pub(crate) struct Diagnostics {
    id: Uuid,
    sink: Option<(LogSink, LogLevel)>,
}

impl Diagnostics {
    pub(crate) fn new(id: Uuid, sink: Option<(LogSink, LogLevel)>) -> Self {
        Self { id, sink }
    }

    pub(crate) fn id(&self) -> Uuid {
        self.id
    }

    /// Returns `true` if a record at `level` would reach the configured sink.
    pub(crate) fn sink_enabled(&self, level: LogLevel) -> bool {
        matches!(self.sink, Some((_, min)) if level >= min)
    }

    /// Returns `true` if a record at `level` would be observed anywhere.
    ///
    /// Used to skip payload formatting when nobody is listening.
    pub(crate) fn enabled(&self, level: LogLevel) -> bool {
        if self.sink_enabled(level) {
            return true;
        }
        match level {
            LogLevel::Debug => tracing::enabled!(tracing::Level::DEBUG),
            LogLevel::Info => tracing::enabled!(tracing::Level::INFO),
            LogLevel::Warn => tracing::enabled!(tracing::Level::WARN),
            LogLevel::Error => tracing::enabled!(tracing::Level::ERROR),
        }
    }

    pub(crate) fn emit(
        &self,
        level: LogLevel,
        message: &'static str,
        payload: Option<String>,
        stats: Option<Stats>,
        error: Option<&StreamError>,
    ) {
        let instance = self.id;
        match level {
            LogLevel::Debug => {
                tracing::debug!(%instance, payload = ?payload, "{message}");
            }
            LogLevel::Info => {
                tracing::info!(%instance, payload = ?payload, "{message}");
            }
            LogLevel::Warn => {
                tracing::warn!(%instance, payload = ?payload, "{message}");
            }
            LogLevel::Error => {
                tracing::error!(%instance, payload = ?payload, error = ?error, "{message}");
            }
        }

        if let Some((sink, min)) = &self.sink {
            if level >= *min {
                sink(LogRecord {
                    level,
                    message,
                    timestamp: SystemTime::now(),
                    instance_id: instance,
                    payload,
                    stats: if level == LogLevel::Debug { stats } else { None },
                    error: error.cloned(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn capture(min: LogLevel) -> (Diagnostics, Arc<Mutex<Vec<LogRecord>>>) {
        let records = Arc::new(Mutex::new(Vec::new()));
        let sink_records = Arc::clone(&records);
        let sink: LogSink = Arc::new(move |record| sink_records.lock().unwrap().push(record));
        (Diagnostics::new(Uuid::new_v4(), Some((sink, min))), records)
    }

    #[test]
    fn level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Error);
        assert_eq!(LogLevel::Warn.to_string(), "WARN");
    }

    #[test]
    fn records_below_minimum_are_dropped() {
        let (diag, records) = capture(LogLevel::Warn);
        diag.emit(LogLevel::Debug, "debug", None, None, None);
        diag.emit(LogLevel::Info, "info", None, None, None);
        diag.emit(LogLevel::Warn, "warn", Some("p".into()), None, None);

        let records = records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].message, "warn");
        assert_eq!(records[0].payload.as_deref(), Some("p"));
        assert_eq!(records[0].instance_id, diag.id());
    }

    #[test]
    fn no_sink_means_sink_disabled() {
        let diag = Diagnostics::new(Uuid::new_v4(), None);
        assert!(!diag.sink_enabled(LogLevel::Error));
        diag.emit(LogLevel::Error, "nobody listening", None, None, None);
    }

    #[test]
    fn stats_only_attached_to_debug_records() {
        let (diag, records) = capture(LogLevel::Debug);
        diag.emit(LogLevel::Debug, "d", None, Some(Stats::default()), None);
        diag.emit(LogLevel::Info, "i", None, Some(Stats::default()), None);

        let records = records.lock().unwrap();
        assert!(records[0].stats.is_some());
        assert!(records[1].stats.is_none());
    }
}
