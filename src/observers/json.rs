//! JSON observer for serializing an instrumentation context.
//!
//! This module provides [`JsonObserver`], which captures a
//! [`MetricsSnapshot`] of an [`Instrumentation`] and serializes it with
//! `serde_json`.
//!
//! # Feature Flag
//!
//! This module requires the `json` feature:
//!
//! ```toml
//! [dependencies]
//! hedron-instrument = { version = "0.3", features = ["json"] }
//! ```
//!
//! # Examples
//!
//! ```rust,ignore
//! use hedron_instrument::instrumentation::Instrumentation;
//! use hedron_instrument::observers::json::JsonObserver;
//!
//! let instruments = Instrumentation::new()?;
//! instruments.counter("http_requests").add(1000);
//!
//! let json = JsonObserver::new().to_json(&instruments, true)?;
//! // {"counters":[{"name":"http_requests","value":1000}],"max_counters":[],...}
//! ```

use std::io::Write;

use crate::instrumentation::Instrumentation;
use crate::snapshot::MetricsSnapshot;

use super::Result;

/// Configuration for the JSON observer.
#[derive(Debug, Clone, Default)]
pub struct JsonConfig {
    /// Whether to pretty-print the JSON output.
    pub pretty: bool,
    /// Whether to stamp the snapshot with the current wall-clock time.
    pub include_timestamp: bool,
}

/// An observer that serializes instrumentation snapshots to JSON.
#[derive(Debug, Clone, Default)]
pub struct JsonObserver {
    config: JsonConfig,
}

impl JsonObserver {
    /// Creates a new JSON observer with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new JSON observer with the specified configuration.
    pub fn with_config(config: JsonConfig) -> Self {
        Self { config }
    }

    /// Enables or disables pretty-printing.
    pub fn pretty(mut self, enabled: bool) -> Self {
        self.config.pretty = enabled;
        self
    }

    /// Enables or disables timestamp inclusion.
    pub fn include_timestamp(mut self, enabled: bool) -> Self {
        self.config.include_timestamp = enabled;
        self
    }

    /// Captures the snapshot this observer would serialize.
    pub fn collect(&self, instrumentation: &Instrumentation, exclude_unused: bool) -> MetricsSnapshot {
        let snapshot = instrumentation.snapshot(exclude_unused);
        if self.config.include_timestamp {
            snapshot.with_timestamp(current_timestamp_ms())
        } else {
            snapshot
        }
    }

    /// Serializes a snapshot of `instrumentation` to a JSON string.
    pub fn to_json(&self, instrumentation: &Instrumentation, exclude_unused: bool) -> Result<String> {
        let snapshot = self.collect(instrumentation, exclude_unused);
        let json = if self.config.pretty {
            serde_json::to_string_pretty(&snapshot)?
        } else {
            serde_json::to_string(&snapshot)?
        };
        Ok(json)
    }

    /// Serializes a snapshot of `instrumentation` into `writer`.
    pub fn write_to<W: Write>(
        &self,
        mut writer: W,
        instrumentation: &Instrumentation,
        exclude_unused: bool,
    ) -> Result<()> {
        let snapshot = self.collect(instrumentation, exclude_unused);
        if self.config.pretty {
            serde_json::to_writer_pretty(&mut writer, &snapshot)?;
        } else {
            serde_json::to_writer(&mut writer, &snapshot)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Returns the current timestamp in milliseconds since Unix epoch.
fn current_timestamp_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::scheduler::SchedulerConfig;
    use crate::timed_scope::NoAlerts;
    use std::sync::Arc;
    use std::time::Duration;

    fn instruments() -> (Arc<ManualClock>, Instrumentation) {
        let clock = Arc::new(ManualClock::new(0));
        let instruments = Instrumentation::builder()
            .clock(Arc::clone(&clock) as Arc<dyn Clock>)
            .scheduler_config(SchedulerConfig::new().worker_threads(1))
            .build()
            .unwrap();
        (clock, instruments)
    }

    #[test]
    fn test_to_json_empty() {
        let (_, instruments) = instruments();
        let json = JsonObserver::new().to_json(&instruments, true).unwrap();
        assert_eq!(
            json,
            r#"{"counters":[],"max_counters":[],"counter_ranges":[],"throughputs":[],"timed_scopes":[]}"#
        );
    }

    #[test]
    fn test_to_json_values() {
        let (clock, instruments) = instruments();
        instruments.counter("requests").add(42);
        instruments.max_counter("in_flight").add(3);
        instruments.counter_range("status").add(404, 2);
        instruments
            .timed_scope("handler")
            .run(0, NoAlerts, || clock.advance(Duration::from_millis(5)));

        let json = JsonObserver::new().to_json(&instruments, true).unwrap();
        assert!(json.contains(r#"{"name":"requests","value":42}"#));
        assert!(json.contains(r#"{"name":"in_flight","value":3,"max":3}"#));
        assert!(json.contains(r#""entries":[{"key":404,"delta":2}]"#));
        assert!(json.contains(r#""executions_count":1"#));
    }

    #[test]
    fn test_round_trip() {
        let (_, instruments) = instruments();
        instruments.counter("a").increment();
        instruments
            .counter_throughput("tp", Duration::from_millis(10))
            .increment();

        let observer = JsonObserver::new();
        let json = observer.to_json(&instruments, false).unwrap();
        let parsed: MetricsSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, observer.collect(&instruments, false));
    }

    #[test]
    fn test_pretty_and_timestamp() {
        let (_, instruments) = instruments();
        instruments.counter("a").increment();

        let json = JsonObserver::new()
            .pretty(true)
            .include_timestamp(true)
            .to_json(&instruments, true)
            .unwrap();
        assert!(json.contains('\n'));
        assert!(json.contains("\"timestamp_ms\""));
    }

    #[test]
    fn test_write_to() {
        let (_, instruments) = instruments();
        instruments.counter("written").increment();

        let mut buffer = Vec::new();
        JsonObserver::new()
            .write_to(&mut buffer, &instruments, true)
            .unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains("\"written\""));
    }
}
