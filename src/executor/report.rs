//! Report sinks and the structured run summary
//!
//! Each run gets three sinks (plain text, HTML, JSON) backed by temporary
//! files. Frameworks running as child processes write to the sink paths;
//! in-process frameworks can write through [`ReportSink::write`]. Closing a
//! sink reads its contents and deletes the file.

use serde::Deserialize;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tempfile::NamedTempFile;

use crate::common::{Error, Result};

/// The three report representations a run produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Text,
    Html,
    Json,
}

impl ReportFormat {
    /// Argument placeholder replaced by this sink's path
    pub fn placeholder(self) -> &'static str {
        match self {
            ReportFormat::Text => "{txt}",
            ReportFormat::Html => "{html}",
            ReportFormat::Json => "{json}",
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            ReportFormat::Text => ".txt",
            ReportFormat::Html => ".html",
            ReportFormat::Json => ".json",
        }
    }
}

enum SinkState {
    Open(NamedTempFile),
    Closed(String),
}

/// A report destination for one run
#[derive(Clone)]
pub struct ReportSink {
    format: ReportFormat,
    state: Arc<Mutex<SinkState>>,
}

impl ReportSink {
    /// Create an open sink backed by a fresh temporary file
    pub fn create(format: ReportFormat) -> Result<Self> {
        let file = tempfile::Builder::new()
            .prefix("scout-report-")
            .suffix(format.suffix())
            .tempfile()?;

        Ok(Self {
            format,
            state: Arc::new(Mutex::new(SinkState::Open(file))),
        })
    }

    fn state(&self) -> MutexGuard<'_, SinkState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn format(&self) -> ReportFormat {
        self.format
    }

    /// Path of the backing file while the sink is open
    pub fn path(&self) -> Option<PathBuf> {
        match &*self.state() {
            SinkState::Open(file) => Some(file.path().to_path_buf()),
            SinkState::Closed(_) => None,
        }
    }

    /// Append bytes to an open sink
    pub fn write(&self, bytes: &[u8]) -> Result<()> {
        match &mut *self.state() {
            SinkState::Open(file) => {
                file.as_file_mut().write_all(bytes)?;
                Ok(())
            }
            SinkState::Closed(_) => Err(Error::Internal(format!(
                "{:?} report sink written after close",
                self.format
            ))),
        }
    }

    /// Close the sink, returning everything written to it
    ///
    /// Closing twice returns the same contents. An unreadable backing file
    /// yields empty contents and a warning.
    pub fn close(&self) -> String {
        let mut state = self.state();
        if let SinkState::Closed(contents) = &*state {
            return contents.clone();
        }

        let contents = match &mut *state {
            SinkState::Open(file) => {
                let _ = file.as_file_mut().flush();
                match std::fs::read(file.path()) {
                    Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                    Err(e) => {
                        tracing::warn!(format = ?self.format, error = %e, "Failed to read report");
                        String::new()
                    }
                }
            }
            SinkState::Closed(contents) => contents.clone(),
        };

        // Dropping the NamedTempFile deletes it
        *state = SinkState::Closed(contents.clone());
        contents
    }

    pub fn is_closed(&self) -> bool {
        matches!(&*self.state(), SinkState::Closed(_))
    }
}

/// Contents of the three sinks after close
#[derive(Debug, Clone, Default)]
pub struct Reports {
    pub text: String,
    pub html: String,
    pub json: String,
}

/// The per-run set of report sinks
#[derive(Clone)]
pub struct ReportSinks {
    pub text: ReportSink,
    pub html: ReportSink,
    pub json: ReportSink,
}

impl ReportSinks {
    pub fn create() -> Result<Self> {
        Ok(Self {
            text: ReportSink::create(ReportFormat::Text)?,
            html: ReportSink::create(ReportFormat::Html)?,
            json: ReportSink::create(ReportFormat::Json)?,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReportSink> {
        [&self.text, &self.html, &self.json].into_iter()
    }

    /// Close every sink and collect what was written
    pub fn close_all(&self) -> Reports {
        Reports {
            text: self.text.close(),
            html: self.html.close(),
            json: self.json.close(),
        }
    }

    pub fn all_closed(&self) -> bool {
        self.iter().all(ReportSink::is_closed)
    }
}

/// Counts reported by the framework's JSON formatter
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct SummaryCounts {
    #[serde(default)]
    pub example_count: u64,
    #[serde(default)]
    pub failure_count: u64,
    #[serde(default)]
    pub pending_count: u64,
    /// Load errors and hooks failing outside any example
    #[serde(default)]
    pub errors_outside_of_examples_count: u64,
    #[serde(default)]
    pub duration: Option<f64>,
}

#[derive(Deserialize)]
struct SummaryDocument {
    summary: SummaryCounts,
    #[serde(default)]
    summary_line: Option<String>,
}

/// Structured result of a run
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub counts: SummaryCounts,
    pub summary_line: Option<String>,
    /// The whole JSON document, used as the incident payload
    pub raw: serde_json::Value,
}

impl RunSummary {
    /// Parse the JSON report
    pub fn parse(json: &str) -> Result<Self> {
        if json.trim().is_empty() {
            return Err(Error::SuiteExecution(
                "test framework did not write a JSON summary".to_string(),
            ));
        }

        let raw: serde_json::Value = serde_json::from_str(json)?;
        let document: SummaryDocument = serde_json::from_value(raw.clone()).map_err(|e| {
            Error::SuiteExecution(format!("JSON summary has no usable 'summary': {}", e))
        })?;

        Ok(Self {
            counts: document.summary,
            summary_line: document.summary_line,
            raw,
        })
    }

    /// Build a summary from counts alone
    pub fn from_counts(example_count: u64, failure_count: u64) -> Self {
        let summary_line = format!("{} examples, {} failures", example_count, failure_count);
        Self {
            counts: SummaryCounts {
                example_count,
                failure_count,
                ..Default::default()
            },
            raw: serde_json::json!({
                "summary": {
                    "example_count": example_count,
                    "failure_count": failure_count,
                },
                "summary_line": summary_line,
            }),
            summary_line: Some(summary_line),
        }
    }

    pub fn failure_count(&self) -> u64 {
        self.counts.failure_count
    }

    /// A run failed if any example failed or the suite errored outside examples
    pub fn failed(&self) -> bool {
        self.counts.failure_count > 0 || self.counts.errors_outside_of_examples_count > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSPEC_JSON: &str = r#"{
        "version": "3.12.0",
        "examples": [],
        "summary": {
            "duration": 1.5,
            "example_count": 12,
            "failure_count": 2,
            "pending_count": 1,
            "errors_outside_of_examples_count": 0
        },
        "summary_line": "12 examples, 2 failures, 1 pending"
    }"#;

    #[test]
    fn test_parse_rspec_summary() {
        let summary = RunSummary::parse(RSPEC_JSON).unwrap();
        assert_eq!(summary.counts.example_count, 12);
        assert_eq!(summary.failure_count(), 2);
        assert_eq!(summary.counts.pending_count, 1);
        assert_eq!(summary.counts.duration, Some(1.5));
        assert_eq!(
            summary.summary_line.as_deref(),
            Some("12 examples, 2 failures, 1 pending")
        );
        assert_eq!(summary.raw["version"], "3.12.0");
        assert!(summary.failed());
    }

    #[test]
    fn test_failed_tracks_failure_count() {
        assert!(!RunSummary::from_counts(5, 0).failed());
        assert!(RunSummary::from_counts(5, 1).failed());
        assert!(RunSummary::from_counts(50, 17).failed());
    }

    #[test]
    fn test_errors_outside_examples_fail() {
        let summary = RunSummary::parse(
            r#"{"summary": {"example_count": 0, "failure_count": 0,
                "errors_outside_of_examples_count": 1}}"#,
        )
        .unwrap();
        assert!(summary.failed());
    }

    #[test]
    fn test_empty_or_malformed_summary() {
        assert!(matches!(
            RunSummary::parse("  "),
            Err(Error::SuiteExecution(_))
        ));
        assert!(matches!(RunSummary::parse("{not json"), Err(Error::Json(_))));
        assert!(matches!(
            RunSummary::parse(r#"{"examples": []}"#),
            Err(Error::SuiteExecution(_))
        ));
    }

    #[test]
    fn test_sink_write_and_close() {
        let sink = ReportSink::create(ReportFormat::Html).unwrap();
        let path = sink.path().unwrap();
        assert!(path.exists());
        assert!(path.to_string_lossy().ends_with(".html"));

        sink.write(b"<html>").unwrap();
        sink.write(b"</html>").unwrap();
        assert_eq!(sink.close(), "<html></html>");

        assert!(sink.is_closed());
        assert!(sink.path().is_none());
        assert!(!path.exists());
        // Idempotent
        assert_eq!(sink.close(), "<html></html>");
        assert!(sink.write(b"late").is_err());
    }

    #[test]
    fn test_sink_reads_external_writes() {
        let sink = ReportSink::create(ReportFormat::Json).unwrap();
        std::fs::write(sink.path().unwrap(), "{\"summary\":{}}").unwrap();
        assert_eq!(sink.close(), "{\"summary\":{}}");
    }

    #[test]
    fn test_close_all() {
        let sinks = ReportSinks::create().unwrap();
        sinks.text.write(b"3 examples").unwrap();
        assert!(!sinks.all_closed());

        let reports = sinks.close_all();
        assert_eq!(reports.text, "3 examples");
        assert_eq!(reports.html, "");
        assert!(sinks.all_closed());
    }
}
