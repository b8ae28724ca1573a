//! Reporting sinks
//!
//! The acquisition loop reports every scored frame, every source-reported
//! frame failure, and finally the session summary, strictly in arrival order.

use super::session::SessionSummary;
use crate::errors::FocusError;
use crate::types::Roi;
use serde::{Deserialize, Serialize};
use std::io::{self, Write};

/// Focus measurement for one delivered frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocusReport {
    pub sequence: u64,
    /// Seconds since the session started
    pub timestamp_s: f64,
    pub roi: Roi,
    pub current: f64,
    pub best: f64,
}

/// A frame the source delivered as failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameFailure {
    pub sequence: u64,
    pub code: u32,
    pub description: String,
}

impl FrameFailure {
    /// The failure as a recoverable [`FocusError::FrameCapture`].
    pub fn to_error(&self) -> FocusError {
        FocusError::FrameCapture {
            code: self.code,
            description: self.description.clone(),
        }
    }
}

/// Code and message of the error that ended a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl From<&FocusError> for ErrorInfo {
    fn from(error: &FocusError) -> Self {
        Self {
            code: error.code().to_string(),
            message: error.to_string(),
        }
    }
}

/// Everything a sink can be told, in owned form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ReportEvent {
    SessionStarted { device: String },
    Focus(FocusReport),
    FrameFailed(FrameFailure),
    SessionEnded {
        summary: SessionSummary,
        error: Option<ErrorInfo>,
    },
}

/// Receiver of acquisition results.
pub trait ReportSink {
    /// Called once the source is open and streaming.
    fn session_started(&mut self, _device: &str) {}

    fn focus_measured(&mut self, report: &FocusReport);

    fn frame_failed(&mut self, failure: &FrameFailure);

    /// Called exactly once per session, including when it ends on a fatal error.
    fn session_ended(&mut self, _summary: &SessionSummary, _error: Option<&FocusError>) {}
}

impl<R: ReportSink + ?Sized> ReportSink for &mut R {
    fn session_started(&mut self, device: &str) {
        (**self).session_started(device)
    }

    fn focus_measured(&mut self, report: &FocusReport) {
        (**self).focus_measured(report)
    }

    fn frame_failed(&mut self, failure: &FrameFailure) {
        (**self).frame_failed(failure)
    }

    fn session_ended(&mut self, summary: &SessionSummary, error: Option<&FocusError>) {
        (**self).session_ended(summary, error)
    }
}

impl<R: ReportSink + ?Sized> ReportSink for Box<R> {
    fn session_started(&mut self, device: &str) {
        (**self).session_started(device)
    }

    fn focus_measured(&mut self, report: &FocusReport) {
        (**self).focus_measured(report)
    }

    fn frame_failed(&mut self, failure: &FrameFailure) {
        (**self).frame_failed(failure)
    }

    fn session_ended(&mut self, summary: &SessionSummary, error: Option<&FocusError>) {
        (**self).session_ended(summary, error)
    }
}

/// Operator console output, one line per frame.
pub struct TextReporter<W: Write> {
    out: W,
}

impl TextReporter<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> TextReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, line: std::fmt::Arguments<'_>) {
        if let Err(e) = self.out.write_fmt(line).and_then(|_| self.out.flush()) {
            log::warn!("Failed to write focus report: {}", e);
        }
    }
}

impl<W: Write> ReportSink for TextReporter<W> {
    fn session_started(&mut self, device: &str) {
        self.emit(format_args!("Using device {}\n", device));
    }

    fn focus_measured(&mut self, report: &FocusReport) {
        self.emit(format_args!(
            "Current Focus: {:>16.3} Best Focus So Far: {:>16.3}\n",
            report.current, report.best
        ));
    }

    fn frame_failed(&mut self, failure: &FrameFailure) {
        self.emit(format_args!(
            "Error: {} {}\n",
            failure.code, failure.description
        ));
    }

    fn session_ended(&mut self, summary: &SessionSummary, error: Option<&FocusError>) {
        if let Some(error) = error {
            self.emit(format_args!(
                "Session aborted [{}]: {}\n",
                error.code(),
                error
            ));
        }
        self.emit(format_args!(
            "Best Focus: {:.3} ({} scored, {} failed, {})\n",
            summary.best_focus, summary.frames_scored, summary.frames_failed, summary.stop_reason
        ));
    }
}

/// Newline-delimited JSON, one [`ReportEvent`] per line.
pub struct JsonLinesReporter<W: Write> {
    out: W,
}

impl JsonLinesReporter<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> JsonLinesReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, event: &ReportEvent) {
        let written = serde_json::to_writer(&mut self.out, event)
            .map_err(io::Error::from)
            .and_then(|_| self.out.write_all(b"\n"))
            .and_then(|_| self.out.flush());
        if let Err(e) = written {
            log::warn!("Failed to write JSON report: {}", e);
        }
    }
}

impl<W: Write> ReportSink for JsonLinesReporter<W> {
    fn session_started(&mut self, device: &str) {
        self.emit(&ReportEvent::SessionStarted {
            device: device.to_string(),
        });
    }

    fn focus_measured(&mut self, report: &FocusReport) {
        self.emit(&ReportEvent::Focus(report.clone()));
    }

    fn frame_failed(&mut self, failure: &FrameFailure) {
        self.emit(&ReportEvent::FrameFailed(failure.clone()));
    }

    fn session_ended(&mut self, summary: &SessionSummary, error: Option<&FocusError>) {
        self.emit(&ReportEvent::SessionEnded {
            summary: summary.clone(),
            error: error.map(ErrorInfo::from),
        });
    }
}
