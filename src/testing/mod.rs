//! Testing utilities for CrabFocus
//!
//! Hardware-free frame sources plus sinks that remember what they were told,
//! for exercising acquisition sessions offline.

pub mod scripted;
pub mod synthetic_data;

pub use scripted::{ScriptedOutcome, ScriptedSource};
pub use synthetic_data::{
    encode_gray, focus_target, sweep_sigma, SyntheticConfig, SyntheticFocusSource,
    INCOMPLETE_FRAME_CODE,
};

use crate::acquisition::{
    DisplaySink, DisplaySlot, ErrorInfo, FocusReport, FrameFailure, ReportEvent, ReportSink,
    SessionSummary,
};
use crate::errors::FocusError;
use crate::types::Frame;

/// Report sink that keeps every event in order.
#[derive(Debug, Clone, Default)]
pub struct CollectingReporter {
    pub events: Vec<ReportEvent>,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn focus_reports(&self) -> Vec<&FocusReport> {
        self.events
            .iter()
            .filter_map(|event| match event {
                ReportEvent::Focus(report) => Some(report),
                _ => None,
            })
            .collect()
    }

    /// (current, best) pairs, in report order.
    pub fn levels(&self) -> Vec<(f64, f64)> {
        self.focus_reports()
            .into_iter()
            .map(|r| (r.current, r.best))
            .collect()
    }

    pub fn failures(&self) -> Vec<&FrameFailure> {
        self.events
            .iter()
            .filter_map(|event| match event {
                ReportEvent::FrameFailed(failure) => Some(failure),
                _ => None,
            })
            .collect()
    }

    pub fn session_end(&self) -> Option<(&SessionSummary, Option<&ErrorInfo>)> {
        self.events.iter().rev().find_map(|event| match event {
            ReportEvent::SessionEnded { summary, error } => Some((summary, error.as_ref())),
            _ => None,
        })
    }
}

impl ReportSink for CollectingReporter {
    fn session_started(&mut self, device: &str) {
        self.events.push(ReportEvent::SessionStarted {
            device: device.to_string(),
        });
    }

    fn focus_measured(&mut self, report: &FocusReport) {
        self.events.push(ReportEvent::Focus(report.clone()));
    }

    fn frame_failed(&mut self, failure: &FrameFailure) {
        self.events.push(ReportEvent::FrameFailed(failure.clone()));
    }

    fn session_ended(&mut self, summary: &SessionSummary, error: Option<&FocusError>) {
        self.events.push(ReportEvent::SessionEnded {
            summary: summary.clone(),
            error: error.map(ErrorInfo::from),
        });
    }
}

/// Display sink that records what it was shown: slot and image size.
#[derive(Debug, Clone, Default)]
pub struct RecordingDisplay {
    pub shown: Vec<(DisplaySlot, u32, u32)>,
}

impl DisplaySink for RecordingDisplay {
    fn show(&mut self, slot: DisplaySlot, image: &Frame) {
        self.shown.push((slot, image.width(), image.height()));
    }
}
