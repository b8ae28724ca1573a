use super::display::{DisplaySink, DisplaySlot, NoDisplay};
use super::report::{FocusReport, FrameFailure, ReportSink};
use super::source::{FrameResult, FrameSource, SourceSettings};
use crate::errors::FocusError;
use crate::focus::{BestFocusTracker, FocusMeter, Measurement, ResponseMode, RoiSpec};
use crate::timing::SessionClock;
use crate::types::Frame;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Loop state, observable between iterations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Requesting or scoring frames
    Running,
    /// The last request returned a source-reported failure; the loop carries on
    FrameFailed,
    /// Terminal: budget spent, cancelled, or failed
    Stopped,
}

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The configured number of frames was requested
    #[default]
    BudgetExhausted,
    /// The source stopped handing out frames before the budget was spent
    SourceExhausted,
    /// A [`CancelToken`] fired
    Cancelled,
    /// A fatal error ended the session
    Fatal,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::BudgetExhausted => write!(f, "frame budget exhausted"),
            StopReason::SourceExhausted => write!(f, "source exhausted"),
            StopReason::Cancelled => write!(f, "cancelled"),
            StopReason::Fatal => write!(f, "fatal error"),
        }
    }
}

/// What a session did, reported when it ends however it ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SessionSummary {
    pub started_at: DateTime<Utc>,
    /// Delivered plus source-failed frames; timeouts are not counted
    pub frames_requested: u64,
    pub frames_scored: u64,
    pub frames_failed: u64,
    pub best_focus: f64,
    pub last_focus: Option<f64>,
    pub stop_reason: StopReason,
    pub elapsed_ms: u64,
}

/// A session that ended on a fatal error. The summary keeps the best focus
/// level reached before the failure.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Focus session aborted after {} frames: {error}", .summary.frames_requested)]
pub struct SessionFailure {
    pub error: FocusError,
    pub summary: SessionSummary,
}

/// Stop request shared with whoever may want to end the session early.
/// Honoured between frames only.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Session parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub frame_budget: u64,
    pub retrieve_timeout: Duration,
    pub roi: RoiSpec,
    pub response: ResponseMode,
    pub source: SourceSettings,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            frame_budget: 10_000,
            retrieve_timeout: Duration::from_millis(5000),
            roi: RoiSpec::default(),
            response: ResponseMode::default(),
            source: SourceSettings::default(),
        }
    }
}

impl SessionConfig {
    pub fn with_frame_budget(mut self, frame_budget: u64) -> Self {
        self.frame_budget = frame_budget;
        self
    }

    pub fn with_retrieve_timeout(mut self, timeout: Duration) -> Self {
        self.retrieve_timeout = timeout;
        self
    }

    pub fn with_roi(mut self, roi: RoiSpec) -> Self {
        self.roi = roi;
        self
    }

    pub fn meter(&self) -> FocusMeter {
        FocusMeter::new(self.roi, self.response)
    }

    fn timeout_ms(&self) -> u64 {
        u64::try_from(self.retrieve_timeout.as_millis()).unwrap_or(u64::MAX)
    }

    pub(crate) fn timeout_error(&self) -> FocusError {
        FocusError::timeout(self.timeout_ms())
    }
}

/// Counters and reporting shared by the synchronous and pipelined loops.
pub(crate) struct Ledger {
    summary: SessionSummary,
    clock: SessionClock,
}

impl Ledger {
    pub(crate) fn start() -> Self {
        Self {
            summary: SessionSummary {
                started_at: Utc::now(),
                ..SessionSummary::default()
            },
            clock: SessionClock::new(),
        }
    }

    pub(crate) fn summary(&self) -> &SessionSummary {
        &self.summary
    }

    pub(crate) fn record_failure<R: ReportSink>(
        &mut self,
        reporter: &mut R,
        code: u32,
        description: String,
    ) {
        self.summary.frames_requested += 1;
        self.summary.frames_failed += 1;
        let failure = FrameFailure {
            sequence: self.summary.frames_requested,
            code,
            description,
        };
        log::warn!("Frame {}: {}", failure.sequence, failure.to_error());
        reporter.frame_failed(&failure);
    }

    /// Count a delivered frame before it is measured.
    pub(crate) fn record_delivery(&mut self) {
        self.summary.frames_requested += 1;
    }

    pub(crate) fn record_measurement<R: ReportSink>(
        &mut self,
        reporter: &mut R,
        measurement: &Measurement,
        best: f64,
    ) {
        self.summary.frames_scored += 1;
        self.summary.last_focus = Some(measurement.level);
        self.summary.best_focus = best;
        let report = FocusReport {
            sequence: self.summary.frames_requested,
            timestamp_s: self.clock.seconds(),
            roi: measurement.roi,
            current: measurement.level,
            best,
        };
        log::debug!(
            "Frame {} roi {} focus {:.3} best {:.3}",
            report.sequence,
            report.roi,
            report.current,
            report.best
        );
        reporter.focus_measured(&report);
    }

    pub(crate) fn finish<R: ReportSink>(
        mut self,
        reporter: &mut R,
        outcome: Result<StopReason, FocusError>,
    ) -> Result<SessionSummary, SessionFailure> {
        self.summary.elapsed_ms = u64::try_from(self.clock.elapsed().as_millis()).unwrap_or(u64::MAX);
        match outcome {
            Ok(reason) => {
                self.summary.stop_reason = reason;
                log::info!(
                    "Focus session stopped ({}): best {:.3} over {} frames",
                    reason,
                    self.summary.best_focus,
                    self.summary.frames_scored
                );
                reporter.session_ended(&self.summary, None);
                Ok(self.summary)
            }
            Err(error) => {
                self.summary.stop_reason = StopReason::Fatal;
                log::error!(
                    "Focus session aborted [{}]: {} (best so far {:.3})",
                    error.code(),
                    error,
                    self.summary.best_focus
                );
                reporter.session_ended(&self.summary, Some(&error));
                Err(SessionFailure {
                    error,
                    summary: self.summary,
                })
            }
        }
    }
}

/// Open, configure and start `source` for a session.
pub(crate) fn prepare_source<S: FrameSource + ?Sized>(
    source: &mut S,
    config: &SessionConfig,
) -> Result<(), FocusError> {
    source.open()?;
    log::info!("Using device {}", source.device_name());
    source.configure(&config.source)?;
    source.start_session(config.frame_budget)?;
    log::info!(
        "Focus session started: budget {} frames, timeout {:?}, roi {}x{} ({:?})",
        config.frame_budget,
        config.retrieve_timeout,
        config.roi.width,
        config.roi.height,
        config.roi.placement
    );
    Ok(())
}

/// Synchronous acquisition loop: request, measure, report, repeat.
pub struct FocusSession<S, R, D = NoDisplay> {
    source: S,
    reporter: R,
    display: D,
    config: SessionConfig,
    meter: FocusMeter,
    tracker: BestFocusTracker,
    state: LoopState,
    cancel: CancelToken,
}

impl<S: FrameSource, R: ReportSink> FocusSession<S, R, NoDisplay> {
    pub fn new(source: S, reporter: R, config: SessionConfig) -> Self {
        let meter = config.meter();
        Self {
            source,
            reporter,
            display: NoDisplay,
            config,
            meter,
            tracker: BestFocusTracker::new(),
            state: LoopState::Running,
            cancel: CancelToken::new(),
        }
    }
}

impl<S: FrameSource, R: ReportSink, D: DisplaySink> FocusSession<S, R, D> {
    pub fn with_display<D2: DisplaySink>(self, display: D2) -> FocusSession<S, R, D2> {
        FocusSession {
            source: self.source,
            reporter: self.reporter,
            display,
            config: self.config,
            meter: self.meter,
            tracker: self.tracker,
            state: self.state,
            cancel: self.cancel,
        }
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn best_focus(&self) -> f64 {
        self.tracker.best()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    pub fn into_parts(self) -> (S, R, D) {
        (self.source, self.reporter, self.display)
    }

    /// Run one session to completion.
    ///
    /// Each call starts a fresh session with the best focus reset to 0. On a
    /// fatal error the returned [`SessionFailure`] still carries the summary,
    /// and the reporter has already been handed the final best value.
    pub fn run(&mut self) -> Result<SessionSummary, SessionFailure> {
        self.tracker = BestFocusTracker::new();
        self.state = LoopState::Running;

        let mut ledger = Ledger::start();
        let outcome = match prepare_source(&mut self.source, &self.config) {
            Ok(()) => {
                self.reporter.session_started(&self.source.device_name());
                self.acquire(&mut ledger)
            }
            Err(error) => Err(error),
        };

        self.source.stop_session();
        self.state = LoopState::Stopped;
        ledger.finish(&mut self.reporter, outcome)
    }

    fn acquire(&mut self, ledger: &mut Ledger) -> Result<StopReason, FocusError> {
        loop {
            if self.cancel.is_cancelled() {
                return Ok(StopReason::Cancelled);
            }
            if ledger.summary().frames_requested >= self.config.frame_budget {
                return Ok(StopReason::BudgetExhausted);
            }
            if !self.source.is_active() {
                return Ok(StopReason::SourceExhausted);
            }

            match self.source.retrieve_next(self.config.retrieve_timeout)? {
                FrameResult::TimedOut => return Err(self.config.timeout_error()),
                FrameResult::Failed { code, description } => {
                    self.state = LoopState::FrameFailed;
                    ledger.record_failure(&mut self.reporter, code, description);
                }
                FrameResult::Delivered(frame) => {
                    self.state = LoopState::Running;
                    ledger.record_delivery();
                    self.process(ledger, frame)?;
                }
            }
        }
    }

    fn process(&mut self, ledger: &mut Ledger, frame: Frame) -> Result<(), FocusError> {
        self.display.show(DisplaySlot::FullFrame, &frame);
        let measurement = self.meter.measure(&frame)?;
        drop(frame);
        self.display.show(DisplaySlot::Region, &measurement.region);

        let best = self.tracker.update(measurement.level);
        ledger.record_measurement(&mut self.reporter, &measurement, best);
        Ok(())
    }
}
