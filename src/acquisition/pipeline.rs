//! Pipelined acquisition
//!
//! Frame k+1 is grabbed on a capture thread while frame k is scored on the
//! caller's thread. The two are joined by a bounded blocking queue, so every
//! grabbed frame is scored and reports still come out in arrival order.
//! The best value lives in a [`SharedBestFocus`] that other threads can read
//! while the session runs.

use super::display::{DisplaySink, DisplaySlot, NoDisplay};
use super::queue::FrameQueue;
use super::report::ReportSink;
use super::session::{
    prepare_source, CancelToken, Ledger, SessionConfig, SessionFailure, SessionSummary, StopReason,
};
use super::source::{FrameResult, FrameSource};
use crate::errors::FocusError;
use crate::focus::{FocusMeter, SharedBestFocus};
use crate::types::Frame;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;

/// Default depth of the capture queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 4;

enum Grabbed {
    Frame(Frame),
    Failed { code: u32, description: String },
    Ended(Result<StopReason, FocusError>),
}

/// Two-thread variant of [`FocusSession`](super::session::FocusSession).
pub struct PipelinedSession<S, R, D = NoDisplay> {
    source: Option<S>,
    reporter: R,
    display: D,
    config: SessionConfig,
    meter: FocusMeter,
    queue_capacity: usize,
    best: SharedBestFocus,
    cancel: CancelToken,
}

impl<S, R> PipelinedSession<S, R, NoDisplay>
where
    S: FrameSource + Send + 'static,
    R: ReportSink,
{
    pub fn new(source: S, reporter: R, config: SessionConfig) -> Self {
        let meter = config.meter();
        Self {
            source: Some(source),
            reporter,
            display: NoDisplay,
            config,
            meter,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            best: SharedBestFocus::new(),
            cancel: CancelToken::new(),
        }
    }
}

impl<S, R, D> PipelinedSession<S, R, D>
where
    S: FrameSource + Send + 'static,
    R: ReportSink,
    D: DisplaySink,
{
    pub fn with_display<D2: DisplaySink>(self, display: D2) -> PipelinedSession<S, R, D2> {
        PipelinedSession {
            source: self.source,
            reporter: self.reporter,
            display,
            config: self.config,
            meter: self.meter,
            queue_capacity: self.queue_capacity,
            best: self.best,
            cancel: self.cancel,
        }
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Live view of the best focus level, readable from any thread.
    pub fn best_focus_handle(&self) -> SharedBestFocus {
        self.best.clone()
    }

    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    /// The source, or `None` once a panicking capture thread took it down.
    pub fn into_parts(self) -> (Option<S>, R, D) {
        (self.source, self.reporter, self.display)
    }

    /// Run one session to completion. See [`FocusSession::run`](super::session::FocusSession::run).
    pub fn run(&mut self) -> Result<SessionSummary, SessionFailure> {
        self.best.restart();
        let mut ledger = Ledger::start();

        let mut source = match self.source.take() {
            Some(source) => source,
            None => {
                let error = FocusError::disconnected("frame source was lost by an earlier session");
                return ledger.finish(&mut self.reporter, Err(error));
            }
        };

        if let Err(error) = prepare_source(&mut source, &self.config) {
            source.stop_session();
            self.source = Some(source);
            return ledger.finish(&mut self.reporter, Err(error));
        }
        self.reporter.session_started(&source.device_name());

        let queue = Arc::new(FrameQueue::new(self.queue_capacity));
        let abort = Arc::new(AtomicBool::new(false));
        let capture = spawn_capture(
            source,
            Arc::clone(&queue),
            self.cancel.clone(),
            Arc::clone(&abort),
            self.config.clone(),
        );
        let capture = match capture {
            Ok(handle) => handle,
            Err((mut source, error)) => {
                source.stop_session();
                self.source = Some(source);
                return ledger.finish(&mut self.reporter, Err(error));
            }
        };

        let outcome = self.consume(&queue, &mut ledger);
        if outcome.is_err() {
            abort.store(true, Ordering::SeqCst);
        }
        queue.close();

        let outcome = match capture.join() {
            Ok(Some(source)) => {
                self.source = Some(source);
                outcome
            }
            Ok(None) => outcome.and(Err(FocusError::device("frame source was never captured"))),
            Err(_) => outcome.and(Err(FocusError::device("capture thread panicked"))),
        };
        ledger.finish(&mut self.reporter, outcome)
    }

    fn consume(
        &mut self,
        queue: &FrameQueue<Grabbed>,
        ledger: &mut Ledger,
    ) -> Result<StopReason, FocusError> {
        loop {
            let grabbed = queue
                .pop()
                .map_err(|_| FocusError::disconnected("capture queue closed unexpectedly"))?;
            match grabbed {
                Grabbed::Frame(frame) => {
                    ledger.record_delivery();
                    self.display.show(DisplaySlot::FullFrame, &frame);
                    let measurement = self.meter.measure(&frame)?;
                    drop(frame);
                    self.display.show(DisplaySlot::Region, &measurement.region);
                    let best = self.best.update(measurement.level);
                    ledger.record_measurement(&mut self.reporter, &measurement, best);
                }
                Grabbed::Failed { code, description } => {
                    ledger.record_failure(&mut self.reporter, code, description);
                }
                Grabbed::Ended(outcome) => return outcome,
            }
        }
    }
}

/// Hands the source to a new capture thread. The source only moves once the
/// thread is running, so a failed spawn gives it back.
fn spawn_capture<S>(
    source: S,
    queue: Arc<FrameQueue<Grabbed>>,
    cancel: CancelToken,
    abort: Arc<AtomicBool>,
    config: SessionConfig,
) -> Result<JoinHandle<Option<S>>, (S, FocusError)>
where
    S: FrameSource + Send + 'static,
{
    let (handoff, receiver) = mpsc::channel::<S>();
    let spawned = std::thread::Builder::new()
        .name("crabfocus-capture".to_string())
        .spawn(move || {
            let mut guard = CaptureGuard {
                queue: &queue,
                finished: false,
            };
            let source = receiver.recv().ok()?;
            let source = capture_loop(source, &queue, &cancel, &abort, &config);
            guard.finished = true;
            Some(source)
        });

    let handle = match spawned {
        Ok(handle) => handle,
        Err(e) => {
            return Err((
                source,
                FocusError::device(format!("failed to spawn capture thread: {e}")),
            ))
        }
    };
    match handoff.send(source) {
        Ok(()) => Ok(handle),
        Err(mpsc::SendError(source)) => Err((
            source,
            FocusError::device("capture thread exited before receiving the frame source"),
        )),
    }
}

/// Ends the consumer's wait when the capture thread leaves without its
/// final `Ended`, e.g. when the source panics mid-grab.
struct CaptureGuard<'a> {
    queue: &'a FrameQueue<Grabbed>,
    finished: bool,
}

impl Drop for CaptureGuard<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let error = if std::thread::panicking() {
            FocusError::device("capture thread panicked")
        } else {
            FocusError::device("capture thread stopped without a frame source")
        };
        log::error!("{}", error);
        // A closed queue means the consumer already stopped listening.
        let _ = self.queue.push_blocking(Grabbed::Ended(Err(error)));
    }
}

fn capture_loop<S: FrameSource>(
    mut source: S,
    queue: &FrameQueue<Grabbed>,
    cancel: &CancelToken,
    abort: &AtomicBool,
    config: &SessionConfig,
) -> S {
    let mut requested = 0u64;
    let outcome = loop {
        if abort.load(Ordering::SeqCst) {
            break Ok(StopReason::Fatal);
        }
        if cancel.is_cancelled() {
            break Ok(StopReason::Cancelled);
        }
        if requested >= config.frame_budget {
            break Ok(StopReason::BudgetExhausted);
        }
        if !source.is_active() {
            break Ok(StopReason::SourceExhausted);
        }

        let grabbed = match source.retrieve_next(config.retrieve_timeout) {
            Ok(FrameResult::Delivered(frame)) => Grabbed::Frame(frame),
            Ok(FrameResult::Failed { code, description }) => Grabbed::Failed { code, description },
            Ok(FrameResult::TimedOut) => break Err(config.timeout_error()),
            Err(error) => break Err(error),
        };
        requested += 1;
        if queue.push_blocking(grabbed).is_err() {
            break Ok(StopReason::Fatal);
        }
    };

    source.stop_session();
    // The consumer has gone away when the queue is closed; nothing left to tell it.
    let _ = queue.push_blocking(Grabbed::Ended(outcome));
    source
}
