//! Scripted frame source
//!
//! Replays a fixed list of outcomes, one per frame request. Lets tests pin
//! down exactly which frames arrive, which fail and where the transport
//! gives out.

use crate::acquisition::{CancelToken, FrameResult, FrameSource, SourceSettings};
use crate::errors::FocusError;
use crate::types::Frame;
use std::collections::VecDeque;
use std::time::Duration;

/// One scripted answer to `retrieve_next`.
#[derive(Debug, Clone)]
pub enum ScriptedOutcome {
    Frame(Frame),
    Failed { code: u32, description: String },
    TimedOut,
    /// Returned as `Err` from `retrieve_next`
    Fatal(FocusError),
}

impl ScriptedOutcome {
    pub fn failed(code: u32, description: impl Into<String>) -> Self {
        ScriptedOutcome::Failed {
            code,
            description: description.into(),
        }
    }
}

impl From<Frame> for ScriptedOutcome {
    fn from(frame: Frame) -> Self {
        ScriptedOutcome::Frame(frame)
    }
}

#[derive(Debug)]
pub struct ScriptedSource {
    name: String,
    script: VecDeque<ScriptedOutcome>,
    open_error: Option<FocusError>,
    cancel_after: Option<(u64, CancelToken)>,
    settings: Option<SourceSettings>,
    started: bool,
    budget: u64,
    handed_out: u64,
    retrieve_calls: u64,
    stop_calls: u32,
}

impl ScriptedSource {
    pub fn new<I>(outcomes: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<ScriptedOutcome>,
    {
        Self {
            name: "Scripted source".to_string(),
            script: outcomes.into_iter().map(Into::into).collect(),
            open_error: None,
            cancel_after: None,
            settings: None,
            started: false,
            budget: 0,
            handed_out: 0,
            retrieve_calls: 0,
            stop_calls: 0,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Make `open` fail with `error`.
    pub fn with_open_error(mut self, error: FocusError) -> Self {
        self.open_error = Some(error);
        self
    }

    /// Fire `token` once `results` frames (delivered or failed) have been handed out.
    pub fn with_cancel_after(mut self, results: u64, token: CancelToken) -> Self {
        self.cancel_after = Some((results, token));
        self
    }

    /// Settings applied by the last `configure` call.
    pub fn settings(&self) -> Option<&SourceSettings> {
        self.settings.as_ref()
    }

    pub fn remaining(&self) -> usize {
        self.script.len()
    }

    pub fn retrieve_calls(&self) -> u64 {
        self.retrieve_calls
    }

    pub fn stop_calls(&self) -> u32 {
        self.stop_calls
    }

    fn handed_out_one(&mut self) {
        self.handed_out += 1;
        if let Some((after, token)) = &self.cancel_after {
            if self.handed_out >= *after {
                token.cancel();
            }
        }
    }
}

impl FrameSource for ScriptedSource {
    fn device_name(&self) -> String {
        self.name.clone()
    }

    fn open(&mut self) -> Result<(), FocusError> {
        match self.open_error.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn configure(&mut self, settings: &SourceSettings) -> Result<(), FocusError> {
        self.settings = Some(settings.clone());
        Ok(())
    }

    fn start_session(&mut self, frame_budget: u64) -> Result<(), FocusError> {
        self.started = true;
        self.budget = frame_budget;
        self.handed_out = 0;
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.started && self.handed_out < self.budget && !self.script.is_empty()
    }

    fn retrieve_next(&mut self, _timeout: Duration) -> Result<FrameResult, FocusError> {
        self.retrieve_calls += 1;
        match self.script.pop_front() {
            Some(ScriptedOutcome::Frame(frame)) => {
                self.handed_out_one();
                let frame = if frame.sequence == 0 {
                    frame.with_sequence(self.handed_out)
                } else {
                    frame
                };
                Ok(FrameResult::Delivered(frame))
            }
            Some(ScriptedOutcome::Failed { code, description }) => {
                self.handed_out_one();
                Ok(FrameResult::Failed { code, description })
            }
            Some(ScriptedOutcome::TimedOut) | None => Ok(FrameResult::TimedOut),
            Some(ScriptedOutcome::Fatal(error)) => Err(error),
        }
    }

    fn stop_session(&mut self) {
        self.started = false;
        self.stop_calls += 1;
    }
}
