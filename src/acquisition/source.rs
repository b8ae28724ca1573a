use crate::errors::FocusError;
use crate::types::{Frame, PixelFormat};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Outcome of one frame request.
#[derive(Debug)]
pub enum FrameResult {
    /// A complete frame
    Delivered(Frame),
    /// The source produced a frame slot but reports it as failed
    Failed { code: u32, description: String },
    /// Nothing arrived within the requested wait
    TimedOut,
}

/// Device settings applied before a session starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSettings {
    pub pixel_format: PixelFormat,
    /// Exposure time in microseconds
    pub exposure_time_us: f64,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            pixel_format: PixelFormat::Mono8,
            exposure_time_us: 10_000.0,
        }
    }
}

/// A camera or other producer of frames.
///
/// The source owns the frame budget: after `start_session(n)` it hands out
/// at most `n` results (delivered or failed) and then reports itself
/// inactive.
pub trait FrameSource {
    /// Human-readable device name.
    fn device_name(&self) -> String;

    fn open(&mut self) -> Result<(), FocusError>;

    fn configure(&mut self, settings: &SourceSettings) -> Result<(), FocusError>;

    fn start_session(&mut self, frame_budget: u64) -> Result<(), FocusError>;

    /// Whether the source still has frames to hand out.
    fn is_active(&self) -> bool;

    /// Block for at most `timeout` waiting for the next frame.
    ///
    /// `Err` is reserved for transport failures that end the session.
    fn retrieve_next(&mut self, timeout: Duration) -> Result<FrameResult, FocusError>;

    /// Stop grabbing. Called once when the session ends, however it ends.
    fn stop_session(&mut self) {}
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn device_name(&self) -> String {
        (**self).device_name()
    }

    fn open(&mut self) -> Result<(), FocusError> {
        (**self).open()
    }

    fn configure(&mut self, settings: &SourceSettings) -> Result<(), FocusError> {
        (**self).configure(settings)
    }

    fn start_session(&mut self, frame_budget: u64) -> Result<(), FocusError> {
        (**self).start_session(frame_budget)
    }

    fn is_active(&self) -> bool {
        (**self).is_active()
    }

    fn retrieve_next(&mut self, timeout: Duration) -> Result<FrameResult, FocusError> {
        (**self).retrieve_next(timeout)
    }

    fn stop_session(&mut self) {
        (**self).stop_session()
    }
}
