//! Live camera source
//!
//! Frames are grabbed on a background thread that owns the `nokhwa` camera
//! and pushes into a drop-oldest queue, so a slow scorer always sees the
//! most recent frame instead of a growing backlog. Per-frame decode errors
//! become [`FrameResult::Failed`]; losing the stream ends the session.

use crate::acquisition::{FrameQueue, FrameResult, FrameSource, SourceSettings};
use crate::errors::FocusError;
use crate::timing::SessionClock;
use crate::types::{Frame, PixelFormat};
use nokhwa::{
    pixel_format::{LumaFormat, RgbFormat},
    query,
    utils::{
        ApiBackend, CameraIndex, ControlValueSetter, KnownCameraControl, RequestedFormat,
        RequestedFormatType,
    },
    Buffer, Camera,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Code reported for a frame the camera delivered but that could not be decoded.
pub const DECODE_FAILURE_CODE: u32 = 0xE100_0001;

const GRAB_QUEUE_CAPACITY: usize = 2;
const STARTUP_TIMEOUT: Duration = Duration::from_secs(10);

/// A camera the platform backend can open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEntry {
    pub index: u32,
    pub name: String,
}

/// List available cameras.
pub fn list_cameras() -> Result<Vec<DeviceEntry>, FocusError> {
    let cameras = query(ApiBackend::Auto)
        .map_err(|e| FocusError::device(format!("Failed to query cameras: {}", e)))?;
    Ok(cameras
        .into_iter()
        .enumerate()
        .map(|(position, info)| DeviceEntry {
            index: match info.index() {
                CameraIndex::Index(index) => *index,
                CameraIndex::String(_) => position as u32,
            },
            name: info.human_name(),
        })
        .collect())
}

enum Grab {
    Frame(Frame),
    Failed { code: u32, description: String },
    Lost(String),
}

pub struct CameraSource {
    index: u32,
    name: Option<String>,
    settings: SourceSettings,
    queue: Option<Arc<FrameQueue<Grab>>>,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    budget: u64,
    handed_out: u64,
}

impl CameraSource {
    pub fn new(index: u32) -> Self {
        Self {
            index,
            name: None,
            settings: SourceSettings::default(),
            queue: None,
            stop: Arc::new(AtomicBool::new(false)),
            worker: None,
            budget: 0,
            handed_out: 0,
        }
    }

    /// Frames dropped because the scorer fell behind the camera.
    pub fn dropped_frames(&self) -> u64 {
        self.queue.as_ref().map_or(0, |q| q.dropped())
    }

    fn shutdown_worker(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(queue) = self.queue.take() {
            queue.close();
        }
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::warn!("Camera grab thread panicked");
            }
        }
    }
}

impl FrameSource for CameraSource {
    fn device_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("Camera {}", self.index))
    }

    fn open(&mut self) -> Result<(), FocusError> {
        let entry = list_cameras()?
            .into_iter()
            .find(|entry| entry.index == self.index)
            .ok_or_else(|| FocusError::device(format!("No camera at index {}", self.index)))?;
        self.name = Some(entry.name);
        Ok(())
    }

    fn configure(&mut self, settings: &SourceSettings) -> Result<(), FocusError> {
        match settings.pixel_format {
            PixelFormat::Mono8 | PixelFormat::Rgb8 => {
                self.settings = settings.clone();
                Ok(())
            }
            other => Err(FocusError::UnsupportedEncoding(format!(
                "{} (camera frames decode to Mono8 or RGB8)",
                other
            ))),
        }
    }

    fn start_session(&mut self, frame_budget: u64) -> Result<(), FocusError> {
        self.shutdown_worker();
        self.stop = Arc::new(AtomicBool::new(false));
        self.budget = frame_budget;
        self.handed_out = 0;

        let queue = Arc::new(FrameQueue::new(GRAB_QUEUE_CAPACITY));
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);
        let worker = {
            let queue = Arc::clone(&queue);
            let stop = Arc::clone(&self.stop);
            let index = self.index;
            let settings = self.settings.clone();
            std::thread::Builder::new()
                .name("crabfocus-grab".to_string())
                .spawn(move || grab_loop(index, settings, &queue, &stop, ready_tx))
                .map_err(|e| FocusError::device(format!("Failed to spawn grab thread: {}", e)))?
        };
        self.queue = Some(queue);
        self.worker = Some(worker);

        let started = ready_rx
            .recv_timeout(STARTUP_TIMEOUT)
            .map_err(|_| FocusError::device("Camera did not start streaming in time"))
            .and_then(|result| result);
        if let Err(error) = started {
            self.shutdown_worker();
            return Err(error);
        }
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.queue.is_some() && self.handed_out < self.budget
    }

    fn retrieve_next(&mut self, timeout: Duration) -> Result<FrameResult, FocusError> {
        let queue = self
            .queue
            .as_ref()
            .ok_or_else(|| FocusError::device("No capture session in progress"))?;

        match queue.pop_timeout(timeout) {
            Ok(Some(Grab::Frame(frame))) => {
                self.handed_out += 1;
                Ok(FrameResult::Delivered(frame))
            }
            Ok(Some(Grab::Failed { code, description })) => {
                self.handed_out += 1;
                Ok(FrameResult::Failed { code, description })
            }
            Ok(Some(Grab::Lost(description))) => Err(FocusError::disconnected(description)),
            Ok(None) => Ok(FrameResult::TimedOut),
            Err(_) => Err(FocusError::disconnected("Camera stream closed")),
        }
    }

    fn stop_session(&mut self) {
        let dropped = self.dropped_frames();
        self.shutdown_worker();
        if dropped > 0 {
            log::info!("Camera dropped {} frames while scoring", dropped);
        }
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        self.shutdown_worker();
    }
}

fn open_camera(index: u32, settings: &SourceSettings) -> Result<Camera, FocusError> {
    let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);
    let mut camera = Camera::new(CameraIndex::Index(index), requested)
        .map_err(|e| FocusError::device(format!("Failed to initialize camera: {}", e)))?;

    // Exposure control is optional hardware; V4L2-style backends count in 100 µs units.
    let exposure = (settings.exposure_time_us / 100.0).round() as i64;
    if let Err(e) =
        camera.set_camera_control(KnownCameraControl::Exposure, ControlValueSetter::Integer(exposure))
    {
        log::warn!("Could not set exposure to {} us: {}", settings.exposure_time_us, e);
    }

    camera
        .open_stream()
        .map_err(|e| FocusError::device(format!("Failed to start stream: {}", e)))?;
    Ok(camera)
}

fn decode(buffer: &Buffer, format: PixelFormat) -> Result<Frame, String> {
    let resolution = buffer.resolution();
    let (width, height) = (resolution.width_x, resolution.height_y);
    let data = match format {
        PixelFormat::Rgb8 => buffer.decode_image::<RgbFormat>().map(|img| img.into_raw()),
        _ => buffer.decode_image::<LumaFormat>().map(|img| img.into_raw()),
    }
    .map_err(|e| e.to_string())?;
    Frame::new(width, height, format, data).map_err(|e| e.to_string())
}

fn grab_loop(
    index: u32,
    settings: SourceSettings,
    queue: &FrameQueue<Grab>,
    stop: &AtomicBool,
    ready: mpsc::SyncSender<Result<(), FocusError>>,
) {
    let mut camera = match open_camera(index, &settings) {
        Ok(camera) => {
            let _ = ready.send(Ok(()));
            camera
        }
        Err(error) => {
            let _ = ready.send(Err(error));
            return;
        }
    };

    let clock = SessionClock::new();
    let mut sequence = 0u64;
    while !stop.load(Ordering::SeqCst) {
        let grabbed = match camera.frame() {
            Ok(buffer) => {
                sequence += 1;
                match decode(&buffer, settings.pixel_format) {
                    Ok(frame) => Grab::Frame(
                        frame
                            .with_sequence(sequence)
                            .with_timestamp_us(clock.micros()),
                    ),
                    Err(description) => Grab::Failed {
                        code: DECODE_FAILURE_CODE,
                        description,
                    },
                }
            }
            Err(e) => {
                let _ = queue.push_drop_oldest(Grab::Lost(format!("Failed to capture frame: {}", e)));
                break;
            }
        };
        if queue.push_drop_oldest(grabbed).is_err() {
            break;
        }
    }

    if let Err(e) = camera.stop_stream() {
        log::warn!("Failed to stop camera stream: {}", e);
    }
}
