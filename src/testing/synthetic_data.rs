//! Synthetic focus sweep
//!
//! A frame source that needs no hardware: a fixed textured target rendered
//! through a Gaussian blur whose sigma walks from defocused to sharp and
//! back over every focus cycle, the way a lens being racked through focus
//! looks to the sensor. The focus metric rises to a peak mid-cycle and falls
//! again, which is exactly what an operator sees while adjusting a lens.

use crate::acquisition::{FrameResult, FrameSource, SourceSettings};
use crate::errors::FocusError;
use crate::timing::SessionClock;
use crate::types::{Frame, PixelFormat};
use image::{GrayImage, Luma};
use std::time::Duration;

/// Code the synthetic source uses for an injected frame failure.
pub const INCOMPLETE_FRAME_CODE: u32 = 0xE100_0014;

/// Blur below this sigma is indistinguishable from the sharp target.
const SHARP_SIGMA: f32 = 0.25;

/// Shape of the synthetic sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticConfig {
    pub width: u32,
    pub height: u32,
    /// Frames per defocus → focus → defocus cycle
    pub sweep_length: u64,
    /// Blur sigma at both ends of the cycle
    pub max_sigma: f32,
    /// Every n-th frame is reported as failed
    pub failure_every: Option<u64>,
    /// The n-th frame request (1-based) fails with a fatal transport error
    pub disconnect_at: Option<u64>,
    /// Simulated time between frames; longer than the retrieve timeout means `TimedOut`
    pub frame_interval: Duration,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            sweep_length: 40,
            max_sigma: 6.0,
            failure_every: None,
            disconnect_at: None,
            frame_interval: Duration::ZERO,
        }
    }
}

/// Render the sharp focus target: a checkerboard with fine per-pixel grain.
pub fn focus_target(width: u32, height: u32) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| {
        let check = if ((x / 16) + (y / 16)) % 2 == 0 { 48u32 } else { 176 };
        let grain = x.wrapping_mul(73_856_093) ^ y.wrapping_mul(19_349_663);
        Luma([(check + grain % 48) as u8])
    })
}

/// Blur sigma for a position in the focus cycle. Sharpest at mid-cycle.
pub fn sweep_sigma(step: u64, sweep_length: u64, max_sigma: f32) -> f32 {
    let length = sweep_length.max(2);
    let phase = (step % length) as f32 / (length - 1) as f32;
    max_sigma * (2.0 * phase - 1.0).abs()
}

/// Pack an 8-bit grayscale image into `format`.
///
/// Wider mono formats are scaled up so that reducing them back to 8 bits is
/// lossless; color formats replicate the gray value into every channel.
/// Bayer formats carry the gray values as raw mosaic samples.
pub fn encode_gray(image: &GrayImage, format: PixelFormat) -> Result<Frame, FocusError> {
    let (width, height) = image.dimensions();
    let gray = image.as_raw();
    let data: Vec<u8> = match format {
        PixelFormat::Mono8
        | PixelFormat::BayerRg8
        | PixelFormat::BayerGr8
        | PixelFormat::BayerGb8
        | PixelFormat::BayerBg8 => gray.clone(),
        PixelFormat::Mono10 | PixelFormat::Mono12 | PixelFormat::Mono16 => {
            let shift = match format {
                PixelFormat::Mono10 => 2,
                PixelFormat::Mono12 => 4,
                _ => 8,
            };
            gray.iter()
                .flat_map(|&v| ((v as u16) << shift).to_le_bytes())
                .collect()
        }
        PixelFormat::Rgb8 | PixelFormat::Bgr8 => gray.iter().flat_map(|&v| [v, v, v]).collect(),
        PixelFormat::Rgba8 | PixelFormat::Bgra8 => {
            gray.iter().flat_map(|&v| [v, v, v, 255]).collect()
        }
        // Neutral chroma, so U and V samples are both 128
        PixelFormat::Yuyv => gray.iter().flat_map(|&y| [y, 128]).collect(),
        PixelFormat::Uyvy => gray.iter().flat_map(|&y| [128, y]).collect(),
    };
    Frame::new(width, height, format, data)
}

/// Hardware-free frame source producing a focus sweep.
pub struct SyntheticFocusSource {
    config: SyntheticConfig,
    target: GrayImage,
    /// Most recently rendered step of the sweep
    rendered: Option<(u64, GrayImage)>,
    format: PixelFormat,
    opened: bool,
    started: bool,
    budget: u64,
    handed_out: u64,
    clock: SessionClock,
}

impl SyntheticFocusSource {
    pub fn new(config: SyntheticConfig) -> Self {
        let target = focus_target(config.width, config.height);
        Self {
            config,
            target,
            rendered: None,
            format: PixelFormat::Mono8,
            opened: false,
            started: false,
            budget: 0,
            handed_out: 0,
            clock: SessionClock::new(),
        }
    }

    pub fn config(&self) -> &SyntheticConfig {
        &self.config
    }

    /// Results handed out in the current session.
    pub fn frames_handed_out(&self) -> u64 {
        self.handed_out
    }

    /// The grayscale image for a step of the cycle. Only the latest step is cached.
    fn render(&mut self, step: u64) -> &GrayImage {
        if self.rendered.as_ref().map(|(cached, _)| *cached) != Some(step) {
            let sigma = sweep_sigma(step, self.config.sweep_length, self.config.max_sigma);
            let image = if sigma < SHARP_SIGMA {
                self.target.clone()
            } else {
                image::imageops::blur(&self.target, sigma)
            };
            self.rendered = Some((step, image));
        }
        match &self.rendered {
            Some((_, image)) => image,
            None => &self.target,
        }
    }

    fn next_frame(&mut self, index: u64) -> Result<Frame, FocusError> {
        let step = (index - 1) % self.config.sweep_length.max(2);
        let format = self.format;
        let timestamp_us = self.clock.micros();
        let image = self.render(step);
        Ok(encode_gray(image, format)?
            .with_sequence(index)
            .with_timestamp_us(timestamp_us))
    }
}

impl Default for SyntheticFocusSource {
    fn default() -> Self {
        Self::new(SyntheticConfig::default())
    }
}

impl FrameSource for SyntheticFocusSource {
    fn device_name(&self) -> String {
        format!(
            "Synthetic focus target {}x{}",
            self.config.width, self.config.height
        )
    }

    fn open(&mut self) -> Result<(), FocusError> {
        if self.config.width == 0 || self.config.height == 0 {
            return Err(FocusError::device("synthetic target has no pixels"));
        }
        self.opened = true;
        Ok(())
    }

    fn configure(&mut self, settings: &SourceSettings) -> Result<(), FocusError> {
        if !self.opened {
            return Err(FocusError::device("configure called before open"));
        }
        self.format = settings.pixel_format;
        log::debug!(
            "Synthetic source configured: {} at {} us exposure",
            settings.pixel_format,
            settings.exposure_time_us
        );
        Ok(())
    }

    fn start_session(&mut self, frame_budget: u64) -> Result<(), FocusError> {
        if !self.opened {
            return Err(FocusError::device("start_session called before open"));
        }
        self.started = true;
        self.budget = frame_budget;
        self.handed_out = 0;
        self.clock = SessionClock::new();
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.started && self.handed_out < self.budget
    }

    fn retrieve_next(&mut self, timeout: Duration) -> Result<FrameResult, FocusError> {
        if !self.started {
            return Err(FocusError::device("no session in progress"));
        }
        if !self.is_active() {
            return Ok(FrameResult::TimedOut);
        }

        let index = self.handed_out + 1;
        if self.config.disconnect_at == Some(index) {
            self.started = false;
            return Err(FocusError::disconnected("synthetic camera unplugged"));
        }

        if self.config.frame_interval > timeout {
            std::thread::sleep(timeout);
            return Ok(FrameResult::TimedOut);
        }
        if !self.config.frame_interval.is_zero() {
            std::thread::sleep(self.config.frame_interval);
        }

        self.handed_out = index;
        if let Some(every) = self.config.failure_every.filter(|&n| n > 0) {
            if index % every == 0 {
                return Ok(FrameResult::Failed {
                    code: INCOMPLETE_FRAME_CODE,
                    description: "Buffer incompletely grabbed".to_string(),
                });
            }
        }
        self.next_frame(index).map(FrameResult::Delivered)
    }

    fn stop_session(&mut self) {
        self.started = false;
    }
}
