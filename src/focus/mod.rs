/// Focus measurement
///
/// The per-frame pipeline: crop the region of interest, reduce it to 8-bit
/// intensity, score it with the variance of its Laplacian, and fold the
/// score into the session's best value.
///
/// Focus levels are only comparable between frames taken with the same ROI
/// size, exposure and pixel format.
pub mod laplacian;
pub mod normalize;
pub mod region;
pub mod tracker;

pub use laplacian::{focus_level, laplacian_response, FocusScorer, ResponseMode};
pub use normalize::{normalize, NormalizedRegion};
pub use region::{extract_region, RoiPlacement, RoiSpec};
pub use tracker::{BestFocusTracker, SharedBestFocus};

use crate::errors::FocusError;
use crate::types::{Frame, Roi};

/// Run extraction, normalization and scoring for one frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct FocusMeter {
    roi: RoiSpec,
    scorer: FocusScorer,
}

/// Output of [`FocusMeter::measure`].
#[derive(Debug, Clone)]
pub struct Measurement {
    pub roi: Roi,
    pub level: f64,
    pub region: Frame,
}

impl FocusMeter {
    pub fn new(roi: RoiSpec, mode: ResponseMode) -> Self {
        Self {
            roi,
            scorer: FocusScorer::new(mode),
        }
    }

    pub fn roi_spec(&self) -> &RoiSpec {
        &self.roi
    }

    /// Measure the focus level of `frame`, placing the ROI from its current size.
    pub fn measure(&self, frame: &Frame) -> Result<Measurement, FocusError> {
        let roi = self.roi.locate(frame.width(), frame.height());
        let region = extract_region(frame, &roi)?;
        let normalized = normalize(&region)?;
        let level = self.scorer.score(&normalized);
        Ok(Measurement { roi, level, region })
    }
}
