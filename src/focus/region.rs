/// Region extraction
///
/// Crops a region of interest out of a full frame into a standalone buffer
/// in the same pixel encoding, and decides where the focus ROI sits on
/// each incoming frame.
use crate::errors::FocusError;
use crate::invariant_ppt::{REGION_MATCHES_ROI, ROI_WITHIN_FRAME};
use crate::types::{Frame, Roi};
use serde::{Deserialize, Serialize};

/// Copy the pixels inside `roi` out of `frame`.
///
/// Fails with [`FocusError::InvalidRegion`] when the ROI is empty or reaches
/// past the frame edge; the ROI is never clamped.
pub fn extract_region(frame: &Frame, roi: &Roi) -> Result<Frame, FocusError> {
    if !roi.fits_within(frame.width(), frame.height()) {
        return Err(FocusError::InvalidRegion {
            roi: *roi,
            frame_width: frame.width(),
            frame_height: frame.height(),
        });
    }
    crate::assert_invariant!(
        roi.offset_x + roi.width <= frame.width() && roi.offset_y + roi.height <= frame.height(),
        ROI_WITHIN_FRAME,
        "extract_region"
    );

    let bpp = frame.format().bytes_per_pixel();
    let start = roi.offset_x as usize * bpp;
    let end = start + roi.width as usize * bpp;

    let mut data = Vec::with_capacity(roi.width as usize * roi.height as usize * bpp);
    for y in roi.offset_y..roi.offset_y + roi.height {
        data.extend_from_slice(&frame.row(y)[start..end]);
    }

    let region = Frame::new(roi.width, roi.height, frame.format(), data)?
        .with_sequence(frame.sequence)
        .with_timestamp_us(frame.timestamp_us);

    crate::assert_invariant!(
        region.width() == roi.width && region.height() == roi.height,
        REGION_MATCHES_ROI,
        "extract_region"
    );
    Ok(region)
}

/// Where the focus ROI is anchored on a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RoiPlacement {
    /// Top-left corner at the frame centre: offset = (W/2, H/2)
    #[default]
    AnchorCenter,
    /// ROI geometrically centred: offset = ((W-w)/2, (H-h)/2)
    Centered,
    /// Fixed offsets regardless of frame size
    Fixed { offset_x: u32, offset_y: u32 },
}

/// ROI size plus placement rule, resolved against each frame's dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoiSpec {
    pub width: u32,
    pub height: u32,
    pub placement: RoiPlacement,
}

impl Default for RoiSpec {
    fn default() -> Self {
        Self {
            width: 300,
            height: 300,
            placement: RoiPlacement::AnchorCenter,
        }
    }
}

impl RoiSpec {
    pub fn new(width: u32, height: u32, placement: RoiPlacement) -> Self {
        Self {
            width,
            height,
            placement,
        }
    }

    /// Resolve the ROI for a frame of the given size.
    ///
    /// The result is not bounds-checked here; [`extract_region`] rejects
    /// ROIs that do not fit.
    pub fn locate(&self, frame_width: u32, frame_height: u32) -> Roi {
        let (offset_x, offset_y) = match self.placement {
            RoiPlacement::AnchorCenter => (frame_width / 2, frame_height / 2),
            RoiPlacement::Centered => (
                frame_width.saturating_sub(self.width) / 2,
                frame_height.saturating_sub(self.height) / 2,
            ),
            RoiPlacement::Fixed { offset_x, offset_y } => (offset_x, offset_y),
        };
        Roi::new(offset_x, offset_y, self.width, self.height)
    }
}
