/// Intensity normalization
///
/// Reduces any supported pixel encoding to a standalone single-channel
/// 8-bit intensity buffer. The output owns its pixels, so the source frame
/// can be dropped as soon as normalization returns.
use crate::errors::FocusError;
use crate::invariant_ppt::NORMALIZED_KEEPS_SHAPE;
use crate::types::{Frame, PixelFormat};
use image::{DynamicImage, GrayImage, ImageBuffer};

/// Single-channel 8-bit intensity region.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRegion {
    image: GrayImage,
}

impl NormalizedRegion {
    pub fn from_gray(image: GrayImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    #[inline]
    pub fn intensity(&self, x: u32, y: u32) -> u8 {
        self.image.get_pixel(x, y)[0]
    }

    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn as_image(&self) -> &GrayImage {
        &self.image
    }

    pub fn into_image(self) -> GrayImage {
        self.image
    }

    /// View the region as a Mono8 frame, e.g. for a display sink.
    pub fn to_frame(&self) -> Frame {
        Frame::from_gray(self.image.clone())
    }
}

/// Convert `region` to 8-bit intensity.
///
/// Mono8 input is copied unchanged. Bayer mosaics are rejected with
/// [`FocusError::UnsupportedEncoding`] since no demosaicing is done.
pub fn normalize(region: &Frame) -> Result<NormalizedRegion, FocusError> {
    let (width, height) = (region.width(), region.height());
    let data = region.data();

    let image = match region.format() {
        PixelFormat::Mono8 => gray(width, height, data.to_vec())?,
        PixelFormat::Mono10 => gray(width, height, shift_mono16(data, 2))?,
        PixelFormat::Mono12 => gray(width, height, shift_mono16(data, 4))?,
        PixelFormat::Mono16 => gray(width, height, shift_mono16(data, 8))?,
        PixelFormat::Rgb8 => {
            let rgb = ImageBuffer::from_raw(width, height, data.to_vec()).ok_or_else(|| layout(region))?;
            DynamicImage::ImageRgb8(rgb).to_luma8()
        }
        PixelFormat::Bgr8 => {
            let rgb = ImageBuffer::from_raw(width, height, swap_red_blue(data, 3))
                .ok_or_else(|| layout(region))?;
            DynamicImage::ImageRgb8(rgb).to_luma8()
        }
        PixelFormat::Rgba8 => {
            let rgba = ImageBuffer::from_raw(width, height, data.to_vec()).ok_or_else(|| layout(region))?;
            DynamicImage::ImageRgba8(rgba).to_luma8()
        }
        PixelFormat::Bgra8 => {
            let rgba = ImageBuffer::from_raw(width, height, swap_red_blue(data, 4))
                .ok_or_else(|| layout(region))?;
            DynamicImage::ImageRgba8(rgba).to_luma8()
        }
        PixelFormat::Yuyv => gray(width, height, data.iter().step_by(2).copied().collect())?,
        PixelFormat::Uyvy => gray(width, height, data.iter().skip(1).step_by(2).copied().collect())?,
        format @ (PixelFormat::BayerRg8
        | PixelFormat::BayerGr8
        | PixelFormat::BayerGb8
        | PixelFormat::BayerBg8) => {
            return Err(FocusError::UnsupportedEncoding(format!(
                "{} (demosaicing not available)",
                format
            )));
        }
    };

    crate::assert_invariant!(
        image.width() == width && image.height() == height,
        NORMALIZED_KEEPS_SHAPE,
        "normalize"
    );
    Ok(NormalizedRegion { image })
}

fn gray(width: u32, height: u32, pixels: Vec<u8>) -> Result<GrayImage, FocusError> {
    let actual = pixels.len();
    GrayImage::from_raw(width, height, pixels).ok_or(FocusError::FrameLayout {
        expected: width as usize * height as usize,
        actual,
    })
}

fn layout(region: &Frame) -> FocusError {
    FocusError::FrameLayout {
        expected: Frame::expected_len(region.width(), region.height(), region.format()),
        actual: region.data().len(),
    }
}

/// Little-endian 16-bit samples shifted down to their top 8 significant bits.
fn shift_mono16(data: &[u8], shift: u32) -> Vec<u8> {
    data.chunks_exact(2)
        .map(|pair| (u16::from_le_bytes([pair[0], pair[1]]) >> shift).min(255) as u8)
        .collect()
}

fn swap_red_blue(data: &[u8], channels: usize) -> Vec<u8> {
    let mut swapped = data.to_vec();
    for pixel in swapped.chunks_exact_mut(channels) {
        pixel.swap(0, 2);
    }
    swapped
}
