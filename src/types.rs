//! Core data types: frames, pixel encodings and regions of interest.

use crate::errors::FocusError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Pixel encoding of a frame buffer.
///
/// Names follow the GenICam pixel format naming used by machine-vision
/// cameras (`Mono8`, `RGB8`, `YUV422_YUYV_Packed`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PixelFormat {
    Mono8,
    /// 10 significant bits in a little-endian 16-bit container
    Mono10,
    /// 12 significant bits in a little-endian 16-bit container
    Mono12,
    Mono16,
    Rgb8,
    Bgr8,
    Rgba8,
    Bgra8,
    /// Packed 4:2:2, byte order Y0 U Y1 V
    Yuyv,
    /// Packed 4:2:2, byte order U Y0 V Y1
    Uyvy,
    BayerRg8,
    BayerGr8,
    BayerGb8,
    BayerBg8,
}

impl PixelFormat {
    pub const ALL: [PixelFormat; 14] = [
        PixelFormat::Mono8,
        PixelFormat::Mono10,
        PixelFormat::Mono12,
        PixelFormat::Mono16,
        PixelFormat::Rgb8,
        PixelFormat::Bgr8,
        PixelFormat::Rgba8,
        PixelFormat::Bgra8,
        PixelFormat::Yuyv,
        PixelFormat::Uyvy,
        PixelFormat::BayerRg8,
        PixelFormat::BayerGr8,
        PixelFormat::BayerGb8,
        PixelFormat::BayerBg8,
    ];

    /// Bytes occupied by one pixel in a packed row.
    ///
    /// 4:2:2 formats share chroma between pixel pairs but still average
    /// two bytes per pixel, which is what row cropping needs.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Mono8
            | PixelFormat::BayerRg8
            | PixelFormat::BayerGr8
            | PixelFormat::BayerGb8
            | PixelFormat::BayerBg8 => 1,
            PixelFormat::Mono10 | PixelFormat::Mono12 | PixelFormat::Mono16 => 2,
            PixelFormat::Yuyv | PixelFormat::Uyvy => 2,
            PixelFormat::Rgb8 | PixelFormat::Bgr8 => 3,
            PixelFormat::Rgba8 | PixelFormat::Bgra8 => 4,
        }
    }

    /// True for the single-channel 8-bit encoding the scorer consumes directly.
    pub fn is_mono8(self) -> bool {
        self == PixelFormat::Mono8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PixelFormat::Mono8 => "Mono8",
            PixelFormat::Mono10 => "Mono10",
            PixelFormat::Mono12 => "Mono12",
            PixelFormat::Mono16 => "Mono16",
            PixelFormat::Rgb8 => "RGB8",
            PixelFormat::Bgr8 => "BGR8",
            PixelFormat::Rgba8 => "RGBA8",
            PixelFormat::Bgra8 => "BGRA8",
            PixelFormat::Yuyv => "YUV422_YUYV_Packed",
            PixelFormat::Uyvy => "YUV422Packed",
            PixelFormat::BayerRg8 => "BayerRG8",
            PixelFormat::BayerGr8 => "BayerGR8",
            PixelFormat::BayerGb8 => "BayerGB8",
            PixelFormat::BayerBg8 => "BayerBG8",
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PixelFormat {
    type Err = FocusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let format = match s.trim().to_ascii_uppercase().as_str() {
            "MONO8" | "GRAY8" | "L8" => PixelFormat::Mono8,
            "MONO10" => PixelFormat::Mono10,
            "MONO12" => PixelFormat::Mono12,
            "MONO16" | "GRAY16" => PixelFormat::Mono16,
            "RGB8" | "RGB8PACKED" | "RGB24" => PixelFormat::Rgb8,
            "BGR8" | "BGR8PACKED" | "BGR24" => PixelFormat::Bgr8,
            "RGBA8" | "RGBA8PACKED" => PixelFormat::Rgba8,
            "BGRA8" | "BGRA8PACKED" => PixelFormat::Bgra8,
            "YUV422_YUYV_PACKED" | "YUYV" | "YUY2" => PixelFormat::Yuyv,
            "YUV422PACKED" | "YUV422_8_UYVY" | "UYVY" => PixelFormat::Uyvy,
            "BAYERRG8" => PixelFormat::BayerRg8,
            "BAYERGR8" => PixelFormat::BayerGr8,
            "BAYERGB8" => PixelFormat::BayerGb8,
            "BAYERBG8" => PixelFormat::BayerBg8,
            _ => return Err(FocusError::UnsupportedEncoding(s.to_string())),
        };
        Ok(format)
    }
}

impl TryFrom<String> for PixelFormat {
    type Error = FocusError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PixelFormat> for String {
    fn from(format: PixelFormat) -> Self {
        format.as_str().to_string()
    }
}

/// An immutable 2-D buffer of pixel samples, tightly packed row by row.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    width: u32,
    height: u32,
    format: PixelFormat,
    data: Vec<u8>,
    /// Source-assigned sequence number (1-based for live sources, 0 when unknown)
    pub sequence: u64,
    /// Capture timestamp in microseconds since the source session started
    pub timestamp_us: u64,
}

impl Frame {
    /// Wrap a packed pixel buffer, checking that its size matches the geometry.
    pub fn new(
        width: u32,
        height: u32,
        format: PixelFormat,
        data: Vec<u8>,
    ) -> Result<Self, FocusError> {
        let expected = Self::expected_len(width, height, format);
        if data.len() != expected {
            return Err(FocusError::FrameLayout {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            format,
            data,
            sequence: 0,
            timestamp_us: 0,
        })
    }

    /// Build a Mono8 frame from a grayscale image.
    pub fn from_gray(image: image::GrayImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            format: PixelFormat::Mono8,
            data: image.into_raw(),
            sequence: 0,
            timestamp_us: 0,
        }
    }

    /// Build an RGB8 frame from an RGB image.
    pub fn from_rgb(image: image::RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            format: PixelFormat::Rgb8,
            data: image.into_raw(),
            sequence: 0,
            timestamp_us: 0,
        }
    }

    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn with_timestamp_us(mut self, timestamp_us: u64) -> Self {
        self.timestamp_us = timestamp_us;
        self
    }

    pub fn expected_len(width: u32, height: u32, format: PixelFormat) -> usize {
        width as usize * height as usize * format.bytes_per_pixel()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Bytes per row.
    pub fn stride(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }

    /// Packed bytes of row `y`.
    pub fn row(&self, y: u32) -> &[u8] {
        let stride = self.stride();
        let start = y as usize * stride;
        &self.data[start..start + stride]
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

/// Region of interest: a sub-rectangle of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Roi {
    pub offset_x: u32,
    pub offset_y: u32,
    pub width: u32,
    pub height: u32,
}

impl Roi {
    pub fn new(offset_x: u32, offset_y: u32, width: u32, height: u32) -> Self {
        Self {
            offset_x,
            offset_y,
            width,
            height,
        }
    }

    /// Whether the region is non-empty and lies inside a `frame_width` x `frame_height` frame.
    ///
    /// The right and bottom edges are inclusive: `offset_x + width == frame_width` fits.
    pub fn fits_within(&self, frame_width: u32, frame_height: u32) -> bool {
        if self.width == 0 || self.height == 0 {
            return false;
        }
        let right = self.offset_x.checked_add(self.width);
        let bottom = self.offset_y.checked_add(self.height);
        matches!((right, bottom), (Some(r), Some(b)) if r <= frame_width && b <= frame_height)
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl fmt::Display for Roi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{}+{}+{}",
            self.width, self.height, self.offset_x, self.offset_y
        )
    }
}
