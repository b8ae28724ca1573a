use crabfocus::errors::FocusError;
use crabfocus::types::{Frame, PixelFormat, Roi};

#[test]
fn test_pixel_format_bytes_per_pixel() {
    assert_eq!(PixelFormat::Mono8.bytes_per_pixel(), 1);
    assert_eq!(PixelFormat::Mono12.bytes_per_pixel(), 2);
    assert_eq!(PixelFormat::Rgb8.bytes_per_pixel(), 3);
    assert_eq!(PixelFormat::Bgra8.bytes_per_pixel(), 4);
    assert_eq!(PixelFormat::Yuyv.bytes_per_pixel(), 2);
    assert_eq!(PixelFormat::BayerGb8.bytes_per_pixel(), 1);
}

#[test]
fn test_pixel_format_serde_uses_device_names() {
    let json = serde_json::to_string(&PixelFormat::Yuyv).unwrap();
    assert_eq!(json, "\"YUV422_YUYV_Packed\"");
    let parsed: PixelFormat = serde_json::from_str("\"mono8\"").unwrap();
    assert_eq!(parsed, PixelFormat::Mono8);
    assert!(serde_json::from_str::<PixelFormat>("\"Mono7\"").is_err());
}

#[test]
fn test_only_mono8_is_mono8() {
    let mono8: Vec<PixelFormat> = PixelFormat::ALL
        .into_iter()
        .filter(|format| format.is_mono8())
        .collect();
    assert_eq!(mono8, vec![PixelFormat::Mono8]);
}

#[test]
fn test_frame_geometry() {
    let frame = Frame::new(4, 3, PixelFormat::Rgb8, vec![0; 36]).unwrap();
    assert_eq!(frame.width(), 4);
    assert_eq!(frame.height(), 3);
    assert_eq!(frame.stride(), 12);
    assert_eq!(frame.row(2).len(), 12);
    assert_eq!(Frame::expected_len(4, 3, PixelFormat::Mono16), 24);
}

#[test]
fn test_frame_layout_error() {
    let err = Frame::new(4, 3, PixelFormat::Mono8, vec![0; 11]).unwrap_err();
    assert_eq!(
        err,
        FocusError::FrameLayout {
            expected: 12,
            actual: 11
        }
    );
}

#[test]
fn test_frame_metadata_builders() {
    let frame = Frame::from_gray(image::GrayImage::new(2, 2))
        .with_sequence(9)
        .with_timestamp_us(1500);
    assert_eq!(frame.sequence, 9);
    assert_eq!(frame.timestamp_us, 1500);
    assert_eq!(frame.format(), PixelFormat::Mono8);
    assert_eq!(frame.into_data().len(), 4);
}

#[test]
fn test_roi_bounds() {
    assert!(Roi::new(0, 0, 640, 480).fits_within(640, 480));
    assert!(!Roi::new(1, 0, 640, 480).fits_within(640, 480));
    assert!(!Roi::new(0, 0, 0, 10).fits_within(640, 480));
    assert!(!Roi::new(u32::MAX, 0, 2, 2).fits_within(640, 480));
    assert_eq!(Roi::new(0, 0, 300, 300).area(), 90_000);
}
