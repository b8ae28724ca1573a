//! Platform camera access
//!
//! Live frame sources backed by `nokhwa`, available with the `camera` feature.

#[cfg(feature = "camera")]
pub mod camera;

#[cfg(feature = "camera")]
pub use camera::{list_cameras, CameraSource, DeviceEntry, DECODE_FAILURE_CODE};
