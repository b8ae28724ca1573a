//! CrabFocus: live focus measurement for camera setup
//!
//! Reads frames from a camera (or any other [`FrameSource`]), crops a region
//! of interest, scores its sharpness as the variance of the Laplacian and
//! reports the current and best focus level for every frame, so an operator
//! can rack a lens through focus and see where it peaks.
//!
//! # Features
//! - Sharpness scoring bit-compatible with an 8-bit saturating Laplacian
//! - Mono, packed YUV and RGB/BGR pixel formats
//! - Sequential or pipelined (grab while scoring) acquisition
//! - Text or JSON-lines reporting
//! - Hardware-free synthetic focus sweep for offline testing
//! - Live cameras through `nokhwa` with the `camera` feature
//!
//! # Usage
//! ```rust,no_run
//! use crabfocus::acquisition::{FocusSession, SessionConfig, TextReporter};
//! use crabfocus::testing::SyntheticFocusSource;
//!
//! let config = SessionConfig::default().with_frame_budget(100);
//! let mut session = FocusSession::new(
//!     SyntheticFocusSource::default(),
//!     TextReporter::stdout(),
//!     config,
//! );
//! match session.run() {
//!     Ok(summary) => println!("best focus {:.3}", summary.best_focus),
//!     Err(failure) => eprintln!("{}", failure),
//! }
//! ```
pub mod acquisition;
pub mod config;
pub mod errors;
pub mod focus;
pub mod invariant_ppt;
pub mod platform;
pub mod timing;
pub mod types;

// Testing utilities - hardware-free sources and recording sinks
pub mod testing;

// Re-exports for convenience
pub use acquisition::{
    CancelToken, FocusSession, FrameResult, FrameSource, PipelinedSession, ReportSink,
    SessionConfig, SessionFailure, SessionSummary, StopReason,
};
pub use config::CrabFocusConfig;
pub use errors::FocusError;
pub use focus::{focus_level, FocusMeter, ResponseMode, RoiPlacement, RoiSpec};
pub use types::{Frame, PixelFormat, Roi};

/// Initialize logging for the focus tools
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "crabfocus=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Get crate information
pub fn get_info() -> CrateInfo {
    CrateInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: DESCRIPTION.to_string(),
        camera_support: cfg!(feature = "camera"),
    }
}

/// Crate information structure
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CrateInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    /// Built with live camera support
    pub camera_support: bool,
}
