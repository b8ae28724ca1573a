use crate::types::Roi;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a frame transport gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportErrorKind {
    /// No frame arrived within the retrieve timeout
    Timeout,
    /// The device or its stream went away
    Disconnected,
    /// Any other device-level failure
    Device,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportErrorKind::Timeout => write!(f, "timeout"),
            TransportErrorKind::Disconnected => write!(f, "disconnected"),
            TransportErrorKind::Device => write!(f, "device"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FocusError {
    #[error("Invalid region {roi} for a {frame_width}x{frame_height} frame")]
    InvalidRegion {
        roi: Roi,
        frame_width: u32,
        frame_height: u32,
    },

    #[error("Unsupported pixel encoding: {0}")]
    UnsupportedEncoding(String),

    #[error("Frame capture failed ({code:#010x}): {description}")]
    FrameCapture { code: u32, description: String },

    #[error("Transport error ({kind}): {description}")]
    FatalTransport {
        kind: TransportErrorKind,
        description: String,
    },

    #[error("Frame buffer holds {actual} bytes, geometry requires {expected}")]
    FrameLayout { expected: usize, actual: usize },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl FocusError {
    pub fn timeout(timeout_ms: u64) -> Self {
        FocusError::FatalTransport {
            kind: TransportErrorKind::Timeout,
            description: format!("no frame within {} ms", timeout_ms),
        }
    }

    pub fn disconnected(description: impl Into<String>) -> Self {
        FocusError::FatalTransport {
            kind: TransportErrorKind::Disconnected,
            description: description.into(),
        }
    }

    pub fn device(description: impl Into<String>) -> Self {
        FocusError::FatalTransport {
            kind: TransportErrorKind::Device,
            description: description.into(),
        }
    }

    /// Stable operator-facing code.
    pub fn code(&self) -> &'static str {
        match self {
            FocusError::InvalidRegion { .. } => "INVALID_REGION",
            FocusError::UnsupportedEncoding(_) => "UNSUPPORTED_ENCODING",
            FocusError::FrameCapture { .. } => "FRAME_CAPTURE",
            FocusError::FatalTransport { kind, .. } => match kind {
                TransportErrorKind::Timeout => "TRANSPORT_TIMEOUT",
                TransportErrorKind::Disconnected => "TRANSPORT_DISCONNECTED",
                TransportErrorKind::Device => "TRANSPORT_DEVICE",
            },
            FocusError::FrameLayout { .. } => "FRAME_LAYOUT",
            FocusError::Config(_) => "CONFIG",
        }
    }

    /// Per-frame capture failures are recovered by the acquisition loop;
    /// everything else ends the session.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, FocusError::FrameCapture { .. })
    }
}
