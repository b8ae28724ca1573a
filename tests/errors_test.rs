#[cfg(test)]
mod error_tests {
    use crabfocus::acquisition::{ErrorInfo, FrameFailure};
    use crabfocus::errors::{FocusError, TransportErrorKind};
    use crabfocus::types::Roi;
    use std::error::Error;

    #[test]
    fn test_invalid_region_message() {
        let error = FocusError::InvalidRegion {
            roi: Roi::new(320, 240, 300, 300),
            frame_width: 640,
            frame_height: 480,
        };
        assert_eq!(
            error.to_string(),
            "Invalid region 300x300+320+240 for a 640x480 frame"
        );
        assert_eq!(error.code(), "INVALID_REGION");
        assert!(error.is_fatal());
    }

    #[test]
    fn test_unsupported_encoding_message() {
        let error = FocusError::UnsupportedEncoding("BayerRG8".to_string());
        assert!(error.to_string().contains("Unsupported pixel encoding"));
        assert!(error.to_string().contains("BayerRG8"));
        assert!(error.is_fatal());
    }

    #[test]
    fn test_frame_capture_is_recoverable() {
        let failure = FrameFailure {
            sequence: 3,
            code: 0xE100_0014,
            description: "Payload incomplete".to_string(),
        };
        let error = failure.to_error();
        assert_eq!(error.code(), "FRAME_CAPTURE");
        assert!(!error.is_fatal());
        assert_eq!(
            error.to_string(),
            "Frame capture failed (0xe1000014): Payload incomplete"
        );
    }

    #[test]
    fn test_transport_codes() {
        assert_eq!(FocusError::timeout(5000).code(), "TRANSPORT_TIMEOUT");
        assert_eq!(FocusError::disconnected("x").code(), "TRANSPORT_DISCONNECTED");
        assert_eq!(FocusError::device("x").code(), "TRANSPORT_DEVICE");
        assert_eq!(
            FocusError::timeout(5000).to_string(),
            "Transport error (timeout): no frame within 5000 ms"
        );
        assert!(matches!(
            FocusError::disconnected("x"),
            FocusError::FatalTransport {
                kind: TransportErrorKind::Disconnected,
                ..
            }
        ));
    }

    #[test]
    fn test_frame_layout_and_config_codes() {
        let layout = FocusError::FrameLayout {
            expected: 12,
            actual: 10,
        };
        assert_eq!(layout.code(), "FRAME_LAYOUT");
        assert!(layout.to_string().contains("10 bytes"));
        assert_eq!(FocusError::Config("bad".to_string()).code(), "CONFIG");
    }

    #[test]
    fn test_error_info_from_error() {
        let info = ErrorInfo::from(&FocusError::timeout(250));
        assert_eq!(info.code, "TRANSPORT_TIMEOUT");
        assert!(info.message.contains("250 ms"));
    }

    #[test]
    fn test_focus_error_implements_error_trait() {
        let error = FocusError::device("Error trait test");
        let _error_trait: &dyn Error = &error;
        assert!(error.source().is_none());
    }

    #[test]
    fn test_focus_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync + 'static>() {}
        assert_send_sync::<FocusError>();
    }
}
