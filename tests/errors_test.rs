#[cfg(test)]
mod error_tests {
    use crabsnap::errors::{CaptureError, DriverError};
    use std::error::Error;

    #[test]
    fn test_unsupported_format_display() {
        let error = CaptureError::UnsupportedFormat {
            device: "/dev/video0".to_string(),
            format: "MJPG".to_string(),
        };
        assert_eq!(error.to_string(), "/dev/video0: unsupported format: MJPG");
    }

    #[test]
    fn test_unsupported_resolution_display() {
        let error = CaptureError::UnsupportedResolution {
            device: "/dev/video0".to_string(),
            width: 641,
            height: 480,
        };
        assert_eq!(
            error.to_string(),
            "/dev/video0: unsupported resolution: 641x480"
        );
    }

    #[test]
    fn test_no_frame_display() {
        assert_eq!(CaptureError::NoFrameAvailable.to_string(), "no frame received");
    }

    #[test]
    fn test_open_failure_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let error = CaptureError::DeviceOpenFailed {
            device: "/dev/video0".to_string(),
            source: DriverError::from(io),
        };
        assert!(error.to_string().contains("denied"));
        let source = error.source().expect("source");
        assert!(source.to_string().contains("I/O error"));
    }

    #[test]
    fn test_stream_start_source() {
        let error = CaptureError::StreamStartFailed(DriverError::Device("busy".to_string()));
        assert_eq!(error.to_string(), "failed to start streaming: device error: busy");
        assert!(error.source().is_some());
    }

    #[test]
    fn test_debug_format() {
        let error = CaptureError::FrameLengthMismatch {
            expected: 12,
            actual: 10,
        };
        let debug_str = format!("{:?}", error);
        assert!(debug_str.contains("FrameLengthMismatch"));
        assert!(debug_str.contains("12"));
    }

    #[test]
    fn test_errors_are_send_sync() {
        fn assert_send_sync<T: Send + Sync + 'static>() {}
        assert_send_sync::<CaptureError>();
        assert_send_sync::<DriverError>();
    }
}
