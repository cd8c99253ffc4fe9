//! Capture pipeline lifecycle tests against the synthetic driver.

use crabsnap::testing::{SyntheticCamera, SyntheticDriver};
use crabsnap::{CaptureError, ControlId, FourCC, FrameSize, FramerRegistry, Snapper, SnapperConfig};
use image::Rgba;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn test_config() -> SnapperConfig {
    SnapperConfig {
        timeout_secs: 1,
        ..SnapperConfig::default()
    }
}

fn snapper_with(camera: SyntheticCamera, config: SnapperConfig) -> (Snapper, Arc<SyntheticDriver>) {
    let driver = Arc::new(SyntheticDriver::new(camera));
    let registry = Arc::new(FramerRegistry::with_defaults());
    let snapper = Snapper::new(driver.clone(), registry, config);
    (snapper, driver)
}

fn default_snapper() -> (Snapper, Arc<SyntheticDriver>) {
    snapper_with(SyntheticCamera::default(), test_config())
}

fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        std::thread::sleep(Duration::from_millis(1));
    }
}

#[cfg(test)]
mod lifecycle_tests {
    use super::*;

    #[test]
    fn test_open_snap_close() {
        let (mut snapper, driver) = default_snapper();
        snapper.open("/dev/video0", "RGB3", 640, 480).unwrap();
        assert!(snapper.is_open());
        assert_eq!(snapper.format(), Some(FourCC::RGB3));

        let frame = snapper.snap().unwrap();
        assert_eq!((frame.width(), frame.height()), (640, 480));
        let base = (frame.sequence() % 256) as u8;
        assert_eq!(
            frame.at(10, 20),
            Rgba([base.wrapping_add(10), base.wrapping_add(20), base.wrapping_add(30), 0xFF])
        );
        frame.release();

        snapper.close();
        assert!(!snapper.is_open());

        let stats = driver.stats();
        assert_eq!(stats.outstanding(), 0);
        assert_eq!(stats.double_releases(), 0);
        assert_eq!(stats.stream_starts(), 1);
        assert_eq!(stats.stream_stops(), 1);
        assert_eq!(stats.closes(), 1);
    }

    #[test]
    fn test_configuration_applied_to_device() {
        let (mut snapper, driver) = default_snapper();
        snapper.open("/dev/video0", "RGB3", 640, 480).unwrap();
        let device = driver.last_device().unwrap();
        assert_eq!(device.buffer_count(), 16);
        assert_eq!(snapper.get_control(ControlId::AUTO_WHITE_BALANCE).unwrap(), 1);
        assert!(device.is_streaming());
        snapper.close();
        assert!(device.is_closed());
        assert!(!device.is_streaming());
    }

    #[test]
    fn test_frames_arrive_in_driver_order() {
        let (mut snapper, driver) = default_snapper();
        snapper.open("/dev/video0", "RGB3", 320, 240).unwrap();

        let mut last = 0;
        for _ in 0..5 {
            let frame = snapper.snap().unwrap();
            assert!(frame.sequence() > last);
            last = frame.sequence();
        }
        snapper.close();
        assert_eq!(driver.stats().outstanding(), 0);
    }

    #[test]
    fn test_frames_dropped_without_consumer() {
        let (mut snapper, driver) = default_snapper();
        snapper.open("/dev/video0", "RGB3", 640, 480).unwrap();
        let stats = driver.stats();

        wait_until(|| stats.frames_released() >= 5);
        let released_before = stats.frames_released();

        // Nothing produced while nobody was waiting is delivered later.
        let frame = snapper.snap().unwrap();
        assert!(frame.sequence() > released_before);
        drop(frame);

        snapper.close();
        assert_eq!(stats.outstanding(), 0);
        assert_eq!(stats.double_releases(), 0);
    }

    #[test]
    fn test_close_releases_undelivered_buffers() {
        let (mut snapper, driver) = default_snapper();
        snapper.open("/dev/video0", "YUYV", 640, 480).unwrap();
        let stats = driver.stats();
        wait_until(|| stats.frames_fetched() >= 1);

        snapper.close();
        assert_eq!(stats.frames_fetched(), stats.frames_released());
        assert!(matches!(snapper.snap(), Err(CaptureError::NoFrameAvailable)));
    }

    #[test]
    fn test_close_twice_makes_no_driver_calls() {
        let (mut snapper, driver) = default_snapper();
        snapper.open("/dev/video0", "RGB3", 640, 480).unwrap();
        snapper.close();

        let calls = driver.stats().calls();
        snapper.close();
        snapper.close();
        assert_eq!(driver.stats().calls(), calls);
        assert_eq!(driver.stats().closes(), 1);
    }

    #[test]
    fn test_close_never_opened() {
        let (mut snapper, driver) = default_snapper();
        snapper.close();
        assert_eq!(driver.stats().calls(), 0);
        assert!(matches!(snapper.snap(), Err(CaptureError::NoFrameAvailable)));
    }

    #[test]
    fn test_reopen_closes_previous_session() {
        let (mut snapper, driver) = default_snapper();
        snapper.open("/dev/video0", "RGB3", 640, 480).unwrap();
        snapper.open("/dev/video0", "YUYV", 320, 240).unwrap();
        let stats = driver.stats();
        assert_eq!(stats.opens(), 2);
        assert_eq!(stats.closes(), 1);
        assert_eq!(snapper.format(), Some(FourCC::YUYV));

        let frame = snapper.snap().unwrap();
        assert_eq!(frame.width(), 320);
        drop(frame);
        snapper.close();
        assert_eq!(stats.closes(), 2);
        assert_eq!(stats.outstanding(), 0);
    }

    #[test]
    fn test_drop_closes_device() {
        let driver = {
            let (mut snapper, driver) = default_snapper();
            snapper.open("/dev/video0", "RGB3", 640, 480).unwrap();
            driver
        };
        assert_eq!(driver.stats().closes(), 1);
        assert_eq!(driver.stats().outstanding(), 0);
    }

    #[test]
    fn test_stalled_camera() {
        let camera = SyntheticCamera {
            stalled: true,
            ..SyntheticCamera::default()
        };
        let (mut snapper, driver) = snapper_with(camera, test_config());
        snapper.open("/dev/video0", "RGB3", 640, 480).unwrap();

        let snapped = snapper.snap_timeout(Duration::from_millis(50)).unwrap();
        assert!(snapped.is_none());

        snapper.close();
        assert_eq!(driver.stats().frames_fetched(), 0);
        assert_eq!(driver.stats().closes(), 1);
    }
}

#[cfg(test)]
mod negotiation_tests {
    use super::*;

    #[test]
    fn test_invalid_code_rejected_before_open() {
        let (mut snapper, driver) = default_snapper();
        let err = snapper.open("/dev/video0", "RGB24", 640, 480).unwrap_err();
        assert!(matches!(err, CaptureError::UnsupportedFormat { .. }));
        assert_eq!(driver.stats().opens(), 0);
    }

    #[test]
    fn test_unsupported_format_rolls_back() {
        let (mut snapper, driver) = default_snapper();
        let err = snapper.open("/dev/video0", "MJPG", 640, 480).unwrap_err();
        assert!(matches!(err, CaptureError::UnsupportedFormat { .. }));
        assert!(err.to_string().contains("MJPG"));
        assert!(!snapper.is_open());
        assert_eq!(driver.stats().closes(), 1);
    }

    #[test]
    fn test_unsupported_resolution_rolls_back() {
        let (mut snapper, driver) = default_snapper();
        let err = snapper.open("/dev/video0", "RGB3", 641, 480).unwrap_err();
        assert!(matches!(
            err,
            CaptureError::UnsupportedResolution {
                width: 641,
                height: 480,
                ..
            }
        ));
        assert!(!snapper.is_open());
        assert_eq!(driver.stats().closes(), 1);
        assert_eq!(driver.stats().stream_starts(), 0);
    }

    #[test]
    fn test_device_open_failure() {
        let camera = SyntheticCamera {
            fail_open: true,
            ..SyntheticCamera::default()
        };
        let (mut snapper, _driver) = snapper_with(camera, test_config());
        let err = snapper.open("/dev/video9", "RGB3", 640, 480).unwrap_err();
        assert!(matches!(err, CaptureError::DeviceOpenFailed { .. }));
        assert!(!snapper.is_open());
    }

    #[test]
    fn test_set_format_failure() {
        let camera = SyntheticCamera {
            fail_set_format: true,
            ..SyntheticCamera::default()
        };
        let (mut snapper, driver) = snapper_with(camera, test_config());
        let err = snapper.open("/dev/video0", "RGB3", 640, 480).unwrap_err();
        assert!(matches!(err, CaptureError::SetFormatFailed(_)));
        assert_eq!(driver.stats().closes(), 1);
    }

    #[test]
    fn test_stream_start_failure() {
        let camera = SyntheticCamera {
            fail_start: true,
            ..SyntheticCamera::default()
        };
        let (mut snapper, driver) = snapper_with(camera, test_config());
        let err = snapper.open("/dev/video0", "RGB3", 640, 480).unwrap_err();
        assert!(matches!(err, CaptureError::StreamStartFailed(_)));
        assert!(!snapper.is_open());
        assert_eq!(driver.stats().closes(), 1);
        assert!(matches!(snapper.snap(), Err(CaptureError::NoFrameAvailable)));
    }

    #[test]
    fn test_adjusted_size_is_used() {
        let camera = SyntheticCamera {
            adjusted_size: Some((320, 240)),
            ..SyntheticCamera::default()
        };
        let (mut snapper, _driver) = snapper_with(camera, test_config());
        snapper.open("/dev/video0", "RGB3", 640, 480).unwrap();

        let geometry = snapper.geometry().unwrap();
        assert_eq!((geometry.width, geometry.height), (320, 240));
        let frame = snapper.snap().unwrap();
        assert_eq!((frame.width(), frame.height()), (320, 240));
        assert_eq!(frame.bytes().len(), 320 * 240 * 3);
    }

    #[test]
    fn test_padded_buffers() {
        let camera = SyntheticCamera {
            formats: vec![(FourCC::RGB3, vec![FrameSize::discrete(50, 10)])],
            padded: true,
            ..SyntheticCamera::default()
        };
        let config = SnapperConfig {
            padded: true,
            ..test_config()
        };
        let (mut snapper, _driver) = snapper_with(camera, config);
        snapper.open("/dev/video0", "RGB3", 50, 10).unwrap();

        let frame = snapper.snap().unwrap();
        assert_eq!(frame.bytes().len(), 3072);
        assert_eq!(frame.stride(), 64 * 3);
        let base = (frame.sequence() % 256) as u8;
        assert_eq!(
            frame.at(49, 9),
            Rgba([base.wrapping_add(49), base.wrapping_add(9), base.wrapping_add(58), 0xFF])
        );
    }

    #[test]
    fn test_yuyv_stream() {
        let (mut snapper, _driver) = default_snapper();
        snapper.open("/dev/video0", "YUYV", 640, 480).unwrap();

        let frame = snapper.snap().unwrap();
        let luma = (frame.sequence() % 256) as u8;
        assert_eq!(frame.at(0, 5), Rgba([luma, luma, luma, 0xFF]));
        let next = luma.wrapping_add(1);
        assert_eq!(frame.at(1, 5), Rgba([next, next, next, 0xFF]));
    }
}

#[cfg(test)]
mod failure_tests {
    use super::*;

    #[test]
    fn test_zero_timeout_rejected_before_driver() {
        let config = SnapperConfig {
            timeout_secs: 0,
            ..SnapperConfig::default()
        };
        let (mut snapper, driver) = snapper_with(SyntheticCamera::default(), config);

        let err = snapper.open("/dev/video0", "RGB3", 640, 480).unwrap_err();
        assert!(matches!(err, CaptureError::Config(_)));
        assert!(!snapper.is_open());
        assert_eq!(driver.stats().opens(), 0);
        assert_eq!(driver.stats().calls(), 0);
    }

    #[test]
    fn test_length_mismatch_releases_buffer() {
        let camera = SyntheticCamera {
            frame_len: Some(100),
            ..SyntheticCamera::default()
        };
        let (mut snapper, driver) = snapper_with(camera, test_config());
        snapper.open("/dev/video0", "RGB3", 640, 480).unwrap();

        let err = snapper.snap().unwrap_err();
        assert!(matches!(
            err,
            CaptureError::FrameLengthMismatch {
                expected: 921_600,
                actual: 100
            }
        ));

        snapper.close();
        assert_eq!(driver.stats().outstanding(), 0);
        assert_eq!(driver.stats().double_releases(), 0);
    }

    #[test]
    fn test_driver_failure_ends_stream() {
        let camera = SyntheticCamera {
            fail_after_frames: Some(3),
            ..SyntheticCamera::default()
        };
        let (mut snapper, driver) = snapper_with(camera, test_config());
        snapper.open("/dev/video0", "RGB3", 640, 480).unwrap();

        let mut delivered = 0;
        loop {
            match snapper.snap() {
                Ok(frame) => {
                    delivered += 1;
                    frame.release();
                }
                Err(CaptureError::NoFrameAvailable) => break,
                Err(e) => panic!("unexpected error: {}", e),
            }
        }
        assert!(delivered <= 3);
        assert!(snapper.failure().is_some());
        assert!(snapper.is_open());

        snapper.close();
        let stats = driver.stats();
        assert_eq!(stats.outstanding(), 0);
        assert_eq!(stats.closes(), 1);
    }

    #[test]
    fn test_controls() {
        let (mut snapper, _driver) = default_snapper();
        assert!(matches!(
            snapper.get_control(ControlId::BRIGHTNESS),
            Err(CaptureError::NotOpen)
        ));

        snapper.open("/dev/video0", "RGB3", 640, 480).unwrap();
        assert_eq!(snapper.get_control(ControlId::BRIGHTNESS).unwrap(), 128);
        snapper.set_control(ControlId::BRIGHTNESS, 200).unwrap();
        assert_eq!(snapper.get_control(ControlId::BRIGHTNESS).unwrap(), 200);
        assert!(matches!(
            snapper.set_control(ControlId(1), 5),
            Err(CaptureError::Control(_))
        ));

        snapper.close();
        assert!(matches!(
            snapper.set_control(ControlId::BRIGHTNESS, 1),
            Err(CaptureError::NotOpen)
        ));
    }
}
