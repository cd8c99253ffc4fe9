//! Device driver interface consumed by the capture pipeline.
//!
//! The pipeline never talks to hardware directly. A [`Driver`] opens devices and
//! each [`Device`] exposes the buffer-level streaming protocol: wait for the
//! next completed buffer, fetch it by index, and hand the index back when done.
//! Device methods take `&self` because the capture thread and consumers use the
//! same handle concurrently, as with ioctls on a shared file descriptor.

use crate::errors::DriverError;
use crate::fourcc::PixelFormat;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// One entry of a device's frame size enumeration.
///
/// Discrete sizes are reported with `min == max` and a zero step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSize {
    pub min_width: u32,
    pub max_width: u32,
    pub step_width: u32,
    pub min_height: u32,
    pub max_height: u32,
    pub step_height: u32,
}

impl FrameSize {
    pub fn discrete(width: u32, height: u32) -> Self {
        Self {
            min_width: width,
            max_width: width,
            step_width: 0,
            min_height: height,
            max_height: height,
            step_height: 0,
        }
    }

    pub fn stepwise(
        (min_width, max_width, step_width): (u32, u32, u32),
        (min_height, max_height, step_height): (u32, u32, u32),
    ) -> Self {
        Self {
            min_width,
            max_width,
            step_width,
            min_height,
            max_height,
            step_height,
        }
    }
}

/// Result of asking the driver for a format; values may differ from the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegotiatedFormat {
    pub pixel_format: PixelFormat,
    pub width: u32,
    pub height: u32,
    /// Bytes per row
    pub stride: u32,
    /// Bytes per buffer
    pub size: u32,
}

/// Device control identifier (V4L2 CID numbering).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ControlId(pub u32);

const CID_BASE: u32 = 0x0098_0900;

impl ControlId {
    pub const BRIGHTNESS: ControlId = ControlId(CID_BASE);
    pub const CONTRAST: ControlId = ControlId(CID_BASE + 1);
    pub const SATURATION: ControlId = ControlId(CID_BASE + 2);
    pub const HUE: ControlId = ControlId(CID_BASE + 3);
    pub const AUTO_WHITE_BALANCE: ControlId = ControlId(CID_BASE + 12);
    pub const GAIN: ControlId = ControlId(CID_BASE + 19);
    pub const SHARPNESS: ControlId = ControlId(CID_BASE + 27);
}

/// Opens devices by identifier (usually a path such as `/dev/video0`).
pub trait Driver: Send + Sync {
    fn open(&self, device: &str) -> Result<Arc<dyn Device>, DriverError>;
}

/// An open capture device.
pub trait Device: Send + Sync {
    /// Supported pixel formats with their human-readable descriptions.
    fn supported_formats(&self) -> HashMap<PixelFormat, String>;

    fn supported_frame_sizes(&self, format: PixelFormat) -> Vec<FrameSize>;

    fn set_image_format(
        &self,
        format: PixelFormat,
        width: u32,
        height: u32,
    ) -> Result<NegotiatedFormat, DriverError>;

    fn set_buffer_count(&self, count: u32) -> Result<(), DriverError>;

    fn set_auto_white_balance(&self, enabled: bool) -> Result<(), DriverError>;

    fn start_streaming(&self) -> Result<(), DriverError>;

    fn stop_streaming(&self) -> Result<(), DriverError>;

    /// Block until a buffer completes. Returns [`DriverError::Timeout`] if none did in time.
    fn wait_for_frame(&self, timeout: Duration) -> Result<(), DriverError>;

    /// Dequeue the completed buffer. The bytes stay valid until `release_frame(index)`.
    fn get_frame(&self) -> Result<(Bytes, u32), DriverError>;

    /// Return a buffer to the driver's queue.
    fn release_frame(&self, index: u32) -> Result<(), DriverError>;

    fn get_control(&self, id: ControlId) -> Result<i32, DriverError>;

    fn set_control(&self, id: ControlId, value: i32) -> Result<(), DriverError>;

    fn close(&self) -> Result<(), DriverError>;
}
