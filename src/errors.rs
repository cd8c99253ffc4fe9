use thiserror::Error;

/// Failures reported by a device driver.
#[derive(Debug, Error)]
pub enum DriverError {
    /// No buffer completed within the wait timeout. Not a failure of the capture loop.
    #[error("timeout waiting for frame")]
    Timeout,
    #[error("device is closed")]
    Closed,
    #[error("device error: {0}")]
    Device(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DriverError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, DriverError::Timeout)
    }
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("{device}: unsupported format: {format}")]
    UnsupportedFormat { device: String, format: String },
    #[error("{device}: unsupported resolution: {width}x{height}")]
    UnsupportedResolution {
        device: String,
        width: u32,
        height: u32,
    },
    #[error("{device}: failed to open device: {source}")]
    DeviceOpenFailed {
        device: String,
        #[source]
        source: DriverError,
    },
    #[error("failed to set image format: {0}")]
    SetFormatFailed(#[source] DriverError),
    #[error("failed to start streaming: {0}")]
    StreamStartFailed(#[source] DriverError),
    #[error("wrong frame length (exp: {expected}, read {actual})")]
    FrameLengthMismatch { expected: usize, actual: usize },
    #[error("frame geometry {width}x{height} does not fit stride {stride}, size {size}")]
    InvalidGeometry {
        width: u32,
        height: u32,
        stride: usize,
        size: usize,
    },
    #[error("no frame received")]
    NoFrameAvailable,
    #[error("camera is not open")]
    NotOpen,
    #[error("camera control error: {0}")]
    Control(#[source] DriverError),
    #[error("invalid FourCC code: {0:?}")]
    InvalidFourCC(String),
    #[error("configuration error: {0}")]
    Config(String),
}
