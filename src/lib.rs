//! CrabSnap: live camera frame capture with zero-copy pixel decoding
//!
//! This crate pulls raw buffers from a camera driver on a background thread
//! and exposes them as read-only pixel grids, hiding the driver's
//! buffer-queue protocol.
//!
//! # Features
//! - Format and resolution negotiation against the device's advertised modes
//! - Drop-when-busy capture: the hardware ring is never stalled by a slow consumer
//! - Borrowed buffers released back to the driver exactly once
//! - Pluggable pixel format decoders (`RGB3`, `YUYV` included)
//! - Frames usable anywhere an `image::GenericImageView` is accepted
//!
//! # Usage
//! ```rust,no_run
//! use crabsnap::{FramerRegistry, Snapper, SnapperConfig};
//! use crabsnap::testing::SyntheticDriver;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), crabsnap::CaptureError> {
//! crabsnap::init_logging();
//! let registry = Arc::new(FramerRegistry::with_defaults());
//! let driver = Arc::new(SyntheticDriver::default());
//! let mut snapper = Snapper::new(driver, registry, SnapperConfig::load_or_default());
//!
//! snapper.open("/dev/video0", "RGB3", 640, 480)?;
//! let frame = snapper.snap()?;
//! println!("pixel: {:?}", frame.at(0, 0));
//! frame.release();
//! snapper.close();
//! # Ok(())
//! # }
//! ```
pub mod buffer;
pub mod config;
pub mod driver;
pub mod errors;
pub mod fourcc;
pub mod framer;
pub mod snapper;

// Testing utilities - synthetic driver for offline testing
pub mod testing;

// Re-exports for convenience
pub use buffer::FrameBuffer;
pub use config::SnapperConfig;
pub use driver::{ControlId, Device, Driver, FrameSize, NegotiatedFormat};
pub use errors::{CaptureError, DriverError};
pub use fourcc::{FourCC, PixelFormat};
pub use framer::{Frame, FrameGeometry, Framer, FramerOptions, FramerRegistry};
pub use snapper::{can_fit, matches, Snapper};

/// Initialize logging for the capture system
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "crabsnap=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
