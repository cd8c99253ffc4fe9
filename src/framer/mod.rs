//! Pixel format decoders ("framers").
//!
//! A framer is built once per negotiated geometry and turns each raw
//! [`FrameBuffer`] into a [`Frame`] without copying. Framers are looked up by
//! [`FourCC`] in a [`FramerRegistry`] that the application builds at startup;
//! each decoder module contributes a `register` function.

pub mod frame;
pub mod rgb3;
pub mod yuyv;

pub use frame::{Frame, Sampler};

use crate::buffer::FrameBuffer;
use crate::errors::CaptureError;
use crate::fourcc::FourCC;
use std::collections::HashMap;
use std::fmt;

/// Negotiated frame layout, fixed for the lifetime of a capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameGeometry {
    pub width: u32,
    pub height: u32,
    /// Bytes per row as reported by the driver (may include padding)
    pub stride: u32,
    /// Bytes per buffer as reported by the driver
    pub size: u32,
}

impl FrameGeometry {
    pub fn new(width: u32, height: u32, stride: u32, size: u32) -> Self {
        Self {
            width,
            height,
            stride,
            size,
        }
    }
}

/// Options shared by all framer constructors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FramerOptions {
    /// Buffers carry hardware alignment padding
    pub padded: bool,
}

pub trait Framer: Send + Sync + fmt::Debug {
    fn format(&self) -> FourCC;

    /// Exact buffer length this framer accepts.
    fn expected_len(&self) -> usize;

    /// Wrap `buffer` as a frame. On failure the buffer has already been released.
    fn frame(&self, buffer: FrameBuffer) -> Result<Frame, CaptureError>;
}

pub type FramerFactory =
    fn(&FrameGeometry, &FramerOptions) -> Result<Box<dyn Framer>, CaptureError>;

/// Maps pixel format codes to framer constructors.
#[derive(Default, Clone)]
pub struct FramerRegistry {
    factories: HashMap<FourCC, FramerFactory>,
}

impl FramerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry populated with every decoder shipped in this crate.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        rgb3::register(&mut registry);
        yuyv::register(&mut registry);
        registry
    }

    /// Register a constructor for `format`, replacing any previous one.
    pub fn register(&mut self, format: FourCC, factory: FramerFactory) {
        if self.factories.insert(format, factory).is_some() {
            log::debug!("Replaced framer for {}", format);
        }
    }

    pub fn contains(&self, format: FourCC) -> bool {
        self.factories.contains_key(&format)
    }

    /// Registered formats in sorted order.
    pub fn formats(&self) -> Vec<FourCC> {
        let mut formats: Vec<FourCC> = self.factories.keys().copied().collect();
        formats.sort();
        formats
    }

    pub fn lookup(
        &self,
        format: FourCC,
        geometry: &FrameGeometry,
        options: &FramerOptions,
    ) -> Result<Box<dyn Framer>, CaptureError> {
        let factory = self
            .factories
            .get(&format)
            .ok_or_else(|| CaptureError::UnsupportedFormat {
                device: "framer registry".to_string(),
                format: format.to_string(),
            })?;
        factory(geometry, options)
    }
}

impl fmt::Debug for FramerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FramerRegistry")
            .field("formats", &self.formats())
            .finish()
    }
}

/// Reject buffers whose length is not exactly `expected`, releasing them first.
pub(crate) fn check_len(buffer: FrameBuffer, expected: usize) -> Result<FrameBuffer, CaptureError> {
    let actual = buffer.len();
    if actual != expected {
        buffer.release();
        return Err(CaptureError::FrameLengthMismatch { expected, actual });
    }
    Ok(buffer)
}
