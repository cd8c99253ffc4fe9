use crate::buffer::FrameBuffer;
use chrono::{DateTime, Utc};
use image::{GenericImageView, Rgba, RgbaImage};
use std::fmt;

/// Reads the pixel at `(x, y)` from raw bytes laid out with `stride` bytes per row.
pub type Sampler = fn(bytes: &[u8], stride: usize, x: usize, y: usize) -> Rgba<u8>;

/// Read-only pixel view over a borrowed driver buffer.
///
/// The frame owns its [`FrameBuffer`], so the bytes stay valid for as long as
/// the frame exists. Dropping the frame or calling [`Frame::release`] hands the
/// buffer back to the driver.
pub struct Frame {
    buffer: FrameBuffer,
    width: u32,
    height: u32,
    stride: usize,
    sampler: Sampler,
}

impl Frame {
    pub fn new(buffer: FrameBuffer, width: u32, height: u32, stride: usize, sampler: Sampler) -> Self {
        Self {
            buffer,
            width,
            height,
            stride,
            sampler,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes per row in the underlying buffer
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Pixel at `(x, y)`.
    ///
    /// # Panics
    /// Panics if the coordinate lies outside the buffer.
    pub fn at(&self, x: u32, y: u32) -> Rgba<u8> {
        (self.sampler)(self.buffer.bytes(), self.stride, x as usize, y as usize)
    }

    /// Raw bytes as delivered by the driver
    pub fn bytes(&self) -> &[u8] {
        self.buffer.bytes()
    }

    pub fn sequence(&self) -> u64 {
        self.buffer.sequence()
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.buffer.captured_at()
    }

    /// Copy the visible area into an owned RGBA image.
    pub fn to_rgba_image(&self) -> RgbaImage {
        RgbaImage::from_fn(self.width, self.height, |x, y| self.at(x, y))
    }

    /// Done with the frame; return the buffer to the camera.
    pub fn release(self) {
        self.buffer.release();
    }
}

impl GenericImageView for Frame {
    type Pixel = Rgba<u8>;

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn get_pixel(&self, x: u32, y: u32) -> Rgba<u8> {
        self.at(x, y)
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("stride", &self.stride)
            .field("buffer", &self.buffer)
            .finish()
    }
}
