//! Packed 24-bit RGB (`RGB3`), three bytes per pixel in R, G, B order.

use super::{check_len, Frame, FrameGeometry, Framer, FramerOptions, FramerRegistry};
use crate::buffer::FrameBuffer;
use crate::errors::CaptureError;
use crate::fourcc::FourCC;
use image::Rgba;

const BYTES_PER_PIXEL: usize = 3;

pub fn register(registry: &mut FramerRegistry) {
    registry.register(FourCC::RGB3, new_framer);
}

fn new_framer(
    geometry: &FrameGeometry,
    options: &FramerOptions,
) -> Result<Box<dyn Framer>, CaptureError> {
    Ok(Box::new(Rgb3Framer::new(
        geometry.width,
        geometry.height,
        options.padded,
    )))
}

/// Width rounded up to a multiple of 32 and height to a multiple of 16.
pub fn padded_dimensions(width: u32, height: u32) -> (u32, u32) {
    ((width + 31) & !31, (height + 15) & !15)
}

#[derive(Debug, Clone)]
pub struct Rgb3Framer {
    width: u32,
    height: u32,
    /// Row length in pixels
    stride: usize,
    size: usize,
}

impl Rgb3Framer {
    pub fn new(width: u32, height: u32, padded: bool) -> Self {
        let (stride, rows) = if padded {
            padded_dimensions(width, height)
        } else {
            (width, height)
        };
        Self {
            width,
            height,
            stride: stride as usize,
            size: BYTES_PER_PIXEL * stride as usize * rows as usize,
        }
    }

    /// Row length in pixels, including padding
    pub fn stride(&self) -> usize {
        self.stride
    }
}

impl Framer for Rgb3Framer {
    fn format(&self) -> FourCC {
        FourCC::RGB3
    }

    fn expected_len(&self) -> usize {
        self.size
    }

    fn frame(&self, buffer: FrameBuffer) -> Result<Frame, CaptureError> {
        let buffer = check_len(buffer, self.size)?;
        Ok(Frame::new(
            buffer,
            self.width,
            self.height,
            self.stride * BYTES_PER_PIXEL,
            sample,
        ))
    }
}

fn sample(bytes: &[u8], stride: usize, x: usize, y: usize) -> Rgba<u8> {
    let i = stride * y + x * BYTES_PER_PIXEL;
    Rgba([bytes[i], bytes[i + 1], bytes[i + 2], 0xFF])
}
