//! YUYV 4:2:2: each 4-byte macropixel `Y0 U Y1 V` covers two horizontal pixels.

use super::{check_len, Frame, FrameGeometry, Framer, FramerOptions, FramerRegistry};
use crate::buffer::FrameBuffer;
use crate::errors::CaptureError;
use crate::fourcc::FourCC;
use image::Rgba;

pub fn register(registry: &mut FramerRegistry) {
    registry.register(FourCC::YUYV, new_framer);
}

fn new_framer(
    geometry: &FrameGeometry,
    _options: &FramerOptions,
) -> Result<Box<dyn Framer>, CaptureError> {
    Ok(Box::new(YuyvFramer::new(geometry)?))
}

#[derive(Debug, Clone)]
pub struct YuyvFramer {
    width: u32,
    height: u32,
    stride: usize,
    size: usize,
}

impl YuyvFramer {
    /// Uses the driver's stride and size. A stride too short for the row's
    /// macropixels or a zero size are replaced by the packed values.
    ///
    /// Fails with [`CaptureError::InvalidGeometry`] if `size` cannot hold the
    /// last row.
    pub fn new(geometry: &FrameGeometry) -> Result<Self, CaptureError> {
        // An odd width still occupies a whole trailing macropixel.
        let min_stride = 4 * (geometry.width as usize).div_ceil(2);
        let stride = (geometry.stride as usize).max(min_stride);
        let rows = geometry.height as usize;
        let size = match geometry.size as usize {
            0 => stride * rows,
            size => size,
        };
        let required = match rows {
            0 => 0,
            rows => stride * (rows - 1) + min_stride,
        };
        if size < required {
            return Err(CaptureError::InvalidGeometry {
                width: geometry.width,
                height: geometry.height,
                stride,
                size,
            });
        }
        Ok(Self {
            width: geometry.width,
            height: geometry.height,
            stride,
            size,
        })
    }

    pub fn stride(&self) -> usize {
        self.stride
    }
}

impl Framer for YuyvFramer {
    fn format(&self) -> FourCC {
        FourCC::YUYV
    }

    fn expected_len(&self) -> usize {
        self.size
    }

    fn frame(&self, buffer: FrameBuffer) -> Result<Frame, CaptureError> {
        let buffer = check_len(buffer, self.size)?;
        Ok(Frame::new(buffer, self.width, self.height, self.stride, sample))
    }
}

fn sample(bytes: &[u8], stride: usize, x: usize, y: usize) -> Rgba<u8> {
    let i = stride * y + (x / 2) * 4;
    let luma = if x % 2 == 0 { bytes[i] } else { bytes[i + 2] };
    let (r, g, b) = yuv_to_rgb(luma, bytes[i + 1], bytes[i + 3]);
    Rgba([r, g, b, 0xFF])
}

/// BT.601 full-range conversion
fn yuv_to_rgb(y: u8, u: u8, v: u8) -> (u8, u8, u8) {
    let y = y as f32;
    let u = u as f32 - 128.0;
    let v = v as f32 - 128.0;

    let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
    let g = (y - 0.344136 * u - 0.714136 * v).clamp(0.0, 255.0) as u8;
    let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;

    (r, g, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neutral_chroma_is_grey() {
        assert_eq!(yuv_to_rgb(100, 128, 128), (100, 100, 100));
        assert_eq!(yuv_to_rgb(0, 128, 128), (0, 0, 0));
        assert_eq!(yuv_to_rgb(255, 128, 128), (255, 255, 255));
    }

    #[test]
    fn test_geometry_fallbacks() {
        let framer = YuyvFramer::new(&FrameGeometry::new(4, 2, 0, 0)).unwrap();
        assert_eq!(framer.stride(), 8);
        assert_eq!(framer.expected_len(), 16);

        let padded = YuyvFramer::new(&FrameGeometry::new(4, 2, 16, 32)).unwrap();
        assert_eq!(padded.stride(), 16);
        assert_eq!(padded.expected_len(), 32);
    }

    #[test]
    fn test_macropixel_addressing() {
        // Two rows of 4 pixels, 12-byte stride (4 bytes of padding per row).
        let mut data = [16u8, 128, 16, 128].repeat(6);
        // Row 1, pixels 2 and 3: Y0=40, Y1=200, neutral chroma.
        data[12 + 4..12 + 8].copy_from_slice(&[40, 128, 200, 128]);
        let frame = YuyvFramer::new(&FrameGeometry::new(4, 2, 12, 24))
            .unwrap()
            .frame(FrameBuffer::new(data, 0))
            .unwrap();
        assert_eq!(frame.at(2, 1), Rgba([40, 40, 40, 0xFF]));
        assert_eq!(frame.at(3, 1), Rgba([200, 200, 200, 0xFF]));
        assert_eq!(frame.at(0, 0), Rgba([16, 16, 16, 0xFF]));
    }

    #[test]
    fn test_odd_width_covers_trailing_macropixel() {
        let framer = YuyvFramer::new(&FrameGeometry::new(3, 2, 0, 0)).unwrap();
        assert_eq!(framer.stride(), 8);
        assert_eq!(framer.expected_len(), 16);

        let mut data = [16u8, 128, 16, 128].repeat(4);
        data[8 + 4] = 90;
        let frame = framer.frame(FrameBuffer::new(data, 0)).unwrap();
        assert_eq!(frame.at(2, 1), Rgba([90, 90, 90, 0xFF]));
    }

    #[test]
    fn test_undersized_driver_size_rejected() {
        let result = YuyvFramer::new(&FrameGeometry::new(4, 2, 8, 12));
        assert!(matches!(
            result,
            Err(CaptureError::InvalidGeometry {
                stride: 8,
                size: 12,
                ..
            })
        ));

        // The last row needs only its pixels, not the full stride.
        let tight = YuyvFramer::new(&FrameGeometry::new(4, 2, 12, 20)).unwrap();
        assert_eq!(tight.expected_len(), 20);
    }

    #[test]
    fn test_registry_refuses_undersized_geometry() {
        let registry = FramerRegistry::with_defaults();
        let result = registry.lookup(
            FourCC::YUYV,
            &FrameGeometry::new(3, 2, 0, 10),
            &FramerOptions::default(),
        );
        assert!(matches!(result, Err(CaptureError::InvalidGeometry { .. })));
    }
}
