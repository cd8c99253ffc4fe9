//! Four-character pixel format codes.

use crate::errors::CaptureError;
use std::fmt;
use std::str::FromStr;

/// Driver-native pixel format identifier (little-endian packed FourCC, as V4L2 uses).
pub type PixelFormat = u32;

/// Four-character tag identifying a raw pixel encoding, e.g. `RGB3` or `YUYV`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FourCC([u8; 4]);

impl FourCC {
    pub const RGB3: FourCC = FourCC(*b"RGB3");
    pub const YUYV: FourCC = FourCC(*b"YUYV");

    pub const fn new(code: &[u8; 4]) -> Self {
        FourCC(*code)
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    pub fn pixel_format(&self) -> PixelFormat {
        u32::from_le_bytes(self.0)
    }

    pub fn from_pixel_format(pf: PixelFormat) -> Self {
        FourCC(pf.to_le_bytes())
    }
}

impl FromStr for FourCC {
    type Err = CaptureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        if bytes.len() != 4 || !bytes.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
            return Err(CaptureError::InvalidFourCC(s.to_string()));
        }
        Ok(FourCC([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{}", b as char)?;
        }
        Ok(())
    }
}

impl From<FourCC> for PixelFormat {
    fn from(code: FourCC) -> Self {
        code.pixel_format()
    }
}
