//! Testing utilities for CrabSnap
//!
//! Provides an in-memory driver that fabricates frames and counts every
//! buffer it hands out, so the capture pipeline can be exercised offline.

pub mod synthetic_data;
pub mod synthetic_driver;

pub use synthetic_data::{synthetic_rgb3_frame, synthetic_yuyv_frame};
pub use synthetic_driver::{DriverStats, SyntheticCamera, SyntheticDevice, SyntheticDriver};
