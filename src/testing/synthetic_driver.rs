//! In-memory driver used by tests and benchmarks.
//!
//! `SyntheticDriver` behaves like a small V4L2 camera: it advertises formats
//! and frame sizes, negotiates a format, and produces a new buffer every
//! `frame_interval` from a fixed ring of indices. Every driver call and buffer
//! transfer is counted in [`DriverStats`], and failures can be injected at
//! each stage of the open sequence and in the capture loop.

use super::synthetic_data::{synthetic_rgb3_frame, synthetic_yuyv_frame};
use crate::driver::{ControlId, Device, Driver, FrameSize, NegotiatedFormat};
use crate::errors::DriverError;
use crate::fourcc::{FourCC, PixelFormat};
use crate::framer::rgb3::padded_dimensions;
use bytes::Bytes;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Longest a synthetic timeout actually sleeps, whatever the requested timeout.
const MAX_TIMEOUT_SLEEP: Duration = Duration::from_millis(20);

/// Behaviour of the simulated camera.
#[derive(Debug, Clone)]
pub struct SyntheticCamera {
    pub formats: Vec<(FourCC, Vec<FrameSize>)>,
    pub frame_interval: Duration,
    /// Negotiate this size instead of the requested one
    pub adjusted_size: Option<(u32, u32)>,
    /// Report hardware-padded RGB3 buffers
    pub padded: bool,
    /// Deliver buffers of this length instead of the negotiated size
    pub frame_len: Option<usize>,
    /// Never complete a buffer; every wait times out
    pub stalled: bool,
    pub fail_open: bool,
    pub fail_set_format: bool,
    pub fail_start: bool,
    /// Fail `wait_for_frame` once this many frames have been fetched
    pub fail_after_frames: Option<u64>,
}

impl Default for SyntheticCamera {
    fn default() -> Self {
        let sizes = vec![
            FrameSize::discrete(640, 480),
            FrameSize::stepwise((160, 1280, 16), (120, 720, 8)),
        ];
        Self {
            formats: vec![(FourCC::RGB3, sizes.clone()), (FourCC::YUYV, sizes)],
            frame_interval: Duration::from_millis(2),
            adjusted_size: None,
            padded: false,
            frame_len: None,
            stalled: false,
            fail_open: false,
            fail_set_format: false,
            fail_start: false,
            fail_after_frames: None,
        }
    }
}

/// Counters shared by a driver and every device it opened.
#[derive(Debug, Default)]
pub struct DriverStats {
    calls: AtomicU64,
    opens: AtomicU64,
    closes: AtomicU64,
    stream_starts: AtomicU64,
    stream_stops: AtomicU64,
    frames_fetched: AtomicU64,
    frames_released: AtomicU64,
    double_releases: AtomicU64,
}

impl DriverStats {
    /// Every driver and device method invocation
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn opens(&self) -> u64 {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> u64 {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn stream_starts(&self) -> u64 {
        self.stream_starts.load(Ordering::SeqCst)
    }

    pub fn stream_stops(&self) -> u64 {
        self.stream_stops.load(Ordering::SeqCst)
    }

    pub fn frames_fetched(&self) -> u64 {
        self.frames_fetched.load(Ordering::SeqCst)
    }

    pub fn frames_released(&self) -> u64 {
        self.frames_released.load(Ordering::SeqCst)
    }

    /// Releases of an index that was not dequeued
    pub fn double_releases(&self) -> u64 {
        self.double_releases.load(Ordering::SeqCst)
    }

    /// Buffers fetched but not yet released
    pub fn outstanding(&self) -> u64 {
        self.frames_fetched()
            .saturating_sub(self.frames_released())
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct SyntheticDriver {
    camera: SyntheticCamera,
    stats: Arc<DriverStats>,
    last_device: Mutex<Option<Arc<SyntheticDevice>>>,
}

impl SyntheticDriver {
    pub fn new(camera: SyntheticCamera) -> Self {
        Self {
            camera,
            stats: Arc::new(DriverStats::default()),
            last_device: Mutex::new(None),
        }
    }

    pub fn stats(&self) -> Arc<DriverStats> {
        self.stats.clone()
    }

    /// Most recently opened device
    pub fn last_device(&self) -> Option<Arc<SyntheticDevice>> {
        self.last_device.lock().expect("lock poisoned").clone()
    }
}

impl Default for SyntheticDriver {
    fn default() -> Self {
        Self::new(SyntheticCamera::default())
    }
}

impl Driver for SyntheticDriver {
    fn open(&self, device: &str) -> Result<Arc<dyn Device>, DriverError> {
        DriverStats::bump(&self.stats.calls);
        if self.camera.fail_open {
            return Err(DriverError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no such device: {}", device),
            )));
        }
        DriverStats::bump(&self.stats.opens);

        let handle = Arc::new(SyntheticDevice::new(
            device,
            self.camera.clone(),
            self.stats.clone(),
        ));
        *self.last_device.lock().expect("lock poisoned") = Some(handle.clone());
        Ok(handle)
    }
}

struct DeviceState {
    negotiated: Option<NegotiatedFormat>,
    buffer_count: u32,
    streaming: bool,
    closed: bool,
    next_index: u32,
    frame_number: u64,
    outstanding: HashSet<u32>,
    controls: HashMap<ControlId, i32>,
}

pub struct SyntheticDevice {
    name: String,
    camera: SyntheticCamera,
    stats: Arc<DriverStats>,
    state: Mutex<DeviceState>,
}

impl SyntheticDevice {
    fn new(name: &str, camera: SyntheticCamera, stats: Arc<DriverStats>) -> Self {
        let controls = HashMap::from([
            (ControlId::BRIGHTNESS, 128),
            (ControlId::CONTRAST, 32),
            (ControlId::SATURATION, 64),
            (ControlId::HUE, 0),
            (ControlId::AUTO_WHITE_BALANCE, 0),
            (ControlId::GAIN, 0),
            (ControlId::SHARPNESS, 3),
        ]);
        Self {
            name: name.to_string(),
            camera,
            stats,
            state: Mutex::new(DeviceState {
                negotiated: None,
                buffer_count: 4,
                streaming: false,
                closed: false,
                next_index: 0,
                frame_number: 0,
                outstanding: HashSet::new(),
                controls,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn buffer_count(&self) -> u32 {
        self.state().buffer_count
    }

    pub fn is_streaming(&self) -> bool {
        self.state().streaming
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    pub fn negotiated(&self) -> Option<NegotiatedFormat> {
        self.state().negotiated
    }

    fn state(&self) -> std::sync::MutexGuard<'_, DeviceState> {
        self.state.lock().expect("lock poisoned")
    }

    fn call(&self) {
        DriverStats::bump(&self.stats.calls);
    }

    fn render(&self, negotiated: &NegotiatedFormat, frame_number: u64) -> Vec<u8> {
        let NegotiatedFormat {
            pixel_format,
            width,
            height,
            stride,
            size,
        } = *negotiated;
        let mut data = match FourCC::from_pixel_format(pixel_format) {
            FourCC::RGB3 => {
                let rows = if stride == 0 { height } else { size / stride };
                synthetic_rgb3_frame(frame_number, width, height, stride / 3, rows)
            }
            FourCC::YUYV => synthetic_yuyv_frame(frame_number, width, height, stride),
            _ => vec![0u8; size as usize],
        };
        data.resize(self.camera.frame_len.unwrap_or(size as usize), 0);
        data
    }
}

fn layout(code: FourCC, width: u32, height: u32, padded: bool) -> (u32, u32) {
    match code {
        FourCC::RGB3 if padded => {
            let (w, h) = padded_dimensions(width, height);
            (3 * w, 3 * w * h)
        }
        FourCC::RGB3 => (3 * width, 3 * width * height),
        _ => (2 * width, 2 * width * height),
    }
}

impl Device for SyntheticDevice {
    fn supported_formats(&self) -> HashMap<PixelFormat, String> {
        self.call();
        self.camera
            .formats
            .iter()
            .map(|(code, _)| (code.pixel_format(), format!("Synthetic {}", code)))
            .collect()
    }

    fn supported_frame_sizes(&self, format: PixelFormat) -> Vec<FrameSize> {
        self.call();
        self.camera
            .formats
            .iter()
            .find(|(code, _)| code.pixel_format() == format)
            .map(|(_, sizes)| sizes.clone())
            .unwrap_or_default()
    }

    fn set_image_format(
        &self,
        format: PixelFormat,
        width: u32,
        height: u32,
    ) -> Result<NegotiatedFormat, DriverError> {
        self.call();
        if self.camera.fail_set_format {
            return Err(DriverError::Device("format rejected".to_string()));
        }
        let (width, height) = self.camera.adjusted_size.unwrap_or((width, height));
        let (stride, size) = layout(
            FourCC::from_pixel_format(format),
            width,
            height,
            self.camera.padded,
        );
        let negotiated = NegotiatedFormat {
            pixel_format: format,
            width,
            height,
            stride,
            size,
        };
        self.state().negotiated = Some(negotiated);
        Ok(negotiated)
    }

    fn set_buffer_count(&self, count: u32) -> Result<(), DriverError> {
        self.call();
        self.state().buffer_count = count.max(1);
        Ok(())
    }

    fn set_auto_white_balance(&self, enabled: bool) -> Result<(), DriverError> {
        self.set_control(ControlId::AUTO_WHITE_BALANCE, i32::from(enabled))
    }

    fn start_streaming(&self) -> Result<(), DriverError> {
        self.call();
        if self.camera.fail_start {
            return Err(DriverError::Device("stream start failed".to_string()));
        }
        self.state().streaming = true;
        DriverStats::bump(&self.stats.stream_starts);
        Ok(())
    }

    fn stop_streaming(&self) -> Result<(), DriverError> {
        self.call();
        self.state().streaming = false;
        DriverStats::bump(&self.stats.stream_stops);
        Ok(())
    }

    fn wait_for_frame(&self, timeout: Duration) -> Result<(), DriverError> {
        self.call();
        let ready = {
            let state = self.state();
            if state.closed {
                return Err(DriverError::Closed);
            }
            if !state.streaming {
                return Err(DriverError::Device("not streaming".to_string()));
            }
            if let Some(limit) = self.camera.fail_after_frames {
                if state.frame_number >= limit {
                    return Err(DriverError::Device("simulated device failure".to_string()));
                }
            }
            !self.camera.stalled && (state.outstanding.len() as u32) < state.buffer_count
        };

        if ready {
            std::thread::sleep(self.camera.frame_interval);
            Ok(())
        } else {
            std::thread::sleep(timeout.min(MAX_TIMEOUT_SLEEP));
            Err(DriverError::Timeout)
        }
    }

    fn get_frame(&self) -> Result<(Bytes, u32), DriverError> {
        self.call();
        let mut state = self.state();
        if state.closed {
            return Err(DriverError::Closed);
        }
        let negotiated = state
            .negotiated
            .ok_or_else(|| DriverError::Device("format not set".to_string()))?;

        let count = state.buffer_count;
        let index = (0..count)
            .map(|i| (state.next_index + i) % count)
            .find(|i| !state.outstanding.contains(i))
            .ok_or_else(|| DriverError::Device("no buffer ready".to_string()))?;

        state.next_index = (index + 1) % count;
        state.frame_number += 1;
        state.outstanding.insert(index);
        let data = self.render(&negotiated, state.frame_number);
        DriverStats::bump(&self.stats.frames_fetched);
        Ok((Bytes::from(data), index))
    }

    fn release_frame(&self, index: u32) -> Result<(), DriverError> {
        self.call();
        if self.state().outstanding.remove(&index) {
            DriverStats::bump(&self.stats.frames_released);
            Ok(())
        } else {
            DriverStats::bump(&self.stats.double_releases);
            Err(DriverError::Device(format!("buffer {} was not dequeued", index)))
        }
    }

    fn get_control(&self, id: ControlId) -> Result<i32, DriverError> {
        self.call();
        self.state()
            .controls
            .get(&id)
            .copied()
            .ok_or_else(|| DriverError::Device(format!("unsupported control {:#x}", id.0)))
    }

    fn set_control(&self, id: ControlId, value: i32) -> Result<(), DriverError> {
        self.call();
        match self.state().controls.get_mut(&id) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(DriverError::Device(format!(
                "unsupported control {:#x}",
                id.0
            ))),
        }
    }

    fn close(&self) -> Result<(), DriverError> {
        self.call();
        self.state().closed = true;
        DriverStats::bump(&self.stats.closes);
        Ok(())
    }
}
