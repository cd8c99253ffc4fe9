//! Live capture pipeline.
//!
//! A [`Snapper`] negotiates a format with the device, then runs one capture
//! thread per open session. The thread waits for the driver to complete a
//! buffer and offers it on a zero-capacity channel. If no consumer is parked
//! in [`Snapper::snap`] at that instant the buffer goes straight back to the
//! driver, so the hardware ring is never stalled by a slow consumer and at
//! most one frame is ever in flight.

use crate::buffer::FrameBuffer;
use crate::config::SnapperConfig;
use crate::driver::{ControlId, Device, Driver, FrameSize};
use crate::errors::{CaptureError, DriverError};
use crate::fourcc::FourCC;
use crate::framer::{Frame, FrameGeometry, Framer, FramerOptions, FramerRegistry};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Select, SendError, Sender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

type FailureSlot = Arc<Mutex<Option<Arc<DriverError>>>>;

/// True if `val` is admitted by the driver range `(min, max, step)`.
pub fn can_fit(min: u32, max: u32, step: u32, val: u32) -> bool {
    // Fixed size exact match.
    if min == max && step == 0 && val == min {
        return true;
    }
    step != 0 && val >= min && val <= max && (val - min) % step == 0
}

/// True if the frame size entry can accommodate `width` x `height`.
pub fn matches(size: &FrameSize, width: u32, height: u32) -> bool {
    can_fit(size.min_width, size.max_width, size.step_width, width)
        && can_fit(size.min_height, size.max_height, size.step_height, height)
}

struct Session {
    device_id: String,
    device: Arc<dyn Device>,
    format: FourCC,
    geometry: FrameGeometry,
    framer: Box<dyn Framer>,
    stop_tx: Sender<()>,
    stream_rx: Receiver<FrameBuffer>,
    capture_thread: Option<JoinHandle<()>>,
}

pub struct Snapper {
    driver: Arc<dyn Driver>,
    registry: Arc<FramerRegistry>,
    config: SnapperConfig,
    session: Option<Session>,
    failure: FailureSlot,
}

impl Snapper {
    pub fn new(
        driver: Arc<dyn Driver>,
        registry: Arc<FramerRegistry>,
        config: SnapperConfig,
    ) -> Self {
        Self {
            driver,
            registry,
            config,
            session: None,
            failure: Arc::new(Mutex::new(None)),
        }
    }

    pub fn config(&self) -> &SnapperConfig {
        &self.config
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /// Negotiated geometry of the open session.
    pub fn geometry(&self) -> Option<FrameGeometry> {
        self.session.as_ref().map(|s| s.geometry)
    }

    pub fn format(&self) -> Option<FourCC> {
        self.session.as_ref().map(|s| s.format)
    }

    /// Driver error that terminated the most recent capture thread, if any.
    pub fn failure(&self) -> Option<Arc<DriverError>> {
        self.failure.lock().expect("lock poisoned").clone()
    }

    /// Open `device` and start streaming `format` at `width` x `height`.
    ///
    /// Any open session is closed first. On error the device is released and
    /// the snapper is left closed. An invalid configuration is rejected before
    /// any driver call.
    pub fn open(
        &mut self,
        device: &str,
        format: &str,
        width: u32,
        height: u32,
    ) -> Result<(), CaptureError> {
        self.config.validate().map_err(CaptureError::Config)?;

        let code: FourCC = format
            .parse()
            .map_err(|_| CaptureError::UnsupportedFormat {
                device: device.to_string(),
                format: format.to_string(),
            })?;

        self.close();

        let handle = self
            .driver
            .open(device)
            .map_err(|source| CaptureError::DeviceOpenFailed {
                device: device.to_string(),
                source,
            })?;

        match self.start_session(device, handle.clone(), code, width, height) {
            Ok(session) => {
                log::info!(
                    "{}: streaming {} {}x{}",
                    device,
                    code,
                    session.geometry.width,
                    session.geometry.height
                );
                self.session = Some(session);
                Ok(())
            }
            Err(e) => {
                if let Err(close_err) = handle.close() {
                    log::warn!("{}: failed to close after error: {}", device, close_err);
                }
                Err(e)
            }
        }
    }

    fn start_session(
        &mut self,
        device_id: &str,
        device: Arc<dyn Device>,
        code: FourCC,
        width: u32,
        height: u32,
    ) -> Result<Session, CaptureError> {
        let pf = code.pixel_format();
        let unsupported_format = || CaptureError::UnsupportedFormat {
            device: device_id.to_string(),
            format: code.to_string(),
        };

        if !device.supported_formats().contains_key(&pf) {
            return Err(unsupported_format());
        }

        let found = device
            .supported_frame_sizes(pf)
            .iter()
            .any(|size| matches(size, width, height));
        if !found {
            return Err(CaptureError::UnsupportedResolution {
                device: device_id.to_string(),
                width,
                height,
            });
        }

        let negotiated = device
            .set_image_format(pf, width, height)
            .map_err(CaptureError::SetFormatFailed)?;
        if negotiated.pixel_format != pf || negotiated.width != width || negotiated.height != height
        {
            log::warn!(
                "Asked for {} {}x{}, got {} {}x{}",
                code,
                width,
                height,
                FourCC::from_pixel_format(negotiated.pixel_format),
                negotiated.width,
                negotiated.height
            );
        }

        let geometry = FrameGeometry::new(
            negotiated.width,
            negotiated.height,
            negotiated.stride,
            negotiated.size,
        );
        let options = FramerOptions {
            padded: self.config.padded,
        };
        let framer = self.registry.lookup(code, &geometry, &options)?;

        if let Err(e) = device.set_buffer_count(self.config.buffer_count) {
            log::warn!("{}: failed to set buffer count: {}", device_id, e);
        }
        if let Err(e) = device.set_auto_white_balance(self.config.auto_white_balance) {
            log::warn!("{}: failed to set auto white balance: {}", device_id, e);
        }

        device
            .start_streaming()
            .map_err(CaptureError::StreamStartFailed)?;

        let (stop_tx, stop_rx) = bounded(1);
        let (stream_tx, stream_rx) = bounded(0);
        self.failure = Arc::new(Mutex::new(None));

        let capture = CaptureLoop {
            device: device.clone(),
            timeout: self.config.timeout(),
            stream_tx,
            stop_rx,
            failure: self.failure.clone(),
        };
        let capture_thread = std::thread::Builder::new()
            .name("crabsnap-capture".to_string())
            .spawn(move || capture.run())
            .map_err(|e| {
                if let Err(stop_err) = device.stop_streaming() {
                    log::warn!("{}: failed to stop stream: {}", device_id, stop_err);
                }
                CaptureError::StreamStartFailed(DriverError::Io(e))
            })?;

        Ok(Session {
            device_id: device_id.to_string(),
            device,
            format: code,
            geometry,
            framer,
            stop_tx,
            stream_rx,
            capture_thread: Some(capture_thread),
        })
    }

    /// Block until the next frame arrives.
    ///
    /// Returns [`CaptureError::NoFrameAvailable`] if the snapper is closed or
    /// the capture thread has ended.
    pub fn snap(&self) -> Result<Frame, CaptureError> {
        let session = self.session.as_ref().ok_or(CaptureError::NoFrameAvailable)?;
        let buffer = session
            .stream_rx
            .recv()
            .map_err(|_| CaptureError::NoFrameAvailable)?;
        session.framer.frame(buffer)
    }

    /// Like [`Snapper::snap`], but gives up after `timeout` with `Ok(None)`.
    pub fn snap_timeout(&self, timeout: Duration) -> Result<Option<Frame>, CaptureError> {
        let session = self.session.as_ref().ok_or(CaptureError::NoFrameAvailable)?;
        match session.stream_rx.recv_timeout(timeout) {
            Ok(buffer) => session.framer.frame(buffer).map(Some),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(CaptureError::NoFrameAvailable),
        }
    }

    /// Stop capturing, release every undelivered buffer and close the device.
    ///
    /// Does nothing if already closed.
    pub fn close(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };

        // Buffered, so this cannot block even if the capture thread already exited.
        let _ = session.stop_tx.try_send(());
        for buffer in session.stream_rx.iter() {
            buffer.release();
        }
        if let Some(handle) = session.capture_thread.take() {
            if handle.join().is_err() {
                log::error!("{}: capture thread panicked", session.device_id);
            }
        }

        if let Err(e) = session.device.stop_streaming() {
            log::warn!("{}: failed to stop stream: {}", session.device_id, e);
        }
        if let Err(e) = session.device.close() {
            log::warn!("{}: failed to close device: {}", session.device_id, e);
        }
        log::info!("{}: closed", session.device_id);
    }

    pub fn get_control(&self, id: ControlId) -> Result<i32, CaptureError> {
        let session = self.session.as_ref().ok_or(CaptureError::NotOpen)?;
        session.device.get_control(id).map_err(CaptureError::Control)
    }

    pub fn set_control(&self, id: ControlId, value: i32) -> Result<(), CaptureError> {
        let session = self.session.as_ref().ok_or(CaptureError::NotOpen)?;
        session
            .device
            .set_control(id, value)
            .map_err(CaptureError::Control)
    }
}

impl Drop for Snapper {
    fn drop(&mut self) {
        self.close();
    }
}

enum Handoff {
    Delivered,
    Dropped,
    Stopped,
}

struct CaptureLoop {
    device: Arc<dyn Device>,
    timeout: Duration,
    stream_tx: Sender<FrameBuffer>,
    stop_rx: Receiver<()>,
    failure: FailureSlot,
}

impl CaptureLoop {
    /// Runs until stopped or the driver fails. Returning drops `stream_tx`,
    /// which tells consumers and the drain in `close` that no frames remain.
    fn run(self) {
        let mut sequence = 0u64;
        loop {
            if self.stop_requested() {
                break;
            }

            match self.device.wait_for_frame(self.timeout) {
                Ok(()) => {}
                Err(DriverError::Timeout) => continue,
                Err(e) => {
                    self.fail(e);
                    break;
                }
            }

            let (data, index) = match self.device.get_frame() {
                Ok(frame) => frame,
                Err(e) => {
                    self.fail(e);
                    break;
                }
            };
            sequence += 1;
            let buffer = FrameBuffer::from_device(self.device.clone(), data, index, sequence);

            match self.handoff(buffer) {
                Handoff::Delivered => log::trace!("Delivered frame {}", sequence),
                Handoff::Dropped => log::trace!("Dropped frame {}", sequence),
                Handoff::Stopped => break,
            }
        }
        log::debug!("Capture thread exiting after {} frames", sequence);
    }

    fn stop_requested(&self) -> bool {
        !matches!(self.stop_rx.try_recv(), Err(TryRecvError::Empty))
    }

    /// Offer `buffer` to a parked consumer without blocking.
    fn handoff(&self, buffer: FrameBuffer) -> Handoff {
        let mut sel = Select::new();
        let deliver = sel.send(&self.stream_tx);
        let stop = sel.recv(&self.stop_rx);

        match sel.try_select() {
            Ok(op) if op.index() == deliver => match op.send(&self.stream_tx, buffer) {
                Ok(()) => Handoff::Delivered,
                Err(SendError(buffer)) => {
                    buffer.release();
                    Handoff::Stopped
                }
            },
            Ok(op) => {
                debug_assert_eq!(op.index(), stop);
                let _ = op.recv(&self.stop_rx);
                buffer.release();
                Handoff::Stopped
            }
            Err(_) => {
                buffer.release();
                Handoff::Dropped
            }
        }
    }

    fn fail(&self, error: DriverError) {
        log::error!("Capture stopped by driver error: {}", error);
        *self.failure.lock().expect("lock poisoned") = Some(Arc::new(error));
    }
}
