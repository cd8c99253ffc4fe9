//! Borrowed driver buffers.
//!
//! A [`FrameBuffer`] is move-only. Whoever holds it when it is dropped, or calls
//! [`FrameBuffer::release`], returns it to the driver; the release callback can
//! therefore run at most once and the bytes can never be read afterwards.

use crate::driver::Device;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;

type ReleaseFn = Box<dyn FnOnce() + Send>;

pub struct FrameBuffer {
    data: Bytes,
    index: u32,
    sequence: u64,
    captured_at: DateTime<Utc>,
    release: Option<ReleaseFn>,
}

impl FrameBuffer {
    /// Wrap bytes that need no release (e.g. a caller-owned copy).
    pub fn new(data: impl Into<Bytes>, index: u32) -> Self {
        Self {
            data: data.into(),
            index,
            sequence: 0,
            captured_at: Utc::now(),
            release: None,
        }
    }

    /// Wrap a buffer dequeued from `device`; releasing it re-queues `index`.
    pub fn from_device(device: Arc<dyn Device>, data: Bytes, index: u32, sequence: u64) -> Self {
        Self::new(data, index)
            .with_sequence(sequence)
            .with_release(move || {
                if let Err(e) = device.release_frame(index) {
                    log::warn!("Failed to release buffer {}: {}", index, e);
                }
            })
    }

    pub fn with_release<F>(mut self, release: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.release = Some(Box::new(release));
        self
    }

    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Driver buffer index
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Position of this buffer in the order the driver produced it
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// Hand the buffer back to the driver.
    pub fn release(mut self) {
        self.run_release();
    }

    fn run_release(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for FrameBuffer {
    fn drop(&mut self) {
        self.run_release();
    }
}

impl fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("len", &self.data.len())
            .field("index", &self.index)
            .field("sequence", &self.sequence)
            .field("captured_at", &self.captured_at)
            .field("pending_release", &self.release.is_some())
            .finish()
    }
}
