//! Capture backend fed with frames from memory.
//!
//! Useful when frames already exist in the process (a decoder, a remote
//! desktop stream, a test fixture). A producer pushes frames into a
//! [`FrameFeed`]; every capture cycle snapshots the latest one.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::interface::backend::CaptureBackend;
use crate::interface::color::Pixel;
use crate::interface::zone::ZoneGeometry;
use crate::resource::sampler::update_zone_from_frame;

use super::{ScreenCaptureError, ScreenFrame};

#[derive(Debug)]
struct OwnedFrame {
    width: u32,
    height: u32,
    stride: usize,
    pixels: Vec<u8>,
}

impl OwnedFrame {
    fn view(&self) -> ScreenFrame<'_> {
        ScreenFrame {
            width: self.width,
            height: self.height,
            stride: self.stride,
            pixels: &self.pixels,
        }
    }
}

#[derive(Debug)]
struct FeedState {
    frame: Option<Arc<OwnedFrame>>,
    available: bool,
    access_lost: bool,
}

#[derive(Debug)]
struct FeedShared {
    state: Mutex<FeedState>,
    changed: Condvar,
}

/// Producer side of a [`MemoryCaptureBackend`]. Cheap to clone.
#[derive(Debug)]
pub struct FrameFeed<C> {
    shared: Arc<FeedShared>,
    _color: PhantomData<fn() -> C>,
}

impl<C> Clone for FrameFeed<C> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            _color: PhantomData,
        }
    }
}

impl<C: Pixel> Default for FrameFeed<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Pixel> FrameFeed<C> {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(FeedShared {
                state: Mutex::new(FeedState {
                    frame: None,
                    available: true,
                    access_lost: false,
                }),
                changed: Condvar::new(),
            }),
            _color: PhantomData,
        }
    }

    fn lock(&self) -> MutexGuard<'_, FeedState> {
        self.shared.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocks up to `timeout` while no frame has been pushed yet.
    fn wait_for_first_frame(&self, timeout: Duration) -> MutexGuard<'_, FeedState> {
        let state = self.lock();
        if timeout.is_zero() {
            return state;
        }
        self.shared
            .changed
            .wait_timeout_while(state, timeout, |s| {
                s.frame.is_none() && s.available && !s.access_lost
            })
            .map(|(state, _)| state)
            .unwrap_or_else(|poisoned| poisoned.into_inner().0)
    }

    /// Publishes a tightly packed `width` x `height` frame.
    pub fn push(&self, width: u32, height: u32, pixels: &[C]) -> Result<(), ScreenCaptureError> {
        let stride = width as usize * C::FORMAT.bytes_per_pixel();
        self.push_bytes(width, height, stride, bytemuck::cast_slice(pixels).to_vec())
    }

    /// Publishes a frame of raw bytes in `C`'s layout whose rows are
    /// `stride` bytes apart.
    pub fn push_bytes(
        &self,
        width: u32,
        height: u32,
        stride: usize,
        pixels: Vec<u8>,
    ) -> Result<(), ScreenCaptureError> {
        let row_bytes = width as usize * C::FORMAT.bytes_per_pixel();
        let required = stride * height as usize;
        if stride < row_bytes || pixels.len() < required {
            return Err(ScreenCaptureError::BufferSize {
                expected: required.max(row_bytes * height as usize),
                actual: pixels.len(),
            });
        }

        self.lock().frame = Some(Arc::new(OwnedFrame {
            width,
            height,
            stride,
            pixels,
        }));
        self.shared.changed.notify_all();
        Ok(())
    }

    /// Makes the next capture report lost access, as a desktop duplication
    /// does after a mode change.
    pub fn signal_access_lost(&self) {
        self.lock().access_lost = true;
        self.shared.changed.notify_all();
    }

    /// An unavailable feed fails initialization and capture until it becomes
    /// available again.
    pub fn set_available(&self, available: bool) {
        self.lock().available = available;
        self.shared.changed.notify_all();
    }
}

pub struct MemoryCaptureBackend<C> {
    feed: FrameFeed<C>,
    timeout: Duration,
    current: Option<Arc<OwnedFrame>>,
    initialized: bool,
    zones: HashMap<usize, ZoneGeometry>,
}

impl<C: Pixel> MemoryCaptureBackend<C> {
    /// Never waits; a capture before the first push reports no frame.
    pub fn new(feed: FrameFeed<C>) -> Self {
        Self::with_timeout(feed, Duration::ZERO)
    }

    /// Waits up to `timeout` for the first frame of the feed.
    pub fn with_timeout(feed: FrameFeed<C>, timeout: Duration) -> Self {
        Self {
            feed,
            timeout,
            current: None,
            initialized: false,
            zones: HashMap::new(),
        }
    }

    pub fn feed(&self) -> &FrameFeed<C> {
        &self.feed
    }

    /// Zones the backend currently holds resources for.
    pub fn registered_zones(&self) -> usize {
        self.zones.len()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
}

impl<C: Pixel> CaptureBackend for MemoryCaptureBackend<C> {
    type Color = C;

    fn initialize(&mut self) -> Result<(), ScreenCaptureError> {
        let mut state = self.feed.lock();
        if !state.available {
            return Err(ScreenCaptureError::InvalidState("frame feed unavailable"));
        }
        state.access_lost = false;
        self.initialized = true;
        Ok(())
    }

    fn release(&mut self) {
        self.initialized = false;
        self.current = None;
        self.zones.clear();
    }

    fn perform_screen_capture(&mut self) -> Result<bool, ScreenCaptureError> {
        if !self.initialized {
            return Err(ScreenCaptureError::InvalidState("frame feed not initialized"));
        }

        let mut state = self.feed.wait_for_first_frame(self.timeout);
        if state.access_lost || !state.available {
            state.access_lost = false;
            drop(state);
            self.initialized = false;
            return Err(ScreenCaptureError::InvalidState("frame feed lost access"));
        }

        match state.frame.clone() {
            Some(frame) => {
                self.current = Some(frame);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn perform_capture_zone_update(
        &self,
        geometry: &ZoneGeometry,
        buffer: &mut [u8],
    ) -> Result<(), ScreenCaptureError> {
        let frame = self
            .current
            .as_ref()
            .ok_or(ScreenCaptureError::InvalidState("no frame captured yet"))?;
        update_zone_from_frame(&frame.view(), geometry, C::FORMAT.bytes_per_pixel(), buffer)
    }

    fn zone_registered(
        &mut self,
        zone_id: usize,
        geometry: &ZoneGeometry,
    ) -> Result<(), ScreenCaptureError> {
        self.zones.insert(zone_id, *geometry);
        Ok(())
    }

    fn zone_unregistered(&mut self, zone_id: usize) {
        self.zones.remove(&zone_id);
    }
}
