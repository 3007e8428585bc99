use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::error::CaptureError;
use crate::interface::color::Pixel;
use crate::interface::display::Display;
use crate::interface::zone::ZoneGeometry;
use crate::resource::black_bar::{BlackBarCache, BlackBarEdges, BlackBars};
use crate::resource::image::Image;
use crate::resource::screen::ScreenCaptureError;

use super::notify::{Notifier, SubscriptionId};

/// Published after a zone buffer was refreshed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneUpdated {
    pub zone_id: usize,
    pub geometry: ZoneGeometry,
}

struct ZoneState<C> {
    geometry: ZoneGeometry,
    buffer: Vec<C>,
    /// Same length as `buffer`; updates land here and are swapped in on
    /// success.
    scratch: Vec<C>,
    black_bars: BlackBarCache,
}

/// A registered display region and its pixel buffer.
///
/// The buffer is written only by the owning `ScreenCapture`, inside the zone
/// lock. Consumers read it through [`CaptureZone::lock`].
pub struct CaptureZone<C> {
    id: usize,
    display: Display,
    state: Mutex<ZoneState<C>>,
    auto_update: AtomicBool,
    update_requested: AtomicBool,
    disposed: AtomicBool,
    updates: AtomicU64,
    updated: Notifier<ZoneUpdated>,
}

impl<C: Pixel> CaptureZone<C> {
    pub(crate) fn new(
        id: usize,
        display: Display,
        geometry: ZoneGeometry,
        black_bar_threshold: u8,
        notification_capacity: usize,
    ) -> Self {
        Self {
            id,
            display,
            state: Mutex::new(ZoneState {
                geometry,
                buffer: vec![C::default(); geometry.pixel_count()],
                scratch: vec![C::default(); geometry.pixel_count()],
                black_bars: BlackBarCache::new(black_bar_threshold),
            }),
            auto_update: AtomicBool::new(true),
            update_requested: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            updates: AtomicU64::new(0),
            updated: Notifier::new(notification_capacity),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn display(&self) -> &Display {
        &self.display
    }

    fn state(&self) -> MutexGuard<'_, ZoneState<C>> {
        self.state.lock().unwrap_or_else(|poisoned| {
            log::debug!(zone = self.id; "Recovering poisoned zone lock");
            self.state.clear_poison();
            poisoned.into_inner()
        })
    }

    /// Takes the zone lock. Buffer updates wait until the lock is released.
    pub fn lock(&self) -> Result<ZoneLock<'_, C>, CaptureError> {
        if self.is_disposed() {
            return Err(CaptureError::ResourceDisposed);
        }
        Ok(ZoneLock {
            zone: self,
            guard: Some(self.state()),
        })
    }

    /// Runs `f` with a view of the current image under the zone lock.
    pub fn with_image<R>(&self, f: impl FnOnce(Image<'_, C>) -> R) -> Result<R, CaptureError> {
        let lock = self.lock()?;
        let image = lock.image()?;
        Ok(f(image))
    }

    /// Snapshot of the geometry.
    pub fn geometry(&self) -> ZoneGeometry {
        self.state().geometry
    }

    pub fn auto_update(&self) -> bool {
        self.auto_update.load(Ordering::Acquire)
    }

    pub fn set_auto_update(&self, enabled: bool) {
        self.auto_update.store(enabled, Ordering::Release);
    }

    /// Asks the next capture cycle to refresh this zone even when
    /// auto-update is off.
    pub fn request_update(&self) {
        self.update_requested.store(true, Ordering::Release);
    }

    pub fn is_update_requested(&self) -> bool {
        self.update_requested.load(Ordering::Acquire)
    }

    pub(crate) fn is_due(&self) -> bool {
        !self.is_disposed() && (self.auto_update() || self.is_update_requested())
    }

    /// Number of successful buffer updates.
    pub fn update_count(&self) -> u64 {
        self.updates.load(Ordering::Relaxed)
    }

    pub fn black_bar_threshold(&self) -> u8 {
        self.state().black_bars.threshold()
    }

    pub fn set_black_bar_threshold(&self, threshold: u8) {
        self.state().black_bars.set_threshold(threshold);
    }

    pub fn subscribe(&self) -> flume::Receiver<ZoneUpdated> {
        self.updated.subscribe()
    }

    pub fn on_updated<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&ZoneUpdated) + Send + Sync + 'static,
    {
        self.updated.on_event(handler)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.updated.unsubscribe(id)
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    pub(crate) fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
    }

    /// Fills the buffer through `update` under the zone lock and marks the
    /// zone updated. On failure the previous contents stay in place.
    ///
    /// The returned event is not published; the caller hands it to
    /// [`CaptureZone::publish_updated`] once it holds no other locks.
    pub(crate) fn update_with<F>(&self, update: F) -> Result<ZoneUpdated, ScreenCaptureError>
    where
        F: FnOnce(&ZoneGeometry, &mut [u8]) -> Result<(), ScreenCaptureError>,
    {
        let geometry = {
            let mut state = self.state();
            let state = &mut *state;
            update(&state.geometry, bytemuck::cast_slice_mut(&mut state.scratch))?;
            std::mem::swap(&mut state.buffer, &mut state.scratch);
            state.black_bars.invalidate();
            state.geometry
        };

        self.update_requested.store(false, Ordering::Release);
        self.updates.fetch_add(1, Ordering::Relaxed);
        Ok(ZoneUpdated {
            zone_id: self.id,
            geometry,
        })
    }

    pub(crate) fn publish_updated(&self, event: &ZoneUpdated) {
        self.updated.publish(event);
    }

    /// Swaps in a new geometry, reallocating only when the buffer size
    /// changes.
    pub(crate) fn resize(&self, geometry: ZoneGeometry) {
        let mut state = self.state();
        if state.buffer.len() != geometry.pixel_count() {
            state.buffer = vec![C::default(); geometry.pixel_count()];
            state.scratch = vec![C::default(); geometry.pixel_count()];
        }
        state.geometry = geometry;
        state.black_bars.invalidate();
    }

    pub(crate) fn reposition(&self, x: usize, y: usize) {
        let mut state = self.state();
        state.geometry.x = x;
        state.geometry.y = y;
    }
}

impl<C> std::fmt::Debug for CaptureZone<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureZone")
            .field("id", &self.id)
            .field("display", &self.display.index)
            .finish_non_exhaustive()
    }
}

/// Scoped read access to a zone's buffer.
///
/// Dropping the lock releases it; [`ZoneLock::release`] does the same
/// explicitly and reports a second release as misuse.
pub struct ZoneLock<'a, C> {
    zone: &'a CaptureZone<C>,
    guard: Option<MutexGuard<'a, ZoneState<C>>>,
}

impl<'a, C: Pixel> ZoneLock<'a, C> {
    fn state(&self) -> Result<&ZoneState<C>, CaptureError> {
        self.guard.as_deref().ok_or(CaptureError::LockMisuse)
    }

    fn state_mut(&mut self) -> Result<&mut ZoneState<C>, CaptureError> {
        self.guard.as_deref_mut().ok_or(CaptureError::LockMisuse)
    }

    pub fn zone_id(&self) -> usize {
        self.zone.id
    }

    pub fn geometry(&self) -> Result<ZoneGeometry, CaptureError> {
        Ok(self.state()?.geometry)
    }

    pub fn image(&self) -> Result<Image<'_, C>, CaptureError> {
        let state = self.state()?;
        let geometry = state.geometry;
        Ok(Image::from_pixels(
            &state.buffer,
            geometry.width,
            geometry.height,
        )?)
    }

    /// The buffer as bytes; `stride * height` long.
    pub fn raw_bytes(&self) -> Result<&[u8], CaptureError> {
        Ok(bytemuck::cast_slice(&self.state()?.buffer))
    }

    pub fn black_bar_threshold(&self) -> Result<u8, CaptureError> {
        Ok(self.state()?.black_bars.threshold())
    }

    pub fn set_black_bar_threshold(&mut self, threshold: u8) -> Result<(), CaptureError> {
        self.state_mut()?.black_bars.set_threshold(threshold);
        Ok(())
    }

    /// Black bars of the current image, memoized until the next update.
    pub fn black_bars(&mut self) -> Result<BlackBars, CaptureError> {
        let state = self.state_mut()?;
        let geometry = state.geometry;
        let image = Image::from_pixels(&state.buffer, geometry.width, geometry.height)?;
        Ok(state.black_bars.bars(&image))
    }

    /// View of the current image without the black bars on `edges`.
    pub fn remove_black_bars(&mut self, edges: BlackBarEdges) -> Result<Image<'_, C>, CaptureError> {
        let state = self.state_mut()?;
        let geometry = state.geometry;
        let image = Image::from_pixels(&state.buffer, geometry.width, geometry.height)?;
        let (x, y, width, height) = state.black_bars.content_rect(&image, edges);
        Ok(image.sub_image(x, y, width, height)?)
    }

    pub fn is_released(&self) -> bool {
        self.guard.is_none()
    }

    pub fn release(&mut self) -> Result<(), CaptureError> {
        self.guard
            .take()
            .map(drop)
            .ok_or(CaptureError::LockMisuse)
    }
}
