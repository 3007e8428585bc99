pub mod inventory;
pub mod notify;
pub mod service;
pub mod zone;

use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rayon::prelude::*;

use crate::api::dto::{CaptureConfig, DownscalePolicy};
use crate::error::CaptureError;
use crate::interface::backend::{CaptureBackend, DynCaptureBackend};
use crate::interface::display::Display;
use crate::interface::zone::ZoneGeometry;
use crate::resource::screen::ScreenCaptureError;

use self::notify::{Notifier, SubscriptionId};
use self::zone::{CaptureZone, ZoneUpdated};

/// Lifecycle of a [`ScreenCapture`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CaptureState {
    /// Backend resources not created yet.
    Uninitialized = 0,
    Active = 1,
    /// Backend resources are gone or unusable; the next cycle restarts.
    Degraded = 2,
    Disposed = 3,
}

impl CaptureState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => CaptureState::Uninitialized,
            1 => CaptureState::Active,
            2 => CaptureState::Degraded,
            _ => CaptureState::Disposed,
        }
    }
}

/// Published once per capture cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureEvent {
    pub successful: bool,
    pub cycle: u64,
}

/// Zone events collected during a cycle, published after `inner` is released.
type ZoneEvents<C> = Vec<(Arc<CaptureZone<C>>, ZoneUpdated)>;

struct CaptureInner<B: CaptureBackend> {
    backend: B,
    zones: Vec<Arc<CaptureZone<B::Color>>>,
    consecutive_failures: u32,
}

/// Drives capture cycles for one display and owns its zones.
///
/// All backend access goes through one coarse lock, so a cycle, a restart
/// and a dispose never overlap. Zone buffers are additionally guarded by
/// their own lock, which consumers take to read them.
pub struct ScreenCapture<B: CaptureBackend = DynCaptureBackend> {
    display: Display,
    config: CaptureConfig,
    inner: Mutex<CaptureInner<B>>,
    state: AtomicU8,
    next_zone_id: AtomicUsize,
    cycles: AtomicU64,
    events: Notifier<CaptureEvent>,
}

impl<B: CaptureBackend> ScreenCapture<B> {
    /// Wraps `backend`; its resources are created by the first capture.
    pub fn new(display: Display, backend: B, config: CaptureConfig) -> Self {
        let events = Notifier::new(config.notification_capacity);
        Self {
            display,
            config,
            inner: Mutex::new(CaptureInner {
                backend,
                zones: Vec::new(),
                consecutive_failures: 0,
            }),
            state: AtomicU8::new(CaptureState::Uninitialized as u8),
            next_zone_id: AtomicUsize::new(0),
            cycles: AtomicU64::new(0),
            events,
        }
    }

    pub fn display(&self) -> &Display {
        &self.display
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn state(&self) -> CaptureState {
        CaptureState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_disposed(&self) -> bool {
        self.state() == CaptureState::Disposed
    }

    /// Completed capture cycles, successful or not.
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    /// Moves to `next` unless already disposed.
    fn transition(&self, next: CaptureState) -> bool {
        self.state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current != CaptureState::Disposed as u8).then_some(next as u8)
            })
            .is_ok()
    }

    fn ensure_alive(&self) -> Result<(), CaptureError> {
        if self.is_disposed() {
            Err(CaptureError::ResourceDisposed)
        } else {
            Ok(())
        }
    }

    fn lock_inner(&self) -> Result<MutexGuard<'_, CaptureInner<B>>, CaptureError> {
        self.ensure_alive()?;
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        // A dispose may have finished while we waited.
        self.ensure_alive()?;
        Ok(inner)
    }

    fn invalid_region(&self, x: usize, y: usize, width: usize, height: usize, level: u32) -> CaptureError {
        CaptureError::InvalidRegion {
            x,
            y,
            width,
            height,
            downscale_level: level,
            display_width: self.display.width,
            display_height: self.display.height,
        }
    }

    fn checked_geometry(
        &self,
        x: usize,
        y: usize,
        width: usize,
        height: usize,
        downscale_level: u32,
    ) -> Result<ZoneGeometry, CaptureError> {
        if !self.display.contains(x, y, width, height) {
            return Err(self.invalid_region(x, y, width, height, downscale_level));
        }

        let geometry = ZoneGeometry::new(x, y, width, height, downscale_level);
        if geometry.downscale_level < downscale_level
            && self.config.downscale_policy == DownscalePolicy::Reject
        {
            return Err(self.invalid_region(x, y, width, height, downscale_level));
        }
        Ok(geometry)
    }

    fn ensure_member(
        inner: &CaptureInner<B>,
        zone: &CaptureZone<B::Color>,
    ) -> Result<(), CaptureError> {
        if inner.zones.iter().any(|z| std::ptr::eq(z.as_ref(), zone)) {
            Ok(())
        } else {
            Err(CaptureError::UnknownZone(zone.id()))
        }
    }

    /// Registers a zone covering (`x`, `y`, `width`, `height`) of the display,
    /// stored at `downscale_level`.
    pub fn register_capture_zone(
        &self,
        x: usize,
        y: usize,
        width: usize,
        height: usize,
        downscale_level: u32,
    ) -> Result<Arc<CaptureZone<B::Color>>, CaptureError> {
        let geometry = self.checked_geometry(x, y, width, height, downscale_level)?;
        let mut inner = self.lock_inner()?;

        let id = self.next_zone_id.fetch_add(1, Ordering::Relaxed);
        let zone = Arc::new(CaptureZone::new(
            id,
            self.display.clone(),
            geometry,
            self.config.black_bar_threshold,
            self.config.notification_capacity,
        ));

        if self.state() == CaptureState::Active {
            inner.backend.zone_registered(id, &geometry)?;
        }
        inner.zones.push(zone.clone());

        log::debug!(
            display = self.display.index,
            zone = id,
            width = geometry.width,
            height = geometry.height,
            level = geometry.downscale_level;
            "Capture zone registered"
        );
        Ok(zone)
    }

    /// Removes `zone`; returns `false` if it is not registered here.
    pub fn unregister_capture_zone(
        &self,
        zone: &CaptureZone<B::Color>,
    ) -> Result<bool, CaptureError> {
        let mut inner = self.lock_inner()?;
        let Some(position) = inner
            .zones
            .iter()
            .position(|z| std::ptr::eq(z.as_ref(), zone))
        else {
            return Ok(false);
        };

        let removed = inner.zones.remove(position);
        if self.state() == CaptureState::Active {
            inner.backend.zone_unregistered(removed.id());
        }
        removed.dispose();

        log::debug!(display = self.display.index, zone = removed.id(); "Capture zone unregistered");
        Ok(true)
    }

    /// Changes the region size and downscale level of `zone`, keeping its
    /// origin.
    pub fn resize_capture_zone(
        &self,
        zone: &CaptureZone<B::Color>,
        width: usize,
        height: usize,
        downscale_level: u32,
    ) -> Result<(), CaptureError> {
        let mut inner = self.lock_inner()?;
        Self::ensure_member(&inner, zone)?;

        let current = zone.geometry();
        let geometry = self.checked_geometry(current.x, current.y, width, height, downscale_level)?;
        zone.resize(geometry);
        self.sync_backend_zone(&mut inner, zone.id(), &geometry)
    }

    /// Moves `zone` to (`x`, `y`) without touching its buffer.
    pub fn move_capture_zone(
        &self,
        zone: &CaptureZone<B::Color>,
        x: usize,
        y: usize,
    ) -> Result<(), CaptureError> {
        let mut inner = self.lock_inner()?;
        Self::ensure_member(&inner, zone)?;

        let current = zone.geometry();
        if !self
            .display
            .contains(x, y, current.unscaled_width, current.unscaled_height)
        {
            return Err(self.invalid_region(
                x,
                y,
                current.unscaled_width,
                current.unscaled_height,
                current.downscale_level,
            ));
        }
        zone.reposition(x, y);
        let geometry = zone.geometry();
        self.sync_backend_zone(&mut inner, zone.id(), &geometry)
    }

    fn sync_backend_zone(
        &self,
        inner: &mut CaptureInner<B>,
        id: usize,
        geometry: &ZoneGeometry,
    ) -> Result<(), CaptureError> {
        if self.state() != CaptureState::Active {
            return Ok(());
        }

        inner.backend.zone_unregistered(id);
        if let Err(err) = inner.backend.zone_registered(id, geometry) {
            log::warn!(display = self.display.index, zone = id, err:display = err; "Failed to update zone backend resources");
            self.transition(CaptureState::Degraded);
            return Err(err.into());
        }
        Ok(())
    }

    /// Snapshot of the registered zones.
    pub fn zones(&self) -> Vec<Arc<CaptureZone<B::Color>>> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .zones
            .clone()
    }

    /// Runs one capture cycle.
    ///
    /// Returns whether a new frame was captured and distributed to the due
    /// zones. Backend failures are logged and reported as `false`; the only
    /// error is [`CaptureError::ResourceDisposed`].
    ///
    /// Subscribers are notified after the capture lock is released, so
    /// handlers may call back into this capture.
    pub fn capture_screen(&self) -> Result<bool, CaptureError> {
        let mut inner = self.lock_inner()?;

        let zone_events = self.capture_locked(&mut inner);
        let successful = zone_events.is_some();
        let cycle = self.cycles.fetch_add(1, Ordering::Relaxed) + 1;
        drop(inner);

        for (zone, event) in zone_events.into_iter().flatten() {
            zone.publish_updated(&event);
        }
        self.events.publish(&CaptureEvent { successful, cycle });
        Ok(successful)
    }

    /// `None` when no frame was captured.
    fn capture_locked(&self, inner: &mut CaptureInner<B>) -> Option<ZoneEvents<B::Color>> {
        if self.state() != CaptureState::Active && self.restart_locked(inner).is_err() {
            return None;
        }

        match inner.backend.perform_screen_capture() {
            Ok(true) => {
                inner.consecutive_failures = 0;
            }
            Ok(false) => return None,
            Err(err) if err.is_recoverable() => {
                log::warn!(display = self.display.index, err:display = err; "Capture access lost, restarting backend");
                self.transition(CaptureState::Degraded);
                let _ = self.restart_locked(inner);
                return None;
            }
            Err(err) => {
                inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
                log::warn!(
                    display = self.display.index,
                    failures = inner.consecutive_failures,
                    err:display = err;
                    "Screen capture failed"
                );
                let limit = self.config.restart_after_failures;
                if limit > 0 && inner.consecutive_failures >= limit {
                    self.transition(CaptureState::Degraded);
                }
                return None;
            }
        }

        Some(self.update_zones(inner))
    }

    fn update_zones(&self, inner: &CaptureInner<B>) -> ZoneEvents<B::Color> {
        let due: Vec<_> = inner.zones.iter().filter(|z| z.is_due()).cloned().collect();
        let backend = &inner.backend;
        let display = self.display.index;

        let update = |zone: &Arc<CaptureZone<B::Color>>| {
            let result = zone.update_with(|geometry, buffer| {
                backend.perform_capture_zone_update(geometry, buffer)
            });
            match result {
                Ok(event) => Some((zone.clone(), event)),
                Err(err) => {
                    log::warn!(display = display, zone = zone.id(), err:display = err; "Zone update failed");
                    None
                }
            }
        };

        if self.config.parallel_zone_updates && due.len() > 1 {
            due.par_iter().filter_map(update).collect()
        } else {
            due.iter().filter_map(update).collect()
        }
    }

    /// Recreates the backend resources, keeping every registered zone.
    ///
    /// On failure the capture stays degraded and the next cycle retries.
    pub fn restart(&self) -> Result<(), CaptureError> {
        let mut inner = self.lock_inner()?;
        Ok(self.restart_locked(&mut inner)?)
    }

    fn restart_locked(&self, inner: &mut CaptureInner<B>) -> Result<(), ScreenCaptureError> {
        inner.backend.release();

        let CaptureInner { backend, zones, .. } = &mut *inner;
        let result = backend.initialize().and_then(|()| {
            zones
                .iter()
                .try_for_each(|zone| backend.zone_registered(zone.id(), &zone.geometry()))
        });

        match result {
            Ok(()) => {
                inner.consecutive_failures = 0;
                self.transition(CaptureState::Active);
                log::info!(display = self.display.index, zones = inner.zones.len(); "Capture backend (re)initialized");
                Ok(())
            }
            Err(err) => {
                inner.backend.release();
                self.transition(CaptureState::Degraded);
                log::warn!(display = self.display.index, err:display = err; "Capture backend restart failed");
                Err(err)
            }
        }
    }

    /// Releases every zone and the backend. Later calls are no-ops; every
    /// other operation fails with [`CaptureError::ResourceDisposed`].
    pub fn dispose(&self) {
        let previous = self.state.swap(CaptureState::Disposed as u8, Ordering::AcqRel);
        if previous == CaptureState::Disposed as u8 {
            return;
        }

        // Waits for an in-flight cycle.
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let zones = std::mem::take(&mut inner.zones);
        for zone in &zones {
            if previous == CaptureState::Active as u8 {
                inner.backend.zone_unregistered(zone.id());
            }
            zone.dispose();
        }
        inner.backend.release();

        log::debug!(display = self.display.index, zones = zones.len(); "Screen capture disposed");
    }

    pub fn subscribe(&self) -> flume::Receiver<CaptureEvent> {
        self.events.subscribe()
    }

    pub fn on_updated<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&CaptureEvent) + Send + Sync + 'static,
    {
        self.events.on_event(handler)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }
}

impl<B: CaptureBackend> Drop for ScreenCapture<B> {
    fn drop(&mut self) {
        self.dispose();
    }
}
