use crate::api::dto::CaptureConfig;
use crate::interface::color::{ColorBgra, Pixel};
use crate::interface::display::Display;
use crate::interface::zone::ZoneGeometry;
use crate::resource::screen::ScreenCaptureError;

/// Capability interface implemented by every platform capture mechanism.
///
/// The orchestrator drives a backend through these hooks only: it never
/// inspects which backend it is talking to. Frame acquisition happens in
/// `perform_screen_capture`; zone buffers are filled afterwards, one
/// `perform_capture_zone_update` call per due zone, possibly from several
/// threads at once.
pub trait CaptureBackend: Send + Sync {
    type Color: Pixel;

    /// Creates the backend's resources (devices, duplication handles, staging
    /// surfaces). Called on first use and on every restart.
    fn initialize(&mut self) -> Result<(), ScreenCaptureError>;

    /// Drops every resource created by `initialize` and `zone_registered`.
    fn release(&mut self);

    /// Materializes the latest frame into a backend-owned surface.
    ///
    /// `Ok(false)` means no frame was available within the timeout.
    /// Recoverable errors (see [`ScreenCaptureError::is_recoverable`]) make
    /// the orchestrator restart the backend.
    fn perform_screen_capture(&mut self) -> Result<bool, ScreenCaptureError>;

    /// Copies (level 0) or downscales (level > 0) the zone's region of the
    /// current frame into `buffer`, which is exactly
    /// `geometry.buffer_len(bytes_per_pixel)` bytes long. Every byte must be
    /// written; the buffer holds an older image. The caller holds the zone
    /// lock.
    fn perform_capture_zone_update(
        &self,
        geometry: &ZoneGeometry,
        buffer: &mut [u8],
    ) -> Result<(), ScreenCaptureError>;

    fn zone_registered(
        &mut self,
        _zone_id: usize,
        _geometry: &ZoneGeometry,
    ) -> Result<(), ScreenCaptureError> {
        Ok(())
    }

    fn zone_unregistered(&mut self, _zone_id: usize) {}
}

impl<B: CaptureBackend + ?Sized> CaptureBackend for Box<B> {
    type Color = B::Color;

    fn initialize(&mut self) -> Result<(), ScreenCaptureError> {
        (**self).initialize()
    }

    fn release(&mut self) {
        (**self).release()
    }

    fn perform_screen_capture(&mut self) -> Result<bool, ScreenCaptureError> {
        (**self).perform_screen_capture()
    }

    fn perform_capture_zone_update(
        &self,
        geometry: &ZoneGeometry,
        buffer: &mut [u8],
    ) -> Result<(), ScreenCaptureError> {
        (**self).perform_capture_zone_update(geometry, buffer)
    }

    fn zone_registered(
        &mut self,
        zone_id: usize,
        geometry: &ZoneGeometry,
    ) -> Result<(), ScreenCaptureError> {
        (**self).zone_registered(zone_id, geometry)
    }

    fn zone_unregistered(&mut self, zone_id: usize) {
        (**self).zone_unregistered(zone_id)
    }
}

/// Type-erased backend handed out by the registry. Registered backends
/// deliver BGRA, the native layout of desktop capture APIs.
pub type DynCaptureBackend = Box<dyn CaptureBackend<Color = ColorBgra>>;

/// Registry entry for a capture backend.
pub struct BackendMetadata {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub list_displays: fn() -> Result<Vec<Display>, ScreenCaptureError>,
    pub create: fn(&Display, &CaptureConfig) -> Result<DynCaptureBackend, ScreenCaptureError>,
}

inventory::collect!(BackendMetadata);
