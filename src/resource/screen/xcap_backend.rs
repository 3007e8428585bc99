//! Screen capture backend using the xcap library.
//!
//! xcap hands out owned RGBA images; frames are converted to BGRA once per
//! capture so zones see the same layout as the native desktop APIs.

use xcap::Monitor;

use crate::api::dto::CaptureConfig;
use crate::interface::backend::{BackendMetadata, CaptureBackend, DynCaptureBackend};
use crate::interface::color::ColorBgra;
use crate::interface::display::{Display, GraphicsCard, Rotation};
use crate::interface::zone::ZoneGeometry;
use crate::resource::sampler::update_zone_from_frame;

use super::{ScreenCaptureError, ScreenFrame};

pub(crate) const BYTES_PER_PIXEL: usize = 4;

fn backend_error(context: &'static str) -> impl FnOnce(xcap::XCapError) -> ScreenCaptureError {
    move |e| ScreenCaptureError::Backend {
        context,
        message: e.to_string(),
    }
}

fn all_monitors() -> Result<Vec<Monitor>, ScreenCaptureError> {
    Monitor::all().map_err(backend_error("Monitor::all"))
}

/// xcap does not expose adapters; every monitor hangs off one pseudo card.
fn pseudo_graphics_card() -> GraphicsCard {
    GraphicsCard {
        index: 0,
        name: "xcap".to_string(),
        vendor_id: 0,
        device_id: 0,
    }
}

pub fn list_displays() -> Result<Vec<Display>, ScreenCaptureError> {
    let monitors = all_monitors()?;

    let mut displays = Vec::with_capacity(monitors.len());
    for (index, monitor) in monitors.iter().enumerate() {
        let name = monitor.name().unwrap_or_else(|_| format!("Display {}", index));
        let width = monitor.width().unwrap_or(0) as usize;
        let height = monitor.height().unwrap_or(0) as usize;

        displays.push(Display {
            index,
            name,
            width,
            height,
            rotation: Rotation::None,
            graphics_card: pseudo_graphics_card(),
        });
    }

    Ok(displays)
}

/// Captures one monitor through xcap.
///
/// The monitor is looked up again on every capture; a vanished monitor is
/// reported as an invalid state so the orchestrator restarts the backend.
pub struct XcapBackend {
    display: Display,
    initialized: bool,
    // BGRA, tightly packed
    buffer: Vec<u8>,
    width: u32,
    height: u32,
}

impl XcapBackend {
    pub fn new(display: Display) -> Self {
        Self {
            display,
            initialized: false,
            buffer: Vec::new(),
            width: 0,
            height: 0,
        }
    }

    pub fn display(&self) -> &Display {
        &self.display
    }

    fn monitor(&self) -> Result<Monitor, ScreenCaptureError> {
        all_monitors()?
            .into_iter()
            .nth(self.display.index)
            .ok_or(ScreenCaptureError::InvalidState("Monitor index out of range"))
    }

    fn frame(&self) -> ScreenFrame<'_> {
        ScreenFrame {
            width: self.width,
            height: self.height,
            stride: self.width as usize * BYTES_PER_PIXEL,
            pixels: &self.buffer,
        }
    }
}

impl CaptureBackend for XcapBackend {
    type Color = ColorBgra;

    fn initialize(&mut self) -> Result<(), ScreenCaptureError> {
        let monitor = self.monitor()?;
        let width = monitor.width().map_err(backend_error("Monitor::width"))?;
        let height = monitor.height().map_err(backend_error("Monitor::height"))?;

        if width as usize != self.display.width || height as usize != self.display.height {
            log::warn!(
                display = self.display.index,
                expected_width = self.display.width,
                expected_height = self.display.height,
                width = width,
                height = height;
                "Monitor resolution differs from enumerated display"
            );
        }

        self.initialized = true;
        Ok(())
    }

    fn release(&mut self) {
        self.initialized = false;
        self.buffer = Vec::new();
        self.width = 0;
        self.height = 0;
    }

    fn perform_screen_capture(&mut self) -> Result<bool, ScreenCaptureError> {
        if !self.initialized {
            return Err(ScreenCaptureError::InvalidState("xcap backend not initialized"));
        }

        let monitor = self.monitor()?;
        let image = monitor
            .capture_image()
            .map_err(backend_error("capture_image"))?;

        self.width = image.width();
        self.height = image.height();

        // RGBA -> BGRA
        let raw = image.into_raw();
        self.buffer.clear();
        self.buffer.reserve(raw.len());
        for chunk in raw.chunks_exact(BYTES_PER_PIXEL) {
            self.buffer
                .extend_from_slice(&[chunk[2], chunk[1], chunk[0], chunk[3]]);
        }

        Ok(true)
    }

    fn perform_capture_zone_update(
        &self,
        geometry: &ZoneGeometry,
        buffer: &mut [u8],
    ) -> Result<(), ScreenCaptureError> {
        if self.buffer.is_empty() {
            return Err(ScreenCaptureError::InvalidState("no frame captured yet"));
        }
        update_zone_from_frame(&self.frame(), geometry, BYTES_PER_PIXEL, buffer)
    }
}

fn create(display: &Display, _config: &CaptureConfig) -> Result<DynCaptureBackend, ScreenCaptureError> {
    Ok(Box::new(XcapBackend::new(display.clone())))
}

inventory::submit!(BackendMetadata {
    id: "xcap",
    name: "XCap",
    description: "Cross-platform capture through the xcap library",
    list_displays,
    create,
});
