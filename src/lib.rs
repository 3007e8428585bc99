//! Lock-guarded screen capture zones.
//!
//! A [`ScreenCapture`] owns the zones registered on one display. Each call to
//! [`ScreenCapture::capture_screen`] asks the backend for a frame and copies
//! (or block-averages) every due zone's region into the zone's buffer.
//! Consumers lock a zone and read it through zero-copy [`Image`] views.

pub mod api;
pub mod error;
pub mod interface;
pub mod manager;
pub mod resource;

pub use api::dto::{CaptureConfig, DownscalePolicy};
pub use error::CaptureError;
pub use interface::backend::{BackendMetadata, CaptureBackend, DynCaptureBackend};
pub use interface::color::{
    ColorAbgr, ColorArgb, ColorBgr, ColorBgra, ColorFormat, ColorRgb, ColorRgba, Pixel,
};
pub use interface::display::{Display, GraphicsCard, Rotation};
pub use interface::zone::{calculate_scaled_size, ZoneGeometry};
pub use manager::inventory::{find_backend, list_backends};
pub use manager::notify::{Notifier, SubscriptionId};
pub use manager::service::ScreenCaptureService;
pub use manager::zone::{CaptureZone, ZoneLock, ZoneUpdated};
pub use manager::{CaptureEvent, CaptureState, ScreenCapture};
pub use resource::black_bar::{BlackBarEdges, BlackBars};
pub use resource::image::{Image, ImageColumn, ImageColumns, ImageError, ImageRow, ImageRows};
pub use resource::screen::{FrameFeed, MemoryCaptureBackend, ScreenCaptureError, ScreenFrame};
