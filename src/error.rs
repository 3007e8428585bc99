use crate::resource::image::ImageError;
use crate::resource::screen::ScreenCaptureError;

/// Errors returned by the application-facing capture API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    #[error(
        "Invalid capture region ({x},{y},{width}x{height}) at level {downscale_level} \
         on a {display_width}x{display_height} display"
    )]
    InvalidRegion {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
        downscale_level: u32,
        display_width: usize,
        display_height: usize,
    },

    #[error("Capture resource has been disposed")]
    ResourceDisposed,

    #[error("Zone lock already released")]
    LockMisuse,

    #[error("Unknown capture zone {0}")]
    UnknownZone(usize),

    #[error(transparent)]
    Image(#[from] ImageError),

    #[error(transparent)]
    Backend(#[from] ScreenCaptureError),

    #[error("Unknown capture backend '{0}'")]
    UnknownBackend(String),
}
