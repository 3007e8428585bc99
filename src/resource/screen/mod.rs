pub mod memory_backend;

/// A frame materialized by a CPU-side backend, stored in contiguous memory.
#[derive(Debug, Clone, Copy)]
pub struct ScreenFrame<'a> {
    pub width: u32,
    pub height: u32,
    /// Bytes per row; may exceed `width * bytes_per_pixel` when rows are padded.
    pub stride: usize,
    pub pixels: &'a [u8],
}

/// Errors reported by capture backends.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScreenCaptureError {
    #[error("Screen capture unsupported: {0}")]
    Unsupported(&'static str),

    #[error("Screen capture OS error ({context}): 0x{code:08X}")]
    OsError { context: &'static str, code: u32 },

    /// The backend lost access to its output (mode change, secure desktop,
    /// device removal). Resources must be recreated.
    #[error("Screen capture invalid state: {0}")]
    InvalidState(&'static str),

    #[error("Screen capture backend error ({context}): {message}")]
    Backend {
        context: &'static str,
        message: String,
    },

    #[error(
        "Zone ({},{},{}x{}) lies outside the {}x{} frame",
        zone.0, zone.1, zone.2, zone.3, frame.0, frame.1
    )]
    ZoneOutOfFrame {
        zone: (usize, usize, usize, usize),
        frame: (u32, u32),
    },

    #[error("Zone buffer holds {actual} bytes but {expected} are required")]
    BufferSize { expected: usize, actual: usize },
}

impl ScreenCaptureError {
    /// Whether the condition is cured by dropping and recreating the
    /// backend's resources.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ScreenCaptureError::InvalidState(_))
    }
}

// ============================================================================
// Platform-specific modules
// ============================================================================

// Linux: Use xcap backend
#[cfg(target_os = "linux")]
pub mod xcap_backend;

#[cfg(target_os = "linux")]
pub use xcap_backend::XcapBackend;

pub use memory_backend::{FrameFeed, MemoryCaptureBackend};
