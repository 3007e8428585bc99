use serde::{Deserialize, Serialize};

/// What to do when a requested downscale level cannot be honoured because
/// the region is too small.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownscalePolicy {
    /// Use the largest level the region allows.
    #[default]
    Clamp,
    /// Fail the registration or resize with `InvalidRegion`.
    Reject,
}

pub const DEFAULT_TIMEOUT_MS: u32 = 16;
pub const DEFAULT_BLACK_BAR_THRESHOLD: u8 = 8;
pub const DEFAULT_RESTART_AFTER_FAILURES: u32 = 3;
pub const DEFAULT_NOTIFICATION_CAPACITY: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptureConfig {
    /// Registered backend id; `None` picks the platform default.
    pub backend: Option<String>,
    /// Upper bound a backend may block waiting for a new frame.
    pub timeout_ms: u32,
    /// Update due zones on the rayon pool instead of one after another.
    pub parallel_zone_updates: bool,
    pub downscale_policy: DownscalePolicy,
    /// Initial black-bar threshold of new zones.
    pub black_bar_threshold: u8,
    /// Consecutive non-recoverable frame failures before the orchestrator
    /// marks itself for restart. 0 disables the counter.
    pub restart_after_failures: u32,
    /// Queue depth of each notification subscriber channel.
    pub notification_capacity: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            backend: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            parallel_zone_updates: true,
            downscale_policy: DownscalePolicy::Clamp,
            black_bar_threshold: DEFAULT_BLACK_BAR_THRESHOLD,
            restart_after_failures: DEFAULT_RESTART_AFTER_FAILURES,
            notification_capacity: DEFAULT_NOTIFICATION_CAPACITY,
        }
    }
}

impl CaptureConfig {
    pub fn default_for_platform() -> Self {
        #[cfg(target_os = "linux")]
        let backend = Some("xcap".to_string());
        #[cfg(not(target_os = "linux"))]
        let backend = None;

        Self {
            backend,
            ..Self::default()
        }
    }
}
