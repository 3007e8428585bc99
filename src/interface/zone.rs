use serde::Serialize;

/// Position and size of a capture zone.
///
/// `x`, `y`, `unscaled_width` and `unscaled_height` describe the region on the
/// display. `width` and `height` are the stored (post-downscale) dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ZoneGeometry {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
    pub unscaled_width: usize,
    pub unscaled_height: usize,
    pub downscale_level: u32,
}

impl ZoneGeometry {
    /// Builds the geometry for a region, applying `calculate_scaled_size`.
    pub fn new(x: usize, y: usize, width: usize, height: usize, downscale_level: u32) -> Self {
        let (scaled_width, scaled_height, level) =
            calculate_scaled_size(width, height, downscale_level);
        Self {
            x,
            y,
            width: scaled_width,
            height: scaled_height,
            unscaled_width: width,
            unscaled_height: height,
            downscale_level: level,
        }
    }

    /// Edge length of the square source block averaged into one stored pixel.
    pub fn block_size(&self) -> usize {
        1usize << self.downscale_level
    }

    pub fn stride(&self, bytes_per_pixel: usize) -> usize {
        self.width * bytes_per_pixel
    }

    pub fn buffer_len(&self, bytes_per_pixel: usize) -> usize {
        self.stride(bytes_per_pixel) * self.height
    }

    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }
}

/// Halves `width` and `height` up to `downscale_level` times.
///
/// Halving stops early once either dimension reaches 1; the returned level is
/// the number of halvings actually applied. Dimensions never drop below 1.
pub fn calculate_scaled_size(
    width: usize,
    height: usize,
    downscale_level: u32,
) -> (usize, usize, u32) {
    let mut width = width.max(1);
    let mut height = height.max(1);
    let mut level = 0;

    while level < downscale_level && width >= 2 && height >= 2 {
        width /= 2;
        height /= 2;
        level += 1;
    }

    (width, height, level)
}
