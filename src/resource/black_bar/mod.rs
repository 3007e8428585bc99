//! Detection of dark margins (letterbox / pillarbox bars) at image edges.

use crate::interface::color::Pixel;
use crate::resource::image::Image;

/// Which edges to strip in [`remove_black_bars`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct BlackBarEdges {
    pub top: bool,
    pub bottom: bool,
    pub left: bool,
    pub right: bool,
}

impl BlackBarEdges {
    pub const NONE: Self = Self {
        top: false,
        bottom: false,
        left: false,
        right: false,
    };
    pub const ALL: Self = Self {
        top: true,
        bottom: true,
        left: true,
        right: true,
    };
    pub const HORIZONTAL: Self = Self {
        top: true,
        bottom: true,
        left: false,
        right: false,
    };
    pub const VERTICAL: Self = Self {
        top: false,
        bottom: false,
        left: true,
        right: true,
    };
}

/// Detected bar sizes in pixels, each measured from its own edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct BlackBars {
    pub top: usize,
    pub bottom: usize,
    pub left: usize,
    pub right: usize,
}

#[inline]
fn is_lit<C: Pixel>(pixel: &C, threshold: u8) -> bool {
    pixel.r() > threshold || pixel.g() > threshold || pixel.b() > threshold
}

/// Number of black rows from the top edge; the full height if every row is
/// black.
pub fn calculate_top<C: Pixel>(image: &Image<'_, C>, threshold: u8) -> usize {
    (0..image.height())
        .find(|&y| image.row_slice(y).iter().any(|p| is_lit(p, threshold)))
        .unwrap_or(image.height())
}

/// Number of black rows from the bottom edge.
pub fn calculate_bottom<C: Pixel>(image: &Image<'_, C>, threshold: u8) -> usize {
    let height = image.height();
    (0..height)
        .rev()
        .find(|&y| image.row_slice(y).iter().any(|p| is_lit(p, threshold)))
        .map_or(height, |y| height - 1 - y)
}

/// Number of black columns from the left edge; the full width if every
/// column is black.
pub fn calculate_left<C: Pixel>(image: &Image<'_, C>, threshold: u8) -> usize {
    image
        .columns()
        .iter()
        .position(|column| column.iter().any(|p| is_lit(p, threshold)))
        .unwrap_or(image.width())
}

/// Number of black columns from the right edge.
pub fn calculate_right<C: Pixel>(image: &Image<'_, C>, threshold: u8) -> usize {
    let width = image.width();
    let columns = image.columns();
    (0..width)
        .rev()
        .find(|&x| {
            columns
                .get(x)
                .is_ok_and(|column| column.iter().any(|p| is_lit(p, threshold)))
        })
        .map_or(width, |x| width - 1 - x)
}

pub fn detect<C: Pixel>(image: &Image<'_, C>, threshold: u8) -> BlackBars {
    BlackBars {
        top: calculate_top(image, threshold),
        bottom: calculate_bottom(image, threshold),
        left: calculate_left(image, threshold),
        right: calculate_right(image, threshold),
    }
}

/// Window of `width` x `height` left after cutting `bars` on `edges`, as
/// (x, y, width, height). Collapses to an empty window when the bars cover
/// the whole image.
pub fn content_rect(
    width: usize,
    height: usize,
    bars: &BlackBars,
    edges: BlackBarEdges,
) -> (usize, usize, usize, usize) {
    let top = if edges.top { bars.top } else { 0 };
    let bottom = if edges.bottom { bars.bottom } else { 0 };
    let left = if edges.left { bars.left } else { 0 };
    let right = if edges.right { bars.right } else { 0 };

    let y = top.min(height);
    let x = left.min(width);
    let content_height = height.saturating_sub(top + bottom);
    let content_width = width.saturating_sub(left + right);
    (x, y, content_width, content_height)
}

/// Sub-view of `image` without the black bars on the requested edges.
pub fn remove_black_bars<'a, C: Pixel>(
    image: &Image<'a, C>,
    threshold: u8,
    edges: BlackBarEdges,
) -> Image<'a, C> {
    let bars = BlackBars {
        top: if edges.top { calculate_top(image, threshold) } else { 0 },
        bottom: if edges.bottom { calculate_bottom(image, threshold) } else { 0 },
        left: if edges.left { calculate_left(image, threshold) } else { 0 },
        right: if edges.right { calculate_right(image, threshold) } else { 0 },
    };
    crop(image, &bars, edges)
}

pub(crate) fn crop<'a, C: Pixel>(
    image: &Image<'a, C>,
    bars: &BlackBars,
    edges: BlackBarEdges,
) -> Image<'a, C> {
    let (x, y, width, height) = content_rect(image.width(), image.height(), bars, edges);
    // content_rect never leaves the image.
    image.sub_image(x, y, width, height).unwrap_or(*image)
}

/// Memoized black-bar results for one zone.
///
/// Edges are computed lazily and kept until [`BlackBarCache::invalidate`]
/// or a threshold change.
#[derive(Clone, Debug)]
pub struct BlackBarCache {
    threshold: u8,
    top: Option<usize>,
    bottom: Option<usize>,
    left: Option<usize>,
    right: Option<usize>,
    content: Option<(BlackBarEdges, (usize, usize, usize, usize))>,
}

impl BlackBarCache {
    pub fn new(threshold: u8) -> Self {
        Self {
            threshold,
            top: None,
            bottom: None,
            left: None,
            right: None,
            content: None,
        }
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    pub fn set_threshold(&mut self, threshold: u8) {
        if self.threshold != threshold {
            self.threshold = threshold;
            self.invalidate();
        }
    }

    pub fn invalidate(&mut self) {
        self.top = None;
        self.bottom = None;
        self.left = None;
        self.right = None;
        self.content = None;
    }

    pub fn is_cached(&self) -> bool {
        self.top.is_some() || self.bottom.is_some() || self.left.is_some() || self.right.is_some()
    }

    pub fn top<C: Pixel>(&mut self, image: &Image<'_, C>) -> usize {
        let threshold = self.threshold;
        *self.top.get_or_insert_with(|| calculate_top(image, threshold))
    }

    pub fn bottom<C: Pixel>(&mut self, image: &Image<'_, C>) -> usize {
        let threshold = self.threshold;
        *self
            .bottom
            .get_or_insert_with(|| calculate_bottom(image, threshold))
    }

    pub fn left<C: Pixel>(&mut self, image: &Image<'_, C>) -> usize {
        let threshold = self.threshold;
        *self.left.get_or_insert_with(|| calculate_left(image, threshold))
    }

    pub fn right<C: Pixel>(&mut self, image: &Image<'_, C>) -> usize {
        let threshold = self.threshold;
        *self.right.get_or_insert_with(|| calculate_right(image, threshold))
    }

    pub fn bars<C: Pixel>(&mut self, image: &Image<'_, C>) -> BlackBars {
        BlackBars {
            top: self.top(image),
            bottom: self.bottom(image),
            left: self.left(image),
            right: self.right(image),
        }
    }

    /// Content window for `edges`, computing only the edges it needs.
    pub fn content_rect<C: Pixel>(
        &mut self,
        image: &Image<'_, C>,
        edges: BlackBarEdges,
    ) -> (usize, usize, usize, usize) {
        if let Some((cached_edges, rect)) = self.content {
            if cached_edges == edges {
                return rect;
            }
        }

        let bars = BlackBars {
            top: if edges.top { self.top(image) } else { 0 },
            bottom: if edges.bottom { self.bottom(image) } else { 0 },
            left: if edges.left { self.left(image) } else { 0 },
            right: if edges.right { self.right(image) } else { 0 },
        };
        let rect = content_rect(image.width(), image.height(), &bars, edges);
        self.content = Some((edges, rect));
        rect
    }
}
