//! Zero-copy read windows over pixel buffers.
//!
//! An [`Image`] never owns pixels. It borrows the backing slice and records
//! where its window starts, how large it is and the stride of the buffer it
//! was cut from. Slicing produces another `Image` over the same slice, so
//! sub-images of sub-images cost nothing and always index the original
//! memory.

mod columns;
mod rows;

use std::ops::Index;

use crate::interface::color::Pixel;

pub use columns::{ImageColumn, ImageColumns};
pub use rows::{ImageRow, ImageRows};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ImageError {
    #[error("Pixel ({x}, {y}) is outside of the {width}x{height} image")]
    IndexOutOfRange {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    },

    #[error("Region ({x}, {y}, {width}x{height}) exceeds the {bounds_width}x{bounds_height} image")]
    RegionOutOfRange {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
        bounds_width: usize,
        bounds_height: usize,
    },

    #[error("Destination holds {actual} pixels but {required} are required")]
    BufferTooSmall { required: usize, actual: usize },

    #[error("Buffer of {len} pixels cannot hold a {width}x{height} window with stride {stride}")]
    InvalidLayout {
        len: usize,
        width: usize,
        height: usize,
        stride: usize,
    },
}

/// A read-only rectangular window over a pixel buffer.
#[derive(Debug, Clone, Copy)]
pub struct Image<'a, C> {
    pixels: &'a [C],
    x: usize,
    y: usize,
    width: usize,
    height: usize,
    stride: usize,
}

impl<'a, C: Pixel> Image<'a, C> {
    /// Creates a window at (`x`, `y`) of a buffer whose rows are `stride`
    /// pixels apart.
    pub fn new(
        pixels: &'a [C],
        x: usize,
        y: usize,
        width: usize,
        height: usize,
        stride: usize,
    ) -> Result<Self, ImageError> {
        let layout_error = ImageError::InvalidLayout {
            len: pixels.len(),
            width,
            height,
            stride,
        };

        // Empty windows still need an origin inside the buffer.
        let right = x.checked_add(width).ok_or(layout_error)?;
        if right > stride {
            return Err(layout_error);
        }
        let last = y
            .checked_add(height.saturating_sub(1))
            .and_then(|row| row.checked_mul(stride))
            .and_then(|row| row.checked_add(right))
            .ok_or(layout_error)?;
        if last > pixels.len() {
            return Err(layout_error);
        }

        Ok(Self {
            pixels,
            x,
            y,
            width,
            height,
            stride,
        })
    }

    /// Wraps a whole, tightly packed buffer.
    pub fn from_pixels(pixels: &'a [C], width: usize, height: usize) -> Result<Self, ImageError> {
        Self::new(pixels, 0, 0, width, height, width)
    }

    /// Reinterprets raw bytes in `C`'s layout as a tightly packed image.
    pub fn from_bytes(bytes: &'a [u8], width: usize, height: usize) -> Result<Self, ImageError> {
        let pixels: &'a [C] =
            bytemuck::try_cast_slice(bytes).map_err(|_| ImageError::InvalidLayout {
                len: bytes.len(),
                width,
                height,
                stride: width,
            })?;
        Self::from_pixels(pixels, width, height)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Stride of the backing buffer, in pixels.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Origin of this window inside the backing buffer.
    pub fn origin(&self) -> (usize, usize) {
        (self.x, self.y)
    }

    pub fn len(&self) -> usize {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    #[inline]
    fn offset(&self, x: usize, y: usize) -> usize {
        (self.y + y) * self.stride + self.x + x
    }

    pub fn get(&self, x: usize, y: usize) -> Result<&'a C, ImageError> {
        if x >= self.width || y >= self.height {
            return Err(ImageError::IndexOutOfRange {
                x,
                y,
                width: self.width,
                height: self.height,
            });
        }
        let pixels = self.pixels;
        Ok(&pixels[self.offset(x, y)])
    }

    /// Cuts a window relative to this one. Bounds are checked against this
    /// view, not the backing buffer.
    pub fn sub_image(
        &self,
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    ) -> Result<Image<'a, C>, ImageError> {
        let fits_x = x.checked_add(width).is_some_and(|right| right <= self.width);
        let fits_y = y.checked_add(height).is_some_and(|bottom| bottom <= self.height);
        if !fits_x || !fits_y {
            return Err(ImageError::RegionOutOfRange {
                x,
                y,
                width,
                height,
                bounds_width: self.width,
                bounds_height: self.height,
            });
        }

        Ok(Image {
            pixels: self.pixels,
            x: self.x + x,
            y: self.y + y,
            width,
            height,
            stride: self.stride,
        })
    }

    pub fn rows(&self) -> ImageRows<'a, C> {
        ImageRows::new(*self)
    }

    pub fn columns(&self) -> ImageColumns<'a, C> {
        ImageColumns::new(*self)
    }

    pub fn row(&self, y: usize) -> Result<ImageRow<'a, C>, ImageError> {
        self.rows().get(y)
    }

    pub fn column(&self, x: usize) -> Result<ImageColumn<'a, C>, ImageError> {
        self.columns().get(x)
    }

    /// Row slice without bounds checks against `height`; callers guarantee
    /// `y < height`.
    #[inline]
    pub(crate) fn row_slice(&self, y: usize) -> &'a [C] {
        let pixels = self.pixels;
        let start = self.offset(0, y);
        &pixels[start..start + self.width]
    }

    /// All pixels in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = &'a C> + 'a {
        let image = *self;
        (0..image.height).flat_map(move |y| image.row_slice(y).iter())
    }

    /// Copies the window into `destination`, row by row.
    pub fn copy_to(&self, destination: &mut [C]) -> Result<(), ImageError> {
        let required = self.len();
        if destination.len() < required {
            return Err(ImageError::BufferTooSmall {
                required,
                actual: destination.len(),
            });
        }
        if self.is_empty() {
            return Ok(());
        }

        for (y, target) in destination[..required]
            .chunks_exact_mut(self.width)
            .enumerate()
        {
            target.copy_from_slice(self.row_slice(y));
        }
        Ok(())
    }

    pub fn to_vec(&self) -> Vec<C> {
        let mut pixels = vec![C::default(); self.len()];
        // Sized to fit, the copy cannot fail.
        let _ = self.copy_to(&mut pixels);
        pixels
    }

    /// Raw bytes of the window when its rows are contiguous in memory.
    pub fn as_contiguous_bytes(&self) -> Option<&'a [u8]> {
        if self.is_empty() {
            return Some(&[]);
        }
        if self.x != 0 || self.width != self.stride {
            return None;
        }
        let pixels = self.pixels;
        let start = self.offset(0, 0);
        Some(bytemuck::cast_slice(&pixels[start..start + self.len()]))
    }
}

impl<'a, C: Pixel> Index<(usize, usize)> for Image<'a, C> {
    type Output = C;

    fn index(&self, (x, y): (usize, usize)) -> &Self::Output {
        match self.get(x, y) {
            Ok(pixel) => pixel,
            Err(err) => panic!("{err}"),
        }
    }
}

impl<'a, C: Pixel> PartialEq for Image<'a, C> {
    /// Two views are equal when they show the same pixels, regardless of
    /// where they sit in their buffers.
    fn eq(&self, other: &Self) -> bool {
        self.width == other.width
            && self.height == other.height
            && (0..self.height).all(|y| self.row_slice(y) == other.row_slice(y))
    }
}

impl<'a, C: Pixel> IntoIterator for &Image<'a, C> {
    type Item = &'a C;
    type IntoIter = Box<dyn Iterator<Item = &'a C> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface::color::ColorRgb;

    /// 8x6 image where every pixel encodes its own coordinates.
    fn coordinate_pixels(width: usize, height: usize) -> Vec<ColorRgb> {
        (0..height)
            .flat_map(|y| (0..width).map(move |x| ColorRgb::from_rgb(x as u8, y as u8, 7)))
            .collect()
    }

    #[test]
    fn indexes_with_parent_stride() {
        let pixels = coordinate_pixels(8, 6);
        let image = Image::new(&pixels, 2, 1, 4, 3, 8).unwrap();

        let pixel = image.get(3, 2).unwrap();
        assert_eq!((pixel.r, pixel.g), (5, 3));
        assert_eq!(image[(0, 0)], ColorRgb::from_rgb(2, 1, 7));
        assert!(matches!(
            image.get(4, 0),
            Err(ImageError::IndexOutOfRange { x: 4, .. })
        ));
        assert!(image.get(0, 3).is_err());
    }

    #[test]
    #[should_panic(expected = "outside of the 4x3 image")]
    fn index_operator_panics_out_of_range() {
        let pixels = coordinate_pixels(8, 6);
        let image = Image::new(&pixels, 2, 1, 4, 3, 8).unwrap();
        let _ = image[(0, 3)];
    }

    #[test]
    fn rejects_windows_outside_the_buffer() {
        let pixels = coordinate_pixels(8, 6);
        assert!(Image::new(&pixels, 5, 0, 4, 1, 8).is_err());
        assert!(Image::new(&pixels, 0, 4, 8, 3, 8).is_err());
        assert!(Image::new(&pixels, 0, 0, 8, 6, 8).is_ok());
        assert!(Image::new(&pixels, 0, 0, 0, 0, 0).is_ok());
    }

    #[test]
    fn empty_windows_keep_their_origin_in_bounds() {
        let pixels = coordinate_pixels(8, 6);
        assert!(Image::new(&pixels, 100, 0, 0, 3, 8).is_err());
        assert!(Image::new(&pixels, 0, 7, 4, 0, 8).is_err());

        let empty = Image::new(&pixels, 8, 5, 0, 1, 8).unwrap();
        assert!(empty.is_empty());
        assert_eq!(empty.iter().count(), 0);
        assert_eq!(empty, Image::new(&pixels, 0, 0, 0, 1, 8).unwrap());
    }

    #[test]
    fn sub_image_is_bounded_by_the_current_view() {
        let pixels = coordinate_pixels(8, 6);
        let image = Image::from_pixels(&pixels, 8, 6).unwrap();
        let inner = image.sub_image(2, 2, 4, 3).unwrap();

        assert_eq!(inner.origin(), (2, 2));
        assert!(inner.sub_image(1, 1, 4, 1).is_err());
        assert!(inner.sub_image(0, 0, 4, 3).is_ok());

        let nested = inner.sub_image(1, 1, 2, 2).unwrap();
        assert_eq!(nested.origin(), (3, 3));
        assert_eq!(nested.stride(), 8);
        assert_eq!(nested[(1, 1)], ColorRgb::from_rgb(4, 4, 7));
    }

    #[test]
    fn slicing_is_associative() {
        let pixels = coordinate_pixels(8, 6);
        let image = Image::from_pixels(&pixels, 8, 6).unwrap();

        for (a, b, w, h) in [(0, 0, 8, 6), (1, 2, 6, 4), (3, 1, 5, 5)] {
            let outer = image.sub_image(a, b, w, h).unwrap();
            for c in 0..w {
                for d in 0..h {
                    let (w2, h2) = (w - c, h - d);
                    let nested = outer.sub_image(c, d, w2, h2).unwrap();
                    let direct = image.sub_image(a + c, b + d, w2, h2).unwrap();
                    assert_eq!(nested.origin(), direct.origin());
                    assert_eq!(nested, direct);
                }
            }
        }
    }

    #[test]
    fn enumeration_is_row_major() {
        let pixels = coordinate_pixels(8, 6);
        let image = Image::new(&pixels, 1, 1, 5, 4, 8).unwrap();

        let flattened: Vec<ColorRgb> = (0..image.height())
            .flat_map(|y| (0..image.width()).map(move |x| (x, y)))
            .map(|(x, y)| *image.get(x, y).unwrap())
            .collect();
        let enumerated: Vec<ColorRgb> = image.iter().copied().collect();

        assert_eq!(enumerated, flattened);
        assert_eq!(image.to_vec(), flattened);
        assert_eq!((&image).into_iter().count(), 20);
    }

    #[test]
    fn copy_to_requires_enough_room() {
        let pixels = coordinate_pixels(8, 6);
        let image = Image::new(&pixels, 0, 0, 3, 2, 8).unwrap();

        let mut small = vec![ColorRgb::default(); 5];
        assert_eq!(
            image.copy_to(&mut small),
            Err(ImageError::BufferTooSmall {
                required: 6,
                actual: 5
            })
        );

        let mut larger = vec![ColorRgb::default(); 8];
        image.copy_to(&mut larger).unwrap();
        assert_eq!(larger[3], ColorRgb::from_rgb(0, 1, 7));
        assert_eq!(larger[7], ColorRgb::default());
    }

    #[test]
    fn from_bytes_shares_memory() {
        let bytes: Vec<u8> = (0..24).collect();
        let image = Image::<ColorRgb>::from_bytes(&bytes, 4, 2).unwrap();

        assert_eq!(image[(1, 1)], ColorRgb { r: 15, g: 16, b: 17 });
        assert_eq!(image.as_contiguous_bytes(), Some(&bytes[..]));
        assert!(image.sub_image(1, 0, 2, 2).unwrap().as_contiguous_bytes().is_none());
        assert!(Image::<ColorRgb>::from_bytes(&bytes[..23], 4, 2).is_err());
    }
}
