use std::ops::Index;

use super::{Image, ImageError};
use crate::interface::color::Pixel;

/// Lazy, indexable access to the rows of an [`Image`].
#[derive(Debug, Clone, Copy)]
pub struct ImageRows<'a, C> {
    image: Image<'a, C>,
}

impl<'a, C: Pixel> ImageRows<'a, C> {
    pub(super) fn new(image: Image<'a, C>) -> Self {
        Self { image }
    }

    pub fn len(&self) -> usize {
        self.image.height
    }

    pub fn is_empty(&self) -> bool {
        self.image.height == 0
    }

    pub fn get(&self, y: usize) -> Result<ImageRow<'a, C>, ImageError> {
        if y >= self.image.height {
            return Err(ImageError::IndexOutOfRange {
                x: 0,
                y,
                width: self.image.width,
                height: self.image.height,
            });
        }
        Ok(ImageRow {
            pixels: self.image.row_slice(y),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = ImageRow<'a, C>> + 'a {
        let image = self.image;
        (0..image.height).map(move |y| ImageRow {
            pixels: image.row_slice(y),
        })
    }
}

/// One row of an image. Rows are contiguous, so this is a thin wrapper
/// around a slice of the backing buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageRow<'a, C> {
    pixels: &'a [C],
}

impl<'a, C: Pixel> ImageRow<'a, C> {
    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    pub fn get(&self, x: usize) -> Result<&'a C, ImageError> {
        let pixels = self.pixels;
        pixels.get(x).ok_or(ImageError::IndexOutOfRange {
            x,
            y: 0,
            width: pixels.len(),
            height: 1,
        })
    }

    pub fn as_slice(&self) -> &'a [C] {
        self.pixels
    }

    pub fn iter(&self) -> std::slice::Iter<'a, C> {
        self.pixels.iter()
    }

    pub fn copy_to(&self, destination: &mut [C]) -> Result<(), ImageError> {
        let required = self.pixels.len();
        if destination.len() < required {
            return Err(ImageError::BufferTooSmall {
                required,
                actual: destination.len(),
            });
        }
        destination[..required].copy_from_slice(self.pixels);
        Ok(())
    }

    pub fn to_vec(&self) -> Vec<C> {
        self.pixels.to_vec()
    }
}

impl<'a, C: Pixel> Index<usize> for ImageRow<'a, C> {
    type Output = C;

    fn index(&self, x: usize) -> &Self::Output {
        &self.pixels[x]
    }
}

impl<'a, C: Pixel> IntoIterator for ImageRow<'a, C> {
    type Item = &'a C;
    type IntoIter = std::slice::Iter<'a, C>;

    fn into_iter(self) -> Self::IntoIter {
        self.pixels.iter()
    }
}

#[cfg(test)]
mod tests {
    use crate::interface::color::{ColorBgra, Pixel};
    use crate::resource::image::{Image, ImageError};

    fn gradient(width: usize, height: usize) -> Vec<ColorBgra> {
        (0..width * height)
            .map(|i| ColorBgra::from_rgb(i as u8, 0, 0))
            .collect()
    }

    #[test]
    fn rows_start_at_the_window_origin() {
        let pixels = gradient(6, 4);
        let image = Image::new(&pixels, 1, 1, 3, 2, 6).unwrap();
        let rows = image.rows();

        assert_eq!(rows.len(), 2);
        let reds: Vec<u8> = rows.get(1).unwrap().iter().map(|p| p.r).collect();
        assert_eq!(reds, vec![13, 14, 15]);
        assert_eq!(rows.get(0).unwrap()[2].r, 9);
        assert!(matches!(rows.get(2), Err(ImageError::IndexOutOfRange { y: 2, .. })));
    }

    #[test]
    fn rows_iterate_in_order_and_copy() {
        let pixels = gradient(4, 3);
        let image = Image::from_pixels(&pixels, 4, 3).unwrap();

        let firsts: Vec<u8> = image.rows().iter().map(|row| row[0].r).collect();
        assert_eq!(firsts, vec![0, 4, 8]);

        let row = image.row(2).unwrap();
        let mut target = [ColorBgra::default(); 4];
        row.copy_to(&mut target).unwrap();
        assert_eq!(target[3].r, 11);
        assert!(row.copy_to(&mut target[..3]).is_err());
        assert!(row.get(4).is_err());
    }
}
