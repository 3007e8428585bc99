use std::ops::Index;

use super::{Image, ImageError};
use crate::interface::color::Pixel;

/// Lazy, indexable access to the columns of an [`Image`].
#[derive(Debug, Clone, Copy)]
pub struct ImageColumns<'a, C> {
    image: Image<'a, C>,
}

impl<'a, C: Pixel> ImageColumns<'a, C> {
    pub(super) fn new(image: Image<'a, C>) -> Self {
        Self { image }
    }

    pub fn len(&self) -> usize {
        self.image.width
    }

    pub fn is_empty(&self) -> bool {
        self.image.width == 0
    }

    pub fn get(&self, x: usize) -> Result<ImageColumn<'a, C>, ImageError> {
        if x >= self.image.width {
            return Err(ImageError::IndexOutOfRange {
                x,
                y: 0,
                width: self.image.width,
                height: self.image.height,
            });
        }
        Ok(ImageColumn::new(self.image, x))
    }

    pub fn iter(&self) -> impl Iterator<Item = ImageColumn<'a, C>> + 'a {
        let image = self.image;
        (0..image.width).map(move |x| ImageColumn::new(image, x))
    }
}

/// One column of an image: `len` pixels, `step` pixels apart in the backing
/// buffer.
#[derive(Debug, Clone, Copy)]
pub struct ImageColumn<'a, C> {
    pixels: &'a [C],
    start: usize,
    len: usize,
    step: usize,
}

impl<'a, C: Pixel> ImageColumn<'a, C> {
    fn new(image: Image<'a, C>, x: usize) -> Self {
        Self {
            pixels: image.pixels,
            start: image.y * image.stride + image.x + x,
            len: image.height,
            step: image.stride.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, y: usize) -> Result<&'a C, ImageError> {
        if y >= self.len {
            return Err(ImageError::IndexOutOfRange {
                x: 0,
                y,
                width: 1,
                height: self.len,
            });
        }
        let pixels = self.pixels;
        Ok(&pixels[self.start + y * self.step])
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a C> + 'a {
        let pixels = self.pixels;
        let (start, step, len) = (self.start, self.step, self.len);
        (0..len).map(move |y| &pixels[start + y * step])
    }

    pub fn copy_to(&self, destination: &mut [C]) -> Result<(), ImageError> {
        if destination.len() < self.len {
            return Err(ImageError::BufferTooSmall {
                required: self.len,
                actual: destination.len(),
            });
        }
        for (target, pixel) in destination.iter_mut().zip(self.iter()) {
            *target = *pixel;
        }
        Ok(())
    }

    pub fn to_vec(&self) -> Vec<C> {
        self.iter().copied().collect()
    }
}

impl<'a, C: Pixel> Index<usize> for ImageColumn<'a, C> {
    type Output = C;

    fn index(&self, y: usize) -> &Self::Output {
        match self.get(y) {
            Ok(pixel) => pixel,
            Err(err) => panic!("{err}"),
        }
    }
}
