//! CPU copy and block-average downscaling of frame regions into zone buffers.

use rayon::prelude::*;

use crate::interface::zone::ZoneGeometry;
use crate::resource::screen::{ScreenCaptureError, ScreenFrame};

/// Averages a `block_size` x `block_size` block of `source` into `destination`.
///
/// `source` rows are `stride` bytes apart; (`x`, `y`) is the block origin in
/// pixels. `destination` receives one pixel (`bytes_per_pixel` bytes). Each
/// channel is summed as an integer and divided by the pixel count, rounding
/// halves up; this is the exact value of `round(sum / (pixels * 255) * 255)`
/// without the float error. An empty block yields zeroes.
///
/// Fails with [`ScreenCaptureError::BufferSize`] when `destination` is
/// shorter than one pixel or the block runs past the end of `source`.
pub fn sample_block(
    source: &[u8],
    stride: usize,
    bytes_per_pixel: usize,
    x: usize,
    y: usize,
    block_size: usize,
    destination: &mut [u8],
) -> Result<(), ScreenCaptureError> {
    if destination.len() < bytes_per_pixel {
        return Err(ScreenCaptureError::BufferSize {
            expected: bytes_per_pixel,
            actual: destination.len(),
        });
    }

    if block_size > 0 {
        let required = block_end(stride, bytes_per_pixel, x, y, block_size);
        if required.map_or(true, |end| end > source.len()) {
            return Err(ScreenCaptureError::BufferSize {
                expected: required.unwrap_or(usize::MAX),
                actual: source.len(),
            });
        }
    }

    sample_rect(
        source,
        stride,
        bytes_per_pixel,
        x,
        y,
        block_size,
        block_size,
        destination,
    );
    Ok(())
}

/// One past the last source byte a block reads, or `None` when a block row
/// does not fit in `stride`.
fn block_end(stride: usize, bytes_per_pixel: usize, x: usize, y: usize, block_size: usize) -> Option<usize> {
    let end = x
        .checked_mul(bytes_per_pixel)?
        .checked_add(block_size.checked_mul(bytes_per_pixel)?)?;
    if end > stride {
        return None;
    }
    y.checked_add(block_size - 1)?.checked_mul(stride)?.checked_add(end)
}

#[allow(clippy::too_many_arguments)]
fn sample_rect(
    source: &[u8],
    stride: usize,
    bytes_per_pixel: usize,
    x: usize,
    y: usize,
    width: usize,
    height: usize,
    destination: &mut [u8],
) {
    let destination = &mut destination[..bytes_per_pixel];
    let count = (width * height) as u64;
    if count == 0 {
        destination.fill(0);
        return;
    }

    // Four channels covers every supported layout.
    let mut sums = [0u64; 4];
    let row_bytes = width * bytes_per_pixel;
    for row in y..y + height {
        let start = row * stride + x * bytes_per_pixel;
        for pixel in source[start..start + row_bytes].chunks_exact(bytes_per_pixel) {
            for (sum, &value) in sums.iter_mut().zip(pixel) {
                *sum += value as u64;
            }
        }
    }

    for (target, &sum) in destination.iter_mut().zip(sums.iter()) {
        let mean = (2 * sum + count) / (2 * count);
        *target = mean.min(u8::MAX as u64) as u8;
    }
}

/// Downscales `width` x `height` destination pixels, each averaged from a
/// `block_size` block of `source` starting at (`x`, `y`).
///
/// Rows are processed in parallel; the result is identical to a sequential
/// pass because every destination pixel depends only on its own block.
#[allow(clippy::too_many_arguments)]
pub(crate) fn downscale_region(
    source: &[u8],
    stride: usize,
    bytes_per_pixel: usize,
    x: usize,
    y: usize,
    width: usize,
    height: usize,
    block_size: usize,
    destination: &mut [u8],
) {
    let dst_stride = width * bytes_per_pixel;
    if dst_stride == 0 {
        return;
    }

    destination[..dst_stride * height]
        .par_chunks_exact_mut(dst_stride)
        .enumerate()
        .for_each(|(row, target)| {
            let src_y = y + row * block_size;
            for (column, pixel) in target.chunks_exact_mut(bytes_per_pixel).enumerate() {
                let src_x = x + column * block_size;
                sample_rect(
                    source,
                    stride,
                    bytes_per_pixel,
                    src_x,
                    src_y,
                    block_size,
                    block_size,
                    pixel,
                );
            }
        });
}

/// Copies a `width` x `height` pixel region at (`x`, `y`) row by row.
#[allow(clippy::too_many_arguments)]
pub(crate) fn copy_region(
    source: &[u8],
    stride: usize,
    bytes_per_pixel: usize,
    x: usize,
    y: usize,
    width: usize,
    height: usize,
    destination: &mut [u8],
) {
    let dst_stride = width * bytes_per_pixel;
    if dst_stride == 0 {
        return;
    }

    for (row, target) in destination[..dst_stride * height]
        .chunks_exact_mut(dst_stride)
        .enumerate()
    {
        let start = (y + row) * stride + x * bytes_per_pixel;
        target.copy_from_slice(&source[start..start + dst_stride]);
    }
}

/// Fills a zone buffer from a CPU frame: a straight copy at downscale level
/// 0, block averaging otherwise.
///
/// The zone region must lie inside the frame and `destination` must be
/// exactly the zone's buffer size; otherwise nothing is written.
pub fn update_zone_from_frame(
    frame: &ScreenFrame<'_>,
    zone: &ZoneGeometry,
    bytes_per_pixel: usize,
    destination: &mut [u8],
) -> Result<(), ScreenCaptureError> {
    let right = zone.x + zone.unscaled_width;
    let bottom = zone.y + zone.unscaled_height;
    let row_bytes = frame.width as usize * bytes_per_pixel;
    let frame_fits = frame.stride >= row_bytes
        && frame.pixels.len() >= frame.stride * frame.height as usize;
    if !frame_fits || right > frame.width as usize || bottom > frame.height as usize {
        return Err(ScreenCaptureError::ZoneOutOfFrame {
            zone: (zone.x, zone.y, zone.unscaled_width, zone.unscaled_height),
            frame: (frame.width, frame.height),
        });
    }

    let expected = zone.buffer_len(bytes_per_pixel);
    if destination.len() != expected {
        return Err(ScreenCaptureError::BufferSize {
            expected,
            actual: destination.len(),
        });
    }

    if zone.downscale_level == 0 {
        copy_region(
            frame.pixels,
            frame.stride,
            bytes_per_pixel,
            zone.x,
            zone.y,
            zone.width,
            zone.height,
            destination,
        );
    } else {
        downscale_region(
            frame.pixels,
            frame.stride,
            bytes_per_pixel,
            zone.x,
            zone.y,
            zone.width,
            zone.height,
            zone.block_size(),
            destination,
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scalar reference: plain nested loops, integer sum, rounded mean.
    fn reference_block(
        source: &[u8],
        stride: usize,
        bpp: usize,
        x: usize,
        y: usize,
        block: usize,
    ) -> Vec<u8> {
        (0..bpp)
            .map(|channel| {
                let mut sum = 0u64;
                for row in y..y + block {
                    for column in x..x + block {
                        sum += source[row * stride + column * bpp + channel] as u64;
                    }
                }
                let mean = sum as f64 / (block * block) as f64;
                mean.round() as u8
            })
            .collect()
    }

    fn noise(len: usize) -> Vec<u8> {
        let mut state = 0x2545_f491_u32;
        (0..len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                (state >> 24) as u8
            })
            .collect()
    }

    #[test]
    fn uniform_block_keeps_its_value() {
        let pixel = [10u8, 20, 30, 0];
        let source: Vec<u8> = pixel.iter().copied().cycle().take(4 * 4 * 4).collect();
        let mut destination = [0u8; 4];

        sample_block(&source, 16, 4, 0, 0, 4, &mut destination).unwrap();
        assert_eq!(destination, [10, 20, 30, 0]);
    }

    #[test]
    fn mixed_block_rounds_to_nearest() {
        // 2x2 RGB block, red channel 0,0,0,3 -> 0.75 -> 1; green 255,255,255,0 -> 191.25 -> 191.
        let source = [0u8, 255, 9, 0, 255, 9, 0, 255, 9, 3, 0, 9];
        let mut destination = [0u8; 3];

        sample_block(&source, 6, 3, 0, 0, 2, &mut destination).unwrap();
        assert_eq!(destination, [1, 191, 9]);
    }

    #[test]
    fn empty_block_is_black() {
        let mut destination = [7u8; 4];
        sample_block(&[], 0, 4, 0, 0, 0, &mut destination).unwrap();
        assert_eq!(destination, [0; 4]);
    }

    #[test]
    fn block_outside_source_is_an_error() {
        let source = vec![50u8; 4 * 4 * 4];
        let mut destination = [0u8; 4];

        assert!(sample_block(&source, 16, 4, 2, 2, 2, &mut destination).is_ok());
        assert!(matches!(
            sample_block(&source, 16, 4, 3, 0, 2, &mut destination),
            Err(ScreenCaptureError::BufferSize { .. })
        ));
        assert!(matches!(
            sample_block(&source, 16, 4, 0, 3, 2, &mut destination),
            Err(ScreenCaptureError::BufferSize { .. })
        ));
        assert!(matches!(
            sample_block(&source, 16, 4, 0, 0, 2, &mut destination[..3]),
            Err(ScreenCaptureError::BufferSize { expected: 4, actual: 3 })
        ));
    }

    #[test]
    fn downscale_matches_scalar_reference() {
        let (width, height, bpp) = (37usize, 29usize, 4usize);
        let stride = width * bpp + 12;
        let source = noise(stride * height);

        for block in [2usize, 4, 8] {
            let (dst_w, dst_h) = ((width - 3) / block, (height - 1) / block);
            let mut destination = vec![0u8; dst_w * dst_h * bpp];
            downscale_region(&source, stride, bpp, 3, 1, dst_w, dst_h, block, &mut destination);

            for dy in 0..dst_h {
                for dx in 0..dst_w {
                    let expected =
                        reference_block(&source, stride, bpp, 3 + dx * block, 1 + dy * block, block);
                    let offset = (dy * dst_w + dx) * bpp;
                    assert_eq!(&destination[offset..offset + bpp], &expected[..]);
                }
            }
        }
    }

    #[test]
    fn level_zero_copies_exactly() {
        let (width, height) = (16u32, 9u32);
        let stride = width as usize * 4 + 8;
        let pixels = noise(stride * height as usize);
        let frame = ScreenFrame {
            width,
            height,
            stride,
            pixels: &pixels,
        };
        let zone = ZoneGeometry::new(3, 2, 10, 5, 0);
        let mut destination = vec![0u8; zone.buffer_len(4)];

        update_zone_from_frame(&frame, &zone, 4, &mut destination).unwrap();
        for row in 0..5 {
            let src = (2 + row) * stride + 3 * 4;
            assert_eq!(
                &destination[row * 40..(row + 1) * 40],
                &pixels[src..src + 40]
            );
        }
    }

    #[test]
    fn rejects_zones_outside_the_frame() {
        let pixels = vec![0u8; 8 * 8 * 4];
        let frame = ScreenFrame {
            width: 8,
            height: 8,
            stride: 32,
            pixels: &pixels,
        };
        let zone = ZoneGeometry::new(4, 4, 8, 2, 1);
        let mut destination = vec![0u8; zone.buffer_len(4)];
        assert!(matches!(
            update_zone_from_frame(&frame, &zone, 4, &mut destination),
            Err(ScreenCaptureError::ZoneOutOfFrame { .. })
        ));

        let zone = ZoneGeometry::new(0, 0, 8, 8, 1);
        let mut wrong = vec![0u8; 3];
        assert!(matches!(
            update_zone_from_frame(&frame, &zone, 4, &mut wrong),
            Err(ScreenCaptureError::BufferSize { expected: 64, .. })
        ));
    }
}
