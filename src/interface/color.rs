use std::fmt::{Display, Formatter};

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// Pixel layouts understood by capture zones and image views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorFormat {
    Bgra,
    Rgba,
    Argb,
    Abgr,
    Rgb,
    Bgr,
}

/// Byte offsets of each channel inside one pixel. `a` is `None` for
/// formats without alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelOffsets {
    pub r: usize,
    pub g: usize,
    pub b: usize,
    pub a: Option<usize>,
}

impl ColorFormat {
    pub const ALL: [ColorFormat; 6] = [
        ColorFormat::Bgra,
        ColorFormat::Rgba,
        ColorFormat::Argb,
        ColorFormat::Abgr,
        ColorFormat::Rgb,
        ColorFormat::Bgr,
    ];

    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            ColorFormat::Bgra | ColorFormat::Rgba | ColorFormat::Argb | ColorFormat::Abgr => 4,
            ColorFormat::Rgb | ColorFormat::Bgr => 3,
        }
    }

    pub const fn offsets(self) -> ChannelOffsets {
        match self {
            ColorFormat::Bgra => ChannelOffsets { r: 2, g: 1, b: 0, a: Some(3) },
            ColorFormat::Rgba => ChannelOffsets { r: 0, g: 1, b: 2, a: Some(3) },
            ColorFormat::Argb => ChannelOffsets { r: 1, g: 2, b: 3, a: Some(0) },
            ColorFormat::Abgr => ChannelOffsets { r: 3, g: 2, b: 1, a: Some(0) },
            ColorFormat::Rgb => ChannelOffsets { r: 0, g: 1, b: 2, a: None },
            ColorFormat::Bgr => ChannelOffsets { r: 2, g: 1, b: 0, a: None },
        }
    }

    pub const fn has_alpha(self) -> bool {
        self.offsets().a.is_some()
    }

    pub const fn name(self) -> &'static str {
        match self {
            ColorFormat::Bgra => "BGRA",
            ColorFormat::Rgba => "RGBA",
            ColorFormat::Argb => "ARGB",
            ColorFormat::Abgr => "ABGR",
            ColorFormat::Rgb => "RGB",
            ColorFormat::Bgr => "BGR",
        }
    }
}

impl Display for ColorFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A pixel value with a fixed in-memory layout.
///
/// Implementors are plain byte tuples, so a `&[u8]` of the right length can
/// be reinterpreted as `&[Self]` without copying.
pub trait Pixel: Pod + Default + PartialEq + std::fmt::Debug + Send + Sync + 'static {
    const FORMAT: ColorFormat;

    fn r(&self) -> u8;
    fn g(&self) -> u8;
    fn b(&self) -> u8;

    /// Alpha channel; 255 for formats without one.
    fn a(&self) -> u8;

    fn from_rgba(r: u8, g: u8, b: u8, a: u8) -> Self;

    fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self::from_rgba(r, g, b, u8::MAX)
    }
}

macro_rules! color_with_alpha {
    ($(#[$meta:meta])* $name:ident, $format:expr, [$($field:ident),+]) => {
        $(#[$meta])*
        #[repr(C)]
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
        pub struct $name {
            $(pub $field: u8),+
        }

        impl Pixel for $name {
            const FORMAT: ColorFormat = $format;

            #[inline]
            fn r(&self) -> u8 { self.r }
            #[inline]
            fn g(&self) -> u8 { self.g }
            #[inline]
            fn b(&self) -> u8 { self.b }
            #[inline]
            fn a(&self) -> u8 { self.a }

            #[inline]
            fn from_rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
                Self { r, g, b, a }
            }
        }
    };
}

macro_rules! color_without_alpha {
    ($(#[$meta:meta])* $name:ident, $format:expr, [$($field:ident),+]) => {
        $(#[$meta])*
        #[repr(C)]
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
        pub struct $name {
            $(pub $field: u8),+
        }

        impl Pixel for $name {
            const FORMAT: ColorFormat = $format;

            #[inline]
            fn r(&self) -> u8 { self.r }
            #[inline]
            fn g(&self) -> u8 { self.g }
            #[inline]
            fn b(&self) -> u8 { self.b }
            #[inline]
            fn a(&self) -> u8 { u8::MAX }

            #[inline]
            fn from_rgba(r: u8, g: u8, b: u8, _a: u8) -> Self {
                Self { r, g, b }
            }
        }
    };
}

color_with_alpha!(
    /// Native layout of DXGI and most desktop capture APIs.
    ColorBgra, ColorFormat::Bgra, [b, g, r, a]
);
color_with_alpha!(ColorRgba, ColorFormat::Rgba, [r, g, b, a]);
color_with_alpha!(ColorArgb, ColorFormat::Argb, [a, r, g, b]);
color_with_alpha!(ColorAbgr, ColorFormat::Abgr, [a, b, g, r]);
color_without_alpha!(ColorRgb, ColorFormat::Rgb, [r, g, b]);
color_without_alpha!(ColorBgr, ColorFormat::Bgr, [b, g, r]);

#[cfg(test)]
mod tests {
    use super::*;

    fn check_layout<C: Pixel>() {
        let color = C::from_rgba(1, 2, 3, 4);
        let bytes = bytemuck::bytes_of(&color);
        let format = C::FORMAT;
        let offsets = format.offsets();

        assert_eq!(bytes.len(), format.bytes_per_pixel(), "{format}");
        assert_eq!(std::mem::size_of::<C>(), format.bytes_per_pixel(), "{format}");
        assert_eq!(bytes[offsets.r], 1, "{format}");
        assert_eq!(bytes[offsets.g], 2, "{format}");
        assert_eq!(bytes[offsets.b], 3, "{format}");
        match offsets.a {
            Some(a) => assert_eq!(bytes[a], 4, "{format}"),
            None => assert_eq!(color.a(), u8::MAX, "{format}"),
        }
    }

    #[test]
    fn memory_layout_matches_format_offsets() {
        check_layout::<ColorBgra>();
        check_layout::<ColorRgba>();
        check_layout::<ColorArgb>();
        check_layout::<ColorAbgr>();
        check_layout::<ColorRgb>();
        check_layout::<ColorBgr>();
    }

    #[test]
    fn reinterprets_raw_bytes_without_copying() {
        let raw: [u8; 8] = [10, 20, 30, 255, 40, 50, 60, 128];
        let pixels: &[ColorBgra] = bytemuck::cast_slice(&raw);

        assert_eq!(pixels.len(), 2);
        assert_eq!((pixels[0].r(), pixels[0].g(), pixels[0].b()), (30, 20, 10));
        assert_eq!(pixels[1].a(), 128);
        assert_eq!(pixels.as_ptr() as *const u8, raw.as_ptr());
    }

    #[test]
    fn every_format_has_a_name() {
        for format in ColorFormat::ALL {
            assert_eq!(format.to_string().len(), format.bytes_per_pixel());
        }
    }
}
