#![forbid(unsafe_code)]

//! Colors and hardware pixel formats.

/// A 32-bit ARGB color (`0xAARRGGBB`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct Color(pub u32);

impl Color {
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    pub const WHITE: Self = Self::rgb(255, 255, 255);
    pub const RED: Self = Self::rgb(255, 0, 0);
    pub const GREEN: Self = Self::rgb(0, 255, 0);
    pub const BLUE: Self = Self::rgb(0, 0, 255);

    /// Opaque color from components.
    #[inline]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self(0xFF00_0000 | (r as u32) << 16 | (g as u32) << 8 | b as u32)
    }

    #[inline]
    pub const fn r(self) -> u8 {
        (self.0 >> 16) as u8
    }

    #[inline]
    pub const fn g(self) -> u8 {
        (self.0 >> 8) as u8
    }

    #[inline]
    pub const fn b(self) -> u8 {
        self.0 as u8
    }

    #[inline]
    pub const fn a(self) -> u8 {
        (self.0 >> 24) as u8
    }
}

/// Pixel layout of a hardware surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PixelFormat {
    /// 16-bit 5:6:5, little endian.
    #[default]
    Rgb565,
    /// 32-bit ARGB, little endian.
    Argb8888,
}

impl PixelFormat {
    #[inline]
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgb565 => 2,
            Self::Argb8888 => 4,
        }
    }

    /// Append the encoding of `color` to `out`.
    pub fn encode(self, color: Color, out: &mut Vec<u8>) {
        let start = out.len();
        out.resize(start + self.bytes_per_pixel(), 0);
        self.encode_into(color, &mut out[start..]);
    }

    /// Write the encoding of `color` over the first pixel of `dst`. Does
    /// nothing if `dst` is shorter than one pixel.
    pub fn encode_into(self, color: Color, dst: &mut [u8]) {
        match self {
            Self::Rgb565 => {
                let v = ((color.r() as u16 & 0xF8) << 8)
                    | ((color.g() as u16 & 0xFC) << 3)
                    | (color.b() as u16 >> 3);
                if let Some(out) = dst.get_mut(..2) {
                    out.copy_from_slice(&v.to_le_bytes());
                }
            }
            Self::Argb8888 => {
                if let Some(out) = dst.get_mut(..4) {
                    out.copy_from_slice(&color.0.to_le_bytes());
                }
            }
        }
    }

    /// Decode one pixel. Short input decodes as black.
    pub fn decode(self, bytes: &[u8]) -> Color {
        match self {
            Self::Rgb565 => match bytes {
                [lo, hi, ..] => {
                    let v = u16::from_le_bytes([*lo, *hi]);
                    let r = ((v >> 11) & 0x1F) as u8;
                    let g = ((v >> 5) & 0x3F) as u8;
                    let b = (v & 0x1F) as u8;
                    Color::rgb(r << 3 | r >> 2, g << 2 | g >> 4, b << 3 | b >> 2)
                }
                _ => Color::BLACK,
            },
            Self::Argb8888 => match bytes {
                [a, b, c, d, ..] => Color(u32::from_le_bytes([*a, *b, *c, *d])),
                _ => Color::BLACK,
            },
        }
    }
}
