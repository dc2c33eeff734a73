#![forbid(unsafe_code)]

//! Bitmap fonts and the font registry.
//!
//! Two glyph layouts are supported, closed over by [`Font`]:
//!
//! - [`FixedFont`]: every glyph is `width x height`, stored row-major, one
//!   row per `ceil(width / 8)` bytes, most significant bit leftmost.
//! - [`BandedFont`]: glyphs are stored column-major in bands of 8 rows. Byte
//!   `i + band * glyph_width` holds column `i` of that band, least significant
//!   bit on top. Glyph widths may vary.
//!
//! Text is rasterized through [`DeviceContext::draw_point`], so glyph drawing
//! on a client context runs through its point cache.

use std::borrow::Cow;
use std::sync::Arc;

use bitflags::bitflags;
use clipwin_core::debug;
use clipwin_core::geometry::Rect;
use unicode_width::UnicodeWidthChar;

use crate::dc::DeviceContext;

bitflags! {
    /// Placement of measured text inside a target rectangle.
    ///
    /// The empty set means left and top.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TextAlign: u8 {
        const RIGHT             = 0x01;
        const CENTER_HORIZONTAL = 0x02;
        const BOTTOM            = 0x04;
        const CENTER_VERTICAL   = 0x08;
        const CENTER = Self::CENTER_HORIZONTAL.bits() | Self::CENTER_VERTICAL.bits();
    }
}

impl TextAlign {
    /// Move a `text`-sized rectangle inside `target`.
    pub fn place(self, target: &Rect, text: &Rect) -> Rect {
        let (w, h) = (text.width(), text.height());
        let x = if self.contains(Self::RIGHT) {
            target.x2.saturating_sub(w)
        } else if self.contains(Self::CENTER_HORIZONTAL) {
            target.x1.saturating_add(target.width().saturating_sub(w) / 2)
        } else {
            target.x1
        };
        let y = if self.contains(Self::BOTTOM) {
            target.y2.saturating_sub(h)
        } else if self.contains(Self::CENTER_VERTICAL) {
            target.y1.saturating_add(target.height().saturating_sub(h) / 2)
        } else {
            target.y1
        };
        Rect::from_origin_size(x, y, w, h)
    }
}

fn glyph_index(first: char, last: char, ch: char) -> Option<usize> {
    (first..=last)
        .contains(&ch)
        .then(|| ch as usize - first as usize)
}

/// Fixed-size row-major bitmap font.
#[derive(Debug, Clone)]
pub struct FixedFont {
    width: u8,
    height: u8,
    first: char,
    last: char,
    bitmap: Cow<'static, [u8]>,
}

impl FixedFont {
    /// Returns `None` if the bitmap is too short for `first..=last` or a
    /// dimension is zero.
    pub fn new(
        width: u8,
        height: u8,
        first: char,
        last: char,
        bitmap: impl Into<Cow<'static, [u8]>>,
    ) -> Option<Self> {
        let bitmap = bitmap.into();
        if width == 0 || height == 0 || last < first {
            return None;
        }
        let glyphs = last as usize - first as usize + 1;
        let stride = usize::from(width).div_ceil(8);
        if bitmap.len() < glyphs * stride * usize::from(height) {
            return None;
        }
        Some(Self {
            width,
            height,
            first,
            last,
            bitmap,
        })
    }

    fn glyph_bytes(&self) -> usize {
        usize::from(self.width).div_ceil(8) * usize::from(self.height)
    }

    fn draw_glyph<C: DeviceContext>(&self, dc: &mut C, index: usize, at: &Rect, clip: &Rect) {
        let stride = usize::from(self.width).div_ceil(8);
        let base = index * self.glyph_bytes();
        for row in 0..usize::from(self.height) {
            let y = at.y1.saturating_add(row as i32);
            for col in 0..usize::from(self.width) {
                let x = at.x1.saturating_add(col as i32);
                let byte = self.bitmap[base + row * stride + col / 8];
                if byte & (0x80 >> (col % 8)) != 0 && clip.contains(x, y) {
                    dc.draw_point(x, y);
                }
            }
        }
    }
}

/// Column-major font in 8-row bands, optionally proportional.
#[derive(Debug, Clone)]
pub struct BandedFont {
    max_width: u8,
    height: u8,
    first: char,
    last: char,
    bits: Cow<'static, [u8]>,
    widths: Option<Vec<u8>>,
    offsets: Vec<usize>,
}

impl BandedFont {
    /// A font where every glyph is `max_width` columns wide.
    pub fn fixed(
        max_width: u8,
        height: u8,
        first: char,
        last: char,
        bits: impl Into<Cow<'static, [u8]>>,
    ) -> Option<Self> {
        Self::build(max_width, height, first, last, bits.into(), None)
    }

    /// A proportional font; `widths[i]` is the width of glyph `first + i`.
    /// Glyphs are packed back to back.
    pub fn proportional(
        height: u8,
        first: char,
        last: char,
        bits: impl Into<Cow<'static, [u8]>>,
        widths: Vec<u8>,
    ) -> Option<Self> {
        let max_width = widths.iter().copied().max().unwrap_or(0);
        Self::build(max_width, height, first, last, bits.into(), Some(widths))
    }

    fn build(
        max_width: u8,
        height: u8,
        first: char,
        last: char,
        bits: Cow<'static, [u8]>,
        widths: Option<Vec<u8>>,
    ) -> Option<Self> {
        if max_width == 0 || height == 0 || last < first {
            return None;
        }
        let glyphs = last as usize - first as usize + 1;
        let bands = usize::from(height).div_ceil(8);
        let mut offsets = Vec::with_capacity(glyphs);
        let mut at = 0;
        for i in 0..glyphs {
            let w = match &widths {
                Some(widths) => usize::from(*widths.get(i)?),
                None => usize::from(max_width),
            };
            offsets.push(at);
            at += w * bands;
        }
        if bits.len() < at {
            return None;
        }
        Some(Self {
            max_width,
            height,
            first,
            last,
            bits,
            widths,
            offsets,
        })
    }

    fn width_of(&self, index: usize) -> u8 {
        match &self.widths {
            Some(widths) => widths[index],
            None => self.max_width,
        }
    }

    fn draw_glyph<C: DeviceContext>(&self, dc: &mut C, index: usize, at: &Rect, clip: &Rect) {
        let width = usize::from(self.width_of(index));
        let base = self.offsets[index];
        let bands = usize::from(self.height).div_ceil(8);
        for i in 0..width {
            let x = at.x1.saturating_add(i as i32);
            for band in 0..bands {
                let byte = self.bits[base + i + band * width];
                for j in 0..8 {
                    let row = band * 8 + j;
                    if row >= usize::from(self.height) {
                        break;
                    }
                    let y = at.y1.saturating_add(row as i32);
                    if byte & (1 << j) != 0 && clip.contains(x, y) {
                        dc.draw_point(x, y);
                    }
                }
            }
        }
    }
}

/// The closed set of font kinds.
#[derive(Debug, Clone)]
pub enum Font {
    Fixed(FixedFont),
    Banded(BandedFont),
}

impl From<FixedFont> for Font {
    fn from(font: FixedFont) -> Self {
        Self::Fixed(font)
    }
}

impl From<BandedFont> for Font {
    fn from(font: BandedFont) -> Self {
        Self::Banded(font)
    }
}

impl Font {
    pub fn height(&self) -> u16 {
        match self {
            Self::Fixed(f) => u16::from(f.height),
            Self::Banded(f) => u16::from(f.height),
        }
    }

    /// Width of one narrow cell.
    fn cell_width(&self) -> i32 {
        match self {
            Self::Fixed(f) => i32::from(f.width),
            Self::Banded(f) => i32::from(f.max_width),
        }
    }

    fn glyph(&self, ch: char) -> Option<(usize, i32)> {
        match self {
            Self::Fixed(f) => glyph_index(f.first, f.last, ch).map(|i| (i, i32::from(f.width))),
            Self::Banded(f) => {
                glyph_index(f.first, f.last, ch).map(|i| (i, i32::from(f.width_of(i))))
            }
        }
    }

    /// Horizontal advance of `ch`. Zero-width and control characters take no
    /// space; characters without a glyph take one cell, or two if wide.
    fn advance(&self, ch: char) -> i32 {
        if ch.is_control() {
            return 0;
        }
        match ch.width() {
            None | Some(0) => 0,
            Some(cells) => match self.glyph(ch) {
                Some((_, w)) => w,
                None => self.cell_width() * cells.min(2) as i32,
            },
        }
    }

    /// Bounding rectangle of `text` anchored at the origin.
    pub fn metrics(&self, text: &str) -> Rect {
        Rect::from_size(self.string_width(text), i32::from(self.height()))
    }

    pub fn string_width(&self, text: &str) -> i32 {
        text.chars().map(|ch| self.advance(ch)).sum()
    }

    /// Draw `text` inside `rect`, placed by the context's text alignment.
    /// Nothing is drawn outside `rect`.
    pub fn draw_text<C: DeviceContext>(&self, dc: &mut C, text: &str, rect: &Rect) {
        let metrics = self.metrics(text);
        let placed = dc.gc().text_align.place(rect, &metrics);
        let height = i32::from(self.height());
        let mut pen = placed.x1;

        for ch in text.chars() {
            let advance = self.advance(ch);
            if advance == 0 {
                continue;
            }
            let cell = Rect::from_origin_size(pen, placed.y1, advance, height);
            match self.glyph(ch) {
                Some((index, _)) => match self {
                    Self::Fixed(f) => f.draw_glyph(dc, index, &cell, rect),
                    Self::Banded(f) => f.draw_glyph(dc, index, &cell, rect),
                },
                None => {
                    if rect.contains_rect(&cell) {
                        dc.draw_rect(&cell);
                    }
                }
            }
            pen = pen.saturating_add(advance);
        }
    }
}

/// Handle of a font in a [`FontRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FontId(u32);

#[derive(Debug)]
struct FontEntry {
    id: FontId,
    family: String,
    font: Arc<Font>,
    refs: u32,
}

/// Installed fonts looked up by family and height.
///
/// A font is added holding one reference. [`FontRegistry::refer`] takes
/// another; [`FontRegistry::derefer`] drops one and uninstalls the font when
/// none remain.
#[derive(Debug, Default)]
pub struct FontRegistry {
    entries: Vec<FontEntry>,
    next_id: u32,
    default: Option<FontId>,
}

impl FontRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a font. The first font installed becomes the default.
    pub fn add(&mut self, family: impl Into<String>, font: impl Into<Font>) -> FontId {
        let id = FontId(self.next_id);
        self.next_id += 1;
        let family = family.into();
        let font = Arc::new(font.into());
        debug!(family = %family, height = font.height(), "font added");
        self.entries.push(FontEntry {
            id,
            family,
            font,
            refs: 1,
        });
        self.default.get_or_insert(id);
        id
    }

    /// Uninstall regardless of outstanding references.
    pub fn remove(&mut self, id: FontId) -> Option<Arc<Font>> {
        let at = self.entries.iter().position(|e| e.id == id)?;
        let entry = self.entries.remove(at);
        if self.default == Some(id) {
            self.default = None;
        }
        debug!(family = %entry.family, "font removed");
        Some(entry.font)
    }

    /// Find a font by family (case-insensitive) and exact height, taking a
    /// reference to it.
    pub fn refer(&mut self, family: &str, height: u16) -> Option<(FontId, Arc<Font>)> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.family.eq_ignore_ascii_case(family) && e.font.height() == height)?;
        entry.refs += 1;
        Some((entry.id, Arc::clone(&entry.font)))
    }

    /// Drop a reference. Returns `true` if the font was uninstalled.
    pub fn derefer(&mut self, id: FontId) -> bool {
        let Some(entry) = self.entries.iter_mut().find(|e| e.id == id) else {
            return false;
        };
        entry.refs = entry.refs.saturating_sub(1);
        if entry.refs == 0 {
            self.remove(id);
            return true;
        }
        false
    }

    pub fn get(&self, id: FontId) -> Option<Arc<Font>> {
        self.entries
            .iter()
            .find(|e| e.id == id)
            .map(|e| Arc::clone(&e.font))
    }

    /// Outstanding references, including the registry's own.
    pub fn ref_count(&self, id: FontId) -> Option<u32> {
        self.entries.iter().find(|e| e.id == id).map(|e| e.refs)
    }

    /// Returns `false` if `id` is not installed.
    pub fn set_default(&mut self, id: FontId) -> bool {
        if self.entries.iter().any(|e| e.id == id) {
            self.default = Some(id);
            true
        } else {
            false
        }
    }

    pub fn default_font(&self) -> Option<Arc<Font>> {
        self.default.and_then(|id| self.get(id))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::{Color, PixelFormat};
    use crate::dc::{BufferDc, GraphicContext};

    /// 3x3 glyphs for 'A' and 'B'. 'A' is a plus sign, 'B' a filled block.
    fn plus_font() -> FixedFont {
        let bitmap: &'static [u8] = &[
            0b0100_0000, 0b1110_0000, 0b0100_0000, // A
            0b1110_0000, 0b1110_0000, 0b1110_0000, // B
        ];
        FixedFont::new(3, 3, 'A', 'B', bitmap).unwrap()
    }

    fn ink(dc: &BufferDc, area: Rect) -> Vec<(i32, i32)> {
        let mut out = Vec::new();
        for y in area.y1..area.y2 {
            for x in area.x1..area.x2 {
                if dc.pixel(x, y) == Some(Color::BLACK) {
                    out.push((x, y));
                }
            }
        }
        out
    }

    #[test]
    fn place_aligns_inside_target() {
        let target = Rect::new(0, 0, 100, 20);
        let text = Rect::from_size(30, 10);
        assert_eq!(TextAlign::empty().place(&target, &text), Rect::new(0, 0, 30, 10));
        assert_eq!(TextAlign::RIGHT.place(&target, &text), Rect::new(70, 0, 100, 10));
        assert_eq!(TextAlign::CENTER.place(&target, &text), Rect::new(35, 5, 65, 15));
        assert_eq!(
            (TextAlign::BOTTOM | TextAlign::RIGHT).place(&target, &text),
            Rect::new(70, 10, 100, 20)
        );
    }

    #[test]
    fn fixed_font_rejects_short_bitmap() {
        assert!(FixedFont::new(8, 8, 'a', 'z', vec![0u8; 10]).is_none());
        assert!(FixedFont::new(0, 8, 'a', 'a', vec![0u8; 8]).is_none());
    }

    #[test]
    fn metrics_skip_zero_width_and_double_wide() {
        let font = Font::from(plus_font());
        assert_eq!(font.metrics("AB"), Rect::new(0, 0, 6, 3));
        assert_eq!(font.string_width("A\u{0301}"), 3);
        assert_eq!(font.string_width("\u{4E2D}"), 6);
        assert_eq!(font.string_width("\n"), 0);
    }

    #[test]
    fn fixed_glyph_rasterizes_row_major() {
        let font = Font::from(plus_font());
        let mut dc = BufferDc::new(10, 5, PixelFormat::Rgb565);
        font.draw_text(&mut dc, "A", &Rect::new(1, 1, 10, 5));
        assert_eq!(ink(&dc, Rect::new(0, 0, 10, 5)), vec![(2, 1), (1, 2), (2, 2), (3, 2), (2, 3)]);
    }

    #[test]
    fn draw_text_clips_to_target() {
        let font = Font::from(plus_font());
        let mut dc = BufferDc::new(10, 5, PixelFormat::Rgb565);
        font.draw_text(&mut dc, "B", &Rect::new(0, 0, 2, 2));
        assert_eq!(ink(&dc, Rect::new(0, 0, 10, 5)), vec![(0, 0), (1, 0), (0, 1), (1, 1)]);
    }

    #[test]
    fn missing_wide_glyph_draws_hollow_box() {
        let font = Font::from(plus_font());
        let mut dc = BufferDc::new(10, 5, PixelFormat::Rgb565);
        font.draw_text(&mut dc, "\u{4E2D}", &Rect::new(0, 0, 10, 5));
        let drawn = ink(&dc, Rect::new(0, 0, 10, 5));
        assert!(drawn.contains(&(0, 0)));
        assert!(drawn.contains(&(5, 2)));
        assert!(!drawn.contains(&(2, 1)));
        assert!(!drawn.contains(&(6, 0)));
    }

    #[test]
    fn banded_glyph_is_column_major_lsb_top() {
        // Two glyphs, 2 columns each, 10 rows (two bands).
        let bits: &'static [u8] = &[
            0b0000_0001, 0b1000_0000, 0b0000_0010, 0b0000_0000, // '0'
            0, 0, 0, 0, // '1'
        ];
        let font = Font::from(BandedFont::fixed(2, 10, '0', '1', bits).unwrap());
        let mut dc = BufferDc::new(4, 12, PixelFormat::Rgb565);
        font.draw_text(&mut dc, "01", &Rect::new(0, 0, 4, 12));
        assert_eq!(ink(&dc, Rect::new(0, 0, 4, 12)), vec![(0, 0), (1, 7), (0, 9)]);
    }

    #[test]
    fn proportional_widths_advance_the_pen() {
        let bits: &'static [u8] = &[0xFF, 0xFF, 0xFF];
        let font = Font::from(BandedFont::proportional(8, 'i', 'm', bits, vec![1, 0, 0, 0, 2]).unwrap());
        assert_eq!(font.string_width("mi"), 3);
        let mut dc = BufferDc::new(4, 8, PixelFormat::Rgb565)
            .with_gc(GraphicContext::default().with_text_align(TextAlign::RIGHT));
        font.draw_text(&mut dc, "i", &Rect::new(0, 0, 4, 8));
        assert_eq!(ink(&dc, Rect::new(0, 0, 4, 1)), vec![(3, 0)]);
        assert!(BandedFont::proportional(8, 'i', 'm', vec![0u8; 1], vec![1, 2]).is_none());
    }

    #[test]
    fn registry_reference_counting() {
        let mut fonts = FontRegistry::new();
        let asc = fonts.add("asc", plus_font());
        assert_eq!(fonts.default_font().map(|f| f.height()), Some(3));

        let (id, font) = fonts.refer("ASC", 3).unwrap();
        assert_eq!(id, asc);
        assert_eq!(font.height(), 3);
        assert_eq!(fonts.ref_count(asc), Some(2));
        assert!(fonts.refer("asc", 16).is_none());
        assert!(fonts.refer("hz", 3).is_none());

        assert!(!fonts.derefer(asc));
        assert!(fonts.derefer(asc));
        assert!(fonts.is_empty());
        assert!(fonts.default_font().is_none());
        assert!(!fonts.derefer(asc));
    }

    #[test]
    fn registry_default_selection() {
        let mut fonts = FontRegistry::new();
        let a = fonts.add("a", plus_font());
        let b = fonts.add("b", BandedFont::fixed(1, 8, 'x', 'x', vec![0u8]).unwrap());
        assert!(fonts.set_default(b));
        assert_eq!(fonts.default_font().map(|f| f.height()), Some(8));
        assert!(fonts.remove(b).is_some());
        assert!(!fonts.set_default(b));
        assert!(fonts.set_default(a));
        assert_eq!(fonts.len(), 1);
    }
}
