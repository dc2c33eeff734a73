#![forbid(unsafe_code)]

//! Hardware driver capability.
//!
//! A [`GraphicDriver`] receives already-clipped primitives in device
//! coordinates. Lines and spans are half-open: `draw_hline(c, x1, x2, y)`
//! covers `x1 <= x < x2`.
//!
//! Two in-memory drivers are provided: [`RecordingDriver`] keeps the call log,
//! [`Framebuffer`] keeps the pixels. [`SharedDriver`] lets several device
//! contexts and the server drive the same surface.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use clipwin_core::geometry::Rect;

use crate::color::{Color, PixelFormat};

/// Primitive operations of a display surface.
pub trait GraphicDriver {
    fn pixel_format(&self) -> PixelFormat;

    fn bytes_per_pixel(&self) -> usize {
        self.pixel_format().bytes_per_pixel()
    }

    fn set_pixel(&mut self, color: Color, x: i32, y: i32);

    fn draw_hline(&mut self, color: Color, x1: i32, x2: i32, y: i32);

    fn draw_vline(&mut self, color: Color, x: i32, y1: i32, y2: i32);

    /// Copy encoded pixels to `x1..x2` on row `y`. `pixels` holds exactly
    /// `(x2 - x1) * bytes_per_pixel` bytes.
    fn draw_raw_span(&mut self, pixels: &[u8], x1: i32, x2: i32, y: i32);

    /// Flush `rect` to the panel.
    fn screen_update(&mut self, rect: Rect);
}

impl<D: GraphicDriver + ?Sized> GraphicDriver for Box<D> {
    fn pixel_format(&self) -> PixelFormat {
        (**self).pixel_format()
    }

    fn bytes_per_pixel(&self) -> usize {
        (**self).bytes_per_pixel()
    }

    fn set_pixel(&mut self, color: Color, x: i32, y: i32) {
        (**self).set_pixel(color, x, y);
    }

    fn draw_hline(&mut self, color: Color, x1: i32, x2: i32, y: i32) {
        (**self).draw_hline(color, x1, x2, y);
    }

    fn draw_vline(&mut self, color: Color, x: i32, y1: i32, y2: i32) {
        (**self).draw_vline(color, x, y1, y2);
    }

    fn draw_raw_span(&mut self, pixels: &[u8], x1: i32, x2: i32, y: i32) {
        (**self).draw_raw_span(pixels, x1, x2, y);
    }

    fn screen_update(&mut self, rect: Rect) {
        (**self).screen_update(rect);
    }
}

/// One recorded hardware call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrawCall {
    Pixel { color: Color, x: i32, y: i32 },
    HLine { color: Color, x1: i32, x2: i32, y: i32 },
    VLine { color: Color, x: i32, y1: i32, y2: i32 },
    RawSpan { x1: i32, x2: i32, y: i32, pixels: Vec<u8> },
    ScreenUpdate(Rect),
}

impl DrawCall {
    /// Device pixels touched by the call.
    pub fn bounds(&self) -> Rect {
        match *self {
            Self::Pixel { x, y, .. } => Rect::new(x, y, x + 1, y + 1),
            Self::HLine { x1, x2, y, .. } | Self::RawSpan { x1, x2, y, .. } => {
                Rect::new(x1, y, x2, y + 1)
            }
            Self::VLine { x, y1, y2, .. } => Rect::new(x, y1, x + 1, y2),
            Self::ScreenUpdate(rect) => rect,
        }
    }
}

/// Driver that records every call instead of drawing.
#[derive(Debug, Clone, Default)]
pub struct RecordingDriver {
    format: PixelFormat,
    calls: Vec<DrawCall>,
}

impl RecordingDriver {
    pub fn new(format: PixelFormat) -> Self {
        Self {
            format,
            calls: Vec::new(),
        }
    }

    pub fn calls(&self) -> &[DrawCall] {
        &self.calls
    }

    /// Drain the log.
    pub fn take_calls(&mut self) -> Vec<DrawCall> {
        std::mem::take(&mut self.calls)
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }
}

impl GraphicDriver for RecordingDriver {
    fn pixel_format(&self) -> PixelFormat {
        self.format
    }

    fn set_pixel(&mut self, color: Color, x: i32, y: i32) {
        self.calls.push(DrawCall::Pixel { color, x, y });
    }

    fn draw_hline(&mut self, color: Color, x1: i32, x2: i32, y: i32) {
        self.calls.push(DrawCall::HLine { color, x1, x2, y });
    }

    fn draw_vline(&mut self, color: Color, x: i32, y1: i32, y2: i32) {
        self.calls.push(DrawCall::VLine { color, x, y1, y2 });
    }

    fn draw_raw_span(&mut self, pixels: &[u8], x1: i32, x2: i32, y: i32) {
        self.calls.push(DrawCall::RawSpan {
            x1,
            x2,
            y,
            pixels: pixels.to_vec(),
        });
    }

    fn screen_update(&mut self, rect: Rect) {
        self.calls.push(DrawCall::ScreenUpdate(rect));
    }
}

/// In-memory pixel surface. Writes outside the surface are dropped.
#[derive(Debug, Clone)]
pub struct Framebuffer {
    width: i32,
    height: i32,
    format: PixelFormat,
    pixels: Vec<Color>,
    updates: Vec<Rect>,
}

impl Framebuffer {
    pub fn new(width: u16, height: u16, format: PixelFormat) -> Self {
        let (width, height) = (i32::from(width), i32::from(height));
        Self {
            width,
            height,
            format,
            pixels: vec![Color::BLACK; (width * height) as usize],
            updates: Vec::new(),
        }
    }

    pub fn bounds(&self) -> Rect {
        Rect::from_size(self.width, self.height)
    }

    #[inline]
    fn index(&self, x: i32, y: i32) -> Option<usize> {
        self.bounds()
            .contains(x, y)
            .then(|| (y * self.width + x) as usize)
    }

    pub fn pixel(&self, x: i32, y: i32) -> Option<Color> {
        self.index(x, y).map(|i| self.pixels[i])
    }

    /// Fill the whole surface, bypassing any clip.
    pub fn clear(&mut self, color: Color) {
        self.pixels.fill(color);
    }

    /// Number of pixels of the given color.
    pub fn count(&self, color: Color) -> usize {
        self.pixels.iter().filter(|&&c| c == color).count()
    }

    /// Rectangles passed to `screen_update`, oldest first.
    pub fn updates(&self) -> &[Rect] {
        &self.updates
    }
}

impl GraphicDriver for Framebuffer {
    fn pixel_format(&self) -> PixelFormat {
        self.format
    }

    fn set_pixel(&mut self, color: Color, x: i32, y: i32) {
        if let Some(i) = self.index(x, y) {
            self.pixels[i] = color;
        }
    }

    fn draw_hline(&mut self, color: Color, x1: i32, x2: i32, y: i32) {
        for x in x1.max(0)..x2.min(self.width) {
            self.set_pixel(color, x, y);
        }
    }

    fn draw_vline(&mut self, color: Color, x: i32, y1: i32, y2: i32) {
        for y in y1.max(0)..y2.min(self.height) {
            self.set_pixel(color, x, y);
        }
    }

    fn draw_raw_span(&mut self, pixels: &[u8], x1: i32, x2: i32, y: i32) {
        let bpp = self.format.bytes_per_pixel();
        for (x, chunk) in (x1..x2).zip(pixels.chunks_exact(bpp)) {
            let color = self.format.decode(chunk);
            self.set_pixel(color, x, y);
        }
    }

    fn screen_update(&mut self, rect: Rect) {
        self.updates.push(rect);
    }
}

/// A driver shared between threads.
#[derive(Debug, Default)]
pub struct SharedDriver<D> {
    inner: Arc<Mutex<D>>,
}

impl<D> Clone for SharedDriver<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<D> SharedDriver<D> {
    pub fn new(driver: D) -> Self {
        Self {
            inner: Arc::new(Mutex::new(driver)),
        }
    }

    /// Lock the underlying driver. A poisoned lock is recovered; the driver
    /// state is plain pixels or call logs.
    pub fn lock(&self) -> MutexGuard<'_, D> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<D: GraphicDriver> GraphicDriver for SharedDriver<D> {
    fn pixel_format(&self) -> PixelFormat {
        self.lock().pixel_format()
    }

    fn bytes_per_pixel(&self) -> usize {
        self.lock().bytes_per_pixel()
    }

    fn set_pixel(&mut self, color: Color, x: i32, y: i32) {
        self.lock().set_pixel(color, x, y);
    }

    fn draw_hline(&mut self, color: Color, x1: i32, x2: i32, y: i32) {
        self.lock().draw_hline(color, x1, x2, y);
    }

    fn draw_vline(&mut self, color: Color, x: i32, y1: i32, y2: i32) {
        self.lock().draw_vline(color, x, y1, y2);
    }

    fn draw_raw_span(&mut self, pixels: &[u8], x1: i32, x2: i32, y: i32) {
        self.lock().draw_raw_span(pixels, x1, x2, y);
    }

    fn screen_update(&mut self, rect: Rect) {
        self.lock().screen_update(rect);
    }
}
