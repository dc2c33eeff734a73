#![forbid(unsafe_code)]

//! Device contexts.
//!
//! A device context turns widget-local drawing calls into clipped driver
//! calls. Two kinds exist and are closed over by [`Dc`]:
//!
//! - [`ClientDc`] draws straight to a [`GraphicDriver`] through the visible
//!   region of its window, as maintained by the window stack in a
//!   [`SharedClip`].
//! - [`BufferDc`] draws into an off-screen pixel buffer which can then be
//!   blitted onto another context.
//!
//! Drawing never fails. Empty, reversed, off-surface, or fully hidden input
//! simply produces no driver calls.
//!
//! # Client clip resolution
//!
//! The effective clip of a [`ClientDc`] is
//! `(window region ∩ owner extent) − child extents`. It is rebuilt whenever the
//! window's clip generation changes, which also empties both point caches:
//!
//! 1. `draw_rect`: last clip rectangle a point was found in (fast accept).
//! 2. `invalid_rect`: last child extent a point was found in (fast reject).
//!
//! A point that hits neither cache walks the region; a hit replaces
//! `draw_rect`. For containers a miss probes the child extents and caches the
//! containing child as `invalid_rect`.

use clipwin_core::geometry::{Point, Rect};
use clipwin_core::trace;

use crate::clip::SharedClip;
use crate::color::{Color, PixelFormat};
use crate::driver::GraphicDriver;
use crate::font::TextAlign;
use crate::region::Region;

/// Drawing attributes of a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphicContext {
    pub foreground: Color,
    pub background: Color,
    pub text_align: TextAlign,
}

impl Default for GraphicContext {
    fn default() -> Self {
        Self {
            foreground: Color::BLACK,
            background: Color::WHITE,
            text_align: TextAlign::empty(),
        }
    }
}

impl GraphicContext {
    #[must_use]
    pub const fn with_foreground(mut self, color: Color) -> Self {
        self.foreground = color;
        self
    }

    #[must_use]
    pub const fn with_background(mut self, color: Color) -> Self {
        self.background = color;
        self
    }

    #[must_use]
    pub const fn with_text_align(mut self, align: TextAlign) -> Self {
        self.text_align = align;
        self
    }
}

/// Operations shared by every device context.
///
/// Coordinates are local to the context: `(0, 0)` is the top-left of the
/// owner. Lines and spans are half-open.
pub trait DeviceContext {
    fn gc(&self) -> &GraphicContext;

    fn gc_mut(&mut self) -> &mut GraphicContext;

    fn bytes_per_pixel(&self) -> usize;

    /// Local drawing area, `(0, 0)-(width, height)`.
    fn size(&mut self) -> Rect;

    fn is_visible(&mut self) -> bool;

    /// Draw one pixel in the foreground color.
    fn draw_point(&mut self, x: i32, y: i32) {
        let color = self.gc().foreground;
        self.draw_point_with_color(x, y, color);
    }

    fn draw_point_with_color(&mut self, x: i32, y: i32, color: Color);

    /// Foreground line covering `min(x1, x2) <= x < max(x1, x2)` on row `y`.
    fn draw_hline(&mut self, x1: i32, x2: i32, y: i32);

    /// Foreground line covering `min(y1, y2) <= y < max(y1, y2)` in column `x`.
    fn draw_vline(&mut self, x: i32, y1: i32, y2: i32);

    /// Fill `rect` with the background color. The foreground is untouched.
    fn fill_rect(&mut self, rect: &Rect);

    /// Copy encoded pixels onto `x1..x2` of row `y`. Pixels beyond the end of
    /// `pixels` are not drawn; `x1 >= x2` draws nothing.
    fn blit_span(&mut self, x1: i32, x2: i32, y: i32, pixels: &[u8]);

    /// Copy `src` (local to `self`) onto `dest` with its top-left at `at`.
    fn blit<T: DeviceContext>(&mut self, src: &Rect, dest: &mut T, at: Point);

    /// Foreground outline of `rect`.
    fn draw_rect(&mut self, rect: &Rect) {
        if rect.is_empty() {
            return;
        }
        self.draw_hline(rect.x1, rect.x2, rect.y1);
        self.draw_hline(rect.x1, rect.x2, rect.y2 - 1);
        self.draw_vline(rect.x1, rect.y1, rect.y2);
        self.draw_vline(rect.x2 - 1, rect.y1, rect.y2);
    }
}

/// The drawable entity a [`ClientDc`] is bound to.
///
/// A top-level window draws over its whole extent. A nested widget covers
/// `area`, given relative to the window's top-left so it follows window
/// moves. A widget with children is a container: its children's areas
/// (also window-relative) are excluded from its clip.
#[derive(Debug, Clone)]
pub struct Surface {
    clip: SharedClip,
    area: Option<Rect>,
    children: Vec<Rect>,
}

impl Surface {
    /// The whole window.
    pub fn window(clip: SharedClip) -> Self {
        Self {
            clip,
            area: None,
            children: Vec::new(),
        }
    }

    /// A widget inside the window.
    pub fn widget(clip: SharedClip, area: Rect) -> Self {
        Self {
            clip,
            area: Some(area),
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_children(mut self, children: impl IntoIterator<Item = Rect>) -> Self {
        self.children = children.into_iter().filter(|c| !c.is_empty()).collect();
        self
    }

    pub fn clip(&self) -> &SharedClip {
        &self.clip
    }

    pub fn children(&self) -> &[Rect] {
        &self.children
    }

    pub fn is_container(&self) -> bool {
        !self.children.is_empty()
    }

    fn device_extent(&self, window: Rect) -> Rect {
        match self.area {
            Some(area) => area.translate(window.x1, window.y1),
            None => window,
        }
    }
}

/// Device context drawing directly to a hardware driver.
///
/// Exclusively owned by its drawable entity. Reads the window clip state
/// written by the window stack; never writes it.
#[derive(Debug)]
pub struct ClientDc<D> {
    surface: Surface,
    driver: D,
    gc: GraphicContext,
    seen_generation: Option<u64>,
    visible: bool,
    extent: Rect,
    region: Region,
    child_extents: Vec<Rect>,
    draw_rect: Rect,
    invalid_rect: Rect,
}

impl<D: GraphicDriver> ClientDc<D> {
    pub fn new(surface: Surface, driver: D) -> Self {
        Self {
            surface,
            driver,
            gc: GraphicContext::default(),
            seen_generation: None,
            visible: false,
            extent: Rect::default(),
            region: Region::empty(),
            child_extents: Vec::new(),
            draw_rect: Rect::default(),
            invalid_rect: Rect::default(),
        }
    }

    #[must_use]
    pub fn with_gc(mut self, gc: GraphicContext) -> Self {
        self.gc = gc;
        self
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    /// Replace the child areas of a container. Forces a clip rebuild.
    pub fn set_children(&mut self, children: impl IntoIterator<Item = Rect>) {
        self.surface.children = children.into_iter().filter(|c| !c.is_empty()).collect();
        self.seen_generation = None;
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    pub fn into_driver(self) -> D {
        self.driver
    }

    /// Owner extent in device coordinates.
    pub fn extent(&mut self) -> Rect {
        self.refresh();
        self.extent
    }

    /// Effective clip in device coordinates.
    pub fn clip_region(&mut self) -> &Region {
        self.refresh();
        &self.region
    }

    fn refresh(&mut self) {
        let generation = self.surface.clip.generation();
        if self.seen_generation == Some(generation) {
            return;
        }
        let snap = self.surface.clip.snapshot();
        let window = snap.extent;
        self.extent = self.surface.device_extent(window);
        self.child_extents = self
            .surface
            .children
            .iter()
            .map(|c| c.translate(window.x1, window.y1))
            .collect();
        let mut region = snap.region.intersect_rect(&self.extent);
        for child in &self.child_extents {
            region = region.subtract_rect(child);
        }
        self.region = region;
        self.visible = snap.visible;
        self.draw_rect = Rect::default();
        self.invalid_rect = Rect::default();
        self.seen_generation = Some(snap.generation);
        trace!(
            generation = snap.generation,
            rects = self.region.num_rects(),
            visible = self.visible,
            "client dc clip refreshed"
        );
    }

    /// Window-local point to device coordinates, `None` past the `i32` range.
    fn to_device(&self, x: i32, y: i32) -> Option<(i32, i32)> {
        Some((x.checked_add(self.extent.x1)?, y.checked_add(self.extent.y1)?))
    }

    /// Clip a device-coordinate horizontal line against the region.
    fn clip_hline(&mut self, color: Color, x1: i32, x2: i32, y: i32) {
        let (x1, x2) = if x1 <= x2 { (x1, x2) } else { (x2, x1) };
        if self.region.is_single_rect() {
            let r = self.region.extents();
            if y < r.y1 || y >= r.y2 {
                return;
            }
            let (a, b) = (x1.max(r.x1), x2.min(r.x2));
            if a < b {
                self.driver.draw_hline(color, a, b, y);
            }
            return;
        }
        for r in self.region.rects() {
            if r.y1 > y {
                break;
            }
            if y >= r.y2 {
                continue;
            }
            let (a, b) = (x1.max(r.x1), x2.min(r.x2));
            if a < b {
                self.driver.draw_hline(color, a, b, y);
            }
        }
    }

    fn clip_vline(&mut self, color: Color, x: i32, y1: i32, y2: i32) {
        let (y1, y2) = if y1 <= y2 { (y1, y2) } else { (y2, y1) };
        if self.region.is_single_rect() {
            let r = self.region.extents();
            if x < r.x1 || x >= r.x2 {
                return;
            }
            let (a, b) = (y1.max(r.y1), y2.min(r.y2));
            if a < b {
                self.driver.draw_vline(color, x, a, b);
            }
            return;
        }
        for r in self.region.rects() {
            if x < r.x1 || x >= r.x2 {
                continue;
            }
            let (a, b) = (y1.max(r.y1), y2.min(r.y2));
            if a < b {
                self.driver.draw_vline(color, x, a, b);
            }
        }
    }
}

impl<D: GraphicDriver> DeviceContext for ClientDc<D> {
    fn gc(&self) -> &GraphicContext {
        &self.gc
    }

    fn gc_mut(&mut self) -> &mut GraphicContext {
        &mut self.gc
    }

    fn bytes_per_pixel(&self) -> usize {
        self.driver.bytes_per_pixel()
    }

    fn size(&mut self) -> Rect {
        self.refresh();
        self.extent.to_local()
    }

    fn is_visible(&mut self) -> bool {
        self.refresh();
        self.visible
    }

    fn draw_point_with_color(&mut self, x: i32, y: i32, color: Color) {
        self.refresh();
        if !self.visible {
            return;
        }
        let Some((x, y)) = self.to_device(x, y) else {
            return;
        };

        if self.draw_rect.contains(x, y) {
            self.driver.set_pixel(color, x, y);
            return;
        }
        if self.invalid_rect.contains(x, y) {
            return;
        }
        if let Some(rect) = self.region.contains_point(x, y) {
            self.draw_rect = rect;
            self.driver.set_pixel(color, x, y);
            return;
        }
        if let Some(child) = self.child_extents.iter().find(|c| c.contains(x, y)) {
            self.invalid_rect = *child;
        }
    }

    fn draw_hline(&mut self, x1: i32, x2: i32, y: i32) {
        self.refresh();
        if !self.visible {
            return;
        }
        let (ox, oy) = (self.extent.x1, self.extent.y1);
        let Some(y) = y.checked_add(oy) else {
            return;
        };
        let color = self.gc.foreground;
        self.clip_hline(color, x1.saturating_add(ox), x2.saturating_add(ox), y);
    }

    fn draw_vline(&mut self, x: i32, y1: i32, y2: i32) {
        self.refresh();
        if !self.visible {
            return;
        }
        let (ox, oy) = (self.extent.x1, self.extent.y1);
        let Some(x) = x.checked_add(ox) else {
            return;
        };
        let color = self.gc.foreground;
        self.clip_vline(color, x, y1.saturating_add(oy), y2.saturating_add(oy));
    }

    fn fill_rect(&mut self, rect: &Rect) {
        self.refresh();
        if !self.visible || rect.is_empty() {
            return;
        }
        let color = self.gc.background;
        let local = self.extent.to_local();

        if *rect == local {
            // The region is disjoint and inside the extent already.
            for r in self.region.rects() {
                for y in r.y1..r.y2 {
                    self.driver.draw_hline(color, r.x1, r.x2, y);
                }
            }
            return;
        }

        let Some(part) = rect.intersection_opt(&local) else {
            return;
        };
        let device = part.translate(self.extent.x1, self.extent.y1);
        for y in device.y1..device.y2 {
            self.clip_hline(color, device.x1, device.x2, y);
        }
    }

    fn blit_span(&mut self, x1: i32, x2: i32, y: i32, pixels: &[u8]) {
        self.refresh();
        if !self.visible || x1 >= x2 {
            return;
        }
        let bpp = self.driver.bytes_per_pixel();
        if bpp == 0 {
            return;
        }
        let available = i32::try_from(pixels.len() / bpp).unwrap_or(i32::MAX);
        let x2 = x2.min(x1.saturating_add(available));
        let Some((x1, y)) = self.to_device(x1, y) else {
            return;
        };
        let x2 = x2.saturating_add(self.extent.x1);

        for r in self.region.rects() {
            if r.y1 > y {
                break;
            }
            if y >= r.y2 {
                continue;
            }
            let (a, b) = (x1.max(r.x1), x2.min(r.x2));
            if a >= b {
                continue;
            }
            let offset = (a - x1) as usize * bpp;
            let len = (b - a) as usize * bpp;
            if let Some(bytes) = pixels.get(offset..offset + len) {
                self.driver.draw_raw_span(bytes, a, b, y);
            }
        }
    }

    /// Not supported: a hardware-backed context cannot be read back, so this
    /// draws nothing.
    fn blit<T: DeviceContext>(&mut self, _src: &Rect, _dest: &mut T, _at: Point) {
        trace!("blit from a client dc ignored");
    }
}

/// Off-screen device context backed by a pixel buffer.
#[derive(Debug, Clone)]
pub struct BufferDc {
    width: i32,
    height: i32,
    format: PixelFormat,
    pixels: Vec<u8>,
    gc: GraphicContext,
}

impl BufferDc {
    /// A buffer cleared to the default background color.
    pub fn new(width: u16, height: u16, format: PixelFormat) -> Self {
        let gc = GraphicContext::default();
        let (width, height) = (i32::from(width), i32::from(height));
        let mut pixels = Vec::with_capacity((width * height) as usize * format.bytes_per_pixel());
        for _ in 0..width * height {
            format.encode(gc.background, &mut pixels);
        }
        Self {
            width,
            height,
            format,
            pixels,
            gc,
        }
    }

    #[must_use]
    pub fn with_gc(mut self, gc: GraphicContext) -> Self {
        self.gc = gc;
        self
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.format
    }

    fn bounds(&self) -> Rect {
        Rect::from_size(self.width, self.height)
    }

    fn offset(&self, x: i32, y: i32) -> Option<usize> {
        self.bounds()
            .contains(x, y)
            .then(|| (y * self.width + x) as usize * self.format.bytes_per_pixel())
    }

    pub fn pixel(&self, x: i32, y: i32) -> Option<Color> {
        let at = self.offset(x, y)?;
        Some(self.format.decode(&self.pixels[at..]))
    }

    /// Encoded pixels of row `y`, columns `x1..x2`, clamped to the buffer.
    pub fn row(&self, x1: i32, x2: i32, y: i32) -> &[u8] {
        let x1 = x1.max(0);
        let x2 = x2.min(self.width);
        if x1 >= x2 || y < 0 || y >= self.height {
            return &[];
        }
        let bpp = self.format.bytes_per_pixel();
        let start = (y * self.width + x1) as usize * bpp;
        let end = start + (x2 - x1) as usize * bpp;
        &self.pixels[start..end]
    }

    fn put(&mut self, color: Color, x: i32, y: i32) {
        if let Some(at) = self.offset(x, y) {
            self.format.encode_into(color, &mut self.pixels[at..]);
        }
    }

    fn span(&mut self, color: Color, x1: i32, x2: i32, y: i32) {
        let (x1, x2) = if x1 <= x2 { (x1, x2) } else { (x2, x1) };
        if y < 0 || y >= self.height {
            return;
        }
        for x in x1.max(0)..x2.min(self.width) {
            self.put(color, x, y);
        }
    }
}

impl DeviceContext for BufferDc {
    fn gc(&self) -> &GraphicContext {
        &self.gc
    }

    fn gc_mut(&mut self) -> &mut GraphicContext {
        &mut self.gc
    }

    fn bytes_per_pixel(&self) -> usize {
        self.format.bytes_per_pixel()
    }

    fn size(&mut self) -> Rect {
        self.bounds()
    }

    fn is_visible(&mut self) -> bool {
        true
    }

    fn draw_point_with_color(&mut self, x: i32, y: i32, color: Color) {
        self.put(color, x, y);
    }

    fn draw_hline(&mut self, x1: i32, x2: i32, y: i32) {
        self.span(self.gc.foreground, x1, x2, y);
    }

    fn draw_vline(&mut self, x: i32, y1: i32, y2: i32) {
        let (y1, y2) = if y1 <= y2 { (y1, y2) } else { (y2, y1) };
        let color = self.gc.foreground;
        for y in y1.max(0)..y2.min(self.height) {
            self.put(color, x, y);
        }
    }

    fn fill_rect(&mut self, rect: &Rect) {
        let Some(part) = rect.intersection_opt(&self.bounds()) else {
            return;
        };
        let color = self.gc.background;
        for y in part.y1..part.y2 {
            self.span(color, part.x1, part.x2, y);
        }
    }

    fn blit_span(&mut self, x1: i32, x2: i32, y: i32, pixels: &[u8]) {
        if x1 >= x2 || y < 0 || y >= self.height {
            return;
        }
        let bpp = self.format.bytes_per_pixel();
        let available = i32::try_from(pixels.len() / bpp).unwrap_or(i32::MAX);
        let x2 = x2.min(x1.saturating_add(available)).min(self.width);
        let start = x1.max(0);
        if start >= x2 {
            return;
        }
        let src = (start - x1) as usize * bpp;
        let len = (x2 - start) as usize * bpp;
        let dst = (y * self.width + start) as usize * bpp;
        if let (Some(from), Some(to)) = (
            pixels.get(src..src + len),
            self.pixels.get_mut(dst..dst + len),
        ) {
            to.copy_from_slice(from);
        }
    }

    /// Copy row by row through [`DeviceContext::blit_span`] on `dest`, which
    /// applies the destination's own clipping.
    fn blit<T: DeviceContext>(&mut self, src: &Rect, dest: &mut T, at: Point) {
        if dest.bytes_per_pixel() != self.format.bytes_per_pixel() {
            trace!("blit skipped: pixel size mismatch");
            return;
        }
        let Some(part) = src.intersection_opt(&self.bounds()) else {
            return;
        };
        let dx = at.x.saturating_add(part.x1.saturating_sub(src.x1));
        let dy = at.y.saturating_add(part.y1.saturating_sub(src.y1));
        for (i, y) in (part.y1..part.y2).enumerate() {
            let Some(row_y) = i32::try_from(i).ok().and_then(|i| dy.checked_add(i)) else {
                break;
            };
            let row = self.row(part.x1, part.x2, y);
            dest.blit_span(dx, dx.saturating_add(part.width()), row_y, row);
        }
    }
}

/// The closed set of device context kinds.
#[derive(Debug)]
pub enum Dc<D> {
    Client(ClientDc<D>),
    Buffer(BufferDc),
}

impl<D> From<ClientDc<D>> for Dc<D> {
    fn from(dc: ClientDc<D>) -> Self {
        Self::Client(dc)
    }
}

impl<D> From<BufferDc> for Dc<D> {
    fn from(dc: BufferDc) -> Self {
        Self::Buffer(dc)
    }
}

macro_rules! each_dc {
    ($self:expr, $dc:ident => $body:expr) => {
        match $self {
            Dc::Client($dc) => $body,
            Dc::Buffer($dc) => $body,
        }
    };
}

impl<D: GraphicDriver> DeviceContext for Dc<D> {
    fn gc(&self) -> &GraphicContext {
        each_dc!(self, dc => dc.gc())
    }

    fn gc_mut(&mut self) -> &mut GraphicContext {
        each_dc!(self, dc => dc.gc_mut())
    }

    fn bytes_per_pixel(&self) -> usize {
        each_dc!(self, dc => dc.bytes_per_pixel())
    }

    fn size(&mut self) -> Rect {
        each_dc!(self, dc => dc.size())
    }

    fn is_visible(&mut self) -> bool {
        each_dc!(self, dc => dc.is_visible())
    }

    fn draw_point_with_color(&mut self, x: i32, y: i32, color: Color) {
        each_dc!(self, dc => dc.draw_point_with_color(x, y, color))
    }

    fn draw_hline(&mut self, x1: i32, x2: i32, y: i32) {
        each_dc!(self, dc => dc.draw_hline(x1, x2, y))
    }

    fn draw_vline(&mut self, x: i32, y1: i32, y2: i32) {
        each_dc!(self, dc => dc.draw_vline(x, y1, y2))
    }

    fn fill_rect(&mut self, rect: &Rect) {
        each_dc!(self, dc => dc.fill_rect(rect))
    }

    fn blit_span(&mut self, x1: i32, x2: i32, y: i32, pixels: &[u8]) {
        each_dc!(self, dc => dc.blit_span(x1, x2, y, pixels))
    }

    fn blit<T: DeviceContext>(&mut self, src: &Rect, dest: &mut T, at: Point) {
        each_dc!(self, dc => dc.blit(src, dest, at))
    }
}
