#![forbid(unsafe_code)]

//! Clipped rendering: regions, device contexts, drivers, and fonts.

pub mod clip;
pub mod color;
pub mod dc;
pub mod driver;
pub mod font;
pub mod region;

pub use clip::{ClipSnapshot, SharedClip};
pub use color::{Color, PixelFormat};
pub use dc::{BufferDc, ClientDc, Dc, DeviceContext, GraphicContext, Surface};
pub use driver::{DrawCall, Framebuffer, GraphicDriver, RecordingDriver, SharedDriver};
pub use font::{BandedFont, FixedFont, Font, FontId, FontRegistry, TextAlign};
pub use region::Region;
