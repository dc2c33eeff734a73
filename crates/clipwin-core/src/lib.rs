#![forbid(unsafe_code)]

//! Core: geometry, input primitives, and logging shared by every clipwin layer.

pub mod geometry;
pub mod input;
pub mod logging;

// Re-export tracing macros at crate root for ergonomic use.
#[cfg(feature = "tracing")]
pub use logging::{debug, trace};
