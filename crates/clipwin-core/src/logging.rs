#![forbid(unsafe_code)]

//! Logging facade for the drawing and input layers.
//!
//! With the `tracing` feature `trace!` and `debug!` are re-exported from
//! tracing (here and at the crate root). Without it both expand to nothing,
//! so the per-pixel clipping paths that log through `clipwin_core::trace!`
//! cost nothing in a default build.
//!
//! The server layer depends on `tracing` directly; only crates that sit on the
//! hot drawing path go through this facade.

#[cfg(feature = "tracing")]
pub use tracing::{debug, trace};

#[cfg(not(feature = "tracing"))]
mod disabled {
    /// Discards its arguments when tracing is disabled.
    #[macro_export]
    macro_rules! trace {
        ($($arg:tt)*) => {};
    }

    /// Discards its arguments when tracing is disabled.
    #[macro_export]
    macro_rules! debug {
        ($($arg:tt)*) => {};
    }
}

#[cfg(all(test, not(feature = "tracing")))]
mod tests {
    #[test]
    fn disabled_macros_accept_tracing_syntax() {
        let count = 3;
        crate::trace!(count, "drew {} segments", count);
        crate::debug!(window = 7, "clip changed");
    }
}
