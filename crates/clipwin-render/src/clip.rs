#![forbid(unsafe_code)]

//! Shared per-window clip state.
//!
//! The window stack is the only writer of a [`SharedClip`]; device contexts on
//! client threads read it. Every write bumps a generation counter, so a reader
//! can tell with one atomic load whether anything it cached is stale, and only
//! takes the lock when it is.
//!
//! The generation is bumped while the write lock is held, so a
//! [`ClipSnapshot`] taken under the read lock always pairs a generation with
//! the content written at that generation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use clipwin_core::geometry::Rect;

use crate::region::Region;

/// A consistent copy of a window's clip state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipSnapshot {
    pub generation: u64,
    /// Window extent in device coordinates.
    pub extent: Rect,
    /// Visible, unobscured part of the window.
    pub region: Region,
    pub visible: bool,
}

#[derive(Debug)]
struct ClipState {
    extent: Rect,
    region: Region,
    visible: bool,
}

#[derive(Debug)]
struct ClipCell {
    generation: AtomicU64,
    state: RwLock<ClipState>,
}

/// Clip state shared between the window stack and a window's device contexts.
///
/// Cloning is cheap and yields a handle to the same cell.
#[derive(Debug, Clone)]
pub struct SharedClip {
    inner: Arc<ClipCell>,
}

impl SharedClip {
    /// A hidden window with the given extent and nothing visible.
    pub fn new(extent: Rect) -> Self {
        Self {
            inner: Arc::new(ClipCell {
                generation: AtomicU64::new(0),
                state: RwLock::new(ClipState {
                    extent,
                    region: Region::empty(),
                    visible: false,
                }),
            }),
        }
    }

    /// Current generation. Changes after every content write.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> ClipSnapshot {
        let state = self.inner.state.read().unwrap_or_else(PoisonError::into_inner);
        ClipSnapshot {
            generation: self.inner.generation.load(Ordering::Acquire),
            extent: state.extent,
            region: state.region.clone(),
            visible: state.visible,
        }
    }

    pub fn extent(&self) -> Rect {
        self.inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .extent
    }

    pub fn region(&self) -> Region {
        self.inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .region
            .clone()
    }

    pub fn is_visible(&self) -> bool {
        self.inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .visible
    }

    /// Replace the clip content. Returns `true` if anything changed; the
    /// generation only moves on a real change.
    pub fn update(&self, extent: Rect, region: Region, visible: bool) -> bool {
        let mut state = self
            .inner
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if state.extent == extent && state.region == region && state.visible == visible {
            return false;
        }
        state.extent = extent;
        state.region = region;
        state.visible = visible;
        self.inner.generation.fetch_add(1, Ordering::Release);
        true
    }

    /// Force every reader to re-evaluate, even if the content is unchanged.
    pub fn invalidate(&self) {
        let _state = self
            .inner
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        self.inner.generation.fetch_add(1, Ordering::Release);
    }

    /// Whether both handles refer to the same cell.
    pub fn ptr_eq(&self, other: &SharedClip) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
