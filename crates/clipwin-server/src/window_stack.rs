#![forbid(unsafe_code)]

//! Top-level window registry.
//!
//! The stack owns every top-level window record, their z-order, keyboard
//! focus and the modal chain, and it computes each window's visible region.
//! It is owned by the server and mutated only on the server thread.
//!
//! # Design
//!
//! Records live in an arena of slots addressed by generation-checked
//! [`WindowKey`]s; z-order is an explicit `Vec` of keys, topmost first.
//!
//! After any change to visibility, stacking or geometry every region is
//! recomputed top to bottom: a window's region is its extent clipped to the
//! screen, minus the extents of every visible window above it. Recomputing
//! the whole stack makes the update transitive for free. Each result is
//! written to the window's [`SharedClip`], whose generation invalidates the
//! device contexts reading it.
//!
//! # Invariants
//!
//! 1. Regions of visible windows are pairwise disjoint and inside the screen.
//! 2. Hidden windows have empty regions.
//! 3. The focused window, if any, is visible and not blocked by a modal.
//! 4. Every id in the modal chain names a registered, visible window.
//!
//! Side effects for clients (repaint, focus changes) are queued as
//! [`Notice`]s and drained by the server.

use std::collections::HashMap;

use clipwin_core::geometry::{Point, Rect};
use clipwin_core::input::WindowId;
use clipwin_render::clip::SharedClip;
use clipwin_render::region::Region;
use tracing::{debug, info};

use crate::error::StackError;
use crate::event::WindowDescriptor;
use crate::mailbox::Mailbox;

/// Stable handle of a window record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowKey {
    index: u32,
    generation: u32,
}

/// A client-visible consequence of a stack change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    /// The window's visible region changed.
    Repaint(WindowId),
    Activated(WindowId),
    Deactivated(WindowId),
}

/// One top-level window.
#[derive(Debug)]
pub struct TopWindow {
    id: WindowId,
    client: Mailbox,
    extent: Rect,
    parent: Option<WindowId>,
    title: String,
    visible: bool,
    clip: SharedClip,
    region: Region,
    monitors: Vec<Rect>,
}

impl TopWindow {
    pub fn id(&self) -> WindowId {
        self.id
    }

    pub fn client(&self) -> &Mailbox {
        &self.client
    }

    pub fn extent(&self) -> Rect {
        self.extent
    }

    pub fn parent(&self) -> Option<WindowId> {
        self.parent
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    pub fn clip(&self) -> &SharedClip {
        &self.clip
    }

    /// Monitor rectangles, relative to the window's top-left.
    pub fn monitors(&self) -> &[Rect] {
        &self.monitors
    }

    /// Whether a screen point is inside one of the monitor rectangles.
    pub fn monitors_point(&self, x: i32, y: i32) -> bool {
        self.monitors
            .iter()
            .any(|m| m.translate(self.extent.x1, self.extent.y1).contains(x, y))
    }
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    record: Option<TopWindow>,
}

/// The registry of top-level windows.
#[derive(Debug)]
pub struct WindowStack {
    screen: Rect,
    capacity: usize,
    slots: Vec<Slot>,
    free: Vec<u32>,
    /// Topmost first.
    order: Vec<WindowKey>,
    by_id: HashMap<WindowId, WindowKey>,
    /// Bottom to top; the last entry is the active modal window.
    modal: Vec<WindowId>,
    focus: Option<WindowId>,
    activations: u64,
    notices: Vec<Notice>,
}

impl WindowStack {
    pub fn new(screen: Rect, capacity: usize) -> Self {
        Self {
            screen,
            capacity,
            slots: Vec::new(),
            free: Vec::new(),
            order: Vec::new(),
            by_id: HashMap::new(),
            modal: Vec::new(),
            focus: None,
            activations: 0,
            notices: Vec::new(),
        }
    }

    pub fn screen(&self) -> Rect {
        self.screen
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of focus changes so far.
    pub fn activation_count(&self) -> u64 {
        self.activations
    }

    pub fn focused(&self) -> Option<WindowId> {
        self.focus
    }

    /// The active modal window.
    pub fn modal_top(&self) -> Option<WindowId> {
        self.modal.last().copied()
    }

    pub fn key(&self, id: WindowId) -> Option<WindowKey> {
        self.by_id.get(&id).copied()
    }

    /// Resolve a key. Keys of removed windows resolve to `None`, even after
    /// their slot is reused.
    pub fn get_by_key(&self, key: WindowKey) -> Option<&TopWindow> {
        let slot = self.slots.get(key.index as usize)?;
        if slot.generation != key.generation {
            return None;
        }
        slot.record.as_ref()
    }

    pub fn get(&self, id: WindowId) -> Option<&TopWindow> {
        self.get_by_key(self.key(id)?)
    }

    fn get_mut(&mut self, id: WindowId) -> Result<&mut TopWindow, StackError> {
        let key = self.key(id).ok_or(StackError::UnknownWindow(id))?;
        self.slots
            .get_mut(key.index as usize)
            .filter(|slot| slot.generation == key.generation)
            .and_then(|slot| slot.record.as_mut())
            .ok_or(StackError::UnknownWindow(id))
    }

    /// Visible region of a window.
    pub fn region(&self, id: WindowId) -> Option<&Region> {
        self.get(id).map(TopWindow::region)
    }

    /// Window ids, topmost first.
    pub fn z_order(&self) -> Vec<WindowId> {
        self.windows().map(TopWindow::id).collect()
    }

    /// Window records, topmost first.
    pub fn windows(&self) -> impl Iterator<Item = &TopWindow> + '_ {
        self.order.iter().filter_map(|&key| self.get_by_key(key))
    }

    /// Pending client notices, oldest first.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Register a window on top of the z-order. New windows start hidden.
    pub fn add(&mut self, desc: WindowDescriptor) -> Result<WindowKey, StackError> {
        let Some(client) = desc.client else {
            return Err(StackError::MalformedDescriptor("missing client mailbox"));
        };
        if !desc.extent.is_well_formed() {
            return Err(StackError::MalformedDescriptor("inverted extent"));
        }
        if let Some(parent) = desc.parent {
            if !self.by_id.contains_key(&parent) {
                return Err(StackError::MalformedDescriptor("unknown parent window"));
            }
        }
        if self.by_id.contains_key(&desc.id) {
            return Err(StackError::DuplicateWindow(desc.id));
        }
        if self.by_id.len() >= self.capacity {
            return Err(StackError::RegistryFull {
                capacity: self.capacity,
            });
        }

        desc.clip.update(desc.extent, Region::empty(), false);
        let record = TopWindow {
            id: desc.id,
            client,
            extent: desc.extent,
            parent: desc.parent,
            title: desc.title,
            visible: false,
            clip: desc.clip,
            region: Region::empty(),
            monitors: Vec::new(),
        };
        let key = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.record = Some(record);
                WindowKey {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    record: Some(record),
                });
                WindowKey {
                    index,
                    generation: 0,
                }
            }
        };
        self.order.insert(0, key);
        self.by_id.insert(desc.id, key);
        info!(wid = %desc.id, extent = ?desc.extent, "window added");
        Ok(key)
    }

    /// Make a window visible and hit-testable. Showing does not raise or
    /// focus it. Showing a visible window does nothing.
    pub fn show(&mut self, id: WindowId) -> Result<(), StackError> {
        let win = self.get_mut(id)?;
        if win.visible {
            return Ok(());
        }
        win.visible = true;
        debug!(wid = %id, "window shown");
        self.recompute();
        Ok(())
    }

    /// Hide a window. Hiding a hidden window does nothing.
    pub fn hide(&mut self, id: WindowId) -> Result<(), StackError> {
        let win = self.get_mut(id)?;
        if !win.visible {
            return Ok(());
        }
        win.visible = false;
        debug!(wid = %id, "window hidden");
        self.modal.retain(|&m| m != id);
        self.recompute();
        if self.focus == Some(id) {
            self.hand_off_focus(id);
        }
        Ok(())
    }

    /// Move a window's top-left corner to `origin`. An origin that would push
    /// the far edges past the coordinate range is rejected.
    pub fn move_to(&mut self, id: WindowId, origin: Point) -> Result<(), StackError> {
        let win = self.get_mut(id)?;
        win.extent = win
            .extent
            .checked_move_to(origin.x, origin.y)
            .ok_or(StackError::MalformedDescriptor("extent out of range"))?;
        debug!(wid = %id, extent = ?win.extent, "window moved");
        self.recompute();
        Ok(())
    }

    /// Replace a window's extent.
    pub fn resize(&mut self, id: WindowId, extent: Rect) -> Result<(), StackError> {
        if !extent.is_well_formed() {
            return Err(StackError::MalformedDescriptor("inverted extent"));
        }
        let win = self.get_mut(id)?;
        win.extent = extent;
        debug!(wid = %id, extent = ?extent, "window resized");
        self.recompute();
        Ok(())
    }

    /// Raise a window (with its child windows) to the top and give it
    /// keyboard focus. Activating the focused window does nothing.
    pub fn activate(&mut self, id: WindowId) -> Result<(), StackError> {
        let win = self.get(id).ok_or(StackError::UnknownWindow(id))?;
        if !win.visible {
            return Err(StackError::NotVisible(id));
        }
        if !self.is_allowed(id) {
            return Err(StackError::Blocked(id));
        }
        if self.focus == Some(id) {
            return Ok(());
        }
        self.raise(id);
        self.set_focus(Some(id));
        self.recompute();
        Ok(())
    }

    /// Make a window the top of the modal chain and activate it. Until it
    /// leaves the chain, only it and its child windows receive pointer input
    /// and focus.
    pub fn modal_enter(&mut self, id: WindowId) -> Result<(), StackError> {
        let win = self.get(id).ok_or(StackError::UnknownWindow(id))?;
        if !win.visible {
            return Err(StackError::NotVisible(id));
        }
        if !self.is_allowed(id) {
            return Err(StackError::Blocked(id));
        }
        if self.modal_top() != Some(id) {
            self.modal.retain(|&m| m != id);
            self.modal.push(id);
            info!(wid = %id, depth = self.modal.len(), "modal chain entered");
        }
        if self.focus != Some(id) {
            self.raise(id);
            self.set_focus(Some(id));
            self.recompute();
        }
        Ok(())
    }

    /// Remove a window from the modal chain. Not being in the chain is fine.
    pub fn modal_exit(&mut self, id: WindowId) -> Result<(), StackError> {
        if !self.by_id.contains_key(&id) {
            return Err(StackError::UnknownWindow(id));
        }
        let before = self.modal.len();
        self.modal.retain(|&m| m != id);
        if self.modal.len() != before {
            info!(wid = %id, depth = self.modal.len(), "modal chain exited");
        }
        Ok(())
    }

    /// Topmost visible window whose extent contains the point. While a modal
    /// chain is active only its top window and that window's children count.
    pub fn hit_test(&self, x: i32, y: i32) -> Option<WindowId> {
        self.windows()
            .find(|w| w.visible && self.is_allowed(w.id) && w.extent.contains(x, y))
            .map(TopWindow::id)
    }

    /// Destroy a window record.
    pub fn remove(&mut self, id: WindowId) -> Result<(), StackError> {
        let key = self.key(id).ok_or(StackError::UnknownWindow(id))?;
        self.by_id.remove(&id);
        self.order.retain(|&k| k != key);
        self.modal.retain(|&m| m != id);
        let slot = &mut self.slots[key.index as usize];
        if let Some(win) = slot.record.take() {
            win.clip.update(win.extent, Region::empty(), false);
        }
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(key.index);

        for slot in &mut self.slots {
            if let Some(win) = slot.record.as_mut() {
                if win.parent == Some(id) {
                    win.parent = None;
                }
            }
        }
        info!(wid = %id, "window removed");
        self.recompute();
        if self.focus == Some(id) {
            self.focus = None;
            self.hand_off_focus(id);
        }
        Ok(())
    }

    /// Add a window-relative monitor rectangle. Duplicates are ignored.
    pub fn monitor_add(&mut self, id: WindowId, rect: Rect) -> Result<(), StackError> {
        let win = self.get_mut(id)?;
        if !rect.is_empty() && !win.monitors.contains(&rect) {
            win.monitors.push(rect);
        }
        Ok(())
    }

    /// Remove a monitor rectangle. Unknown rectangles are ignored.
    pub fn monitor_remove(&mut self, id: WindowId, rect: Rect) -> Result<(), StackError> {
        let win = self.get_mut(id)?;
        win.monitors.retain(|m| *m != rect);
        Ok(())
    }

    fn is_allowed(&self, id: WindowId) -> bool {
        match self.modal.last() {
            None => true,
            Some(&top) => id == top || self.get(id).and_then(TopWindow::parent) == Some(top),
        }
    }

    /// Move `id` and its child windows to the top, keeping their relative
    /// order.
    fn raise(&mut self, id: WindowId) {
        let (mut lifted, rest): (Vec<WindowKey>, Vec<WindowKey>) =
            self.order.iter().partition(|&&key| {
                self.get_by_key(key)
                    .is_some_and(|w| w.id == id || w.parent == Some(id))
            });
        // Children stay above their parent.
        lifted.sort_by_key(|&key| self.get_by_key(key).is_some_and(|w| w.id == id));
        lifted.extend(rest);
        self.order = lifted;
    }

    fn set_focus(&mut self, next: Option<WindowId>) {
        if let Some(prev) = self.focus {
            if self.by_id.contains_key(&prev) {
                self.notices.push(Notice::Deactivated(prev));
            }
        }
        self.focus = next;
        if let Some(id) = next {
            self.activations += 1;
            self.notices.push(Notice::Activated(id));
            debug!(wid = %id, activations = self.activations, "focus changed");
        }
    }

    /// Focus the topmost visible, unblocked window other than `leaving`.
    fn hand_off_focus(&mut self, leaving: WindowId) {
        let next = self
            .windows()
            .find(|w| w.visible && w.id != leaving && self.is_allowed(w.id))
            .map(TopWindow::id);
        self.set_focus(next);
    }

    fn recompute(&mut self) {
        let mut covered = Region::empty();
        for i in 0..self.order.len() {
            let key = self.order[i];
            let Some(win) = self.slots[key.index as usize].record.as_mut() else {
                continue;
            };
            let region = if win.visible {
                let on_screen = win.extent.intersection(&self.screen);
                let region = Region::from_rect(on_screen).subtract(&covered);
                covered = covered.union_rect(&on_screen);
                region
            } else {
                Region::empty()
            };
            let changed = win.region != region;
            win.clip.update(win.extent, region.clone(), win.visible);
            win.region = region;
            if changed && win.visible {
                self.notices.push(Notice::Repaint(win.id));
            }
        }
    }
}
