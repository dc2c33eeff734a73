#![forbid(unsafe_code)]

//! Input primitives and identifiers.
//!
//! These are the values that travel from input sources through the server to
//! client mailboxes. Window targeting is left empty by senders; the server
//! fills in [`MouseEvent::wid`] / [`KeyEvent::wid`] after hit-testing or focus
//! lookup.
//!
//! # Design Notes
//!
//! - Coordinates are device pixels, origin at top-left.
//! - Button state and transition share one bitflags value, so a left press is
//!   `LEFT | DOWN` and a left release is `LEFT | UP`.
//! - A [`PressId`] correlates the down/move/up samples of one gesture.

use std::sync::atomic::{AtomicU64, Ordering};

use bitflags::bitflags;

static NEXT_WINDOW_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_PRESS_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identity of a top-level window.
///
/// Minted by the client before the window is registered with the server, so
/// that the create request itself can name the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(u64);

impl WindowId {
    /// Allocate a process-unique id.
    pub fn next() -> Self {
        Self(NEXT_WINDOW_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Wrap a raw value (tests, replays).
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for WindowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "win#{}", self.0)
    }
}

/// Logical-press identifier shared by a down/move/up sequence.
///
/// Ids are monotonically increasing across all input sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct PressId(u64);

impl PressId {
    /// Allocate the next id.
    pub fn next() -> Self {
        Self(NEXT_PRESS_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

bitflags! {
    /// Mouse buttons plus the transition that produced the event.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MouseButtons: u8 {
        const LEFT   = 0x01;
        const RIGHT  = 0x02;
        const MIDDLE = 0x04;
        /// The button went down.
        const DOWN   = 0x10;
        /// The button came up.
        const UP     = 0x20;
    }
}

impl MouseButtons {
    /// Only the button bits, without DOWN/UP.
    pub fn held(self) -> MouseButtons {
        self & (Self::LEFT | Self::RIGHT | Self::MIDDLE)
    }

    pub fn is_down(self) -> bool {
        self.contains(Self::DOWN)
    }

    pub fn is_up(self) -> bool {
        self.contains(Self::UP)
    }
}

/// A pointer event (button or motion).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MouseEvent {
    pub x: i32,
    pub y: i32,
    pub buttons: MouseButtons,
    /// Gesture correlation id.
    pub press_id: PressId,
    /// Target window, resolved by the server.
    pub wid: Option<WindowId>,
    /// Server activation count at delivery time.
    pub activation_count: u64,
}

impl MouseEvent {
    #[must_use]
    pub const fn new(x: i32, y: i32, buttons: MouseButtons) -> Self {
        Self {
            x,
            y,
            buttons,
            press_id: PressId::from_raw(0),
            wid: None,
            activation_count: 0,
        }
    }

    #[must_use]
    pub const fn with_press_id(mut self, press_id: PressId) -> Self {
        self.press_id = press_id;
        self
    }

    #[must_use]
    pub const fn position(&self) -> (i32, i32) {
        (self.x, self.y)
    }
}

bitflags! {
    /// Modifier keys held during a key event.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0001;
        const ALT   = 0b0010;
        const CTRL  = 0b0100;
        const SUPER = 0b1000;
    }
}

/// Key codes for keyboard events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    Char(char),
    Enter,
    Escape,
    Backspace,
    Tab,
    Delete,
    Home,
    End,
    PageUp,
    PageDown,
    Up,
    Down,
    Left,
    Right,
    /// Function key (F1-F24).
    F(u8),
}

/// Press or release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum KeyEventKind {
    #[default]
    Press,
    Release,
}

/// A keyboard event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub code: KeyCode,
    pub modifiers: Modifiers,
    pub kind: KeyEventKind,
    /// Target window, always the focused one.
    pub wid: Option<WindowId>,
    pub activation_count: u64,
}

impl KeyEvent {
    #[must_use]
    pub const fn new(code: KeyCode) -> Self {
        Self {
            code,
            modifiers: Modifiers::empty(),
            kind: KeyEventKind::Press,
            wid: None,
            activation_count: 0,
        }
    }

    #[must_use]
    pub const fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    #[must_use]
    pub const fn with_kind(mut self, kind: KeyEventKind) -> Self {
        self.kind = kind;
        self
    }
}

/// Phase of a touch sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TouchPhase {
    Down,
    Move,
    Up,
}

/// A normalized touch sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TouchSample {
    pub x: i32,
    pub y: i32,
    pub phase: TouchPhase,
}

impl TouchSample {
    pub const fn new(x: i32, y: i32, phase: TouchPhase) -> Self {
        Self { x, y, phase }
    }
}

/// A touch event as posted to the server, before conversion to mouse events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TouchEvent {
    pub sample: TouchSample,
    pub press_id: PressId,
}

/// One raw reading from an input device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawSample {
    Touch(TouchSample),
    /// Absolute pointer position and the buttons currently held.
    Pointer { x: i32, y: i32, held: MouseButtons },
    Key(KeyEvent),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_monotonic() {
        let a = PressId::next();
        let b = PressId::next();
        assert!(b > a);
        let w1 = WindowId::next();
        let w2 = WindowId::next();
        assert_ne!(w1, w2);
    }

    #[test]
    fn held_strips_transition_bits() {
        let b = MouseButtons::LEFT | MouseButtons::DOWN;
        assert_eq!(b.held(), MouseButtons::LEFT);
        assert!(b.is_down());
        assert!(!b.is_up());
    }

    #[test]
    fn mouse_event_builder() {
        let id = PressId::from_raw(9);
        let ev = MouseEvent::new(3, 4, MouseButtons::LEFT | MouseButtons::UP).with_press_id(id);
        assert_eq!(ev.position(), (3, 4));
        assert_eq!(ev.press_id, id);
        assert_eq!(ev.wid, None);
    }

    #[test]
    fn window_id_display() {
        assert_eq!(WindowId::from_raw(42).to_string(), "win#42");
    }
}
