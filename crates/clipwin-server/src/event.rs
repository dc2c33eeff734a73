#![forbid(unsafe_code)]

//! Router vocabulary.
//!
//! Every message between clients, input sources and the server is an
//! [`Event`] wrapped in an [`Envelope`]. An envelope may carry an
//! acknowledgment slot; the receiver answers it with a [`Status`] once the
//! request has been applied, which is how synchronous posts are implemented.

use std::sync::mpsc::{self, Receiver, SyncSender};

use clipwin_core::geometry::{Point, Rect};
use clipwin_core::input::{KeyEvent, MouseEvent, TouchEvent, WindowId};
use clipwin_render::clip::SharedClip;

use crate::mailbox::Mailbox;

/// Result of a request, as seen across the client/server boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Ok,
    Error,
}

impl Status {
    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }
}

impl<E> From<Result<(), E>> for Status {
    fn from(result: Result<(), E>) -> Self {
        match result {
            Ok(()) => Self::Ok,
            Err(_) => Self::Error,
        }
    }
}

/// Everything the server needs to register a top-level window.
#[derive(Debug, Clone)]
pub struct WindowDescriptor {
    pub id: WindowId,
    /// Where the window's input and notifications are delivered.
    pub client: Option<Mailbox>,
    /// Extent in screen coordinates.
    pub extent: Rect,
    /// Owning window, for dialogs that belong to a modal parent.
    pub parent: Option<WindowId>,
    /// Clip cell shared with the window's device contexts.
    pub clip: SharedClip,
    pub title: String,
}

impl WindowDescriptor {
    /// A fresh window with a new id and clip cell.
    pub fn new(extent: Rect, client: Mailbox) -> Self {
        Self {
            id: WindowId::next(),
            client: Some(client),
            extent,
            parent: None,
            clip: SharedClip::new(extent),
            title: String::new(),
        }
    }

    #[must_use]
    pub fn with_parent(mut self, parent: WindowId) -> Self {
        self.parent = Some(parent);
        self
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }
}

/// An application announcing itself to the window manager.
#[derive(Debug, Clone)]
pub struct AppInfo {
    pub name: String,
    pub mailbox: Option<Mailbox>,
}

impl AppInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mailbox: None,
        }
    }
}

/// Router and client event vocabulary.
#[derive(Debug, Clone)]
pub enum Event {
    MouseMotion(MouseEvent),
    MouseButton(MouseEvent),
    Keyboard(KeyEvent),
    Touch(TouchEvent),

    WinCreate(WindowDescriptor),
    WinShow(WindowId),
    WinHide(WindowId),
    WinMove { wid: WindowId, origin: Point },
    WinResize { wid: WindowId, extent: Rect },
    WinDestroy(WindowId),
    WinActivate(WindowId),
    WinDeactivate(WindowId),
    WinModalEnter(WindowId),
    WinModalExit(WindowId),

    /// Register a window-relative motion area.
    MonitorAdd { wid: WindowId, rect: Rect },
    MonitorRemove { wid: WindowId, rect: Rect },

    UpdateBegin(Rect),
    UpdateEnd(Rect),

    AppCreate(AppInfo),
    AppDestroy(AppInfo),
    SetWindowManager(Mailbox),

    /// Application-defined command; the server ignores it.
    Command { wid: Option<WindowId>, command: u32 },
    /// The window's visible region changed and must be redrawn.
    Paint { wid: WindowId },
}

impl Event {
    /// Short kind name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::MouseMotion(_) => "mouse_motion",
            Self::MouseButton(_) => "mouse_button",
            Self::Keyboard(_) => "keyboard",
            Self::Touch(_) => "touch",
            Self::WinCreate(_) => "win_create",
            Self::WinShow(_) => "win_show",
            Self::WinHide(_) => "win_hide",
            Self::WinMove { .. } => "win_move",
            Self::WinResize { .. } => "win_resize",
            Self::WinDestroy(_) => "win_destroy",
            Self::WinActivate(_) => "win_activate",
            Self::WinDeactivate(_) => "win_deactivate",
            Self::WinModalEnter(_) => "win_modal_enter",
            Self::WinModalExit(_) => "win_modal_exit",
            Self::MonitorAdd { .. } => "monitor_add",
            Self::MonitorRemove { .. } => "monitor_remove",
            Self::UpdateBegin(_) => "update_begin",
            Self::UpdateEnd(_) => "update_end",
            Self::AppCreate(_) => "app_create",
            Self::AppDestroy(_) => "app_destroy",
            Self::SetWindowManager(_) => "set_window_manager",
            Self::Command { .. } => "command",
            Self::Paint { .. } => "paint",
        }
    }

    /// Target window, if the event names one.
    pub fn wid(&self) -> Option<WindowId> {
        match self {
            Self::MouseMotion(ev) | Self::MouseButton(ev) => ev.wid,
            Self::Keyboard(ev) => ev.wid,
            Self::WinCreate(desc) => Some(desc.id),
            Self::WinShow(wid)
            | Self::WinHide(wid)
            | Self::WinDestroy(wid)
            | Self::WinActivate(wid)
            | Self::WinDeactivate(wid)
            | Self::WinModalEnter(wid)
            | Self::WinModalExit(wid) => Some(*wid),
            Self::WinMove { wid, .. }
            | Self::WinResize { wid, .. }
            | Self::MonitorAdd { wid, .. }
            | Self::MonitorRemove { wid, .. }
            | Self::Paint { wid } => Some(*wid),
            Self::Command { wid, .. } => *wid,
            Self::Touch(_)
            | Self::UpdateBegin(_)
            | Self::UpdateEnd(_)
            | Self::AppCreate(_)
            | Self::AppDestroy(_)
            | Self::SetWindowManager(_) => None,
        }
    }
}

/// Reply slot of a synchronous request.
#[derive(Debug)]
pub struct Ack(SyncSender<Status>);

impl Ack {
    /// Answer the request. A requester that gave up waiting is ignored.
    pub fn send(self, status: Status) {
        let _ = self.0.try_send(status);
    }
}

/// An event in flight, with an optional acknowledgment slot.
#[derive(Debug)]
pub struct Envelope {
    pub event: Event,
    ack: Option<Ack>,
}

impl Envelope {
    /// Fire-and-forget.
    pub fn new(event: Event) -> Self {
        Self { event, ack: None }
    }

    /// An envelope whose receiver must reply on the returned channel.
    pub fn with_ack(event: Event) -> (Self, Receiver<Status>) {
        let (tx, rx) = mpsc::sync_channel(1);
        (
            Self {
                event,
                ack: Some(Ack(tx)),
            },
            rx,
        )
    }

    pub fn from_parts(event: Event, ack: Option<Ack>) -> Self {
        Self { event, ack }
    }

    pub fn into_parts(self) -> (Event, Option<Ack>) {
        (self.event, self.ack)
    }

    pub fn wants_ack(&self) -> bool {
        self.ack.is_some()
    }

    /// Answer the acknowledgment, if any. Later calls do nothing.
    pub fn ack(&mut self, status: Status) {
        if let Some(ack) = self.ack.take() {
            ack.send(status);
        }
    }
}

impl From<Event> for Envelope {
    fn from(event: Event) -> Self {
        Self::new(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipwin_core::input::MouseButtons;

    #[test]
    fn ack_is_answered_once() {
        let (mut env, rx) = Envelope::with_ack(Event::WinShow(WindowId::from_raw(3)));
        assert!(env.wants_ack());
        env.ack(Status::Ok);
        env.ack(Status::Error);
        assert!(!env.wants_ack());
        assert_eq!(rx.try_recv(), Ok(Status::Ok));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn ack_after_requester_left_is_ignored() {
        let (mut env, rx) = Envelope::with_ack(Event::UpdateBegin(Rect::default()));
        drop(rx);
        env.ack(Status::Ok);
    }

    #[test]
    fn names_and_targets() {
        let wid = WindowId::from_raw(9);
        let mut ev = MouseEvent::new(1, 1, MouseButtons::LEFT | MouseButtons::DOWN);
        assert_eq!(Event::MouseButton(ev).wid(), None);
        ev.wid = Some(wid);
        assert_eq!(Event::MouseButton(ev).wid(), Some(wid));
        assert_eq!(Event::Paint { wid }.name(), "paint");
        assert_eq!(Event::WinMove { wid, origin: Point::new(0, 0) }.wid(), Some(wid));
        assert_eq!(Status::from(Err::<(), _>("nope")), Status::Error);
        assert!(Status::from(Ok::<(), ()>(())).is_ok());
    }
}
