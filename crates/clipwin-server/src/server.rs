#![forbid(unsafe_code)]

//! The window server: a single-threaded event router.
//!
//! [`Server`] owns the [`WindowStack`] and pulls one [`Envelope`] at a time
//! from its inbound queue. Lifecycle requests mutate the stack and answer the
//! envelope's acknowledgment; input events are targeted (hit test for the
//! pointer, focus for the keyboard) and forwarded to the owning client's
//! mailbox.
//!
//! # Threads
//!
//! The server thread is the only writer of window and region state. Clients
//! see regions only through their [`SharedClip`](clipwin_render::SharedClip)
//! cells and talk to the server only through a [`ServerHandle`]. The loop
//! exits once every handle has been dropped.
//!
//! # Example
//!
//! ```ignore
//! let (server, handle) = Server::new(ServerConfig::default());
//! let thread = server.spawn()?;
//!
//! let (mailbox, inbox) = mailbox::channel(64);
//! let desc = WindowDescriptor::new(Rect::new(0, 0, 200, 100), mailbox);
//! let wid = desc.id;
//! handle.post_sync(Event::WinCreate(desc))?;
//! handle.post_sync(Event::WinShow(wid))?;
//!
//! drop(handle);
//! let server = thread.join()?;
//! ```

use std::fmt;
use std::thread::{self, JoinHandle};

use clipwin_core::geometry::{Point, Rect};
use clipwin_core::input::{KeyEvent, MouseButtons, MouseEvent, TouchEvent, TouchPhase, WindowId};
use clipwin_render::driver::GraphicDriver;
use tracing::{debug, info, trace, trace_span, warn};

use crate::config::ServerConfig;
use crate::error::{ServerError, StackError};
use crate::event::{Ack, Envelope, Event, Status};
use crate::mailbox::{self, Inbox, Mailbox};
use crate::window_stack::{Notice, WindowStack};

type Hook = Box<dyn FnMut() + Send>;

/// Global pointer state tracked by the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub position: Point,
    pub visible: bool,
    /// Buttons currently held.
    pub buttons: MouseButtons,
}

impl Default for Cursor {
    fn default() -> Self {
        Self {
            position: Point::new(0, 0),
            visible: true,
            buttons: MouseButtons::empty(),
        }
    }
}

/// The router and its state.
pub struct Server {
    config: ServerConfig,
    inbox: Inbox,
    stack: WindowStack,
    cursor: Cursor,
    driver: Option<Box<dyn GraphicDriver + Send>>,
    window_manager: Option<Mailbox>,
    on_show: Option<Hook>,
    on_activate: Option<Hook>,
    dispatched: u64,
    undelivered_notices: u64,
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("stack", &self.stack)
            .field("cursor", &self.cursor)
            .field("has_driver", &self.driver.is_some())
            .field("window_manager", &self.window_manager)
            .field("dispatched", &self.dispatched)
            .field("undelivered_notices", &self.undelivered_notices)
            .finish_non_exhaustive()
    }
}

impl Server {
    /// Create a server and the first handle to its inbound queue.
    pub fn new(config: ServerConfig) -> (Self, ServerHandle) {
        let (mailbox, inbox) = mailbox::channel(config.inbound_capacity);
        let handle = ServerHandle {
            mailbox,
            retry_interval: config.post_retry_interval,
            retry_limit: config.post_retry_limit,
        };
        let server = Self {
            stack: WindowStack::new(config.screen, config.max_windows),
            config,
            inbox,
            cursor: Cursor::default(),
            driver: None,
            window_manager: None,
            on_show: None,
            on_activate: None,
            dispatched: 0,
            undelivered_notices: 0,
        };
        (server, handle)
    }

    /// Driver used to flush `UpdateEnd` rectangles.
    #[must_use]
    pub fn with_driver(mut self, driver: impl GraphicDriver + Send + 'static) -> Self {
        self.driver = Some(Box::new(driver));
        self
    }

    /// Called before every show request.
    #[must_use]
    pub fn on_show(mut self, hook: impl FnMut() + Send + 'static) -> Self {
        self.on_show = Some(Box::new(hook));
        self
    }

    /// Called before every activation, requested or caused by a click.
    #[must_use]
    pub fn on_activate(mut self, hook: impl FnMut() + Send + 'static) -> Self {
        self.on_activate = Some(Box::new(hook));
        self
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn stack(&self) -> &WindowStack {
        &self.stack
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Envelopes dispatched so far.
    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }

    /// Repaint and focus notices a client mailbox refused.
    pub fn undelivered_notices(&self) -> u64 {
        self.undelivered_notices
    }

    /// Dispatch until every [`ServerHandle`] is gone.
    pub fn run(&mut self) {
        info!(screen = ?self.config.screen, "window server started");
        while let Some(envelope) = self.inbox.recv() {
            self.dispatch(envelope);
        }
        info!(dispatched = self.dispatched, "window server stopped");
    }

    /// Dispatch whatever is queued right now. Returns the number handled.
    pub fn run_until_idle(&mut self) -> usize {
        let mut handled = 0;
        while let Some(envelope) = self.inbox.try_recv() {
            self.dispatch(envelope);
            handled += 1;
        }
        handled
    }

    /// Run the loop on a named thread.
    pub fn spawn(self) -> Result<ServerThread, ServerError> {
        let handle = thread::Builder::new()
            .name("clipwin-server".into())
            .spawn(move || {
                let mut server = self;
                server.run();
                server
            })
            .map_err(ServerError::Spawn)?;
        Ok(ServerThread { handle })
    }

    /// Handle one envelope. Returns `true` if the request was applied or the
    /// event delivered.
    pub fn dispatch(&mut self, envelope: Envelope) -> bool {
        self.dispatched += 1;
        let (event, ack) = envelope.into_parts();
        let name = event.name();
        let _span = trace_span!("dispatch", seq = self.dispatched, event = name).entered();
        debug!(wid = ?event.wid(), "dispatch");

        let status = match event {
            Event::AppCreate(_) | Event::AppDestroy(_) => {
                return self.route_to_window_manager(event, ack);
            }
            Event::MouseButton(ev) => self.mouse_button(ev),
            Event::MouseMotion(ev) => self.mouse_motion(ev),
            Event::Keyboard(ev) => self.keyboard(ev),
            Event::Touch(ev) => self.touch(ev),
            Event::WinCreate(desc) => self.apply(name, |stack| stack.add(desc).map(drop)),
            Event::WinShow(wid) => {
                if let Some(hook) = self.on_show.as_mut() {
                    hook();
                }
                self.apply(name, |stack| stack.show(wid))
            }
            Event::WinHide(wid) => self.apply(name, |stack| stack.hide(wid)),
            Event::WinMove { wid, origin } => self.apply(name, |stack| stack.move_to(wid, origin)),
            Event::WinResize { wid, extent } => self.apply(name, |stack| stack.resize(wid, extent)),
            Event::WinDestroy(wid) => self.apply(name, |stack| stack.remove(wid)),
            Event::WinActivate(wid) => {
                self.activation_hook();
                self.apply(name, |stack| stack.activate(wid))
            }
            Event::WinModalEnter(wid) => {
                self.activation_hook();
                self.apply(name, |stack| stack.modal_enter(wid))
            }
            Event::WinModalExit(wid) => self.apply(name, |stack| stack.modal_exit(wid)),
            Event::MonitorAdd { wid, rect } => self.apply(name, |stack| stack.monitor_add(wid, rect)),
            Event::MonitorRemove { wid, rect } => {
                self.apply(name, |stack| stack.monitor_remove(wid, rect))
            }
            Event::UpdateBegin(_) => {
                self.cursor.visible = false;
                Status::Ok
            }
            Event::UpdateEnd(rect) => {
                self.screen_update(rect);
                self.cursor.visible = true;
                Status::Ok
            }
            Event::SetWindowManager(mailbox) => self.set_window_manager(mailbox),
            Event::Command { command, .. } => {
                trace!(command, "command ignored");
                Status::Ok
            }
            Event::Paint { .. } | Event::WinDeactivate(_) => {
                warn!(event = name, "unrecognized event kind for the server");
                Status::Error
            }
        };

        self.flush_notices();
        if let Some(ack) = ack {
            ack.send(status);
        }
        status.is_ok()
    }

    fn apply(
        &mut self,
        name: &'static str,
        op: impl FnOnce(&mut WindowStack) -> Result<(), StackError>,
    ) -> Status {
        match op(&mut self.stack) {
            Ok(()) => Status::Ok,
            Err(err) => {
                warn!(event = name, error = %err, "request rejected");
                Status::Error
            }
        }
    }

    fn activation_hook(&mut self) {
        if let Some(hook) = self.on_activate.as_mut() {
            hook();
        }
    }

    fn screen_update(&mut self, rect: Rect) {
        if let Some(driver) = self.driver.as_mut() {
            driver.screen_update(rect);
        }
    }

    fn set_window_manager(&mut self, mailbox: Mailbox) -> Status {
        if self.window_manager.is_some() {
            warn!("window manager already registered");
            return Status::Error;
        }
        info!("window manager registered");
        self.window_manager = Some(mailbox);
        Status::Ok
    }

    /// The window manager answers application announcements itself. Without
    /// one they are accepted on the spot.
    fn route_to_window_manager(&mut self, event: Event, ack: Option<Ack>) -> bool {
        let Some(wm) = self.window_manager.clone() else {
            debug!(event = event.name(), "no window manager, accepting");
            if let Some(ack) = ack {
                ack.send(Status::Ok);
            }
            return true;
        };
        let name = event.name();
        match wm.post_with_retry(
            Envelope::from_parts(event, ack),
            self.config.forward_retry_interval,
            self.config.forward_retry_limit,
        ) {
            Ok(()) => true,
            Err(err) => {
                warn!(event = name, error = %err, "window manager unreachable");
                false
            }
        }
    }

    fn mouse_button(&mut self, mut ev: MouseEvent) -> Status {
        self.cursor.position = Point::new(ev.x, ev.y);
        if ev.buttons.is_down() {
            self.cursor.buttons |= ev.buttons.held();
        } else if ev.buttons.is_up() {
            self.cursor.buttons -= ev.buttons.held();
        }

        let Some(wid) = self.stack.hit_test(ev.x, ev.y) else {
            trace!(x = ev.x, y = ev.y, "button outside every window");
            return Status::Ok;
        };
        if ev.buttons.is_down() && self.stack.focused() != Some(wid) {
            self.activation_hook();
            if let Err(err) = self.stack.activate(wid) {
                debug!(wid = %wid, error = %err, "click activation refused");
            }
            self.flush_notices();
        }
        ev.wid = Some(wid);
        ev.activation_count = self.stack.activation_count();
        self.forward(wid, Event::MouseButton(ev))
    }

    fn mouse_motion(&mut self, mut ev: MouseEvent) -> Status {
        self.cursor.position = Point::new(ev.x, ev.y);
        self.cursor.buttons = ev.buttons.held();

        let Some(win) = self
            .stack
            .hit_test(ev.x, ev.y)
            .and_then(|wid| self.stack.get(wid))
        else {
            return Status::Ok;
        };
        if !win.monitors().is_empty() && !win.monitors_point(ev.x, ev.y) {
            trace!(wid = %win.id(), x = ev.x, y = ev.y, "motion outside monitors");
            return Status::Ok;
        }
        let wid = win.id();
        ev.wid = Some(wid);
        ev.activation_count = self.stack.activation_count();
        self.forward(wid, Event::MouseMotion(ev))
    }

    fn keyboard(&mut self, mut ev: KeyEvent) -> Status {
        let Some(wid) = self.stack.focused() else {
            trace!(code = ?ev.code, "key with no focused window");
            return Status::Ok;
        };
        ev.wid = Some(wid);
        ev.activation_count = self.stack.activation_count();
        self.forward(wid, Event::Keyboard(ev))
    }

    fn touch(&mut self, ev: TouchEvent) -> Status {
        let TouchEvent { sample, press_id } = ev;
        let (button, motion) = match sample.phase {
            TouchPhase::Down => (MouseButtons::LEFT | MouseButtons::DOWN, false),
            TouchPhase::Up => (MouseButtons::LEFT | MouseButtons::UP, false),
            TouchPhase::Move => (MouseButtons::LEFT, true),
        };
        let mouse = MouseEvent::new(sample.x, sample.y, button).with_press_id(press_id);
        if motion {
            self.mouse_motion(mouse)
        } else {
            self.mouse_button(mouse)
        }
    }

    fn forward(&self, wid: WindowId, event: Event) -> Status {
        let Some(win) = self.stack.get(wid) else {
            warn!(wid = %wid, event = event.name(), "forward to unknown window");
            return Status::Error;
        };
        let name = event.name();
        match win.client().post_with_retry(
            Envelope::new(event),
            self.config.forward_retry_interval,
            self.config.forward_retry_limit,
        ) {
            Ok(()) => Status::Ok,
            Err(err) => {
                warn!(wid = %wid, event = name, error = %err, "client mailbox give-up");
                Status::Error
            }
        }
    }

    fn flush_notices(&mut self) {
        for notice in self.stack.take_notices() {
            let (wid, event) = match notice {
                Notice::Repaint(wid) => (wid, Event::Paint { wid }),
                Notice::Activated(wid) => (wid, Event::WinActivate(wid)),
                Notice::Deactivated(wid) => (wid, Event::WinDeactivate(wid)),
            };
            if self.forward(wid, event) == Status::Error {
                self.undelivered_notices += 1;
                debug!(wid = %wid, total = self.undelivered_notices, "notice undelivered");
            }
        }
    }
}

/// A server running on its own thread.
#[derive(Debug)]
pub struct ServerThread {
    handle: JoinHandle<Server>,
}

impl ServerThread {
    /// Wait for the loop to exit and take the server back.
    pub fn join(self) -> thread::Result<Server> {
        self.handle.join()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Posting side of the server's inbound queue.
#[derive(Debug, Clone)]
pub struct ServerHandle {
    mailbox: Mailbox,
    retry_interval: std::time::Duration,
    retry_limit: u32,
}

impl ServerHandle {
    /// Enqueue an event without waiting for it to be handled.
    pub fn post(&self, event: Event) -> Result<(), ServerError> {
        self.post_envelope(Envelope::new(event))
    }

    pub fn post_envelope(&self, envelope: Envelope) -> Result<(), ServerError> {
        self.mailbox
            .post_with_retry(envelope, self.retry_interval, self.retry_limit)
            .map_err(ServerError::from)
    }

    /// Enqueue an event and block until the server answers.
    ///
    /// Must not be called from the server thread.
    pub fn post_sync(&self, event: Event) -> Result<Status, ServerError> {
        let (envelope, reply) = Envelope::with_ack(event);
        self.post_envelope(envelope)?;
        reply.recv().map_err(|_| ServerError::AckDropped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::WindowDescriptor;
    use clipwin_render::color::PixelFormat;
    use clipwin_render::driver::{DrawCall, RecordingDriver, SharedDriver};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn create(handle: &ServerHandle, server: &mut Server, extent: Rect) -> (WindowId, Inbox) {
        let (mb, inbox) = mailbox::channel(64);
        let desc = WindowDescriptor::new(extent, mb);
        let wid = desc.id;
        handle.post(Event::WinCreate(desc)).unwrap();
        handle.post(Event::WinShow(wid)).unwrap();
        server.run_until_idle();
        (wid, inbox)
    }

    #[test]
    fn ack_carries_status() {
        let (mut server, handle) = Server::new(ServerConfig::default());
        let (env, reply) = Envelope::with_ack(Event::WinShow(WindowId::from_raw(u64::MAX)));
        handle.post_envelope(env).unwrap();
        server.run_until_idle();
        assert_eq!(reply.try_recv(), Ok(Status::Error));

        let (mb, _inbox) = mailbox::channel(4);
        let (env, reply) = Envelope::with_ack(Event::WinCreate(WindowDescriptor::new(
            Rect::new(0, 0, 10, 10),
            mb,
        )));
        handle.post_envelope(env).unwrap();
        server.run_until_idle();
        assert_eq!(reply.try_recv(), Ok(Status::Ok));
    }

    #[test]
    fn client_bound_kinds_are_rejected() {
        let (mut server, _handle) = Server::new(ServerConfig::default());
        let wid = WindowId::from_raw(1);
        assert!(!server.dispatch(Envelope::new(Event::Paint { wid })));
        assert!(!server.dispatch(Envelope::new(Event::WinDeactivate(wid))));
        assert!(server.dispatch(Envelope::new(Event::Command { wid: None, command: 7 })));
    }

    #[test]
    fn hooks_fire_before_show_and_activate() {
        let shows = Arc::new(AtomicUsize::new(0));
        let activations = Arc::new(AtomicUsize::new(0));
        let (server, handle) = Server::new(ServerConfig::default());
        let mut server = server
            .on_show({
                let shows = Arc::clone(&shows);
                move || {
                    shows.fetch_add(1, Ordering::SeqCst);
                }
            })
            .on_activate({
                let activations = Arc::clone(&activations);
                move || {
                    activations.fetch_add(1, Ordering::SeqCst);
                }
            });
        let (wid, _inbox) = create(&handle, &mut server, Rect::new(0, 0, 10, 10));
        handle.post(Event::WinActivate(wid)).unwrap();
        handle.post(Event::WinShow(WindowId::from_raw(u64::MAX))).unwrap();
        server.run_until_idle();
        assert_eq!(shows.load(Ordering::SeqCst), 2);
        assert_eq!(activations.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn update_end_flushes_and_shows_cursor() {
        let driver = SharedDriver::new(RecordingDriver::new(PixelFormat::Rgb565));
        let (server, handle) = Server::new(ServerConfig::default());
        let mut server = server.with_driver(driver.clone());

        handle.post(Event::UpdateBegin(Rect::new(0, 0, 5, 5))).unwrap();
        server.run_until_idle();
        assert!(!server.cursor().visible);

        handle.post(Event::UpdateEnd(Rect::new(0, 0, 5, 5))).unwrap();
        server.run_until_idle();
        assert!(server.cursor().visible);
        assert_eq!(
            driver.lock().calls(),
            &[DrawCall::ScreenUpdate(Rect::new(0, 0, 5, 5))]
        );
    }

    #[test]
    fn second_window_manager_is_rejected() {
        let (mut server, _handle) = Server::new(ServerConfig::default());
        let (wm, _wm_inbox) = mailbox::channel(4);
        assert!(server.dispatch(Envelope::new(Event::SetWindowManager(wm.clone()))));
        assert!(!server.dispatch(Envelope::new(Event::SetWindowManager(wm))));
    }

    #[test]
    fn click_activates_and_stamps_events() {
        let (mut server, handle) = Server::new(ServerConfig::default());
        let (a, inbox_a) = create(&handle, &mut server, Rect::new(0, 0, 100, 100));
        let (_b, _inbox_b) = create(&handle, &mut server, Rect::new(50, 50, 150, 150));
        inbox_a.drain();

        let down = MouseEvent::new(10, 10, MouseButtons::LEFT | MouseButtons::DOWN);
        handle.post(Event::MouseButton(down)).unwrap();
        server.run_until_idle();
        assert_eq!(server.stack().focused(), Some(a));
        assert_eq!(server.stack().z_order()[0], a);
        assert_eq!(server.cursor().position, Point::new(10, 10));
        assert_eq!(server.cursor().buttons, MouseButtons::LEFT);

        let events: Vec<Event> = inbox_a.drain().into_iter().map(|env| env.event).collect();
        assert!(matches!(events[0], Event::WinActivate(wid) if wid == a));
        let Some(Event::MouseButton(ev)) = events.last() else {
            panic!("expected a button event, got {events:?}");
        };
        assert_eq!(ev.wid, Some(a));
        assert_eq!(ev.activation_count, server.stack().activation_count());
    }
}
