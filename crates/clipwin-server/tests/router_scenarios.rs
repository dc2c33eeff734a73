//! End-to-end router scenarios: clients, windows, input and acknowledgments
//! through a real server loop.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use clipwin_core::geometry::{Point, Rect};
use clipwin_core::input::{
    KeyCode, KeyEvent, MouseButtons, MouseEvent, PressId, TouchEvent, TouchPhase, TouchSample,
    WindowId,
};
use clipwin_render::{
    ClientDc, Color, DeviceContext, Framebuffer, GraphicContext, PixelFormat, SharedDriver, Surface,
};
use clipwin_server::mailbox;
use clipwin_server::{
    AppInfo, Envelope, Event, Inbox, Server, ServerConfig, ServerHandle, Status, WindowDescriptor,
};
use tracing::field::{Field, Visit};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Client {
    desc: WindowDescriptor,
    inbox: Inbox,
}

impl Client {
    fn new(extent: Rect) -> Self {
        let (mb, inbox) = mailbox::channel(64);
        Self {
            desc: WindowDescriptor::new(extent, mb),
            inbox,
        }
    }

    fn wid(&self) -> WindowId {
        self.desc.id
    }

    fn events(&self) -> Vec<Event> {
        self.inbox.drain().into_iter().map(|env| env.event).collect()
    }

    fn input(&self) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|ev| {
                matches!(
                    ev,
                    Event::MouseButton(_) | Event::MouseMotion(_) | Event::Keyboard(_)
                )
            })
            .collect()
    }
}

fn open(handle: &ServerHandle, server: &mut Server, extent: Rect) -> Client {
    let client = Client::new(extent);
    handle.post(Event::WinCreate(client.desc.clone())).unwrap();
    handle.post(Event::WinShow(client.wid())).unwrap();
    server.run_until_idle();
    client
}

fn touch(x: i32, y: i32, phase: TouchPhase, press_id: PressId) -> Event {
    Event::Touch(TouchEvent {
        sample: TouchSample::new(x, y, phase),
        press_id,
    })
}

#[derive(Clone, Default)]
struct WarnLog {
    messages: Arc<Mutex<Vec<String>>>,
}

#[derive(Default)]
struct MessageVisitor {
    message: Option<String>,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{value:?}"));
        }
    }
}

impl<S> Layer<S> for WarnLog
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() != tracing::Level::WARN {
            return;
        }
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        if let Some(message) = visitor.message {
            self.messages.lock().unwrap().push(message);
        }
    }
}

#[derive(Clone, Default)]
struct SpanLog {
    names: Arc<Mutex<Vec<&'static str>>>,
}

impl<S> Layer<S> for SpanLog
where
    S: tracing::Subscriber,
{
    fn on_new_span(
        &self,
        attrs: &tracing::span::Attributes<'_>,
        _id: &tracing::span::Id,
        _ctx: Context<'_, S>,
    ) {
        self.names.lock().unwrap().push(attrs.metadata().name());
    }
}

fn capture_warnings() -> (tracing::dispatcher::DefaultGuard, Arc<Mutex<Vec<String>>>) {
    let log = WarnLog::default();
    let messages = Arc::clone(&log.messages);
    let subscriber = tracing_subscriber::registry().with(log);
    let guard = tracing::subscriber::set_default(subscriber);
    tracing::callsite::rebuild_interest_cache();
    (guard, messages)
}

// ===========================================================================
// Scenarios
// ===========================================================================

#[test]
fn overlapping_windows_clip_and_hit_test() {
    let (mut server, handle) = Server::new(ServerConfig::default());
    let a = open(&handle, &mut server, Rect::new(0, 0, 100, 100));
    let b = open(&handle, &mut server, Rect::new(50, 50, 150, 150));

    let stack = server.stack();
    assert_eq!(
        stack.region(a.wid()).unwrap().rects(),
        &[Rect::new(0, 0, 100, 50), Rect::new(0, 50, 50, 100)]
    );
    assert_eq!(stack.region(b.wid()).unwrap().rects(), &[Rect::new(50, 50, 150, 150)]);
    assert_eq!(stack.hit_test(60, 60), Some(b.wid()));

    handle.post(Event::WinHide(b.wid())).unwrap();
    server.run_until_idle();
    assert_eq!(
        server.stack().region(a.wid()).unwrap().rects(),
        &[Rect::new(0, 0, 100, 100)]
    );
    assert!(
        a.events()
            .iter()
            .any(|ev| matches!(ev, Event::Paint { wid } if *wid == a.wid()))
    );
}

#[test]
fn touch_gesture_reaches_window_in_order() {
    let (mut server, handle) = Server::new(ServerConfig::default());
    let target = open(&handle, &mut server, Rect::new(0, 0, 100, 100));
    target.events();

    let press = PressId::next();
    for event in [
        touch(10, 20, TouchPhase::Down, press),
        touch(12, 22, TouchPhase::Move, press),
        touch(14, 24, TouchPhase::Move, press),
        touch(14, 24, TouchPhase::Up, press),
    ] {
        handle.post(event).unwrap();
    }
    server.run_until_idle();

    let input = target.input();
    assert_eq!(input.len(), 4);
    let mice: Vec<MouseEvent> = input
        .iter()
        .map(|ev| match ev {
            Event::MouseButton(m) | Event::MouseMotion(m) => *m,
            other => panic!("unexpected {other:?}"),
        })
        .collect();
    assert!(mice.iter().all(|m| m.press_id == press));
    assert!(mice.iter().all(|m| m.wid == Some(target.wid())));
    assert!(matches!(input[0], Event::MouseButton(m) if m.buttons == MouseButtons::LEFT | MouseButtons::DOWN));
    assert!(matches!(input[1], Event::MouseMotion(m) if (m.x, m.y) == (12, 22)));
    assert!(matches!(input[2], Event::MouseMotion(m) if (m.x, m.y) == (14, 24)));
    assert!(matches!(input[3], Event::MouseButton(m) if m.buttons == MouseButtons::LEFT | MouseButtons::UP));
}

#[test]
fn keyboard_follows_focus_not_pointer() {
    let (mut server, handle) = Server::new(ServerConfig::default());
    let a = open(&handle, &mut server, Rect::new(0, 0, 100, 100));
    let b = open(&handle, &mut server, Rect::new(200, 0, 300, 100));

    handle.post(Event::WinActivate(a.wid())).unwrap();
    handle
        .post(Event::MouseMotion(MouseEvent::new(250, 50, MouseButtons::empty())))
        .unwrap();
    handle.post(Event::Keyboard(KeyEvent::new(KeyCode::Char('x')))).unwrap();
    server.run_until_idle();

    let a_input = a.input();
    assert_eq!(a_input.len(), 1);
    assert!(matches!(a_input[0], Event::Keyboard(k) if k.code == KeyCode::Char('x') && k.wid == Some(a.wid())));
    let b_input = b.input();
    assert!(matches!(&b_input[..], [Event::MouseMotion(m)] if m.wid == Some(b.wid())));
}

#[test]
fn click_on_unfocused_window_activates_it_first() {
    let (mut server, handle) = Server::new(ServerConfig::default());
    let a = open(&handle, &mut server, Rect::new(0, 0, 100, 100));
    let b = open(&handle, &mut server, Rect::new(50, 50, 150, 150));
    handle.post(Event::WinActivate(b.wid())).unwrap();
    server.run_until_idle();
    a.events();
    b.events();

    let before = server.stack().activation_count();
    handle
        .post(Event::MouseButton(MouseEvent::new(
            10,
            10,
            MouseButtons::LEFT | MouseButtons::DOWN,
        )))
        .unwrap();
    handle
        .post(Event::MouseButton(MouseEvent::new(
            10,
            10,
            MouseButtons::LEFT | MouseButtons::UP,
        )))
        .unwrap();
    server.run_until_idle();

    assert_eq!(server.stack().focused(), Some(a.wid()));
    assert_eq!(server.stack().z_order(), vec![a.wid(), b.wid()]);
    assert_eq!(server.stack().activation_count(), before + 1);
    assert!(
        b.events()
            .iter()
            .any(|ev| matches!(ev, Event::WinDeactivate(wid) if *wid == b.wid()))
    );
    let a_events = a.events();
    let activated = a_events
        .iter()
        .position(|ev| matches!(ev, Event::WinActivate(_)))
        .unwrap();
    let clicked = a_events
        .iter()
        .position(|ev| matches!(ev, Event::MouseButton(_)))
        .unwrap();
    assert!(activated < clicked);
}

#[test]
fn motion_outside_monitors_is_suppressed() {
    let (mut server, handle) = Server::new(ServerConfig::default());
    let win = open(&handle, &mut server, Rect::new(100, 100, 200, 200));
    handle
        .post(Event::MonitorAdd {
            wid: win.wid(),
            rect: Rect::new(0, 0, 20, 20),
        })
        .unwrap();
    for (x, y) in [(105, 105), (150, 150), (119, 119)] {
        handle
            .post(Event::MouseMotion(MouseEvent::new(x, y, MouseButtons::empty())))
            .unwrap();
    }
    server.run_until_idle();

    let seen: Vec<(i32, i32)> = win
        .input()
        .iter()
        .filter_map(|ev| match ev {
            Event::MouseMotion(m) => Some((m.x, m.y)),
            _ => None,
        })
        .collect();
    assert_eq!(seen, vec![(105, 105), (119, 119)]);
    assert_eq!(server.cursor().position, Point::new(119, 119));
}

#[test]
fn modal_dialog_captures_input() {
    let (mut server, handle) = Server::new(ServerConfig::default());
    let main = open(&handle, &mut server, Rect::new(0, 0, 400, 400));
    let dialog = open(&handle, &mut server, Rect::new(100, 100, 200, 200));
    handle.post(Event::WinModalEnter(dialog.wid())).unwrap();
    server.run_until_idle();
    main.events();

    handle
        .post(Event::MouseButton(MouseEvent::new(
            10,
            10,
            MouseButtons::LEFT | MouseButtons::DOWN,
        )))
        .unwrap();
    let (env, reply) = Envelope::with_ack(Event::WinActivate(main.wid()));
    handle.post_envelope(env).unwrap();
    server.run_until_idle();
    assert_eq!(reply.try_recv(), Ok(Status::Error));
    assert!(main.input().is_empty());
    assert_eq!(server.stack().focused(), Some(dialog.wid()));

    handle.post(Event::WinDestroy(dialog.wid())).unwrap();
    server.run_until_idle();
    assert_eq!(server.stack().modal_top(), None);
    assert_eq!(server.stack().focused(), Some(main.wid()));
}

#[test]
fn window_manager_receives_app_announcements() {
    let (mut server, handle) = Server::new(ServerConfig::default());

    let (env, reply) = Envelope::with_ack(Event::AppCreate(AppInfo::new("clock")));
    handle.post_envelope(env).unwrap();
    server.run_until_idle();
    assert_eq!(reply.try_recv(), Ok(Status::Ok));

    let (wm, wm_inbox) = mailbox::channel(8);
    handle.post(Event::SetWindowManager(wm)).unwrap();
    let (env, reply) = Envelope::with_ack(Event::AppDestroy(AppInfo::new("clock")));
    handle.post_envelope(env).unwrap();
    server.run_until_idle();

    let mut forwarded = wm_inbox.drain();
    assert_eq!(forwarded.len(), 1);
    assert!(matches!(&forwarded[0].event, Event::AppDestroy(info) if info.name == "clock"));
    assert!(reply.try_recv().is_err());
    forwarded[0].ack(Status::Ok);
    assert_eq!(reply.try_recv(), Ok(Status::Ok));
}

#[test]
fn rejected_kinds_are_logged() {
    let (guard, warnings) = capture_warnings();
    let (mut server, _handle) = Server::new(ServerConfig::default());
    assert!(!server.dispatch(Envelope::new(Event::Paint {
        wid: WindowId::from_raw(3)
    })));
    drop(guard);
    let warnings = warnings.lock().unwrap();
    assert!(
        warnings.iter().any(|m| m.contains("unrecognized event kind")),
        "{warnings:?}"
    );
}

#[test]
fn move_beyond_coordinate_range_is_refused() {
    let (mut server, handle) = Server::new(ServerConfig::default());
    let win = open(&handle, &mut server, Rect::new(10, 10, 110, 110));

    let (env, reply) = Envelope::with_ack(Event::WinMove {
        wid: win.wid(),
        origin: Point::new(i32::MAX, 0),
    });
    assert!(!server.dispatch(env));
    assert_eq!(reply.try_recv(), Ok(Status::Error));
    let top = server.stack().get(win.wid()).unwrap();
    assert_eq!(top.extent(), Rect::new(10, 10, 110, 110));
    assert_eq!(server.stack().hit_test(50, 50), Some(win.wid()));
}

#[test]
fn every_dispatch_opens_a_span() {
    let log = SpanLog::default();
    let names = Arc::clone(&log.names);
    let guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(log));
    tracing::callsite::rebuild_interest_cache();

    let (mut server, handle) = Server::new(ServerConfig::default());
    handle.post(Event::UpdateBegin(Rect::new(0, 0, 10, 10))).unwrap();
    handle.post(Event::UpdateEnd(Rect::new(0, 0, 10, 10))).unwrap();
    assert_eq!(server.run_until_idle(), 2);
    drop(guard);

    let names = names.lock().unwrap();
    assert_eq!(names.iter().filter(|&&n| n == "dispatch").count(), 2);
}

#[test]
fn full_client_mailbox_drops_after_retries() {
    let config = ServerConfig::default().with_forward_retry(Duration::from_millis(1), 2);
    let (mut server, handle) = Server::new(config);
    let (mb, inbox) = mailbox::channel(1);
    let desc = WindowDescriptor::new(Rect::new(0, 0, 10, 10), mb);
    let wid = desc.id;
    handle.post(Event::WinCreate(desc)).unwrap();
    handle.post(Event::WinShow(wid)).unwrap();
    handle.post(Event::WinActivate(wid)).unwrap();
    server.run_until_idle();
    assert!(server.undelivered_notices() >= 1);

    // The mailbox is already holding a paint notice.
    let key = Envelope::new(Event::Keyboard(KeyEvent::new(KeyCode::Enter)));
    assert!(!server.dispatch(key));
    assert_eq!(inbox.drain().len(), 1);
}

// ===========================================================================
// Threaded server
// ===========================================================================

#[test]
fn synchronous_requests_on_a_running_server() {
    let fb = SharedDriver::new(Framebuffer::new(200, 200, PixelFormat::Argb8888));
    let (server, handle) = Server::new(ServerConfig::default().with_screen(Rect::from_size(200, 200)));
    let thread = server.with_driver(fb.clone()).spawn().unwrap();

    let a = Client::new(Rect::new(0, 0, 100, 100));
    let b = Client::new(Rect::new(50, 50, 150, 150));
    for client in [&a, &b] {
        assert_eq!(
            handle.post_sync(Event::WinCreate(client.desc.clone())).unwrap(),
            Status::Ok
        );
        assert_eq!(handle.post_sync(Event::WinShow(client.wid())).unwrap(), Status::Ok);
    }
    assert_eq!(
        handle.post_sync(Event::WinCreate(a.desc.clone())).unwrap(),
        Status::Error
    );

    // A fills its whole extent; B's area must stay untouched.
    let gc = GraphicContext::default().with_background(Color::RED);
    let mut dc = ClientDc::new(Surface::window(a.desc.clip.clone()), fb.clone()).with_gc(gc);
    let local = dc.size();
    dc.fill_rect(&local);
    assert_eq!(
        handle.post_sync(Event::UpdateEnd(Rect::new(0, 0, 200, 200))).unwrap(),
        Status::Ok
    );

    {
        let fb = fb.lock();
        assert_eq!(fb.pixel(10, 10), Some(Color::RED));
        assert_eq!(fb.pixel(99, 49), Some(Color::RED));
        assert_ne!(fb.pixel(60, 60), Some(Color::RED));
        assert_eq!(fb.count(Color::RED), 100 * 100 - 50 * 50);
        assert_eq!(fb.updates(), &[Rect::new(0, 0, 200, 200)]);
    }

    // Moving B away exposes the rest of A; the next fill reaches it.
    assert_eq!(
        handle
            .post_sync(Event::WinMove {
                wid: b.wid(),
                origin: Point::new(150, 150),
            })
            .unwrap(),
        Status::Ok
    );
    dc.fill_rect(&local);
    assert_eq!(fb.lock().count(Color::RED), 100 * 100);

    drop(handle);
    let server = thread.join().unwrap();
    assert_eq!(server.stack().len(), 2);
    assert!(a.events().iter().any(|ev| matches!(ev, Event::Paint { .. })));
}
