#![forbid(unsafe_code)]

//! clipwin Server
//!
//! The single-threaded router that owns window stacking and input routing.
//!
//! # Key Components
//!
//! - [`Server`] - Event router loop over a bounded inbound queue
//! - [`ServerHandle`] - Posting side used by clients and input sources
//! - [`WindowStack`] - Top-level window registry: z-order, focus, modal chain, regions
//! - [`Mailbox`] / [`Inbox`] - Bounded client mailboxes with retry on full
//! - [`IngestWorker`] - Interrupt-driven input sampling thread
//!
//! # How it fits in the system
//! Input sources post events to the server; the server updates the window
//! stack, publishes each window's visible region through its
//! [`SharedClip`](clipwin_render::SharedClip), and forwards input to the
//! owning client. Clients draw through `clipwin-render` device contexts
//! that read those regions.

pub mod config;
pub mod error;
pub mod event;
pub mod ingest;
pub mod mailbox;
pub mod server;
pub mod window_stack;

pub use config::{IngestConfig, ServerConfig, TICK};
pub use error::{MailboxError, ServerError, StackError};
pub use event::{AppInfo, Envelope, Event, Status, WindowDescriptor};
pub use ingest::{InputDevice, IngestWorker, InterruptSemaphore, IrqHandoff, SampleTranslator};
pub use mailbox::{Inbox, Mailbox};
pub use server::{Cursor, Server, ServerHandle, ServerThread};
pub use window_stack::{Notice, TopWindow, WindowKey, WindowStack};
