#![forbid(unsafe_code)]

//! clipwin public facade crate.
//!
//! Re-exports the common types of the core, render and server crates and
//! offers a small prelude for clients and input drivers.

use std::fmt;

// --- Core re-exports -------------------------------------------------------

pub use clipwin_core::geometry::{Point, Rect};
pub use clipwin_core::input::{
    KeyCode, KeyEvent, KeyEventKind, Modifiers, MouseButtons, MouseEvent, PressId, RawSample,
    TouchEvent, TouchPhase, TouchSample, WindowId,
};

// --- Render re-exports -----------------------------------------------------

pub use clipwin_render::{
    BandedFont, BufferDc, ClientDc, Color, Dc, DeviceContext, FixedFont, Font, FontId,
    FontRegistry, Framebuffer, GraphicContext, GraphicDriver, PixelFormat, RecordingDriver,
    Region, SharedClip, SharedDriver, Surface, TextAlign,
};

// --- Server re-exports -----------------------------------------------------

pub use clipwin_server::{
    Event, IngestConfig, IngestWorker, InputDevice, Mailbox, Server, ServerConfig, ServerError,
    ServerHandle, StackError, Status, WindowDescriptor, WindowStack,
};

// --- Errors ---------------------------------------------------------------

/// Top-level error type for clipwin applications.
#[derive(Debug)]
pub enum Error {
    /// The window server refused or could not take a request.
    Server(ServerError),
    /// I/O failure while setting up threads or devices.
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server(err) => write!(f, "{err}"),
            Self::Io(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Server(err) => Some(err),
            Self::Io(err) => Some(err),
        }
    }
}

impl From<ServerError> for Error {
    fn from(err: ServerError) -> Self {
        match err {
            ServerError::Spawn(io) => Self::Io(io),
            other => Self::Server(other),
        }
    }
}

impl From<StackError> for Error {
    fn from(err: StackError) -> Self {
        Self::Server(ServerError::Stack(err))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

/// Standard result type for clipwin APIs.
pub type Result<T> = std::result::Result<T, Error>;

/// Register and show a window, waiting for the server to confirm each step.
///
/// Draw into the window through a [`ClientDc`] built on a clone of
/// `desc.clip` taken before the call.
pub fn open_window(handle: &ServerHandle, desc: WindowDescriptor) -> Result<WindowId> {
    let wid = desc.id;
    for event in [Event::WinCreate(desc), Event::WinShow(wid)] {
        let name = event.name();
        if handle.post_sync(event)? != Status::Ok {
            return Err(Error::Server(ServerError::Rejected(name)));
        }
    }
    Ok(wid)
}

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        ClientDc, Color, DeviceContext, Error, Event, GraphicContext, Point, Rect, Result, Server,
        ServerConfig, ServerHandle, Status, Surface, WindowDescriptor, WindowId,
    };

    pub use crate::{core, render, server};
}

pub use clipwin_core as core;
pub use clipwin_render as render;
pub use clipwin_server as server;
