#![forbid(unsafe_code)]

//! Error types for the window server.
//!
//! None of these cross the client/server boundary; the router reduces them to
//! [`Status::Error`](crate::event::Status::Error) in acknowledgments.

use std::fmt;

use clipwin_core::input::WindowId;

/// A window-stack operation was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackError {
    /// The create request is missing something the stack needs.
    MalformedDescriptor(&'static str),
    /// A window with this id is already registered.
    DuplicateWindow(WindowId),
    /// No free slot left.
    RegistryFull { capacity: usize },
    UnknownWindow(WindowId),
    /// The operation needs a shown window.
    NotVisible(WindowId),
    /// A modal chain that does not include this window is active.
    Blocked(WindowId),
}

impl fmt::Display for StackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedDescriptor(why) => write!(f, "malformed window descriptor: {why}"),
            Self::DuplicateWindow(id) => write!(f, "{id} is already registered"),
            Self::RegistryFull { capacity } => {
                write!(f, "window registry full ({capacity} windows)")
            }
            Self::UnknownWindow(id) => write!(f, "unknown window {id}"),
            Self::NotVisible(id) => write!(f, "{id} is not shown"),
            Self::Blocked(id) => write!(f, "{id} is blocked by a modal window"),
        }
    }
}

impl std::error::Error for StackError {}

/// A post to a mailbox failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxError {
    /// Still full after the retry budget was spent.
    Full,
    /// The receiving side is gone.
    Disconnected,
}

impl fmt::Display for MailboxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => f.write_str("mailbox full"),
            Self::Disconnected => f.write_str("mailbox disconnected"),
        }
    }
}

impl std::error::Error for MailboxError {}

/// Errors seen by users of a [`ServerHandle`](crate::server::ServerHandle).
#[derive(Debug)]
pub enum ServerError {
    /// The server loop has exited.
    NotRunning,
    /// The inbound queue stayed full for the whole retry budget.
    Busy,
    /// The server dropped the reply channel without answering.
    AckDropped,
    /// The server answered a request with `Status::Error`.
    Rejected(&'static str),
    Stack(StackError),
    /// The server thread could not be started.
    Spawn(std::io::Error),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotRunning => f.write_str("window server is not running"),
            Self::Busy => f.write_str("window server inbound queue is full"),
            Self::AckDropped => f.write_str("window server dropped the acknowledgment"),
            Self::Rejected(event) => write!(f, "window server rejected {event}"),
            Self::Stack(err) => write!(f, "{err}"),
            Self::Spawn(err) => write!(f, "failed to start window server: {err}"),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Stack(err) => Some(err),
            Self::Spawn(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StackError> for ServerError {
    fn from(err: StackError) -> Self {
        Self::Stack(err)
    }
}

impl From<MailboxError> for ServerError {
    fn from(err: MailboxError) -> Self {
        match err {
            MailboxError::Full => Self::Busy,
            MailboxError::Disconnected => Self::NotRunning,
        }
    }
}
