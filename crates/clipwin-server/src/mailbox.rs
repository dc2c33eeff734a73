#![forbid(unsafe_code)]

//! Bounded in-process mailboxes.
//!
//! A [`Mailbox`] is the sending side (cloneable, shared by everyone who posts
//! to one receiver); an [`Inbox`] is the single receiving side. Posting never
//! blocks: a full mailbox is retried after a fixed sleep, a bounded number of
//! times, so a stuck receiver can delay a sender but never wedge it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TryRecvError, TrySendError};
use std::thread;
use std::time::Duration;

use crate::error::MailboxError;
use crate::event::{Envelope, Event};

static NEXT_MAILBOX: AtomicU64 = AtomicU64::new(1);

/// Create a mailbox holding at most `capacity` envelopes (minimum 1).
pub fn channel(capacity: usize) -> (Mailbox, Inbox) {
    let (tx, rx) = mpsc::sync_channel(capacity.max(1));
    let id = NEXT_MAILBOX.fetch_add(1, Ordering::Relaxed);
    (Mailbox { id, tx }, Inbox { rx })
}

/// Sending side of a mailbox.
#[derive(Debug, Clone)]
pub struct Mailbox {
    id: u64,
    tx: SyncSender<Envelope>,
}

impl Mailbox {
    /// One attempt. On failure the envelope is handed back.
    pub fn try_post(&self, envelope: Envelope) -> Result<(), (MailboxError, Envelope)> {
        self.tx.try_send(envelope).map_err(|err| match err {
            TrySendError::Full(env) => (MailboxError::Full, env),
            TrySendError::Disconnected(env) => (MailboxError::Disconnected, env),
        })
    }

    /// Post a fire-and-forget event with a single attempt.
    pub fn post(&self, event: Event) -> Result<(), MailboxError> {
        self.try_post(Envelope::new(event)).map_err(|(err, _)| err)
    }

    /// Post, sleeping `interval` between attempts while the mailbox is full,
    /// for at most `limit` retries.
    pub fn post_with_retry(
        &self,
        mut envelope: Envelope,
        interval: Duration,
        limit: u32,
    ) -> Result<(), MailboxError> {
        let mut retries = 0;
        loop {
            match self.try_post(envelope) {
                Ok(()) => return Ok(()),
                Err((MailboxError::Full, env)) if retries < limit => {
                    envelope = env;
                    retries += 1;
                    thread::sleep(interval);
                }
                Err((err, _)) => return Err(err),
            }
        }
    }

    /// Whether both handles feed the same inbox.
    pub fn same_as(&self, other: &Mailbox) -> bool {
        self.id == other.id
    }
}

/// Receiving side of a mailbox.
#[derive(Debug)]
pub struct Inbox {
    rx: Receiver<Envelope>,
}

impl Inbox {
    /// Block until an envelope arrives. `None` once every sender is gone.
    pub fn recv(&self) -> Option<Envelope> {
        self.rx.recv().ok()
    }

    pub fn try_recv(&self) -> Option<Envelope> {
        match self.rx.try_recv() {
            Ok(env) => Some(env),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<Envelope> {
        match self.rx.recv_timeout(timeout) {
            Ok(env) => Some(env),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Everything queued right now, oldest first.
    pub fn drain(&self) -> Vec<Envelope> {
        self.rx.try_iter().collect()
    }
}
