//! Presentation hook
//!
//! The relay core reports every message it relays or receives as a
//! `Notification`; rendering is left to whoever implements `Observer`.

use std::io::Write;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::message::{ChatMessage, MessageKind};

/// One message as seen by the presentation layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub kind: MessageKind,
    pub sender: String,
    pub body: String,
    /// The message originated from the local user
    pub is_own: bool,
}

impl Notification {
    pub fn from_message(msg: &ChatMessage, is_own: bool) -> Self {
        Self {
            kind: msg.kind(),
            sender: msg.sender().to_string(),
            body: msg.body().to_string(),
            is_own,
        }
    }
}

/// Consumer of relay notifications
pub trait Observer: Send {
    fn notify(&mut self, notification: &Notification);
}

/// Writes each notification as a log line
#[derive(Debug, Default)]
pub struct LogObserver;

impl Observer for LogObserver {
    fn notify(&mut self, n: &Notification) {
        if n.is_own {
            info!("[{}] (me) {}", n.sender, n.body);
        } else {
            info!("[{}] {}", n.sender, n.body);
        }
    }
}

/// Writes each notification as one JSON line
#[derive(Debug)]
pub struct JsonObserver<W> {
    out: W,
}

impl<W: Write + Send> JsonObserver<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_line(&mut self, n: &Notification) -> std::io::Result<()> {
        serde_json::to_writer(&mut self.out, n)?;
        writeln!(self.out)?;
        self.out.flush()
    }
}

impl<W: Write + Send> Observer for JsonObserver<W> {
    fn notify(&mut self, n: &Notification) {
        if let Err(e) = self.write_line(n) {
            warn!("Failed to write notification: {}", e);
        }
    }
}

/// Queues notifications for another task
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    sender: mpsc::UnboundedSender<Notification>,
}

impl ChannelObserver {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl Observer for ChannelObserver {
    fn notify(&mut self, n: &Notification) {
        // Receiver gone means nobody is rendering; nothing to do
        let _ = self.sender.send(n.clone());
    }
}
