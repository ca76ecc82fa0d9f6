//! Worker unit: one task per accepted connection
//!
//! The worker reads records from its client socket and forwards them to the
//! coordinator over its private control channel. It never touches the slot
//! table or any other client's socket. A companion writer task drains the
//! slot's outbound queue into the socket.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, warn};

use crate::error::RelayError;
use crate::frame::{write_record, RecordReader};
use crate::message::{ChatMessage, MessageKind};
use crate::reaper::ExitGuard;
use crate::types::SlotIndex;

/// Worker lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Reading from the socket
    Active,
    /// Final LOGOUT forwarded, no more reads
    Draining,
    /// Socket read half and control channel released
    Terminated,
}

/// Per-connection worker
#[derive(Debug)]
pub struct WorkerUnit {
    index: SlotIndex,
    nickname: Option<String>,
    state: WorkerState,
    control: mpsc::Sender<ChatMessage>,
    wake: Arc<Notify>,
}

impl WorkerUnit {
    pub fn new(index: SlotIndex, control: mpsc::Sender<ChatMessage>, wake: Arc<Notify>) -> Self {
        Self {
            index,
            nickname: None,
            state: WorkerState::Active,
            control,
            wake,
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Nickname seen on this connection, if any
    pub fn nickname(&self) -> Option<&str> {
        self.nickname.as_deref()
    }

    /// Relay records from `reader` until the client leaves
    ///
    /// End of stream, a read error or a corrupt record all produce a
    /// synthetic LOGOUT so the coordinator always sees a departure.
    pub async fn run<R: AsyncRead + Unpin>(&mut self, reader: R) {
        let mut records = RecordReader::new(reader);

        while self.state == WorkerState::Active {
            let msg = match records.next_record().await {
                Ok(Some(msg)) => msg,
                Ok(None) | Err(RelayError::PeerClosed) => {
                    debug!("Client {} closed the connection", self.index);
                    ChatMessage::departure(self.nickname())
                }
                Err(e) => {
                    warn!("Dropping client {}: {}", self.index, e);
                    ChatMessage::departure(self.nickname())
                }
            };
            self.handle_record(msg).await;
        }

        drop(records);
        self.state = WorkerState::Terminated;
        debug!("Worker {} terminated", self.index);
    }

    async fn handle_record(&mut self, msg: ChatMessage) {
        match msg.kind() {
            MessageKind::Nickname => {
                if self.nickname.is_none() {
                    debug!("Client {} is '{}'", self.index, msg.sender());
                    self.nickname = Some(msg.sender().to_string());
                }
            }
            MessageKind::Chat => {}
            MessageKind::Logout => self.state = WorkerState::Draining,
        }
        self.forward(msg).await;
    }

    async fn forward(&mut self, msg: ChatMessage) {
        if self.control.send(msg).await.is_err() {
            warn!("Client {}: {}", self.index, RelayError::ChannelBroken);
            self.state = WorkerState::Draining;
            return;
        }
        self.wake.notify_one();
    }
}

/// Write queued records to the client until the coordinator lets go
///
/// The queue closes when the coordinator releases the slot; the write half
/// is then shut down.
pub async fn pump_outbound<W: AsyncWrite + Unpin>(
    index: SlotIndex,
    mut writer: W,
    mut outbound: mpsc::UnboundedReceiver<ChatMessage>,
) {
    while let Some(msg) = outbound.recv().await {
        if let Err(e) = write_record(&mut writer, &msg).await {
            debug!("Write to client {} failed: {}", index, e);
            break;
        }
    }
    if let Err(e) = writer.shutdown().await {
        debug!("Shutdown of client {} socket failed: {}", index, e);
    }
    debug!("Writer for client {} ended", index);
}

/// Start the worker and writer tasks for an accepted connection
///
/// `guard` reports the worker's exit to the coordinator once the worker
/// and its control channel are gone.
pub fn spawn(
    unit: WorkerUnit,
    stream: TcpStream,
    outbound: mpsc::UnboundedReceiver<ChatMessage>,
    guard: ExitGuard,
) {
    let index = unit.index;
    let (reader, writer) = stream.into_split();

    tokio::spawn(pump_outbound(index, writer, outbound));

    tokio::spawn(async move {
        let _guard = guard;
        let mut unit = unit;
        unit.run(reader).await;
        drop(unit);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::write_record;
    use crate::message::TAG_SIZE;
    use tokio::io::AsyncReadExt;

    fn worker(index: usize) -> (WorkerUnit, mpsc::Receiver<ChatMessage>) {
        let (tx, rx) = mpsc::channel(32);
        (
            WorkerUnit::new(SlotIndex(index), tx, Arc::new(Notify::new())),
            rx,
        )
    }

    #[tokio::test]
    async fn test_forwards_and_synthesizes_logout_on_eof() {
        let (mut unit, mut control) = worker(0);
        let (mut client, server) = tokio::io::duplex(1024);

        let nick = ChatMessage::nickname("alice");
        let chat = ChatMessage::chat("alice", "hi");
        write_record(&mut client, &nick).await.unwrap();
        write_record(&mut client, &chat).await.unwrap();
        drop(client);

        unit.run(server).await;

        assert_eq!(unit.state(), WorkerState::Terminated);
        assert_eq!(unit.nickname(), Some("alice"));
        assert_eq!(control.recv().await, Some(nick));
        assert_eq!(control.recv().await, Some(chat));

        let logout = control.recv().await.unwrap();
        assert_eq!(logout, ChatMessage::departure(Some("alice")));
        assert!(control.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_explicit_logout_stops_reading() {
        let (mut unit, mut control) = worker(1);
        let (mut client, server) = tokio::io::duplex(1024);

        let logout = ChatMessage::logout("bob", "bye");
        write_record(&mut client, &logout).await.unwrap();
        write_record(&mut client, &ChatMessage::chat("bob", "too late"))
            .await
            .unwrap();

        // Client stays connected; the worker must still stop
        unit.run(server).await;

        assert_eq!(unit.state(), WorkerState::Terminated);
        assert_eq!(control.recv().await, Some(logout));
        assert!(control.try_recv().is_err());
        drop(client);
    }

    #[tokio::test]
    async fn test_second_nickname_keeps_first_locally() {
        let (mut unit, mut control) = worker(2);
        let (mut client, server) = tokio::io::duplex(1024);

        write_record(&mut client, &ChatMessage::nickname("carol"))
            .await
            .unwrap();
        write_record(&mut client, &ChatMessage::nickname("mallory"))
            .await
            .unwrap();
        drop(client);

        unit.run(server).await;

        assert_eq!(unit.nickname(), Some("carol"));
        // Both are forwarded verbatim; the coordinator rejects the second
        assert_eq!(control.recv().await.unwrap().sender(), "carol");
        assert_eq!(control.recv().await.unwrap().sender(), "mallory");
        assert_eq!(control.recv().await.unwrap().sender(), "carol");
    }

    #[tokio::test]
    async fn test_corrupt_record_ends_session() {
        let (mut unit, mut control) = worker(3);
        let (mut client, server) = tokio::io::duplex(1024);

        let mut bad = ChatMessage::chat("dave", "x").encode();
        bad[..TAG_SIZE].copy_from_slice(&99u32.to_be_bytes());
        client.write_all(&bad).await.unwrap();

        unit.run(server).await;

        let logout = control.recv().await.unwrap();
        assert_eq!(logout.kind(), MessageKind::Logout);
        assert_eq!(logout.sender(), "unknown");
        drop(client);
    }

    #[tokio::test]
    async fn test_broken_control_channel_terminates() {
        let (mut unit, control) = worker(4);
        drop(control);
        let (mut client, server) = tokio::io::duplex(1024);

        write_record(&mut client, &ChatMessage::chat("erin", "lost"))
            .await
            .unwrap();

        unit.run(server).await;
        assert_eq!(unit.state(), WorkerState::Terminated);
        drop(client);
    }

    #[tokio::test]
    async fn test_pump_writes_until_queue_closes() {
        let (tx, rx) = mpsc::unbounded_channel();
        let (mut client, server) = tokio::io::duplex(1024);
        let pump = tokio::spawn(pump_outbound(SlotIndex(0), server, rx));

        let msg = ChatMessage::chat("alice", "to you");
        tx.send(msg.clone()).unwrap();
        drop(tx);
        pump.await.unwrap();

        let mut received = Vec::new();
        client.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, msg.encode().to_vec());
    }
}
