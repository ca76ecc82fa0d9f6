//! Client side of the relay protocol
//!
//! Connects to a coordinator, announces a nickname and splits the socket
//! into a record reader and a record writer so both can be driven from one
//! `select!` loop.

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};
use tracing::debug;

use crate::error::RelayError;
use crate::frame::{write_record, RecordReader};
use crate::message::ChatMessage;

/// Receiving half of a client connection
#[derive(Debug)]
pub struct ClientReader {
    records: RecordReader<OwnedReadHalf>,
}

impl ClientReader {
    /// Next record relayed by the coordinator; None once it hangs up
    pub async fn recv(&mut self) -> Result<Option<ChatMessage>, RelayError> {
        self.records.next_record().await
    }
}

/// Sending half of a client connection
#[derive(Debug)]
pub struct ClientWriter {
    writer: OwnedWriteHalf,
    nickname: String,
}

impl ClientWriter {
    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    /// Send a chat line under this client's nickname
    pub async fn send_chat(&mut self, body: &str) -> Result<ChatMessage, RelayError> {
        let msg = ChatMessage::chat(&self.nickname, body);
        write_record(&mut self.writer, &msg).await?;
        Ok(msg)
    }

    /// Send a raw record
    pub async fn send(&mut self, msg: &ChatMessage) -> Result<(), RelayError> {
        write_record(&mut self.writer, msg).await
    }

    /// Announce departure and close the sending side
    pub async fn logout(mut self) -> Result<(), RelayError> {
        let msg = ChatMessage::departure(Some(&self.nickname));
        write_record(&mut self.writer, &msg).await?;
        self.writer.shutdown().await?;
        debug!("Logged out as '{}'", self.nickname);
        Ok(())
    }
}

/// Connect and announce `nickname`
pub async fn connect<A: ToSocketAddrs>(
    addr: A,
    nickname: &str,
) -> Result<(ClientReader, ClientWriter), RelayError> {
    let stream = TcpStream::connect(addr).await?;
    let (reader, writer) = stream.into_split();

    let announce = ChatMessage::nickname(nickname);
    let mut writer = ClientWriter {
        writer,
        nickname: announce.sender().to_string(),
    };
    writer.send(&announce).await?;

    Ok((
        ClientReader {
            records: RecordReader::new(reader),
        },
        writer,
    ))
}
