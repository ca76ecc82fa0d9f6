//! Record framing over async byte streams
//!
//! `RecordReader` accumulates socket reads until a full record is buffered,
//! so short reads never surface as short messages.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::error::{DecodeError, RelayError};
use crate::message::{ChatMessage, RECORD_SIZE};

/// Reads fixed-size records from a byte stream
#[derive(Debug)]
pub struct RecordReader<R> {
    inner: R,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> RecordReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: Vec::with_capacity(RECORD_SIZE),
        }
    }

    /// Read the next complete record
    ///
    /// Returns `Ok(None)` when the peer closes the stream on a record
    /// boundary and `PeerClosed` when it closes mid-record.
    pub async fn next_record(&mut self) -> Result<Option<ChatMessage>, RelayError> {
        loop {
            match ChatMessage::decode(&self.buf) {
                Ok(msg) => {
                    self.buf.clear();
                    return Ok(Some(msg));
                }
                Err(DecodeError::IncompleteRecord { .. }) => {}
                Err(e) => return Err(e.into()),
            }

            // Never read past the current record
            let mut chunk = [0u8; RECORD_SIZE];
            let wanted = RECORD_SIZE - self.buf.len();
            let n = self.inner.read(&mut chunk[..wanted]).await?;
            if n == 0 {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                debug!("Stream closed with {} bytes of a partial record", self.buf.len());
                return Err(RelayError::PeerClosed);
            }
            self.buf.extend_from_slice(&chunk[..n]);
        }
    }
}

/// Write one record and flush it
pub async fn write_record<W: AsyncWrite + Unpin>(
    writer: &mut W,
    msg: &ChatMessage,
) -> Result<(), RelayError> {
    writer.write_all(&msg.encode()).await?;
    writer.flush().await?;
    Ok(())
}
