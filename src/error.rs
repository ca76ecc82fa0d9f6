//! Error types for the chat relay
//!
//! Defines record decoding errors, relay-level errors and per-slot delivery
//! errors. Uses thiserror for ergonomic error definitions.

use thiserror::Error;

use crate::message::RECORD_SIZE;
use crate::types::SlotIndex;

/// Record decoding errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Fewer bytes than one record are available (transient, read more)
    #[error("incomplete record: {available} of {} bytes", RECORD_SIZE)]
    IncompleteRecord { available: usize },

    /// Kind tag outside the known set (connection-fatal)
    #[error("corrupt message: unknown kind tag {tag}")]
    CorruptMessage { tag: u32 },
}

impl DecodeError {
    /// Whether the caller should wait for more bytes instead of giving up
    pub fn is_transient(&self) -> bool {
        matches!(self, DecodeError::IncompleteRecord { .. })
    }
}

/// Relay-level errors
///
/// Only `Setup` is surfaced to the operator as a process failure; every
/// other variant is contained to the connection it happened on.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Socket, bind or listen failure (fatal at startup)
    #[error("setup failed: {0}")]
    Setup(#[source] std::io::Error),

    /// Every slot is occupied or still draining
    #[error("capacity exceeded ({capacity} clients)")]
    CapacityExceeded { capacity: usize },

    /// Record could not be decoded
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Peer closed the connection (normal termination)
    #[error("peer closed connection")]
    PeerClosed,

    /// Control channel between worker and coordinator was severed
    #[error("control channel broken")]
    ChannelBroken,

    /// A second NICKNAME arrived for a slot that already has one
    #[error("slot {index} already has nickname '{current}'")]
    NicknameAlreadySet { index: SlotIndex, current: String },

    /// IO error on an established connection
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outbound delivery errors
///
/// Occurs when the coordinator hands a record to a slot's socket writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SendError {
    /// The writer has stopped (socket gone)
    #[error("Channel closed")]
    ChannelClosed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_transient() {
        assert!(DecodeError::IncompleteRecord { available: 3 }.is_transient());
        assert!(!DecodeError::CorruptMessage { tag: 9 }.is_transient());
    }

    #[test]
    fn test_error_messages() {
        let err = RelayError::from(DecodeError::IncompleteRecord { available: 10 });
        assert_eq!(
            err.to_string(),
            format!("decode error: incomplete record: 10 of {} bytes", RECORD_SIZE)
        );

        let err = RelayError::NicknameAlreadySet {
            index: SlotIndex(2),
            current: "alice".to_string(),
        };
        assert_eq!(err.to_string(), "slot #2 already has nickname 'alice'");
    }
}
