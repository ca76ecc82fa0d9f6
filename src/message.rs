//! Message protocol definitions
//!
//! Every message on the wire is one fixed-size record:
//!
//! ```text
//! +-----------+------------------+----------------------+
//! | kind: u32 | sender: [u8; 20] | body: [u8; 100]      |
//! | (BE)      | NUL-padded UTF-8 | NUL-padded UTF-8     |
//! +-----------+------------------+----------------------+
//! ```
//!
//! No length prefix or delimiter is used; a receiver that holds fewer than
//! `RECORD_SIZE` bytes must wait for more.

use serde::Serialize;

use crate::error::DecodeError;

/// Size of the kind tag in bytes
pub const TAG_SIZE: usize = 4;
/// Size of the sender field in bytes (including the NUL terminator)
pub const SENDER_FIELD: usize = 20;
/// Size of the body field in bytes (including the NUL terminator)
pub const BODY_FIELD: usize = 100;
/// Total size of one record on the wire
pub const RECORD_SIZE: usize = TAG_SIZE + SENDER_FIELD + BODY_FIELD;

/// Longest sender text that fits a record
pub const MAX_SENDER_LEN: usize = SENDER_FIELD - 1;
/// Longest body text that fits a record
pub const MAX_BODY_LEN: usize = BODY_FIELD - 1;

/// Kind tag of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Client announces its nickname
    Nickname,
    /// Regular chat line
    Chat,
    /// Client is leaving
    Logout,
}

impl MessageKind {
    /// Wire value of this kind
    pub fn tag(self) -> u32 {
        match self {
            MessageKind::Nickname => 0,
            MessageKind::Chat => 1,
            MessageKind::Logout => 2,
        }
    }

    /// Parse a wire tag
    pub fn from_tag(tag: u32) -> Result<Self, DecodeError> {
        match tag {
            0 => Ok(MessageKind::Nickname),
            1 => Ok(MessageKind::Chat),
            2 => Ok(MessageKind::Logout),
            tag => Err(DecodeError::CorruptMessage { tag }),
        }
    }
}

/// A single chat message
///
/// Fields are clamped to what a record can carry at construction time, so
/// every `ChatMessage` survives an encode/decode cycle unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    kind: MessageKind,
    sender: String,
    body: String,
}

impl ChatMessage {
    /// Create a message of any kind, clamping both text fields
    pub fn new(kind: MessageKind, sender: &str, body: &str) -> Self {
        Self {
            kind,
            sender: clamp(sender, MAX_SENDER_LEN),
            body: clamp(body, MAX_BODY_LEN),
        }
    }

    /// Nickname announcement; the nickname travels in the sender field
    pub fn nickname(nickname: &str) -> Self {
        Self::new(MessageKind::Nickname, nickname, "")
    }

    /// Chat line from `sender`
    pub fn chat(sender: &str, body: &str) -> Self {
        Self::new(MessageKind::Chat, sender, body)
    }

    /// Logout notice from `sender`
    pub fn logout(sender: &str, body: &str) -> Self {
        Self::new(MessageKind::Logout, sender, body)
    }

    /// Logout built on behalf of a client that vanished without saying goodbye
    pub fn departure(nickname: Option<&str>) -> Self {
        let name = nickname.unwrap_or("unknown");
        Self::logout(name, &format!("[{}] has left the chat.", name))
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Encode into one wire record
    pub fn encode(&self) -> [u8; RECORD_SIZE] {
        let mut record = [0u8; RECORD_SIZE];
        record[..TAG_SIZE].copy_from_slice(&self.kind.tag().to_be_bytes());

        let sender = self.sender.as_bytes();
        record[TAG_SIZE..TAG_SIZE + sender.len()].copy_from_slice(sender);

        let body_start = TAG_SIZE + SENDER_FIELD;
        let body = self.body.as_bytes();
        record[body_start..body_start + body.len()].copy_from_slice(body);

        record
    }

    /// Decode the first record in `bytes`
    ///
    /// Returns `IncompleteRecord` when fewer than `RECORD_SIZE` bytes are
    /// available and `CorruptMessage` for an unknown kind tag.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() < RECORD_SIZE {
            return Err(DecodeError::IncompleteRecord {
                available: bytes.len(),
            });
        }

        let mut tag = [0u8; TAG_SIZE];
        tag.copy_from_slice(&bytes[..TAG_SIZE]);
        let kind = MessageKind::from_tag(u32::from_be_bytes(tag))?;

        let body_start = TAG_SIZE + SENDER_FIELD;
        let sender = read_field(&bytes[TAG_SIZE..body_start]);
        let body = read_field(&bytes[body_start..RECORD_SIZE]);

        Ok(Self::new(kind, &sender, &body))
    }
}

/// Read a NUL-padded text field
fn read_field(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

/// Cut `text` at the first NUL and to at most `max` bytes on a char boundary
fn clamp(text: &str, max: usize) -> String {
    let text = text.split('\0').next().unwrap_or_default();
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_size() {
        assert_eq!(RECORD_SIZE, 124);
        assert_eq!(ChatMessage::chat("a", "b").encode().len(), RECORD_SIZE);
    }

    #[test]
    fn test_round_trip() {
        let messages = [
            ChatMessage::nickname("alice"),
            ChatMessage::chat("bob", "hello there"),
            ChatMessage::logout("carol", "bye"),
            ChatMessage::chat("", ""),
            ChatMessage::chat("한국어", "안녕하세요"),
        ];
        for msg in messages {
            assert_eq!(ChatMessage::decode(&msg.encode()).unwrap(), msg);
        }
    }

    #[test]
    fn test_fields_are_clamped() {
        let long_sender = "s".repeat(40);
        let long_body = "b".repeat(250);
        let msg = ChatMessage::chat(&long_sender, &long_body);

        assert_eq!(msg.sender().len(), MAX_SENDER_LEN);
        assert_eq!(msg.body().len(), MAX_BODY_LEN);
        assert_eq!(ChatMessage::decode(&msg.encode()).unwrap(), msg);
    }

    #[test]
    fn test_clamp_respects_char_boundary() {
        // 'é' is two bytes; 10 of them are 20 bytes
        let msg = ChatMessage::nickname(&"é".repeat(10));
        assert_eq!(msg.sender(), "é".repeat(9));
    }

    #[test]
    fn test_clamp_cuts_at_nul() {
        let msg = ChatMessage::chat("ali\0ce", "hi\0there");
        assert_eq!(msg.sender(), "ali");
        assert_eq!(msg.body(), "hi");
    }

    #[test]
    fn test_decode_incomplete() {
        let record = ChatMessage::chat("alice", "hi").encode();
        let err = ChatMessage::decode(&record[..RECORD_SIZE - 1]).unwrap_err();
        assert_eq!(
            err,
            DecodeError::IncompleteRecord {
                available: RECORD_SIZE - 1
            }
        );
        assert!(ChatMessage::decode(&[]).unwrap_err().is_transient());
    }

    #[test]
    fn test_decode_corrupt_tag() {
        let mut record = ChatMessage::chat("alice", "hi").encode();
        record[..TAG_SIZE].copy_from_slice(&7u32.to_be_bytes());
        assert_eq!(
            ChatMessage::decode(&record).unwrap_err(),
            DecodeError::CorruptMessage { tag: 7 }
        );
    }

    #[test]
    fn test_decode_ignores_trailing_bytes() {
        let first = ChatMessage::chat("alice", "one");
        let second = ChatMessage::chat("alice", "two");
        let mut bytes = first.encode().to_vec();
        bytes.extend_from_slice(&second.encode());

        assert_eq!(ChatMessage::decode(&bytes).unwrap(), first);
        assert_eq!(ChatMessage::decode(&bytes[RECORD_SIZE..]).unwrap(), second);
    }

    #[test]
    fn test_departure_notice() {
        let msg = ChatMessage::departure(Some("bob"));
        assert_eq!(msg.kind(), MessageKind::Logout);
        assert_eq!(msg.sender(), "bob");
        assert_eq!(msg.body(), "[bob] has left the chat.");

        let anon = ChatMessage::departure(None);
        assert_eq!(anon.sender(), "unknown");
    }

    #[test]
    fn test_kind_serialize() {
        let json = serde_json::to_string(&ChatMessage::logout("bob", "bye")).unwrap();
        assert!(json.contains("\"kind\":\"logout\""));
        assert!(json.contains("\"sender\":\"bob\""));
    }
}
