//! TCP Chat Relay Library
//!
//! A chat relay built on tokio: the coordinator accepts TCP connections,
//! runs one worker task per connection and fans every chat message out to
//! all other connected clients.
//!
//! # Architecture
//! - `Coordinator` owns the listener, the fixed-capacity `SlotTable` and
//!   the live-connection counter; it is the only writer of all three
//! - Each connection has a `WorkerUnit` task that decodes fixed-size
//!   records from its socket and forwards them over a private control
//!   channel
//! - Worker exits are reported through an `ExitGuard` onto the
//!   coordinator's event queue, where they are reaped exactly once
//! - When the last client departs the coordinator shuts down
//!
//! # Example
//! ```ignore
//! use chat_relay::{Coordinator, RelayConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), chat_relay::RelayError> {
//!     let coordinator = Coordinator::bind(RelayConfig::default()).await?;
//!     coordinator.run().await;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod frame;
pub mod logging;
pub mod message;
pub mod observer;
pub mod reaper;
pub mod server;
pub mod slot;
pub mod types;
pub mod worker;

// Re-export main types for convenience
pub use client::{connect, ClientReader, ClientWriter};
pub use config::RelayConfig;
pub use error::{DecodeError, RelayError, SendError};
pub use message::{ChatMessage, MessageKind, RECORD_SIZE};
pub use observer::{ChannelObserver, JsonObserver, LogObserver, Notification, Observer};
pub use server::Coordinator;
pub use slot::{ClientSlot, SlotTable};
pub use types::{Generation, SlotIndex};
pub use worker::{WorkerState, WorkerUnit};
