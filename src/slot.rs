//! Client slots and the fixed-capacity slot table
//!
//! The table is owned and mutated by the coordinator only. An index moves
//! through `Vacant -> Active -> Draining -> Vacant`; it becomes allocatable
//! again only once the worker that used it has been reaped.

use std::net::SocketAddr;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

use tracing::warn;

use crate::error::{RelayError, SendError};
use crate::message::ChatMessage;
use crate::types::{Generation, SlotIndex};

/// Connected client state held by the coordinator
///
/// Owns the coordinator's ends of the connection: the outbound queue feeding
/// the socket writer and the receiving end of the control channel. Dropping
/// the slot closes both.
#[derive(Debug)]
pub struct ClientSlot {
    /// Position in the slot table
    pub index: SlotIndex,
    /// Allocation this slot belongs to
    pub generation: Generation,
    /// Remote address of the client
    pub peer: SocketAddr,
    /// Nickname (None before the first NICKNAME record)
    pub nickname: Option<String>,
    /// Coordinator → socket writer queue, bounded only by memory like a
    /// kernel socket buffer
    outbound: mpsc::UnboundedSender<ChatMessage>,
    /// Worker → coordinator control channel
    control: mpsc::Receiver<ChatMessage>,
}

/// Records pulled from one control channel in a single pass
#[derive(Debug, Default)]
pub struct Drained {
    /// Records in the order the worker sent them
    pub messages: Vec<ChatMessage>,
    /// The worker end of the channel is gone
    pub disconnected: bool,
    /// The pass stopped at its limit with records left behind
    pub more: bool,
}

impl ClientSlot {
    pub fn new(
        index: SlotIndex,
        generation: Generation,
        peer: SocketAddr,
        outbound: mpsc::UnboundedSender<ChatMessage>,
        control: mpsc::Receiver<ChatMessage>,
    ) -> Self {
        Self {
            index,
            generation,
            peer,
            nickname: None,
            outbound,
            control,
        }
    }

    /// Queue a record for this client's socket without waiting
    ///
    /// Fails only once the socket writer has stopped.
    pub fn deliver(&self, msg: ChatMessage) -> Result<(), SendError> {
        self.outbound
            .send(msg)
            .map_err(|_| SendError::ChannelClosed)
    }

    /// Pull up to `limit` records from the control channel without waiting
    pub fn drain(&mut self, limit: usize) -> Drained {
        let mut drained = Drained::default();
        while drained.messages.len() < limit {
            match self.control.try_recv() {
                Ok(msg) => drained.messages.push(msg),
                Err(TryRecvError::Empty) => return drained,
                Err(TryRecvError::Disconnected) => {
                    drained.disconnected = true;
                    return drained;
                }
            }
        }
        drained.more = !self.control.is_empty();
        drained
    }

    /// Get the display name for this client
    ///
    /// Returns the nickname if set, otherwise "unknown".
    pub fn display_name(&self) -> &str {
        self.nickname.as_deref().unwrap_or("unknown")
    }

    /// Check if this client has announced a nickname
    pub fn has_nickname(&self) -> bool {
        self.nickname.is_some()
    }

    /// Bind the nickname; the first one wins
    pub fn bind_nickname(&mut self, nickname: &str) -> Result<(), RelayError> {
        if let Some(current) = &self.nickname {
            return Err(RelayError::NicknameAlreadySet {
                index: self.index,
                current: current.clone(),
            });
        }
        self.nickname = Some(nickname.to_string());
        Ok(())
    }
}

/// State of one table entry
#[derive(Debug)]
enum SlotEntry {
    Vacant,
    Active(ClientSlot),
    /// Handles closed, waiting for the worker exit to be confirmed
    Draining { generation: Generation },
}

/// Fixed-capacity registry of client slots
#[derive(Debug)]
pub struct SlotTable {
    entries: Vec<SlotEntry>,
    next_generation: Generation,
}

impl SlotTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: (0..capacity).map(|_| SlotEntry::Vacant).collect(),
            next_generation: Generation(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Lowest vacant index (first fit)
    ///
    /// Draining entries count as occupied.
    pub fn reserve(&self) -> Result<SlotIndex, RelayError> {
        self.entries
            .iter()
            .position(|entry| matches!(entry, SlotEntry::Vacant))
            .map(SlotIndex)
            .ok_or(RelayError::CapacityExceeded {
                capacity: self.capacity(),
            })
    }

    /// Hand out a fresh allocation generation
    pub fn next_generation(&mut self) -> Generation {
        let generation = self.next_generation;
        self.next_generation = generation.next();
        generation
    }

    /// Place an allocated slot at its index
    ///
    /// The index must come from `reserve` with no intervening allocation.
    ///
    /// Returns false, dropping the slot and closing its handles, if the index
    /// is out of range or not vacant.
    pub fn occupy(&mut self, slot: ClientSlot) -> bool {
        let index = slot.index;
        let Some(entry) = self.entries.get_mut(index.get()) else {
            warn!("Slot {} is out of range, allocation dropped", index);
            return false;
        };
        if !matches!(entry, SlotEntry::Vacant) {
            warn!("Slot {} is still occupied, allocation dropped", index);
            return false;
        }
        *entry = SlotEntry::Active(slot);
        true
    }

    pub fn get(&self, index: SlotIndex) -> Option<&ClientSlot> {
        match self.entries.get(index.get()) {
            Some(SlotEntry::Active(slot)) => Some(slot),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, index: SlotIndex) -> Option<&mut ClientSlot> {
        match self.entries.get_mut(index.get()) {
            Some(SlotEntry::Active(slot)) => Some(slot),
            _ => None,
        }
    }

    /// Active slots in index order
    pub fn active(&self) -> impl Iterator<Item = &ClientSlot> {
        self.entries.iter().filter_map(|entry| match entry {
            SlotEntry::Active(slot) => Some(slot),
            _ => None,
        })
    }

    /// Snapshot of active indices in index order
    pub fn active_indices(&self) -> Vec<SlotIndex> {
        self.active().map(|slot| slot.index).collect()
    }

    /// Number of active slots
    pub fn active_count(&self) -> usize {
        self.active().count()
    }

    /// Number of entries that cannot be allocated (active or draining)
    pub fn occupied_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| !matches!(entry, SlotEntry::Vacant))
            .count()
    }

    /// Close the slot's handles and keep the index reserved until reaped
    ///
    /// Returns the released slot, or None if the index was not active.
    pub fn release(&mut self, index: SlotIndex) -> Option<ClientSlot> {
        let entry = self.entries.get_mut(index.get())?;
        let SlotEntry::Active(slot) = &*entry else {
            return None;
        };
        let generation = slot.generation;
        match std::mem::replace(entry, SlotEntry::Draining { generation }) {
            SlotEntry::Active(slot) => Some(slot),
            _ => None,
        }
    }

    /// Free the index once its worker has exited
    ///
    /// Only an exit carrying the allocation's own generation is honoured, so
    /// a stale or repeated exit can never free a reused index. Returns true
    /// when the index was freed.
    pub fn reap(&mut self, index: SlotIndex, generation: Generation) -> bool {
        let Some(entry) = self.entries.get_mut(index.get()) else {
            return false;
        };
        let current = match &*entry {
            SlotEntry::Active(slot) => slot.generation,
            SlotEntry::Draining { generation: draining } => *draining,
            SlotEntry::Vacant => return false,
        };
        if current != generation {
            return false;
        }
        *entry = SlotEntry::Vacant;
        true
    }

    /// Free every entry, closing all remaining handles
    ///
    /// Returns the number of entries that were not vacant.
    pub fn clear(&mut self) -> usize {
        let occupied = self.occupied_count();
        for entry in &mut self.entries {
            *entry = SlotEntry::Vacant;
        }
        occupied
    }
}
