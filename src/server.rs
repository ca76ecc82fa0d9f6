//! Coordinator loop
//!
//! The coordinator owns the listener, the slot table and the live-connection
//! counter. Each iteration runs in a fixed order:
//!
//! 1. try one non-blocking accept and allocate a slot for it
//! 2. drain every active slot's control channel in index order, fanning
//!    chat and logout records out to all other active slots
//! 3. reap exited workers, freeing their indices and counting them down
//! 4. wait until a connection, a worker record or a worker exit is ready,
//!    bounded by the configured idle wait
//!
//! Workers only ever write to their own control channel and report their
//! exit through the shared event queue, so every slot and counter mutation
//! happens here.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::FutureExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Notify};
use tracing::{debug, info, warn};

use crate::config::RelayConfig;
use crate::error::{RelayError, SendError};
use crate::message::{ChatMessage, MessageKind};
use crate::observer::{LogObserver, Notification, Observer};
use crate::reaper::{CounterTransition, ExitGuard, LiveCounter, WorkerExit};
use crate::slot::{ClientSlot, SlotTable};
use crate::types::SlotIndex;
use crate::worker::{self, WorkerUnit};

/// The relay coordinator
pub struct Coordinator {
    config: RelayConfig,
    listener: TcpListener,
    slots: SlotTable,
    counter: LiveCounter,
    /// Worker exit events, one per spawned worker
    exit_tx: mpsc::UnboundedSender<WorkerExit>,
    exit_rx: mpsc::UnboundedReceiver<WorkerExit>,
    /// Signalled by workers whenever there is something to drain or reap
    wake: Arc<Notify>,
    /// Connection accepted during the idle wait, admitted next iteration
    pending: Option<io::Result<(TcpStream, SocketAddr)>>,
    observer: Box<dyn Observer>,
}

impl Coordinator {
    /// Bind the listener described by `config`
    pub async fn bind(config: RelayConfig) -> Result<Self, RelayError> {
        let listener = TcpListener::bind(config.listen_addr())
            .await
            .map_err(RelayError::Setup)?;
        let (exit_tx, exit_rx) = mpsc::unbounded_channel();

        Ok(Self {
            slots: SlotTable::new(config.capacity),
            config,
            listener,
            counter: LiveCounter::new(),
            exit_tx,
            exit_rx,
            wake: Arc::new(Notify::new()),
            pending: None,
            observer: Box::new(LogObserver),
        })
    }

    /// Replace the default log observer
    pub fn with_observer(mut self, observer: impl Observer + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr, RelayError> {
        self.listener.local_addr().map_err(RelayError::Setup)
    }

    /// Run until every client that connected has departed
    pub async fn run(mut self) {
        info!(
            "Coordinator started (capacity {}, idle wait {:?})",
            self.slots.capacity(),
            self.config.idle_wait
        );

        loop {
            self.accept_step();
            let backlog = self.drain_step();
            if self.reap_step() {
                break;
            }
            if backlog {
                // Let writer and worker tasks run before the next pass
                tokio::task::yield_now().await;
            } else {
                self.idle_wait().await;
            }
        }

        let freed = self.slots.clear();
        drop(self.listener);
        info!("All clients departed, coordinator shut down ({} slots freed)", freed);
    }

    /// Admit at most one connection without waiting
    fn accept_step(&mut self) {
        let accepted = match self.pending.take() {
            Some(result) => Some(result),
            None => self.listener.accept().now_or_never(),
        };

        match accepted {
            Some(Ok((stream, peer))) => self.admit(stream, peer),
            Some(Err(e)) => warn!("Failed to accept connection: {}", e),
            None => {}
        }
    }

    /// Allocate the lowest free slot and start a worker for it
    fn admit(&mut self, stream: TcpStream, peer: SocketAddr) {
        let index = match self.slots.reserve() {
            Ok(index) => index,
            Err(e) => {
                warn!("Refusing {}: {}", peer, e);
                drop(stream);
                return;
            }
        };
        let generation = self.slots.next_generation();

        let (control_tx, control_rx) = mpsc::channel(self.config.control_buffer);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        let guard = ExitGuard::new(index, generation, self.exit_tx.clone(), self.wake.clone());
        let unit = WorkerUnit::new(index, control_tx, self.wake.clone());
        worker::spawn(unit, stream, outbound_rx, guard);

        let slot = ClientSlot::new(index, generation, peer, outbound_tx, control_rx);
        if !self.slots.occupy(slot) {
            // The worker sees its channels close and exits; its stale
            // generation is ignored at reap time
            return;
        }
        self.counter.increment();

        info!(
            "Client {} connected from {} (connections: {})",
            index,
            peer,
            self.counter.live()
        );
    }

    /// Drain every active slot once; true if any slot still has records queued
    fn drain_step(&mut self) -> bool {
        let mut backlog = false;
        for index in self.slots.active_indices() {
            backlog |= self.drain_slot(index, self.config.drain_batch);
        }
        backlog
    }

    /// Dispatch up to `limit` records from one slot
    fn drain_slot(&mut self, index: SlotIndex, limit: usize) -> bool {
        let Some(slot) = self.slots.get_mut(index) else {
            return false;
        };
        let drained = slot.drain(limit);

        for msg in drained.messages {
            if !self.dispatch(index, msg) {
                return false;
            }
        }

        if drained.disconnected && self.slots.get(index).is_some() {
            warn!("Client {}: {}", index, RelayError::ChannelBroken);
            self.slots.release(index);
            return false;
        }

        drained.more
    }

    /// Handle one record from a worker; false once the slot has been released
    fn dispatch(&mut self, index: SlotIndex, msg: ChatMessage) -> bool {
        match msg.kind() {
            MessageKind::Nickname => {
                let Some(slot) = self.slots.get_mut(index) else {
                    return false;
                };
                match slot.bind_nickname(msg.sender()) {
                    Ok(()) => info!("Client {} set nickname to '{}'", index, msg.sender()),
                    Err(e) => warn!("Rejected nickname '{}': {}", msg.sender(), e),
                }
                true
            }
            MessageKind::Chat => {
                self.broadcast(index, &msg);
                true
            }
            MessageKind::Logout => {
                self.broadcast(index, &msg);
                if let Some(slot) = self.slots.release(index) {
                    info!("Client {} ({}) logged out", index, slot.display_name());
                }
                false
            }
        }
    }

    /// Queue `msg` for every active slot except its origin
    fn broadcast(&mut self, origin: SlotIndex, msg: &ChatMessage) {
        let mut delivered = 0;
        for slot in self.slots.active().filter(|slot| slot.index != origin) {
            match slot.deliver(msg.clone()) {
                Ok(()) => delivered += 1,
                Err(SendError::ChannelClosed) => debug!("Client {} writer already closed", slot.index),
            }
        }
        debug!("Broadcast from {} reached {} clients", origin, delivered);

        self.observer.notify(&Notification::from_message(msg, false));
    }

    /// Reap exited workers; true once the last connection is gone
    fn reap_step(&mut self) -> bool {
        while let Ok(exit) = self.exit_rx.try_recv() {
            let current = self
                .slots
                .get(exit.index)
                .is_some_and(|slot| slot.generation == exit.generation);
            if current {
                // Whatever the worker sent before exiting goes out first
                self.drain_slot(exit.index, usize::MAX);
                self.slots.release(exit.index);
            }

            if !self.slots.reap(exit.index, exit.generation) {
                debug!("Ignoring stale exit of {} ({})", exit.index, exit.generation);
                continue;
            }

            let transition = self.counter.decrement();
            info!(
                "Worker {} reaped (connections: {})",
                exit.index,
                self.counter.live()
            );
            if transition == CounterTransition::ReachedZero {
                return true;
            }
        }
        false
    }

    /// Block until something is ready, at most `idle_wait`
    async fn idle_wait(&mut self) {
        let accepted = tokio::select! {
            result = self.listener.accept() => Some(result),
            _ = self.wake.notified() => None,
            _ = tokio::time::sleep(self.config.idle_wait) => None,
        };
        if accepted.is_some() {
            self.pending = accepted;
        }
    }
}
