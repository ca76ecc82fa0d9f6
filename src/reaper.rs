//! Worker exit notification and the live-connection counter
//!
//! A worker carries an `ExitGuard` for its whole lifetime. Dropping the guard
//! (normal return, error or panic unwind) pushes exactly one `WorkerExit`
//! onto the coordinator's event queue and wakes the coordinator. The
//! coordinator is the only place the counter is mutated.

use std::sync::Arc;

use tokio::sync::{mpsc, Notify};
use tracing::{debug, warn};

use crate::types::{Generation, SlotIndex};

/// Event emitted when a worker has terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerExit {
    pub index: SlotIndex,
    pub generation: Generation,
}

/// Sends a `WorkerExit` when dropped
#[derive(Debug)]
pub struct ExitGuard {
    exit: WorkerExit,
    events: mpsc::UnboundedSender<WorkerExit>,
    wake: Arc<Notify>,
}

impl ExitGuard {
    pub fn new(
        index: SlotIndex,
        generation: Generation,
        events: mpsc::UnboundedSender<WorkerExit>,
        wake: Arc<Notify>,
    ) -> Self {
        Self {
            exit: WorkerExit { index, generation },
            events,
            wake,
        }
    }
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        if self.events.send(self.exit).is_err() {
            debug!("Coordinator gone, exit of slot {} not reported", self.exit.index);
            return;
        }
        self.wake.notify_one();
    }
}

/// Result of decrementing the counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterTransition {
    /// Other connections remain
    Decremented,
    /// The last connection departed
    ReachedZero,
}

/// Count of connections whose workers have not yet been reaped
#[derive(Debug, Default)]
pub struct LiveCounter {
    live: usize,
}

impl LiveCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live(&self) -> usize {
        self.live
    }

    /// Count a newly allocated slot
    pub fn increment(&mut self) {
        self.live += 1;
    }

    /// Count one reaped worker
    pub fn decrement(&mut self) -> CounterTransition {
        match self.live {
            0 => {
                warn!("Live-connection counter decremented at zero");
                CounterTransition::Decremented
            }
            1 => {
                self.live = 0;
                CounterTransition::ReachedZero
            }
            _ => {
                self.live -= 1;
                CounterTransition::Decremented
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_transitions() {
        let mut counter = LiveCounter::new();
        counter.increment();
        counter.increment();
        assert_eq!(counter.live(), 2);

        assert_eq!(counter.decrement(), CounterTransition::Decremented);
        assert_eq!(counter.decrement(), CounterTransition::ReachedZero);
        assert_eq!(counter.live(), 0);
    }

    #[test]
    fn test_counter_never_underflows() {
        let mut counter = LiveCounter::new();
        // Zero without ever being positive is not a shutdown trigger
        assert_eq!(counter.decrement(), CounterTransition::Decremented);
        assert_eq!(counter.live(), 0);
    }

    #[tokio::test]
    async fn test_guard_reports_exit_once() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let wake = Arc::new(Notify::new());

        let guard = ExitGuard::new(SlotIndex(4), Generation(9), tx, wake.clone());
        drop(guard);

        assert_eq!(
            rx.recv().await,
            Some(WorkerExit {
                index: SlotIndex(4),
                generation: Generation(9)
            })
        );
        // The guard was the only sender
        assert_eq!(rx.recv().await, None);
        // Wake permit was stored for the coordinator
        wake.notified().await;
    }

    #[tokio::test]
    async fn test_guard_reports_exit_on_panic() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let guard = ExitGuard::new(SlotIndex(0), Generation(1), tx, Arc::new(Notify::new()));

        let task = tokio::spawn(async move {
            let _guard = guard;
            panic!("worker blew up");
        });
        assert!(task.await.is_err());

        assert_eq!(rx.recv().await.map(|e| e.index), Some(SlotIndex(0)));
    }
}
