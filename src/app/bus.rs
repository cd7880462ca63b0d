// ChatSleuth - app/bus.rs
//
// Event bus: the single hand-off between the tail pipeline and the consumer.
//
// Architecture:
//   - `EventBus` owns the consumer end of a bounded mpsc channel
//     (EVENT_BUS_CAPACITY). The consumer drains it from its own loop
//     (`ChatMonitor::pump`).
//   - Ordered results travel through a sequencer thread. The tail thread and
//     the line workers send `(seq, Option<TailProgress>)` pairs to it; it
//     re-orders them with a `ReorderBuffer` and forwards to the bus in file
//     order, publishing how far it has released.
//   - Side-effect failures (sound playback) have no file position and are
//     offered straight to the bus with `try_send`; they are dropped rather
//     than block a player thread when the bus is full.
//
// Backpressure: a full bus blocks the sequencer. The tail thread compares
// its next sequence number with `Sequencer::released` and stops dispatching
// once MAX_IN_FLIGHT_LINES are outstanding, so the reorder buffer and the
// worker queue are bounded too.
//
// Shutdown: the sequencer exits when every work sender is dropped, or when
// the bus receiver is gone. Dropping the `EventBus` therefore drains the
// whole pipeline without a join.

use crate::core::model::TailProgress;
use crate::core::sequence::ReorderBuffer;
use crate::util::constants::EVENT_BUS_CAPACITY;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;

/// Sender half of the bus, cloned into anything that reports to the consumer.
pub type BusSender = mpsc::SyncSender<TailProgress>;

/// One unit of ordered work: its sequence number and its result (if any).
pub type SequencedResult = (u64, Option<TailProgress>);

/// Sender half of the sequencer input.
pub type WorkSender = mpsc::Sender<SequencedResult>;

pub struct EventBus {
    tx: BusSender,
    rx: mpsc::Receiver<TailProgress>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(EVENT_BUS_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, rx) = mpsc::sync_channel(capacity);
        Self { tx, rx }
    }

    pub fn sender(&self) -> BusSender {
        self.tx.clone()
    }

    /// Take up to `max` queued messages without blocking.
    pub fn drain(&self, max: usize) -> Vec<TailProgress> {
        self.rx.try_iter().take(max).collect()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle on a running sequencer thread.
pub struct Sequencer {
    pub work_tx: WorkSender,
    released: Arc<AtomicU64>,
    handle: JoinHandle<()>,
}

impl Sequencer {
    /// Number of sequence slots forwarded (or skipped) so far.
    pub fn released(&self) -> u64 {
        self.released.load(Ordering::SeqCst)
    }

    /// True once the thread has exited (inputs closed or bus gone).
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Start the sequencer thread forwarding in-order results to `out`.
pub fn spawn_sequencer(out: BusSender) -> Sequencer {
    let (work_tx, work_rx) = mpsc::channel::<SequencedResult>();
    let released = Arc::new(AtomicU64::new(0));
    let progress = Arc::clone(&released);

    let handle = std::thread::spawn(move || {
        let mut reorder = ReorderBuffer::new();
        for (seq, result) in work_rx {
            for message in reorder.push(seq, result) {
                // Blocks while the bus is full.
                if out.send(message).is_err() {
                    tracing::debug!(seq, "Sequencer: bus closed, exiting");
                    return;
                }
            }
            progress.store(reorder.next_expected(), Ordering::SeqCst);
        }
        if reorder.pending_len() > 0 {
            tracing::warn!(
                pending = reorder.pending_len(),
                next = reorder.next_expected(),
                "Sequencer: inputs closed with results held behind a gap"
            );
        }
    });

    Sequencer {
        work_tx,
        released,
        handle,
    }
}
