// ChatSleuth - core/sequence.rs
//
// Re-serialisation of out-of-order worker results into file order.
//
// The tail assigns every unit of work (a log line, a tail notice) a dense,
// monotonically increasing sequence number starting at 0. Workers finish in
// any order; `ReorderBuffer` holds early arrivals until every lower number has
// been seen, then releases the contiguous run. A slot that produced nothing
// (dropped line) must still be pushed as `None` or the run stalls.

use std::collections::BTreeMap;

#[derive(Debug)]
pub struct ReorderBuffer<T> {
    next: u64,
    pending: BTreeMap<u64, Option<T>>,
}

impl<T> Default for ReorderBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ReorderBuffer<T> {
    pub fn new() -> Self {
        Self {
            next: 0,
            pending: BTreeMap::new(),
        }
    }

    /// Record the result for `seq` and return every item that is now in
    /// order, oldest first. Empty slots are consumed silently.
    ///
    /// A duplicate or already-released `seq` is ignored.
    pub fn push(&mut self, seq: u64, item: Option<T>) -> Vec<T> {
        if seq < self.next || self.pending.contains_key(&seq) {
            tracing::warn!(seq, next = self.next, "Duplicate sequence number ignored");
            return Vec::new();
        }
        self.pending.insert(seq, item);

        let mut ready = Vec::new();
        while let Some(slot) = self.pending.remove(&self.next) {
            if let Some(item) = slot {
                ready.push(item);
            }
            self.next += 1;
        }
        ready
    }

    /// Sequence number the buffer is waiting for.
    pub fn next_expected(&self) -> u64 {
        self.next
    }

    /// Number of results held back behind a gap.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
