// ChatSleuth - app/tail.rs
//
// Live tail: follows the chat log from its current end and feeds every newly
// appended complete line through the classification pipeline.
//
// Architecture:
//   - `TailManager` lives on the consumer thread and exposes start/stop.
//   - `run_tail_watcher` runs on a dedicated background thread. It owns the
//     open file handle and is the only reader of the log.
//   - Each complete line gets the next sequence number and is handed to the
//     rayon worker pool. Workers parse, filter and notify, then report
//     `(seq, result)` to the sequencer (see app::bus), which restores file
//     order before anything reaches the consumer.
//   - Tail notices (`Started`, errors, `Stopped`) take sequence numbers too,
//     so they appear at their true position in the stream.
//   - At most MAX_IN_FLIGHT_LINES are dispatched ahead of what the sequencer
//     has released; past that the tail thread waits.
//   - An `Arc<AtomicBool>` stop flag is checked once per loop iteration.
//
// Error policy:
//   - Stat, open and read failures are fatal: an Error notice is emitted,
//     followed by `Stopped`, and the thread exits.
//   - Replacement (the path now names a different file than the open handle)
//     and truncation (size < offset) both reopen the path at offset 0.
//   - A panic while processing one line is caught and becomes an Error
//     notice for that line's slot; the tail continues.
//   - MAX_TAIL_READ_BYTES_PER_TICK caps each read so a burst of writes
//     cannot stall the stop check. The partial-line carry is capped at
//     MAX_TAIL_PARTIAL_BYTES.

use crate::app::bus::{self, BusSender, Sequencer, WorkSender};
use crate::app::notifier::Notifier;
use crate::core::filter::IgnoreSet;
use crate::core::model::TailProgress;
use crate::core::parser;
use crate::util::constants::{
    IN_FLIGHT_WAIT_MS, MAX_IN_FLIGHT_LINES, MAX_TAIL_PARTIAL_BYTES, MAX_TAIL_READ_BYTES_PER_TICK,
};
use crate::util::error::TailError;
use rayon::ThreadPool;
use std::any::Any;
use std::fs::{File, Metadata};
use std::io::{Read, Seek, SeekFrom};
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

// =============================================================================
// Pipeline context
// =============================================================================

/// Everything the tail thread and its line workers share.
#[derive(Clone)]
pub struct TailContext {
    pub pool: Arc<ThreadPool>,
    pub ignore: Arc<IgnoreSet>,
    pub notifier: Arc<Notifier>,
    /// Unordered side channel to the consumer (sound failures).
    pub bus: BusSender,
    pub poll_interval: Duration,
}

// =============================================================================
// TailManager
// =============================================================================

/// Manages a live tail on a background thread.
pub struct TailManager {
    cancel_flag: Option<Arc<AtomicBool>>,
    handle: Option<JoinHandle<()>>,
}

impl TailManager {
    pub fn new() -> Self {
        Self {
            cancel_flag: None,
            handle: None,
        }
    }

    /// Start tailing `path` from its current end (new content only).
    ///
    /// Results are delivered in file order to `ctx.bus`. If a tail is
    /// already running it is stopped first.
    pub fn start(&mut self, path: PathBuf, ctx: TailContext) {
        self.stop();

        let cancel = Arc::new(AtomicBool::new(false));
        self.cancel_flag = Some(Arc::clone(&cancel));

        tracing::info!(file = %path.display(), "Live tail started");
        self.handle = Some(std::thread::spawn(move || {
            run_tail_watcher(path, ctx, cancel);
        }));
    }

    /// Request the background thread to stop.
    ///
    /// Does not join: the thread notices the flag on its next iteration and
    /// sends `TailProgress::Stopped` before terminating.
    pub fn stop(&mut self) {
        if let Some(flag) = self.cancel_flag.take() {
            flag.store(true, Ordering::SeqCst);
            tracing::info!("Live tail stop requested");
        }
        self.handle = None;
    }

    /// The consumer has seen `Stopped`; release the finished thread.
    pub fn mark_stopped(&mut self) {
        self.cancel_flag = None;
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("Tail thread panicked");
            }
        }
    }

    /// Returns `true` while a tail thread is running and not yet stopped.
    pub fn is_active(&self) -> bool {
        self.cancel_flag.is_some()
    }
}

impl Default for TailManager {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Per-file state (private to the background thread)
// =============================================================================

struct TailState {
    path: PathBuf,
    file: File,
    /// Byte position of the next unread byte.
    offset: u64,
    /// Bytes after the last newline seen: an in-progress line.
    partial: Vec<u8>,
    /// True when the last poll consumed everything the file held.
    at_end: bool,
}

/// Why the cursor went back to offset 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reset {
    /// Same file, now shorter than the offset.
    Truncated,
    /// The path names a different file than the open handle (rotation).
    Replaced,
}

/// Outcome of one poll of the log file.
#[derive(Debug, Default, PartialEq)]
struct PollOutcome {
    lines: Vec<String>,
    /// Set when an over-long partial line was discarded.
    overflow: Option<usize>,
    /// Set when the file was reopened from the start.
    reset: Option<Reset>,
}

impl TailState {
    /// Open `path` with the cursor at its current end.
    fn open_at_end(path: PathBuf) -> Result<Self, TailError> {
        let mut file = File::open(&path).map_err(|source| TailError::Open {
            path: path.clone(),
            source,
        })?;
        let offset = file
            .seek(SeekFrom::End(0))
            .map_err(|source| TailError::Read {
                path: path.clone(),
                source,
            })?;
        tracing::debug!(file = %path.display(), offset, "Tail: seeding initial offset");
        Ok(Self {
            path,
            file,
            offset,
            partial: Vec::new(),
            at_end: true,
        })
    }

    fn poll(&mut self) -> Result<PollOutcome, TailError> {
        let mut outcome = PollOutcome::default();

        // 1. Stat through the path, so deletion and replacement are noticed.
        let path_meta = std::fs::metadata(&self.path).map_err(|source| TailError::Stat {
            path: self.path.clone(),
            source,
        })?;
        let current_size = path_meta.len();

        // 2. Replacement or truncation: reopen and start over.
        let replaced = match self.file.metadata() {
            Ok(handle_meta) => !same_file(&handle_meta, &path_meta),
            Err(_) => true,
        };
        let reset = if replaced {
            Some(Reset::Replaced)
        } else if current_size < self.offset {
            Some(Reset::Truncated)
        } else {
            None
        };
        if let Some(reason) = reset {
            tracing::info!(
                file = %self.path.display(),
                ?reason,
                old_offset = self.offset,
                new_size = current_size,
                "Tail: reopening at offset 0"
            );
            self.file = File::open(&self.path).map_err(|source| TailError::Open {
                path: self.path.clone(),
                source,
            })?;
            self.offset = 0;
            self.partial.clear();
            outcome.reset = Some(reason);
        }

        // 3. Nothing new.
        if current_size <= self.offset {
            self.at_end = true;
            return Ok(outcome);
        }

        // 4. Read new bytes, capped per tick.
        let available = current_size - self.offset;
        let limit = available.min(MAX_TAIL_READ_BYTES_PER_TICK as u64);
        let new_bytes = self.read_at_offset(limit)?;
        self.offset += new_bytes.len() as u64;
        self.at_end = new_bytes.is_empty() || available <= limit;
        if new_bytes.is_empty() {
            return Ok(outcome);
        }

        // 5. Split complete lines off the carry.
        self.partial.extend_from_slice(&new_bytes);
        if let Some(nl_pos) = self.partial.iter().rposition(|&b| b == b'\n') {
            let rest = self.partial.split_off(nl_pos + 1);
            let complete = std::mem::replace(&mut self.partial, rest);
            outcome.lines = complete
                .split(|&b| b == b'\n')
                .filter(|raw| !raw.is_empty())
                .map(decode_line)
                .collect();
        }

        // 6. Bound the carry.
        if self.partial.len() > MAX_TAIL_PARTIAL_BYTES {
            outcome.overflow = Some(self.partial.len());
            tracing::warn!(
                file = %self.path.display(),
                bytes = self.partial.len(),
                "Tail: partial line exceeds limit, discarding"
            );
            self.partial.clear();
        }

        Ok(outcome)
    }

    fn read_at_offset(&mut self, limit: u64) -> Result<Vec<u8>, TailError> {
        let mut buf = Vec::with_capacity(limit as usize);
        self.file
            .seek(SeekFrom::Start(self.offset))
            .and_then(|_| (&mut self.file).take(limit).read_to_end(&mut buf))
            .map_err(|source| TailError::Read {
                path: self.path.clone(),
                source,
            })?;
        Ok(buf)
    }
}

/// True if both metadata describe the same file on disk.
#[cfg(unix)]
fn same_file(a: &Metadata, b: &Metadata) -> bool {
    use std::os::unix::fs::MetadataExt;
    a.dev() == b.dev() && a.ino() == b.ino()
}

/// True if both metadata describe the same file on disk.
///
/// Without a stable file id, the creation time stands in for identity.
#[cfg(not(unix))]
fn same_file(a: &Metadata, b: &Metadata) -> bool {
    match (a.created(), b.created()) {
        (Ok(x), Ok(y)) => x == y,
        _ => true,
    }
}

/// Lossy UTF-8 decode with any trailing `\r` removed.
fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

// =============================================================================
// Background tail watcher
// =============================================================================

/// Background poll loop for one log file.
fn run_tail_watcher(path: PathBuf, ctx: TailContext, cancel: Arc<AtomicBool>) {
    let sequencer = bus::spawn_sequencer(ctx.bus.clone());
    let mut next_seq: u64 = 0;

    macro_rules! send {
        ($msg:expr) => {{
            let seq = next_seq;
            next_seq += 1;
            if sequencer.work_tx.send((seq, Some($msg))).is_err() {
                // Consumer gone: exit silently.
                return;
            }
        }};
    }

    let mut state = match TailState::open_at_end(path.clone()) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(file = %path.display(), error = %e, "Tail: open failed");
            send!(TailProgress::error(e.to_string()));
            send!(TailProgress::Stopped);
            return;
        }
    };
    send!(TailProgress::Started { path: path.clone() });

    loop {
        if cancel.load(Ordering::SeqCst) {
            send!(TailProgress::Stopped);
            return;
        }

        let outcome = match state.poll() {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(file = %path.display(), error = %e, "Tail: stopping");
                send!(TailProgress::error(e.to_string()));
                send!(TailProgress::Stopped);
                return;
            }
        };

        match outcome.reset {
            Some(Reset::Replaced) => {
                send!(TailProgress::info(
                    "Log file was replaced; reading the new file from the start."
                ));
            }
            Some(Reset::Truncated) => {
                send!(TailProgress::warning("Log file was truncated; reading from the start."));
            }
            None => {}
        }

        if !outcome.lines.is_empty() {
            tracing::trace!(count = outcome.lines.len(), "Tail: dispatching lines");
        }
        for line in outcome.lines {
            if !wait_for_window(next_seq, &sequencer, &cancel) {
                // Stopped or consumer gone: the flag check above reports it.
                break;
            }
            let seq = next_seq;
            next_seq += 1;
            dispatch_line(seq, line, &ctx, &sequencer.work_tx);
        }

        if let Some(bytes) = outcome.overflow {
            send!(TailProgress::warning(format!(
                "Discarded an incomplete line of {bytes} bytes (too long)."
            )));
        }

        if sequencer.is_finished() {
            tracing::debug!("Tail: sequencer gone, exiting");
            return;
        }
        if state.at_end {
            std::thread::sleep(ctx.poll_interval);
        }
    }
}

/// Block until `seq` is within MAX_IN_FLIGHT_LINES of what the sequencer has
/// released. Returns false if the tail should stop instead.
fn wait_for_window(seq: u64, sequencer: &Sequencer, cancel: &AtomicBool) -> bool {
    while seq.saturating_sub(sequencer.released()) >= MAX_IN_FLIGHT_LINES {
        if cancel.load(Ordering::SeqCst) || sequencer.is_finished() {
            return false;
        }
        std::thread::sleep(Duration::from_millis(IN_FLIGHT_WAIT_MS));
    }
    true
}

/// Hand one line to the worker pool. The slot is always filled, even when
/// processing panics, so the sequencer never stalls.
fn dispatch_line(seq: u64, line: String, ctx: &TailContext, work_tx: &WorkSender) {
    let ignore = Arc::clone(&ctx.ignore);
    let notifier = Arc::clone(&ctx.notifier);
    let bus = ctx.bus.clone();
    let work_tx = work_tx.clone();

    ctx.pool.spawn(move || {
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            process_line(&line, &ignore, &notifier, &bus)
        }))
        .unwrap_or_else(|payload| {
            let reason = panic_message(payload.as_ref());
            tracing::error!(seq, reason = %reason, "Line worker panicked");
            Some(TailProgress::error(format!("Error processing line: {reason}")))
        });
        // Sequencer gone means the consumer is gone.
        let _ = work_tx.send((seq, result));
    });
}

/// Parse, filter and notify for one raw line.
///
/// `None` means the line is dropped: unparseable or from an ignored speaker.
pub fn process_line(
    line: &str,
    ignore: &IgnoreSet,
    notifier: &Notifier,
    bus: &BusSender,
) -> Option<TailProgress> {
    let Some(event) = parser::parse_line(line) else {
        tracing::trace!(line = %parser::line_preview(line), "Dropped unparseable line");
        return None;
    };
    if ignore.rejects(&event) {
        tracing::trace!(speaker = event.speaker().unwrap_or_default(), "Dropped ignored speaker");
        return None;
    }
    notifier.on_event(&event, bus);
    Some(TailProgress::Chat(event))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
