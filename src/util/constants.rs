// ChatSleuth - util/constants.rs
//
// Single source of truth for all named constants, limits, and defaults.
// Every configurable value has a default plus a validated MIN/MAX range.

// =============================================================================
// Application metadata
// =============================================================================

/// Application display name.
pub const APP_NAME: &str = "ChatSleuth";

/// Application identifier used for config/data directories.
pub const APP_ID: &str = "ChatSleuth";

/// Current application version (updated by release script).
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// Live tail limits
// =============================================================================

/// How long the tail loop sleeps when no new complete line is available (ms).
/// Bounds both idle CPU usage and whisper notification latency.
pub const DEFAULT_TAIL_POLL_INTERVAL_MS: u64 = 100;

/// Minimum user-configurable tail poll interval (ms).
pub const MIN_TAIL_POLL_INTERVAL_MS: u64 = 10;

/// Maximum user-configurable tail poll interval (ms).
pub const MAX_TAIL_POLL_INTERVAL_MS: u64 = 10_000; // 10 s

/// Maximum bytes read from the log in one poll tick.
/// Prevents a large burst of new content from stalling the stop-flag check.
pub const MAX_TAIL_READ_BYTES_PER_TICK: usize = 512 * 1_024; // 512 KiB

/// Maximum accumulated size of the in-progress (no newline yet) line buffer.
///
/// Guards against unbounded growth when the log produces no newlines, e.g. a
/// binary file opened by mistake. The fragment is discarded with a warning.
pub const MAX_TAIL_PARTIAL_BYTES: usize = MAX_TAIL_READ_BYTES_PER_TICK * 4; // 2 MiB

// =============================================================================
// Line processing
// =============================================================================

/// Default number of worker threads for per-line classification.
pub const DEFAULT_WORKER_THREADS: usize = 4;

/// Minimum user-configurable worker thread count.
pub const MIN_WORKER_THREADS: usize = 1;

/// Maximum user-configurable worker thread count.
pub const MAX_WORKER_THREADS: usize = 32;

/// Maximum lines dispatched to workers but not yet released in file order.
///
/// Bounds the reorder buffer and the worker queue. The tail thread waits for
/// the sequencer to catch up before dispatching past this window.
pub const MAX_IN_FLIGHT_LINES: u64 = 4_096;

/// Sleep between checks while the tail thread waits on the in-flight window (ms).
pub const IN_FLIGHT_WAIT_MS: u64 = 2;

/// Threads dedicated to notification sound playback. Playback blocks for the
/// length of the clip, so it never shares the line workers.
pub const SOUND_PLAYER_THREADS: usize = 1;

/// Length of the `HH:MM` clock prefix kept from a log line's time token.
pub const TIMESTAMP_PREFIX_LEN: usize = 5;

/// Maximum length of a log line included in debug output.
pub const DEBUG_MAX_LINE_PREVIEW: usize = 200;

// =============================================================================
// History limits
// =============================================================================

/// Default number of events retained per chat category. The history
/// capacity is the sum of the per-category limits.
pub const DEFAULT_CATEGORY_LIMIT: usize = 50;

/// Minimum user-configurable per-category limit.
pub const MIN_CATEGORY_LIMIT: usize = 1;

/// Maximum user-configurable per-category limit.
pub const MAX_CATEGORY_LIMIT: usize = 10_000;

/// Capacity of the consumer-facing event bus.
///
/// When full, the sequencer blocks on send until the consumer pumps, which in
/// turn holds the tail thread at the in-flight window. Memory stays bounded
/// however slowly the consumer drains.
pub const EVENT_BUS_CAPACITY: usize = 1_024;

/// Maximum number of bus messages applied to history per consumer pump.
/// Remaining messages stay queued for the next pump so a burst cannot stall
/// the presentation refresh.
pub const MAX_BUS_MESSAGES_PER_PUMP: usize = 200;

// =============================================================================
// Notifications
// =============================================================================

/// Default whisper notification volume (percent).
pub const DEFAULT_NOTIFY_VOLUME: u8 = 100;

/// Maximum notification volume (percent).
pub const MAX_NOTIFY_VOLUME: u8 = 100;

/// Upper bound of ffplay's `-volume` argument.
pub const FFPLAY_MAX_VOLUME: u16 = 256;

/// Default notification sound, relative to the application directory.
pub const DEFAULT_NOTIFY_SOUND: &str = "bin/notify.wav";

/// Default audio player binary, relative to the application directory.
#[cfg(target_os = "windows")]
pub const DEFAULT_PLAYER_BINARY: &str = "bin/ffplay.exe";

/// Default audio player binary (resolved via PATH on non-Windows hosts).
#[cfg(not(target_os = "windows"))]
pub const DEFAULT_PLAYER_BINARY: &str = "ffplay";

/// Speaker used by the "test notification" action.
pub const TEST_WHISPER_SPEAKER: &str = "ChatSleuth";

/// Message used by the "test notification" action.
pub const TEST_WHISPER_MESSAGE: &str = "Test whisper from ChatSleuth!";

// =============================================================================
// Logging
// =============================================================================

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

// =============================================================================
// Configuration
// =============================================================================

/// Configuration file name.
pub const CONFIG_FILE_NAME: &str = "config.toml";
