// ChatSleuth - app/notifier.rs
//
// Incoming-whisper notification: unread counting, sound and attention.
//
// `on_event` runs on the line workers. It only counts and dispatches: sound
// playback is spawned onto a dedicated playback pool, separate from the line
// workers, so a slow player never delays line processing. Failures come back
// to the consumer as Error notices offered to the bus with `try_send`.

use crate::app::bus::BusSender;
use crate::core::model::{ChatEvent, TailProgress};
use crate::platform::config::AppConfig;
use crate::platform::sound::SoundPlayer;
use rayon::ThreadPool;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc};

// =============================================================================
// Unread counter
// =============================================================================

/// Number of incoming whispers since the user last looked at the window.
#[derive(Debug, Default)]
pub struct UnreadCounter {
    count: AtomicU64,
}

impl UnreadCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one and return the new count.
    pub fn increment(&self) -> u64 {
        self.count.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn reset(&self) {
        self.count.store(0, Ordering::SeqCst);
    }

    pub fn get(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }
}

// =============================================================================
// Host window
// =============================================================================

/// The window hosting the chat view, as far as notifications care.
pub trait HostWindow: Send + Sync {
    fn is_minimized(&self) -> bool;

    /// Flash the taskbar entry or equivalent.
    fn request_attention(&self);
}

/// No window at all (CLI host). Never minimized, so never flashed.
#[derive(Debug, Default, Clone, Copy)]
pub struct Headless;

impl HostWindow for Headless {
    fn is_minimized(&self) -> bool {
        false
    }

    fn request_attention(&self) {}
}

// =============================================================================
// Notifier
// =============================================================================

/// Notification switches taken from config at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotifySettings {
    pub enabled: bool,
    /// 0-100.
    pub volume: u8,
}

impl NotifySettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            enabled: config.notify_enabled,
            volume: config.notify_volume,
        }
    }
}

pub struct Notifier {
    settings: NotifySettings,
    unread: Arc<UnreadCounter>,
    player: Arc<dyn SoundPlayer>,
    window: Arc<dyn HostWindow>,
    /// Playback pool. Never the line-worker pool.
    sound_pool: Arc<ThreadPool>,
}

impl Notifier {
    pub fn new(
        settings: NotifySettings,
        unread: Arc<UnreadCounter>,
        player: Arc<dyn SoundPlayer>,
        window: Arc<dyn HostWindow>,
        sound_pool: Arc<ThreadPool>,
    ) -> Self {
        Self {
            settings,
            unread,
            player,
            window,
            sound_pool,
        }
    }

    pub fn settings(&self) -> NotifySettings {
        self.settings
    }

    /// Inspect one admitted event. Returns true if it was an incoming
    /// whisper (counted, and alerted when notifications are enabled).
    ///
    /// Callers must apply the ignore filter first: ignored speakers are
    /// never counted.
    pub fn on_event(&self, event: &ChatEvent, bus: &BusSender) -> bool {
        if !event.is_incoming_whisper() {
            return false;
        }

        let unread = self.unread.increment();
        tracing::debug!(
            speaker = event.speaker().unwrap_or_default(),
            unread,
            "Incoming whisper"
        );

        if self.settings.enabled {
            self.alert(bus);
        }
        true
    }

    /// Play the sound and request attention if the window is minimized.
    /// Does not touch the unread counter.
    pub fn alert(&self, bus: &BusSender) {
        let player = Arc::clone(&self.player);
        let volume = self.settings.volume;
        let bus = bus.clone();
        self.sound_pool.spawn(move || {
            if let Err(e) = player.play(volume) {
                tracing::warn!(error = %e, "Notification sound failed");
                match bus.try_send(TailProgress::error(e.to_string())) {
                    Ok(()) | Err(mpsc::TrySendError::Disconnected(_)) => {}
                    Err(mpsc::TrySendError::Full(_)) => {
                        tracing::warn!("Event bus full, sound failure notice dropped");
                    }
                }
            }
        });

        if self.window.is_minimized() {
            self.window.request_attention();
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::model::{Category, Severity};
    use crate::util::error::NotifyError;
    use std::path::PathBuf;
    use std::sync::atomic::AtomicBool;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records every play request; optionally fails each one.
    #[derive(Default)]
    pub(crate) struct RecordingPlayer {
        pub volumes: Mutex<Vec<u8>>,
        pub fail: bool,
    }

    impl SoundPlayer for RecordingPlayer {
        fn play(&self, volume: u8) -> Result<(), NotifyError> {
            self.volumes
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .push(volume);
            if self.fail {
                Err(NotifyError::SoundNotFound {
                    path: PathBuf::from("missing.wav"),
                })
            } else {
                Ok(())
            }
        }
    }

    #[derive(Default)]
    pub(crate) struct FakeWindow {
        pub minimized: AtomicBool,
        pub attention_requests: AtomicU64,
    }

    impl HostWindow for FakeWindow {
        fn is_minimized(&self) -> bool {
            self.minimized.load(Ordering::SeqCst)
        }

        fn request_attention(&self) {
            self.attention_requests.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Fixture {
        notifier: Notifier,
        unread: Arc<UnreadCounter>,
        player: Arc<RecordingPlayer>,
        window: Arc<FakeWindow>,
        pool: Arc<ThreadPool>,
    }

    fn fixture(enabled: bool, fail: bool) -> Fixture {
        let unread = Arc::new(UnreadCounter::new());
        let player = Arc::new(RecordingPlayer {
            fail,
            ..Default::default()
        });
        let window = Arc::new(FakeWindow::default());
        let pool = Arc::new(
            rayon::ThreadPoolBuilder::new()
                .num_threads(1)
                .build()
                .unwrap(),
        );
        let notifier = Notifier::new(
            NotifySettings {
                enabled,
                volume: 40,
            },
            Arc::clone(&unread),
            Arc::clone(&player) as Arc<dyn SoundPlayer>,
            Arc::clone(&window) as Arc<dyn HostWindow>,
            Arc::clone(&pool),
        );
        Fixture {
            notifier,
            unread,
            player,
            window,
            pool,
        }
    }

    fn whisper(marker: &str) -> ChatEvent {
        ChatEvent::chat(
            Category::Whisper,
            Some(marker.to_string()),
            Some("Alice".to_string()),
            "hi",
            Some("12:00".to_string()),
        )
    }

    /// Wait for queued pool work by running a marker job behind it.
    fn settle(pool: &ThreadPool) {
        let (tx, rx) = mpsc::channel();
        pool.spawn(move || {
            let _ = tx.send(());
        });
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
    }

    #[test]
    fn test_incoming_whisper_counts_and_plays() {
        let f = fixture(true, false);
        let (bus, _rx) = mpsc::sync_channel(16);
        assert!(f.notifier.on_event(&whisper("@From "), &bus));
        settle(&f.pool);
        assert_eq!(f.unread.get(), 1);
        assert_eq!(*f.player.volumes.lock().unwrap(), vec![40]);
    }

    #[test]
    fn test_outgoing_whisper_and_other_categories_are_ignored() {
        let f = fixture(true, false);
        let (bus, _rx) = mpsc::sync_channel(16);
        assert!(!f.notifier.on_event(&whisper("@To "), &bus));
        assert!(!f.notifier.on_event(&ChatEvent::system("hello"), &bus));
        settle(&f.pool);
        assert_eq!(f.unread.get(), 0);
        assert!(f.player.volumes.lock().unwrap().is_empty());
    }

    #[test]
    fn test_disabled_notifications_still_count() {
        let f = fixture(false, false);
        let (bus, _rx) = mpsc::sync_channel(16);
        assert!(f.notifier.on_event(&whisper("@From "), &bus));
        settle(&f.pool);
        assert_eq!(f.unread.get(), 1);
        assert!(f.player.volumes.lock().unwrap().is_empty());
    }

    #[test]
    fn test_attention_only_when_minimized() {
        let f = fixture(true, false);
        let (bus, _rx) = mpsc::sync_channel(16);
        f.notifier.on_event(&whisper("@From "), &bus);
        assert_eq!(f.window.attention_requests.load(Ordering::SeqCst), 0);

        f.window.minimized.store(true, Ordering::SeqCst);
        f.notifier.on_event(&whisper("@From "), &bus);
        assert_eq!(f.window.attention_requests.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_player_failure_becomes_error_notice() {
        let f = fixture(true, true);
        let (bus, rx) = mpsc::sync_channel(16);
        f.notifier.alert(&bus);
        match rx.recv_timeout(Duration::from_secs(5)).unwrap() {
            TailProgress::Notice { message, severity } => {
                assert_eq!(severity, Severity::Error);
                assert!(message.starts_with("Sound not found"), "{message}");
            }
            other => panic!("expected notice, got {other:?}"),
        }
        assert_eq!(f.unread.get(), 0);
    }

    #[test]
    fn test_failure_notice_on_full_bus_is_dropped_without_blocking() {
        let f = fixture(true, true);
        let (bus, rx) = mpsc::sync_channel(1);
        bus.send(TailProgress::warning("filler")).unwrap();

        f.notifier.alert(&bus);
        // The playback thread must come free even though the bus is full.
        settle(&f.pool);

        assert_eq!(f.player.volumes.lock().unwrap().len(), 1);
        assert_eq!(rx.try_iter().count(), 1);
    }

    #[test]
    fn test_unread_reset() {
        let counter = UnreadCounter::new();
        assert_eq!(counter.increment(), 1);
        assert_eq!(counter.increment(), 2);
        counter.reset();
        assert_eq!(counter.get(), 0);
    }
}
