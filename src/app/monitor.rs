// ChatSleuth - app/monitor.rs
//
// Top-level application state: owns the history, unread counter, worker
// pool, sound pool and event bus, and wires them into a live tail.
// Owned by the host (the CLI in main.rs, or an embedding UI).
//
// The host calls `pump` from its own loop. Everything that reaches history
// goes through `pump`, so history order is bus order.

use crate::app::bus::EventBus;
use crate::app::notifier::{HostWindow, Notifier, NotifySettings, UnreadCounter};
use crate::app::tail::{TailContext, TailManager};
use crate::core::filter::{self, ChannelFilter, IgnoreSet};
use crate::core::history::HistoryBuffer;
use crate::core::model::{Category, ChatEvent, TailProgress, WHISPER_FROM_MARKER};
use crate::platform::config::AppConfig;
use crate::platform::sound::SoundPlayer;
use crate::util::constants::{APP_NAME, MAX_BUS_MESSAGES_PER_PUMP, SOUND_PLAYER_THREADS};
use crate::util::error::{Result, TailError};
use rayon::ThreadPool;
use std::path::Path;
use std::sync::{mpsc, Arc};
use std::time::Duration;

pub struct ChatMonitor {
    config: AppConfig,
    history: Arc<HistoryBuffer>,
    unread: Arc<UnreadCounter>,
    ignore: Arc<IgnoreSet>,
    notifier: Arc<Notifier>,
    pool: Arc<ThreadPool>,
    /// Present while a tail session is live. Replaced on every start so
    /// results from an earlier session can never leak into the next.
    bus: Option<EventBus>,
    tail: TailManager,

    /// Presentation-side category toggles.
    pub filter: ChannelFilter,
}

impl ChatMonitor {
    /// Build the pipeline. Fails only if a thread pool cannot start.
    pub fn new(
        config: AppConfig,
        player: Arc<dyn SoundPlayer>,
        window: Arc<dyn HostWindow>,
    ) -> Result<Self> {
        let threads = config.worker_threads;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("chatsleuth-worker-{i}"))
            .build()
            .map_err(|source| TailError::WorkerPool { threads, source })?;
        let pool = Arc::new(pool);

        // Playback blocks on the player process; keep it off the line workers.
        let sound_pool = rayon::ThreadPoolBuilder::new()
            .num_threads(SOUND_PLAYER_THREADS)
            .thread_name(|i| format!("chatsleuth-sound-{i}"))
            .build()
            .map_err(|source| TailError::WorkerPool {
                threads: SOUND_PLAYER_THREADS,
                source,
            })?;

        let unread = Arc::new(UnreadCounter::new());
        let notifier = Arc::new(Notifier::new(
            NotifySettings::from_config(&config),
            Arc::clone(&unread),
            player,
            window,
            Arc::new(sound_pool),
        ));

        tracing::info!(
            capacity = config.history_capacity(),
            workers = threads,
            ignored = config.ignored_speakers.len(),
            notify = config.notify_enabled,
            "Chat monitor ready"
        );

        Ok(Self {
            history: Arc::new(HistoryBuffer::new(config.history_capacity())),
            ignore: Arc::new(config.ignore_set()),
            config,
            unread,
            notifier,
            pool,
            bus: None,
            tail: TailManager::new(),
            filter: ChannelFilter::default(),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Begin tailing `path`, stopping any previous tail.
    pub fn start(&mut self, path: &Path) {
        self.stop();

        let bus = EventBus::new();
        let ctx = TailContext {
            pool: Arc::clone(&self.pool),
            ignore: Arc::clone(&self.ignore),
            notifier: Arc::clone(&self.notifier),
            bus: bus.sender(),
            poll_interval: Duration::from_millis(self.config.poll_interval_ms),
        };
        self.tail.start(path.to_path_buf(), ctx);
        self.bus = Some(bus);
    }

    /// Stop the tail and discard anything still in flight.
    pub fn stop(&mut self) {
        self.tail.stop();
        self.bus = None;
    }

    pub fn is_active(&self) -> bool {
        self.tail.is_active()
    }

    /// Drain pending bus messages into history, oldest first.
    ///
    /// Returns the messages taken so the host can render them. Bounded per
    /// call so a burst cannot starve the host loop.
    pub fn pump(&mut self) -> Vec<TailProgress> {
        let messages = match &self.bus {
            Some(bus) => bus.drain(MAX_BUS_MESSAGES_PER_PUMP),
            None => return Vec::new(),
        };

        for message in &messages {
            if let Some(event) = message.to_history_event() {
                self.history.append(event);
            }
            if matches!(message, TailProgress::Stopped) {
                tracing::info!("Live tail stopped");
                self.tail.mark_stopped();
            }
        }
        messages
    }

    /// Current history in arrival order.
    pub fn snapshot(&self) -> Vec<ChatEvent> {
        self.history.snapshot()
    }

    /// History restricted to the categories `self.filter` shows.
    pub fn visible_snapshot(&self) -> Vec<ChatEvent> {
        let events = self.history.snapshot();
        filter::apply_filters(&events, &self.filter)
            .into_iter()
            .map(|idx| events[idx].clone())
            .collect()
    }

    pub fn history(&self) -> &Arc<HistoryBuffer> {
        &self.history
    }

    pub fn unread(&self) -> u64 {
        self.unread.get()
    }

    /// The window regained focus: the user has seen the whispers.
    pub fn on_focus_gained(&self) {
        self.unread.reset();
    }

    /// The window was restored from minimized or the tray.
    pub fn on_restored(&self) {
        self.unread.reset();
    }

    /// Title decorated with the unread count when non-zero.
    pub fn window_title(&self) -> String {
        match self.unread.get() {
            0 => APP_NAME.to_string(),
            n => format!("{APP_NAME} ({n})"),
        }
    }

    /// Insert a synthetic incoming whisper stamped with the local time and
    /// alert as for a real one, without counting it as unread.
    ///
    /// Used to check the sound and volume settings.
    pub fn simulate_whisper(&self, speaker: &str, message: &str) -> ChatEvent {
        let event = ChatEvent::chat(
            Category::Whisper,
            Some(WHISPER_FROM_MARKER.to_string()),
            Some(speaker.to_string()),
            message,
            Some(chrono::Local::now().format("%H:%M").to_string()),
        );
        self.history.append(event.clone());

        if self.notifier.settings().enabled {
            // Without a live session failure notices have no consumer.
            let sender = self
                .bus
                .as_ref()
                .map(EventBus::sender)
                .unwrap_or_else(|| mpsc::sync_channel(1).0);
            self.notifier.alert(&sender);
        }
        event
    }
}

impl Drop for ChatMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::notifier::tests::{FakeWindow, RecordingPlayer};
    use crate::core::model::Severity;
    use std::io::Write;
    use std::time::Instant;

    fn monitor(config: AppConfig) -> (ChatMonitor, Arc<RecordingPlayer>) {
        let player = Arc::new(RecordingPlayer::default());
        let monitor = ChatMonitor::new(
            config,
            Arc::clone(&player) as Arc<dyn SoundPlayer>,
            Arc::new(FakeWindow::default()),
        )
        .unwrap();
        (monitor, player)
    }

    fn test_config() -> AppConfig {
        AppConfig {
            poll_interval_ms: 10,
            worker_threads: 2,
            ..AppConfig::default()
        }
    }

    /// Pump until `done` holds over everything received, or time out.
    fn pump_until(
        monitor: &mut ChatMonitor,
        done: impl Fn(&[TailProgress]) -> bool,
    ) -> Vec<TailProgress> {
        let deadline = Instant::now() + Duration::from_secs(10);
        let mut seen = Vec::new();
        while Instant::now() < deadline {
            seen.extend(monitor.pump());
            if done(&seen) {
                return seen;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        panic!("timed out; received {seen:?}");
    }

    fn started(seen: &[TailProgress]) -> bool {
        seen.iter()
            .any(|m| matches!(m, TailProgress::Started { .. }))
    }

    #[test]
    fn test_window_title_shows_unread() {
        let (monitor, _) = monitor(test_config());
        assert_eq!(monitor.window_title(), "ChatSleuth");
        monitor.unread.increment();
        monitor.unread.increment();
        assert_eq!(monitor.window_title(), "ChatSleuth (2)");
        monitor.on_focus_gained();
        assert_eq!(monitor.window_title(), "ChatSleuth");
    }

    #[test]
    fn test_simulated_whisper_alerts_without_counting() {
        let (monitor, player) = monitor(AppConfig {
            notify_volume: 70,
            ..test_config()
        });
        let event = monitor.simulate_whisper("Tester", "ping");
        assert!(event.is_incoming_whisper());
        assert_eq!(event.timestamp().map(str::len), Some(5));
        assert_eq!(monitor.snapshot(), vec![event]);
        assert_eq!(monitor.unread(), 0);

        let deadline = Instant::now() + Duration::from_secs(5);
        while player.volumes.lock().unwrap().is_empty() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(*player.volumes.lock().unwrap(), vec![70]);
    }

    #[test]
    fn test_simulated_whisper_respects_mute() {
        let (monitor, player) = monitor(AppConfig {
            notify_enabled: false,
            ..test_config()
        });
        monitor.simulate_whisper("Tester", "ping");
        std::thread::sleep(Duration::from_millis(50));
        assert!(player.volumes.lock().unwrap().is_empty());
    }

    #[test]
    fn test_missing_log_reports_error_then_stops() {
        let dir = tempfile::tempdir().unwrap();
        let (mut monitor, _) = monitor(test_config());
        monitor.start(&dir.path().join("absent.txt"));
        assert!(monitor.is_active());

        let seen = pump_until(&mut monitor, |s| s.contains(&TailProgress::Stopped));
        assert!(matches!(
            &seen[0],
            TailProgress::Notice { severity: Severity::Error, message } if message.starts_with("Cannot open log")
        ));
        assert!(!monitor.is_active());
        let history = monitor.snapshot();
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|e| e.category() == Category::System));
    }

    #[test]
    fn test_visible_snapshot_applies_channel_filter() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Client.txt");
        std::fs::write(&path, "").unwrap();

        let (mut monitor, _) = monitor(test_config());
        monitor.start(&path);
        pump_until(&mut monitor, started);

        let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(f, "2024/01/15 10:00:00 1 [INFO Client 1] $Seller: wts").unwrap();
        writeln!(f, "2024/01/15 10:00:01 2 [INFO Client 1] %Friend: inv").unwrap();
        drop(f);

        pump_until(&mut monitor, |s| {
            s.iter().filter(|m| matches!(m, TailProgress::Chat(_))).count() == 2
        });

        monitor.filter.set_visible(Category::Trade, false);
        monitor.filter.set_visible(Category::System, false);
        let visible = monitor.visible_snapshot();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].speaker(), Some("Friend"));
        assert_eq!(monitor.snapshot().len(), 3);
    }

    #[test]
    fn test_stop_discards_pending_results() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Client.txt");
        std::fs::write(&path, "").unwrap();

        let (mut monitor, _) = monitor(test_config());
        monitor.start(&path);
        monitor.stop();
        assert!(!monitor.is_active());
        assert!(monitor.pump().is_empty());
    }

    /// Blocks every play call until the test drops its release sender.
    struct StallingPlayer {
        release: std::sync::Mutex<mpsc::Receiver<()>>,
        started: std::sync::atomic::AtomicUsize,
    }

    impl SoundPlayer for StallingPlayer {
        fn play(&self, _volume: u8) -> std::result::Result<(), crate::util::error::NotifyError> {
            self.started
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            let release = self.release.lock().unwrap_or_else(|p| p.into_inner());
            let _ = release.recv_timeout(Duration::from_secs(10));
            Ok(())
        }
    }

    #[test]
    fn test_stalled_playback_does_not_hold_up_line_workers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Client.txt");
        std::fs::write(&path, "").unwrap();

        let (release_tx, release_rx) = mpsc::channel::<()>();
        let player = Arc::new(StallingPlayer {
            release: std::sync::Mutex::new(release_rx),
            started: Default::default(),
        });
        let mut monitor = ChatMonitor::new(
            AppConfig {
                worker_threads: 1,
                ..test_config()
            },
            Arc::clone(&player) as Arc<dyn SoundPlayer>,
            Arc::new(FakeWindow::default()),
        )
        .unwrap();
        monitor.start(&path);
        pump_until(&mut monitor, started);

        let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        for n in 0..5 {
            writeln!(f, "2024/01/15 10:00:0{n} 1 [INFO Client 1] @From Alice: w{n}").unwrap();
        }
        writeln!(f, "2024/01/15 10:00:09 1 [INFO Client 1] #Bob: after").unwrap();
        drop(f);

        // All six lines reach history while the first playback is still stuck.
        let seen = pump_until(&mut monitor, |s| {
            s.iter().filter(|m| matches!(m, TailProgress::Chat(_))).count() == 6
        });
        assert!(seen.iter().any(|m| matches!(
            m,
            TailProgress::Chat(e) if e.content() == "after"
        )));
        assert_eq!(monitor.unread(), 5);
        assert!(
            player.started.load(std::sync::atomic::Ordering::SeqCst) <= 1,
            "playback is serialised on its own thread"
        );
        drop(release_tx);
    }
}
