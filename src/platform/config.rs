// ChatSleuth - platform/config.rs
//
// Platform-specific configuration directory resolution and config.toml
// loading with startup validation.
//
// Uses the `directories` crate for XDG (Linux), AppData (Windows),
// Library (macOS) compliance.
//
// The validated `AppConfig` is an immutable value handed to each component at
// construction; nothing reads settings from global state.

use crate::core::filter::IgnoreSet;
use crate::core::model::Category;
use crate::util::constants;
use crate::util::error::ConfigError;
use directories::ProjectDirs;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// Resolved platform paths for ChatSleuth configuration.
#[derive(Debug, Clone)]
pub struct PlatformPaths {
    /// Configuration directory (e.g. ~/.config/chatsleuth/ or %APPDATA%\ChatSleuth\config\)
    pub config_dir: PathBuf,
}

impl PlatformPaths {
    /// Resolve platform-appropriate paths.
    ///
    /// Falls back to current directory if platform dirs cannot be determined.
    pub fn resolve() -> Self {
        if let Some(proj_dirs) = ProjectDirs::from("", "", constants::APP_ID) {
            let config_dir = proj_dirs.config_dir().to_path_buf();
            tracing::debug!(config = %config_dir.display(), "Platform paths resolved");
            Self { config_dir }
        } else {
            tracing::warn!("Could not determine platform directories, using current directory");
            Self {
                config_dir: PathBuf::from("."),
            }
        }
    }
}

/// Resolve a path from config relative to the executable's directory.
///
/// Absolute paths are returned unchanged. A relative path is anchored next to
/// the executable when it exists there (the bundled `bin/` layout); otherwise
/// it is returned as given so bare program names still resolve through PATH.
pub fn resolve_app_relative(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    if let Some(exe_dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        let candidate = exe_dir.join(path);
        if candidate.exists() {
            return candidate;
        }
    }
    path.to_path_buf()
}

// =============================================================================
// config.toml loading and validation
// =============================================================================

/// Raw deserialisable shape of config.toml.
///
/// Unknown keys are silently ignored for forward compatibility -- a newer
/// config file can be used with an older binary without crashing.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct RawConfig {
    /// `[log]` section.
    pub log: LogSection,
    /// `[notifications]` section.
    pub notifications: NotificationsSection,
    /// `[filter]` section.
    pub filter: FilterSection,
    /// `[history]` section.
    pub history: HistorySection,
    /// `[processing]` section.
    pub processing: ProcessingSection,
    /// `[logging]` section.
    pub logging: LoggingSection,
}

/// `[log]` config section: the chat log being tailed.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct LogSection {
    /// Path to the client's chat log.
    pub path: Option<String>,
    /// Idle sleep between polls in ms.
    pub poll_interval_ms: Option<u64>,
}

/// `[notifications]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct NotificationsSection {
    /// Play a sound for incoming whispers.
    pub enabled: Option<bool>,
    /// Volume in percent. Signed so negative values can be reported.
    pub volume: Option<i64>,
    /// Sound file to play.
    pub sound_file: Option<String>,
    /// Audio player binary (ffplay).
    pub player: Option<String>,
}

/// `[filter]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct FilterSection {
    /// Speakers whose lines are dropped entirely.
    pub ignored_speakers: Option<Vec<String>>,
}

/// `[history]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct HistorySection {
    /// Retention limit per category name. Signed so negative values can be
    /// reported.
    pub limits: Option<HashMap<String, i64>>,
}

/// `[processing]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct ProcessingSection {
    /// Number of per-line worker threads.
    pub worker_threads: Option<usize>,
}

/// `[logging]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub level: Option<String>,
}

/// Validated application configuration derived from `config.toml`.
///
/// All values are validated against named constants at load time.
/// Invalid values produce actionable warnings and fall back to defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    // -- Log --
    /// Chat log to tail (CLI argument takes precedence).
    pub log_path: Option<PathBuf>,
    /// Idle sleep between polls in ms.
    pub poll_interval_ms: u64,

    // -- Notifications --
    /// Whether incoming whispers play a sound and request attention.
    pub notify_enabled: bool,
    /// Notification volume, 0-100.
    pub notify_volume: u8,
    /// Sound file (relative paths are anchored at the executable).
    pub sound_file: PathBuf,
    /// Audio player binary.
    pub player: PathBuf,

    // -- Filter --
    /// Speakers whose lines are dropped.
    pub ignored_speakers: Vec<String>,

    // -- History --
    /// Retention limit per category; the history capacity is their sum.
    pub category_limits: BTreeMap<Category, usize>,

    // -- Processing --
    /// Per-line worker threads.
    pub worker_threads: usize,

    // -- Logging --
    /// Logging level string (for init before tracing is available).
    pub log_level: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_path: None,
            poll_interval_ms: constants::DEFAULT_TAIL_POLL_INTERVAL_MS,
            notify_enabled: true,
            notify_volume: constants::DEFAULT_NOTIFY_VOLUME,
            sound_file: PathBuf::from(constants::DEFAULT_NOTIFY_SOUND),
            player: PathBuf::from(constants::DEFAULT_PLAYER_BINARY),
            ignored_speakers: Vec::new(),
            category_limits: Category::all()
                .iter()
                .map(|c| (*c, constants::DEFAULT_CATEGORY_LIMIT))
                .collect(),
            worker_threads: constants::DEFAULT_WORKER_THREADS,
            log_level: None,
        }
    }
}

impl AppConfig {
    /// Total history capacity: the per-category limits summed.
    pub fn history_capacity(&self) -> usize {
        self.category_limits.values().sum()
    }

    /// Build the admission filter from `ignored_speakers`.
    pub fn ignore_set(&self) -> IgnoreSet {
        IgnoreSet::new(self.ignored_speakers.iter().cloned())
    }
}

/// Load and validate `config.toml` from the platform config directory.
///
/// Returns `AppConfig` with validated values and a list of non-fatal warnings.
/// If the file does not exist, returns defaults with no warnings (first-run).
/// If the file is unreadable or unparseable, returns defaults with a warning:
/// the application still starts but the user is informed.
pub fn load_config(config_dir: &Path) -> (AppConfig, Vec<String>) {
    let config_path = config_dir.join(constants::CONFIG_FILE_NAME);

    if !config_path.exists() {
        tracing::debug!(path = %config_path.display(), "No config.toml found; using defaults");
        return (AppConfig::default(), Vec::new());
    }

    match load_config_file(&config_path) {
        Ok(result) => result,
        Err(e) => {
            let msg = format!("{e}. Using defaults.");
            tracing::warn!("{}", msg);
            (AppConfig::default(), vec![msg])
        }
    }
}

/// Load and validate an explicitly chosen config file.
///
/// Unlike [`load_config`], a missing or unparseable file is an error: the
/// user named it, so silently falling back to defaults would hide a typo.
/// Out-of-range values are still only warnings.
pub fn load_config_file(path: &Path) -> Result<(AppConfig, Vec<String>), ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let raw: RawConfig = toml::from_str(&content).map_err(|source| ConfigError::TomlParse {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(path = %path.display(), "Loaded config.toml");
    Ok(validate(raw))
}

/// Validate each field against named constants, accumulating all warnings.
pub fn validate(raw: RawConfig) -> (AppConfig, Vec<String>) {
    let mut config = AppConfig::default();
    let mut warnings: Vec<String> = Vec::new();

    // -- Log: path --
    if let Some(path) = raw.log.path {
        if !path.trim().is_empty() {
            config.log_path = Some(PathBuf::from(path.trim()));
        }
    }

    // -- Log: poll_interval_ms --
    if let Some(ms) = raw.log.poll_interval_ms {
        if (constants::MIN_TAIL_POLL_INTERVAL_MS..=constants::MAX_TAIL_POLL_INTERVAL_MS)
            .contains(&ms)
        {
            config.poll_interval_ms = ms;
        } else {
            warnings.push(range_warning(
                "log.poll_interval_ms",
                ms.to_string(),
                format!(
                    "{}-{}",
                    constants::MIN_TAIL_POLL_INTERVAL_MS,
                    constants::MAX_TAIL_POLL_INTERVAL_MS
                ),
                constants::DEFAULT_TAIL_POLL_INTERVAL_MS.to_string(),
            ));
        }
    }

    // -- Notifications --
    if let Some(enabled) = raw.notifications.enabled {
        config.notify_enabled = enabled;
    }

    if let Some(volume) = raw.notifications.volume {
        match u8::try_from(volume) {
            Ok(v) if v <= constants::MAX_NOTIFY_VOLUME => config.notify_volume = v,
            _ => warnings.push(range_warning(
                "notifications.volume",
                volume.to_string(),
                format!("0-{}", constants::MAX_NOTIFY_VOLUME),
                constants::DEFAULT_NOTIFY_VOLUME.to_string(),
            )),
        }
    }

    if let Some(sound) = raw.notifications.sound_file {
        if !sound.trim().is_empty() {
            config.sound_file = PathBuf::from(sound.trim());
        }
    }

    if let Some(player) = raw.notifications.player {
        if !player.trim().is_empty() {
            config.player = PathBuf::from(player.trim());
        }
    }

    // -- Filter: ignored_speakers --
    if let Some(speakers) = raw.filter.ignored_speakers {
        for speaker in speakers {
            if speaker.is_empty() {
                warnings.push("[filter] ignored_speakers contains an empty name; skipped.".into());
            } else if !config.ignored_speakers.contains(&speaker) {
                config.ignored_speakers.push(speaker);
            }
        }
    }

    // -- History: limits --
    if let Some(limits) = raw.history.limits {
        for (name, limit) in limits {
            let Some(category) = Category::from_label(&name) else {
                warnings.push(format!(
                    "[history] limits has unknown category \"{name}\". Valid categories: {}.",
                    Category::all()
                        .iter()
                        .map(Category::label)
                        .collect::<Vec<_>>()
                        .join(", ")
                ));
                continue;
            };
            match usize::try_from(limit) {
                Ok(l)
                    if (constants::MIN_CATEGORY_LIMIT..=constants::MAX_CATEGORY_LIMIT)
                        .contains(&l) =>
                {
                    config.category_limits.insert(category, l);
                }
                _ => warnings.push(range_warning(
                    &format!("history.limits.{category}"),
                    limit.to_string(),
                    format!(
                        "{}-{}",
                        constants::MIN_CATEGORY_LIMIT,
                        constants::MAX_CATEGORY_LIMIT
                    ),
                    constants::DEFAULT_CATEGORY_LIMIT.to_string(),
                )),
            }
        }
    }

    // -- Processing: worker_threads --
    if let Some(threads) = raw.processing.worker_threads {
        if (constants::MIN_WORKER_THREADS..=constants::MAX_WORKER_THREADS).contains(&threads) {
            config.worker_threads = threads;
        } else {
            warnings.push(range_warning(
                "processing.worker_threads",
                threads.to_string(),
                format!(
                    "{}-{}",
                    constants::MIN_WORKER_THREADS,
                    constants::MAX_WORKER_THREADS
                ),
                constants::DEFAULT_WORKER_THREADS.to_string(),
            ));
        }
    }

    // -- Logging: level --
    if let Some(ref level) = raw.logging.level {
        let valid = ["error", "warn", "info", "debug", "trace"];
        if valid.contains(&level.to_lowercase().as_str()) {
            config.log_level = Some(level.clone());
        } else {
            warnings.push(format!(
                "[logging] level = \"{level}\" is not recognised. \
                 Valid values: error, warn, info, debug, trace. Using default (info).",
            ));
        }
    }

    if !warnings.is_empty() {
        tracing::warn!(
            count = warnings.len(),
            "Config validation produced warnings"
        );
    }

    (config, warnings)
}

/// Warning text for a value outside its named-constant range.
fn range_warning(field: &str, value: String, expected: String, default: String) -> String {
    let err = ConfigError::ValueOutOfRange {
        field: field.to_string(),
        value,
        expected,
    };
    format!("{err}. Using default ({default}).")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_text: &str) -> (AppConfig, Vec<String>) {
        let raw: RawConfig = toml::from_str(toml_text).expect("valid TOML");
        validate(raw)
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let (config, warnings) = parse("");
        assert!(warnings.is_empty());
        assert_eq!(config, AppConfig::default());
        assert_eq!(
            config.history_capacity(),
            constants::DEFAULT_CATEGORY_LIMIT * Category::all().len()
        );
    }

    #[test]
    fn test_full_config_is_applied() {
        let (config, warnings) = parse(
            r#"
            [log]
            path = "/games/logs/Client.txt"
            poll_interval_ms = 250

            [notifications]
            enabled = false
            volume = 40
            sound_file = "sounds/ping.wav"
            player = "/usr/bin/ffplay"

            [filter]
            ignored_speakers = ["Engine", "Spammer", "Engine"]

            [history]
            limits = { Whisper = 500, trade = 10 }

            [processing]
            worker_threads = 2

            [logging]
            level = "debug"
            "#,
        );
        assert!(warnings.is_empty(), "unexpected warnings: {warnings:?}");
        assert_eq!(config.log_path, Some(PathBuf::from("/games/logs/Client.txt")));
        assert_eq!(config.poll_interval_ms, 250);
        assert!(!config.notify_enabled);
        assert_eq!(config.notify_volume, 40);
        assert_eq!(config.sound_file, PathBuf::from("sounds/ping.wav"));
        assert_eq!(config.ignored_speakers, vec!["Engine", "Spammer"]);
        assert_eq!(config.category_limits[&Category::Whisper], 500);
        assert_eq!(config.category_limits[&Category::Trade], 10);
        assert_eq!(
            config.history_capacity(),
            500 + 10 + constants::DEFAULT_CATEGORY_LIMIT * 5
        );
        assert_eq!(config.worker_threads, 2);
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert!(config.ignore_set().is_ignored(Some("Spammer")));
    }

    #[test]
    fn test_out_of_range_values_warn_and_fall_back() {
        let (config, warnings) = parse(
            r#"
            [log]
            poll_interval_ms = 1

            [notifications]
            volume = 250

            [history]
            limits = { Local = 0, Shout = 5 }

            [processing]
            worker_threads = 0

            [logging]
            level = "verbose"
            "#,
        );
        assert_eq!(warnings.len(), 6, "{warnings:?}");
        assert_eq!(config.poll_interval_ms, constants::DEFAULT_TAIL_POLL_INTERVAL_MS);
        assert_eq!(config.notify_volume, constants::DEFAULT_NOTIFY_VOLUME);
        assert_eq!(
            config.category_limits[&Category::Local],
            constants::DEFAULT_CATEGORY_LIMIT
        );
        assert_eq!(config.worker_threads, constants::DEFAULT_WORKER_THREADS);
        assert!(warnings.iter().any(|w| w.contains("notifications.volume")));
        assert!(warnings.iter().any(|w| w.contains("Shout")));
    }

    #[test]
    fn test_negative_volume_is_rejected() {
        let (config, warnings) = parse("[notifications]\nvolume = -5\n");
        assert_eq!(warnings.len(), 1);
        assert_eq!(config.notify_volume, constants::DEFAULT_NOTIFY_VOLUME);
    }

    #[test]
    fn test_missing_default_config_is_silent() {
        let dir = tempfile::tempdir().unwrap();
        let (config, warnings) = load_config(dir.path());
        assert!(warnings.is_empty());
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_unparseable_default_config_warns() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(constants::CONFIG_FILE_NAME), "[log\npath=").unwrap();
        let (config, warnings) = load_config(dir.path());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("Config parse error"));
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_explicit_missing_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_config_file(&dir.path().join("nope.toml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_absolute_paths_resolve_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let abs = dir.path().join("notify.wav");
        assert_eq!(resolve_app_relative(&abs), abs);
        assert_eq!(
            resolve_app_relative(Path::new("definitely-not-bundled.wav")),
            PathBuf::from("definitely-not-bundled.wav")
        );
    }
}
