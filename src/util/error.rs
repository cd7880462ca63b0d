// ChatSleuth - util/error.rs
//
// Typed error hierarchy with context-preserving error chains.
// All errors preserve the causal chain for diagnostic logging.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Top-level error type for all ChatSleuth operations.
/// Errors are categorised by the subsystem that produced them.
#[derive(Debug)]
pub enum ChatSleuthError {
    /// The live tail failed to start or lost its file.
    Tail(TailError),

    /// Configuration loading or validation failed.
    Config(ConfigError),
}

impl fmt::Display for ChatSleuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tail(e) => write!(f, "Tail error: {e}"),
            Self::Config(e) => write!(f, "Configuration error: {e}"),
        }
    }
}

impl std::error::Error for ChatSleuthError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Tail(e) => Some(e),
            Self::Config(e) => Some(e),
        }
    }
}

// ---------------------------------------------------------------------------
// Tail errors
// ---------------------------------------------------------------------------

/// Transport-level failures of the live tail. Every variant is fatal to the
/// tail loop; the message is surfaced as a System notice before stopping.
#[derive(Debug)]
pub enum TailError {
    /// The log file could not be opened.
    Open { path: PathBuf, source: io::Error },

    /// The log file could not be stat'ed (deleted, permission change).
    Stat { path: PathBuf, source: io::Error },

    /// Reading new bytes from the log file failed.
    Read { path: PathBuf, source: io::Error },

    /// The per-line worker pool could not be created.
    WorkerPool {
        threads: usize,
        source: rayon::ThreadPoolBuildError,
    },
}

impl fmt::Display for TailError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open { path, source } => {
                write!(f, "Cannot open log '{}': {source}", path.display())
            }
            Self::Stat { path, source } => {
                write!(f, "Log '{}' is no longer readable: {source}", path.display())
            }
            Self::Read { path, source } => {
                write!(f, "Read error on log '{}': {source}", path.display())
            }
            Self::WorkerPool { threads, source } => {
                write!(f, "Cannot start {threads} line worker(s): {source}")
            }
        }
    }
}

impl std::error::Error for TailError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Open { source, .. } => Some(source),
            Self::Stat { source, .. } => Some(source),
            Self::Read { source, .. } => Some(source),
            Self::WorkerPool { source, .. } => Some(source),
        }
    }
}

impl From<TailError> for ChatSleuthError {
    fn from(e: TailError) -> Self {
        Self::Tail(e)
    }
}

// ---------------------------------------------------------------------------
// Notification errors
// ---------------------------------------------------------------------------

/// Failures of the "play notification sound" side-effect. Never fatal to the
/// tail; surfaced as System notices.
#[derive(Debug)]
pub enum NotifyError {
    /// The configured sound file does not exist.
    SoundNotFound { path: PathBuf },

    /// The player binary could not be launched.
    PlayerSpawn { player: PathBuf, source: io::Error },

    /// The player ran but reported failure.
    PlayerExit { player: PathBuf, code: Option<i32> },
}

impl fmt::Display for NotifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SoundNotFound { path } => {
                write!(f, "Sound not found: {}", path.display())
            }
            Self::PlayerSpawn { player, source } => {
                write!(f, "Failed to play sound with '{}': {source}", player.display())
            }
            Self::PlayerExit { player, code } => match code {
                Some(code) => write!(
                    f,
                    "Failed to play sound: '{}' exited with status {code}",
                    player.display()
                ),
                None => write!(
                    f,
                    "Failed to play sound: '{}' was terminated by a signal",
                    player.display()
                ),
            },
        }
    }
}

impl std::error::Error for NotifyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::PlayerSpawn { source, .. } => Some(source),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

/// Errors related to configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    /// TOML parsing failed.
    TomlParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// A config value is out of the allowed range.
    ValueOutOfRange {
        field: String,
        value: String,
        expected: String,
    },

    /// I/O error reading config file.
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TomlParse { path, source } => {
                write!(f, "Config parse error '{}': {source}", path.display())
            }
            Self::ValueOutOfRange {
                field,
                value,
                expected,
            } => write!(
                f,
                "Config '{field}' = '{value}' is out of range. Expected: {expected}"
            ),
            Self::Io { path, source } => {
                write!(f, "Config I/O error '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::TomlParse { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ConfigError> for ChatSleuthError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

/// Convenience type alias for ChatSleuth results.
pub type Result<T> = std::result::Result<T, ChatSleuthError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_tail_error_keeps_io_source() {
        let err: ChatSleuthError = TailError::Stat {
            path: PathBuf::from("Client.txt"),
            source: io::Error::new(io::ErrorKind::NotFound, "gone"),
        }
        .into();
        assert!(err.to_string().contains("no longer readable"));
        let tail = err.source().expect("tail source");
        assert!(tail.source().is_some(), "io::Error must stay in the chain");
    }

    #[test]
    fn test_notify_error_messages() {
        let missing = NotifyError::SoundNotFound {
            path: PathBuf::from("bin/notify.wav"),
        };
        assert!(missing.to_string().starts_with("Sound not found"));

        let exit = NotifyError::PlayerExit {
            player: PathBuf::from("ffplay"),
            code: Some(1),
        };
        assert!(exit.to_string().contains("status 1"));
    }

    #[test]
    fn test_config_range_error_display() {
        let err = ConfigError::ValueOutOfRange {
            field: "notifications.volume".to_string(),
            value: "250".to_string(),
            expected: "0-100".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Config 'notifications.volume' = '250' is out of range. Expected: 0-100"
        );
    }
}
