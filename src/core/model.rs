// ChatSleuth - core/model.rs
//
// Core data model types. Pure data definitions with no I/O, no UI,
// no platform dependencies.
//
// These types are the shared vocabulary across all layers.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// =============================================================================
// Category
// =============================================================================

/// Chat channel a log line belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    Local,
    Global,
    Party,
    Whisper,
    Trade,
    Guild,
    System,
}

impl Category {
    /// Returns all variants in display order.
    pub fn all() -> &'static [Category] {
        &[
            Category::Local,
            Category::Global,
            Category::Party,
            Category::Whisper,
            Category::Trade,
            Category::Guild,
            Category::System,
        ]
    }

    /// Human-readable label for display and config keys.
    pub fn label(&self) -> &'static str {
        match self {
            Category::Local => "Local",
            Category::Global => "Global",
            Category::Party => "Party",
            Category::Whisper => "Whisper",
            Category::Trade => "Trade",
            Category::Guild => "Guild",
            Category::System => "System",
        }
    }

    /// Case-insensitive inverse of [`Category::label`].
    pub fn from_label(label: &str) -> Option<Category> {
        Category::all()
            .iter()
            .copied()
            .find(|c| c.label().eq_ignore_ascii_case(label.trim()))
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// =============================================================================
// Chat event
// =============================================================================

/// Marker the game writes in front of an incoming whisper.
pub const WHISPER_FROM_MARKER: &str = "@From ";

/// Marker the game writes in front of an outgoing whisper.
pub const WHISPER_TO_MARKER: &str = "@To ";

/// One classified chat line (or a synthetic System notice).
///
/// Immutable once built. Fields are private so the constructors can hold the
/// invariant that System events never carry a marker or speaker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatEvent {
    content: String,
    timestamp: Option<String>,
    channel_marker: Option<String>,
    speaker: Option<String>,
    category: Category,
}

impl ChatEvent {
    /// Build a chat event from classified parts.
    ///
    /// A `Category::System` request is normalised: marker and speaker are
    /// dropped.
    pub fn chat(
        category: Category,
        channel_marker: Option<String>,
        speaker: Option<String>,
        content: impl Into<String>,
        timestamp: Option<String>,
    ) -> Self {
        let (channel_marker, speaker) = if category == Category::System {
            (None, None)
        } else {
            (channel_marker, speaker)
        };
        Self {
            content: content.into(),
            timestamp,
            channel_marker,
            speaker,
            category,
        }
    }

    /// Synthetic System event (diagnostics, tail status). No timestamp.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            timestamp: None,
            channel_marker: None,
            speaker: None,
            category: Category::System,
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// `HH:MM` local clock time, absent for synthetic events.
    pub fn timestamp(&self) -> Option<&str> {
        self.timestamp.as_deref()
    }

    /// Raw channel marker such as `#`, `%` or `@From `.
    pub fn channel_marker(&self) -> Option<&str> {
        self.channel_marker.as_deref()
    }

    pub fn speaker(&self) -> Option<&str> {
        self.speaker.as_deref()
    }

    pub fn category(&self) -> Category {
        self.category
    }

    /// True for whispers received from another player.
    pub fn is_incoming_whisper(&self) -> bool {
        self.category == Category::Whisper
            && self
                .channel_marker
                .as_deref()
                .is_some_and(|m| m.trim_end() == WHISPER_FROM_MARKER.trim_end())
    }
}

// =============================================================================
// Severity
// =============================================================================

/// Severity attached to diagnostic notices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Error => "Error",
            Severity::Warning => "Warning",
            Severity::Info => "Info",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// =============================================================================
// Tail Progress (event bus payload)
// =============================================================================

/// Messages carried from the tail pipeline to the single consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum TailProgress {
    /// The log was opened and the cursor placed at its current end.
    Started { path: PathBuf },

    /// An admitted chat event.
    Chat(ChatEvent),

    /// A diagnostic for on-screen display.
    Notice { message: String, severity: Severity },

    /// The tail loop has exited. Always the last message of a tail session.
    Stopped,
}

impl TailProgress {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Notice {
            message: message.into(),
            severity: Severity::Error,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::Notice {
            message: message.into(),
            severity: Severity::Warning,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::Notice {
            message: message.into(),
            severity: Severity::Info,
        }
    }

    /// The history entry this message produces, if any.
    ///
    /// Notices become System events; `Started` and `Stopped` are surfaced as
    /// System lines too so the user sees when the tail is (in)active.
    pub fn to_history_event(&self) -> Option<ChatEvent> {
        match self {
            TailProgress::Chat(event) => Some(event.clone()),
            TailProgress::Notice { message, .. } => Some(ChatEvent::system(message.clone())),
            TailProgress::Started { path } => Some(ChatEvent::system(format!(
                "Watching {}",
                path.display()
            ))),
            TailProgress::Stopped => Some(ChatEvent::system("Live tail stopped.")),
        }
    }
}
