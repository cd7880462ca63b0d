// ChatSleuth - core/parser.rs
//
// Line-classification parser for the game client's chat log.
// Core layer: pure string functions, never touches the filesystem.
//
// Observed line shape:
//
//   2024/01/15 00:01:02 123456 abc [INFO Client 456] #Trader: wtb map
//   ^date      ^time    ^noise               ^tag   ^message body
//
// The time token is cut to `HH:MM`; the message body is everything after the
// last "] ". Bodies are then classified by their leading channel marker.
// Lines that do not fit this shape are unparseable and silently dropped;
// they are far too frequent (engine output shares the same file) to report.

use crate::core::model::{Category, ChatEvent, WHISPER_FROM_MARKER, WHISPER_TO_MARKER};
use crate::util::constants::{DEBUG_MAX_LINE_PREVIEW, TIMESTAMP_PREFIX_LEN};

/// Delimiter separating the bracketed log prefix from the message body.
const BODY_DELIMITER: &str = "] ";

/// Body prefix of server/system messages.
const SYSTEM_PREFIX: &str = "System:";

/// Channel markers in precedence order: `(raw prefix, canonical marker, category)`.
///
/// Doubled markers come first so `##` is never read as `#` followed by a
/// speaker starting with `#`.
const CHANNEL_MARKERS: &[(&str, &str, Category)] = &[
    ("##", "#", Category::Global),
    ("$$", "$", Category::Trade),
    ("#", "#", Category::Global),
    ("$", "$", Category::Trade),
    ("&", "&", Category::Guild),
    ("%", "%", Category::Party),
    (WHISPER_FROM_MARKER, WHISPER_FROM_MARKER, Category::Whisper),
    (WHISPER_TO_MARKER, WHISPER_TO_MARKER, Category::Whisper),
];

/// Structured fields of one message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    pub category: Category,
    /// Canonical marker; `Some("")` for Local chat, `None` for System.
    pub channel_marker: Option<String>,
    /// `None` for System messages and for bodies with an empty speaker part.
    pub speaker: Option<String>,
    pub content: String,
}

/// Classify a message body (the part after the log prefix).
///
/// Returns `None` when the body has no `:` separator.
pub fn classify(body: &str) -> Option<Classified> {
    let (speaker_part, content) = body.split_once(':')?;
    let content = content.trim().to_string();

    if let Some(&(prefix, marker, category)) = CHANNEL_MARKERS
        .iter()
        .find(|(prefix, _, _)| body.starts_with(prefix))
    {
        // Only the exact matched prefix is removed; `#Name#2` keeps its
        // trailing '#'.
        let speaker = speaker_part
            .strip_prefix(prefix)
            .unwrap_or(speaker_part)
            .trim();
        return Some(Classified {
            category,
            channel_marker: Some(marker.to_string()),
            speaker: non_empty(speaker),
            content,
        });
    }

    if body.starts_with(SYSTEM_PREFIX) {
        return Some(Classified {
            category: Category::System,
            channel_marker: None,
            speaker: None,
            content,
        });
    }

    Some(Classified {
        category: Category::Local,
        channel_marker: Some(String::new()),
        speaker: non_empty(speaker_part.trim()),
        content,
    })
}

/// Clock time of a log line: the second whitespace-delimited token, cut to
/// `HH:MM`. The first token is the date.
pub fn extract_timestamp(line: &str) -> Option<String> {
    let mut tokens = line.split_whitespace();
    tokens.next()?;
    let time = tokens.next()?;
    Some(time.chars().take(TIMESTAMP_PREFIX_LEN).collect())
}

/// Message body of a log line: the text after the last `"] "`, trimmed.
pub fn extract_message(line: &str) -> Option<&str> {
    let start = line.rfind(BODY_DELIMITER)? + BODY_DELIMITER.len();
    Some(line[start..].trim())
}

/// Full line pipeline: extract timestamp and body, then classify.
///
/// `None` means the line is unparseable and must be dropped without a
/// diagnostic.
pub fn parse_line(line: &str) -> Option<ChatEvent> {
    let timestamp = extract_timestamp(line)?;
    let body = extract_message(line)?;
    let classified = classify(body)?;
    Some(ChatEvent::chat(
        classified.category,
        classified.channel_marker,
        classified.speaker,
        classified.content,
        Some(timestamp),
    ))
}

/// Truncated copy of a line for debug output.
pub(crate) fn line_preview(line: &str) -> String {
    line.chars().take(DEBUG_MAX_LINE_PREVIEW).collect()
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}
