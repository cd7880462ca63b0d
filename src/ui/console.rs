// ChatSleuth - ui/console.rs
//
// Plain-text rendering of chat events for terminal hosts.
// No colour or markup: the core stays presentation-neutral and a terminal
// host can pipe this straight into other tools.

use crate::core::model::{Category, ChatEvent};

/// Render one event as `[HH:MM] <marker><speaker>: <content>`.
///
/// The timestamp bracket is omitted for synthetic events, and System events
/// render as bare content.
pub fn format_event(event: &ChatEvent) -> String {
    let mut out = String::new();
    if let Some(ts) = event.timestamp() {
        out.push('[');
        out.push_str(ts);
        out.push_str("] ");
    }

    if event.category() != Category::System {
        if let Some(speaker) = event.speaker() {
            out.push_str(event.channel_marker().unwrap_or_default());
            out.push_str(speaker);
            out.push_str(": ");
        }
    }

    out.push_str(event.content());
    out
}
