// ChatSleuth - core/filter.rs
//
// Admission and display filters for chat events.
//   - `IgnoreSet` decides admission: ignored speakers never reach history
//     and are never counted for notifications.
//   - `ChannelFilter` decides visibility: which categories the presentation
//     shows from a history snapshot. It never removes anything from history.
// Core layer: pure logic, no I/O or UI dependencies.

use crate::core::model::{Category, ChatEvent};
use std::collections::HashSet;

// =============================================================================
// Ignore filter
// =============================================================================

/// Speaker names whose lines are dropped (engine spam, bots, muted players).
///
/// Membership is a case-sensitive exact match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IgnoreSet {
    speakers: HashSet<String>,
}

impl IgnoreSet {
    pub fn new<I, S>(speakers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            speakers: speakers.into_iter().map(Into::into).collect(),
        }
    }

    /// True iff `speaker` is present and listed. Absent speakers (System
    /// lines) are never ignored.
    pub fn is_ignored(&self, speaker: Option<&str>) -> bool {
        match speaker {
            Some(name) => self.speakers.contains(name),
            None => false,
        }
    }

    /// Convenience over [`IgnoreSet::is_ignored`] for a whole event.
    pub fn rejects(&self, event: &ChatEvent) -> bool {
        self.is_ignored(event.speaker())
    }

    pub fn len(&self) -> usize {
        self.speakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.speakers.is_empty()
    }
}

// =============================================================================
// Channel filter
// =============================================================================

/// Per-category visibility toggles. All categories are visible by default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelFilter {
    hidden: HashSet<Category>,
}

impl ChannelFilter {
    /// Returns true if no category is hidden.
    pub fn is_empty(&self) -> bool {
        self.hidden.is_empty()
    }

    pub fn is_visible(&self, category: Category) -> bool {
        !self.hidden.contains(&category)
    }

    pub fn set_visible(&mut self, category: Category, visible: bool) {
        if visible {
            self.hidden.remove(&category);
        } else {
            self.hidden.insert(category);
        }
    }

    /// Flip one category and return its new visibility.
    pub fn toggle(&mut self, category: Category) -> bool {
        let visible = !self.is_visible(category);
        self.set_visible(category, visible);
        visible
    }

    /// Show only the given categories.
    pub fn only(categories: &[Category]) -> Self {
        Self {
            hidden: Category::all()
                .iter()
                .copied()
                .filter(|c| !categories.contains(c))
                .collect(),
        }
    }
}

/// Apply the channel filter to a snapshot, returning indices of visible
/// events in their original order.
///
/// Indices avoid copying events, so the caller can render straight from the
/// snapshot it already holds.
pub fn apply_filters(events: &[ChatEvent], filter: &ChannelFilter) -> Vec<usize> {
    if filter.is_empty() {
        return (0..events.len()).collect();
    }

    events
        .iter()
        .enumerate()
        .filter(|(_, event)| filter.is_visible(event.category()))
        .map(|(idx, _)| idx)
        .collect()
}
