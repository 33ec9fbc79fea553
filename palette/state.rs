/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::collections::HashSet;
use std::time::Duration;

use ghostshell_core::{
    ChatTranscript, CursorPoint, PaletteOffset, SavedMemorySet, SavedOrder, ScrapedMemory,
};
use serde::Serialize;

/// Fixed suggestions listed on the Ask tab.
pub const ASK_SUGGESTIONS: [&str; 5] = [
    "Ask AI: How do I center a div?",
    "Search documentation",
    "Search Stack Overflow",
    "Find React best practices",
    "Explain this code pattern",
];

pub const DUPLICATE_SAVE_MESSAGE: &str = "This page is already saved in memory";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PaletteTab {
    #[default]
    Memory,
    Ask,
    Chat,
}

impl PaletteTab {
    pub const ALL: [PaletteTab; 3] = [PaletteTab::Memory, PaletteTab::Ask, PaletteTab::Chat];

    /// Digit shortcut, `1`..=`3`.
    pub fn from_digit(digit: char) -> Option<Self> {
        match digit {
            '1' => Some(PaletteTab::Memory),
            '2' => Some(PaletteTab::Ask),
            '3' => Some(PaletteTab::Chat),
            _ => None,
        }
    }

    pub fn digit(self) -> char {
        match self {
            PaletteTab::Memory => '1',
            PaletteTab::Ask => '2',
            PaletteTab::Chat => '3',
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PaletteTab::Memory => "Memory",
            PaletteTab::Ask => "Ask",
            PaletteTab::Chat => "Chat",
        }
    }

    /// Whether the tab shows a navigable list.
    pub fn has_list(self) -> bool {
        self != PaletteTab::Chat
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveStatus {
    #[default]
    Idle,
    Saving,
    Success,
    Error,
}

impl SaveStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, SaveStatus::Success | SaveStatus::Error)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DragState {
    pub active: bool,
    /// Cursor minus palette offset at drag start.
    pub anchor: CursorPoint,
}

impl Default for DragState {
    fn default() -> Self {
        Self {
            active: false,
            anchor: CursorPoint::origin(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaletteConfig {
    pub nudge_step: i32,
    pub saved_order: SavedOrder,
    pub status_revert: Duration,
}

impl Default for PaletteConfig {
    fn default() -> Self {
        Self {
            nudge_step: 20,
            saved_order: SavedOrder::OldestFirst,
            status_revert: Duration::from_secs(3),
        }
    }
}

/// Everything the palette shows, for one mount.
///
/// `save_generation`, `pending_saves` and `session` survive [`reset`] so that
/// completions and timers issued before an unmount can be told apart from
/// current ones.
///
/// [`reset`]: PaletteState::reset
#[derive(Clone, Debug)]
pub struct PaletteState {
    pub is_open: bool,
    pub active_tab: PaletteTab,
    pub highlighted_index: usize,
    pub position: PaletteOffset,
    pub drag: DragState,
    pub save_status: SaveStatus,
    pub save_message: String,
    pub preview: Option<ScrapedMemory>,
    pub transcript: ChatTranscript,
    pub chat_draft: String,
    pub queries_in_flight: usize,
    pub save_generation: u64,
    /// URLs handed to the backend whose save has not completed yet.
    pub pending_saves: HashSet<String>,
    pub session: u64,
    pub config: PaletteConfig,
}

impl PaletteState {
    pub fn new(config: PaletteConfig) -> Self {
        Self {
            is_open: false,
            active_tab: PaletteTab::default(),
            highlighted_index: 0,
            position: PaletteOffset::zero(),
            drag: DragState::default(),
            save_status: SaveStatus::default(),
            save_message: String::new(),
            preview: None,
            transcript: ChatTranscript::default(),
            chat_draft: String::new(),
            queries_in_flight: 0,
            save_generation: 0,
            pending_saves: HashSet::new(),
            session: 0,
            config,
        }
    }

    /// Back to a closed, default palette.
    pub fn reset(&mut self) {
        let fresh = Self {
            save_generation: self.save_generation,
            pending_saves: std::mem::take(&mut self.pending_saves),
            session: self.session,
            ..Self::new(self.config.clone())
        };
        *self = fresh;
    }

    pub fn loading(&self) -> bool {
        self.queries_in_flight > 0
    }

    /// Labels of the active tab's list.
    pub fn visible_items(&self, saved: &SavedMemorySet) -> Vec<String> {
        match self.active_tab {
            PaletteTab::Memory => saved
                .ordered(self.config.saved_order)
                .into_iter()
                .map(ScrapedMemory::list_label)
                .collect(),
            PaletteTab::Ask => ASK_SUGGESTIONS.iter().map(|s| s.to_string()).collect(),
            PaletteTab::Chat => Vec::new(),
        }
    }

    pub fn item_count(&self, saved: &SavedMemorySet) -> usize {
        match self.active_tab {
            PaletteTab::Memory => saved.len(),
            PaletteTab::Ask => ASK_SUGGESTIONS.len(),
            PaletteTab::Chat => 0,
        }
    }
}

impl Default for PaletteState {
    fn default() -> Self {
        Self::new(PaletteConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digits_map_to_tabs_in_order() {
        for tab in PaletteTab::ALL {
            assert_eq!(PaletteTab::from_digit(tab.digit()), Some(tab));
        }
        assert_eq!(PaletteTab::from_digit('4'), None);
        assert_eq!(PaletteTab::from_digit('0'), None);
    }

    #[test]
    fn reset_keeps_counters_and_config() {
        let config = PaletteConfig {
            nudge_step: 5,
            ..PaletteConfig::default()
        };
        let mut state = PaletteState::new(config.clone());
        state.is_open = true;
        state.active_tab = PaletteTab::Chat;
        state.position = PaletteOffset::new(40, -20);
        state.save_generation = 3;
        state.pending_saves.insert("https://a.test".to_string());
        state.session = 2;
        state.chat_draft = "half a question".to_string();

        state.reset();

        assert!(!state.is_open);
        assert_eq!(state.active_tab, PaletteTab::Memory);
        assert_eq!(state.position, PaletteOffset::zero());
        assert!(state.chat_draft.is_empty());
        assert_eq!((state.save_generation, state.session), (3, 2));
        assert!(state.pending_saves.contains("https://a.test"));
        assert_eq!(state.config, config);
    }

    #[test]
    fn memory_items_follow_display_order() {
        let mut saved = SavedMemorySet::new();
        for (title, url) in [("One", "https://one.test/a"), ("Two", "https://two.test/b")] {
            saved
                .insert(ScrapedMemory::webpage(title, "", Vec::new(), url, 0))
                .expect("distinct urls");
        }
        let mut state = PaletteState::new(PaletteConfig {
            saved_order: SavedOrder::NewestFirst,
            ..PaletteConfig::default()
        });

        assert_eq!(
            state.visible_items(&saved),
            ["Two (two.test)", "One (one.test)"]
        );
        state.active_tab = PaletteTab::Ask;
        assert_eq!(state.item_count(&saved), ASK_SUGGESTIONS.len());
        state.active_tab = PaletteTab::Chat;
        assert!(state.visible_items(&saved).is_empty());
    }
}
