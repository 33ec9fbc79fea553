/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use ghostshell_core::{ChatSender, SavedMemorySet};
use serde::Serialize;

use super::state::{PaletteState, PaletteTab, SaveStatus};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TabLabel {
    pub tab: PaletteTab,
    pub label: &'static str,
    pub digit: char,
    pub active: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ListItem {
    pub label: String,
    pub highlighted: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PreviewCard {
    pub title: String,
    pub body_text: String,
    pub link_count: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SaveBanner {
    pub status: SaveStatus,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChatBubble {
    pub sender: ChatSender,
    pub text: String,
    pub source: Option<String>,
    pub fallback_warning: bool,
    pub error: bool,
}

/// Render tree handed to the host surface after every state change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PaletteView {
    pub tabs: Vec<TabLabel>,
    pub items: Vec<ListItem>,
    pub preview: Option<PreviewCard>,
    pub save_button: Option<&'static str>,
    pub banner: Option<SaveBanner>,
    pub transcript: Vec<ChatBubble>,
    pub chat_draft: String,
    pub loading: bool,
    /// CSS `translate(x, y)` of the palette card.
    pub translate: (i32, i32),
    pub dragging: bool,
}

fn save_button_label(status: SaveStatus) -> &'static str {
    match status {
        SaveStatus::Idle => "Save to Memory",
        SaveStatus::Saving => "Saving...",
        SaveStatus::Success => "Saved Successfully!",
        SaveStatus::Error => "Error Saving",
    }
}

impl PaletteView {
    pub fn render(state: &PaletteState, saved: &SavedMemorySet) -> Self {
        let on_memory = state.active_tab == PaletteTab::Memory;
        let on_chat = state.active_tab == PaletteTab::Chat;

        let tabs = PaletteTab::ALL
            .into_iter()
            .map(|tab| TabLabel {
                tab,
                label: tab.label(),
                digit: tab.digit(),
                active: tab == state.active_tab,
            })
            .collect();

        let items = state
            .visible_items(saved)
            .into_iter()
            .enumerate()
            .map(|(index, label)| ListItem {
                label,
                highlighted: index == state.highlighted_index,
            })
            .collect();

        let preview = state
            .preview
            .as_ref()
            .filter(|_| on_memory)
            .map(|memory| PreviewCard {
                title: memory.title.clone(),
                body_text: memory.body_text.clone(),
                link_count: memory.links.len(),
            });

        let banner = (on_memory && !state.save_message.is_empty()).then(|| SaveBanner {
            status: state.save_status,
            message: state.save_message.clone(),
        });

        let transcript = if on_chat {
            state
                .transcript
                .messages()
                .iter()
                .map(|message| ChatBubble {
                    sender: message.sender,
                    text: message.text.clone(),
                    source: message.source_label(),
                    fallback_warning: message.hallucinated && !message.error,
                    error: message.error,
                })
                .collect()
        } else {
            Vec::new()
        };

        Self {
            tabs,
            items,
            preview,
            save_button: on_memory.then(|| save_button_label(state.save_status)),
            banner,
            transcript,
            chat_draft: if on_chat {
                state.chat_draft.clone()
            } else {
                String::new()
            },
            loading: on_chat && state.loading(),
            translate: (state.position.x, state.position.y),
            dragging: state.drag.active,
        }
    }

    pub fn active_tab(&self) -> Option<PaletteTab> {
        self.tabs.iter().find(|tab| tab.active).map(|tab| tab.tab)
    }

    pub fn highlighted_item(&self) -> Option<&str> {
        self.items
            .iter()
            .find(|item| item.highlighted)
            .map(|item| item.label.as_str())
    }
}
