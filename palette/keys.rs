/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Key bindings while the palette is mounted.

use keyboard_types::{Key, Modifiers, NamedKey};

use super::intents::{NudgeDirection, PaletteIntent};
use super::state::{PaletteState, PaletteTab};
use crate::input::KeyStroke;

/// Map a key press to at most one palette intent.
///
/// `editable_target` is true when the key went to a text field (the chat box,
/// or anything else focused on the page).
pub fn intent_for_key(
    stroke: &KeyStroke,
    state: &PaletteState,
    editable_target: bool,
) -> Option<PaletteIntent> {
    if stroke.key == Key::Named(NamedKey::Escape) {
        return Some(PaletteIntent::Close);
    }
    if !state.is_open {
        return None;
    }

    if stroke.modifiers.contains(Modifiers::CONTROL) {
        return control_binding(&stroke.key);
    }

    match &stroke.key {
        Key::Named(NamedKey::Enter)
            if state.active_tab == PaletteTab::Chat
                && editable_target
                && !stroke.modifiers.contains(Modifiers::SHIFT) =>
        {
            Some(PaletteIntent::SubmitChatDraft)
        }
        Key::Character(text) if !editable_target => {
            let mut chars = text.chars();
            match (chars.next(), chars.next()) {
                (Some(digit), None) => PaletteTab::from_digit(digit).map(PaletteIntent::SelectTab),
                _ => None,
            }
        }
        Key::Named(NamedKey::ArrowDown) if state.active_tab.has_list() => {
            Some(PaletteIntent::HighlightNext)
        }
        Key::Named(NamedKey::ArrowUp) if state.active_tab.has_list() => {
            Some(PaletteIntent::HighlightPrevious)
        }
        _ => None,
    }
}

fn control_binding(key: &Key) -> Option<PaletteIntent> {
    match key {
        Key::Named(NamedKey::ArrowLeft) => Some(PaletteIntent::Nudge(NudgeDirection::Left)),
        Key::Named(NamedKey::ArrowRight) => Some(PaletteIntent::Nudge(NudgeDirection::Right)),
        Key::Named(NamedKey::ArrowUp) => Some(PaletteIntent::Nudge(NudgeDirection::Up)),
        Key::Named(NamedKey::ArrowDown) => Some(PaletteIntent::Nudge(NudgeDirection::Down)),
        Key::Character(text) if text.eq_ignore_ascii_case("r") => {
            Some(PaletteIntent::ResetPosition)
        }
        _ => None,
    }
}
