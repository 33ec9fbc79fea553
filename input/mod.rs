/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Keyboard routing for the content script.
//!
//! The [`KeyboardRouter`] is registered in three listener phases so that pages
//! which swallow key events in one phase still let the shortcut through. The
//! event's own handled marker keeps a single physical key press from toggling
//! more than once.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use keyboard_types::{Key, Modifiers, NamedKey};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::diagnostics::{CHANNEL_KEYBOARD_FORWARDED, CHANNEL_KEYBOARD_SUPPRESSED, emit_message};
use crate::host::{FocusedElement, KeyListener, ListenerPhase, PageDocument};

/// A dispatched `keydown`. Listener flags are interior so every phase sees the
/// marks left by earlier ones.
#[derive(Debug)]
pub struct KeyEvent {
    key: Key,
    modifiers: Modifiers,
    handled: AtomicBool,
    default_prevented: AtomicBool,
    propagation_stopped: AtomicBool,
    immediate_stopped: AtomicBool,
}

/// Plain copy of a key press, for handing to another context.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyStroke {
    pub key: Key,
    pub modifiers: Modifiers,
}

impl KeyStroke {
    pub fn character(text: &str, modifiers: Modifiers) -> Self {
        Self {
            key: Key::Character(text.to_string()),
            modifiers,
        }
    }

    pub fn named(key: NamedKey, modifiers: Modifiers) -> Self {
        Self {
            key: Key::Named(key),
            modifiers,
        }
    }
}

impl KeyEvent {
    pub fn new(key: Key, modifiers: Modifiers) -> Self {
        Self {
            key,
            modifiers,
            handled: AtomicBool::new(false),
            default_prevented: AtomicBool::new(false),
            propagation_stopped: AtomicBool::new(false),
            immediate_stopped: AtomicBool::new(false),
        }
    }

    pub fn from_stroke(stroke: KeyStroke) -> Self {
        Self::new(stroke.key, stroke.modifiers)
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    pub fn stroke(&self) -> KeyStroke {
        KeyStroke {
            key: self.key.clone(),
            modifiers: self.modifiers,
        }
    }

    /// Claim the event. Only the first caller gets `true`.
    pub fn mark_handled(&self) -> bool {
        !self.handled.swap(true, Ordering::AcqRel)
    }

    pub fn is_handled(&self) -> bool {
        self.handled.load(Ordering::Acquire)
    }

    pub fn prevent_default(&self) {
        self.default_prevented.store(true, Ordering::Release);
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented.load(Ordering::Acquire)
    }

    pub fn stop_propagation(&self) {
        self.propagation_stopped.store(true, Ordering::Release);
    }

    pub fn propagation_stopped(&self) -> bool {
        self.propagation_stopped.load(Ordering::Acquire)
    }

    /// Also skips the remaining listeners of the current phase.
    pub fn stop_immediate_propagation(&self) {
        self.immediate_stopped.store(true, Ordering::Release);
        self.stop_propagation();
    }

    pub fn immediate_propagation_stopped(&self) -> bool {
        self.immediate_stopped.load(Ordering::Acquire)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Apple,
    Other,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_vendor = "apple") {
            Platform::Apple
        } else {
            Platform::Other
        }
    }

    /// Classify a `navigator.platform` string.
    pub fn from_navigator_platform(platform: &str) -> Self {
        let platform = platform.to_ascii_lowercase();
        if ["mac", "iphone", "ipod", "ipad"]
            .iter()
            .any(|needle| platform.contains(needle))
        {
            Platform::Apple
        } else {
            Platform::Other
        }
    }

    /// Cmd on Apple platforms, Ctrl elsewhere.
    pub fn command_modifier(self) -> Modifiers {
        match self {
            Platform::Apple => Modifiers::META,
            Platform::Other => Modifiers::CONTROL,
        }
    }
}

/// Platform modifier + Shift + a letter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActivationShortcut {
    pub platform: Platform,
    pub letter: char,
}

impl ActivationShortcut {
    pub fn new(platform: Platform, letter: char) -> Self {
        Self {
            platform,
            letter: letter.to_ascii_lowercase(),
        }
    }

    pub fn matches(&self, key: &Key, modifiers: Modifiers) -> bool {
        if !modifiers.contains(self.platform.command_modifier() | Modifiers::SHIFT) {
            return false;
        }
        match key {
            Key::Character(text) => {
                let mut chars = text.chars().flat_map(char::to_lowercase);
                chars.next() == Some(self.letter) && chars.next().is_none()
            }
            _ => false,
        }
    }
}

/// Whether key presses in `element` belong to the page's own text entry.
pub fn is_editable_context(element: &FocusedElement) -> bool {
    let text_entry = matches!(element.tag_name.as_str(), "INPUT" | "TEXTAREA");
    // Search boxes that are not plain inputs still expect every keystroke.
    let search_box = element.name.as_deref() == Some("q")
        || element.class_list.iter().any(|class| class == "gLFyf")
        || element.role.as_deref() == Some("combobox");
    text_entry || element.content_editable || search_box
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteOutcome {
    Ignored,
    SuppressedEditable,
    AlreadyHandled,
    Forwarded,
}

/// Sent to the content script's loop when the shortcut fires locally.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShortcutPressed;

pub struct KeyboardRouter {
    shortcut: ActivationShortcut,
    document: Arc<dyn PageDocument>,
    forward: mpsc::UnboundedSender<ShortcutPressed>,
}

impl KeyboardRouter {
    pub fn new(
        shortcut: ActivationShortcut,
        document: Arc<dyn PageDocument>,
        forward: mpsc::UnboundedSender<ShortcutPressed>,
    ) -> Self {
        Self {
            shortcut,
            document,
            forward,
        }
    }

    /// Register on window capture, document capture and document bubble.
    pub fn install(self: &Arc<Self>) {
        for phase in [
            ListenerPhase::WindowCapture,
            ListenerPhase::DocumentCapture,
            ListenerPhase::DocumentBubble,
        ] {
            self.document
                .add_key_listener(phase, self.clone() as Arc<dyn KeyListener>);
        }
    }

    pub fn route(&self, event: &KeyEvent) -> RouteOutcome {
        if !self.shortcut.matches(event.key(), event.modifiers()) {
            return RouteOutcome::Ignored;
        }
        if event.is_handled() {
            return RouteOutcome::AlreadyHandled;
        }
        if self
            .document
            .active_element()
            .is_some_and(|element| is_editable_context(&element))
        {
            emit_message(CHANNEL_KEYBOARD_SUPPRESSED, 0);
            return RouteOutcome::SuppressedEditable;
        }
        if !event.mark_handled() {
            return RouteOutcome::AlreadyHandled;
        }

        event.prevent_default();
        event.stop_immediate_propagation();
        if self.forward.send(ShortcutPressed).is_err() {
            log::warn!("keyboard router: content script loop is gone, shortcut dropped");
        }
        emit_message(CHANNEL_KEYBOARD_FORWARDED, 0);
        RouteOutcome::Forwarded
    }
}

impl KeyListener for KeyboardRouter {
    fn on_key(&self, event: &KeyEvent, phase: ListenerPhase) {
        let outcome = self.route(event);
        if outcome != RouteOutcome::Ignored {
            log::debug!("keyboard router: {outcome:?} in {phase:?}");
        }
    }
}
