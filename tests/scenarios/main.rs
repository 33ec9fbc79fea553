/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! End-to-end runs of the background → content script → page world path over
//! the headless browser.

mod activation;
mod palette;

use std::sync::Arc;
use std::time::Duration;

use ghostshell::VERSION;
use ghostshell::extension::{ExtensionEnv, ExtensionSettings};
use ghostshell::host::headless::{HeadlessBrowser, HeadlessDocument};
use ghostshell::input::{ActivationShortcut, Platform};
use ghostshell::page::{PageEvent, PageSnapshot, PageWorldHandle};
use ghostshell_comms::test_support::ScriptedBackend;
use ghostshell_core::TabId;
use ghostshell_core::protocol::TOGGLE_COMMAND;
use keyboard_types::{Key, Modifiers, NamedKey};

pub const PAGE_URL: &str = "https://blog.test/posts/ownership";

/// One browser window with one web page open.
pub struct Harness {
    pub browser: HeadlessBrowser,
    pub backend: ScriptedBackend,
    pub tab: TabId,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_tab(|browser| browser.open_tab(PAGE_URL))
    }

    pub fn with_tab(open: impl FnOnce(&HeadlessBrowser) -> TabId) -> Self {
        let backend = ScriptedBackend::new();
        let settings = ExtensionSettings {
            shortcut: ActivationShortcut::new(Platform::Other, 'k'),
            ..ExtensionSettings::default()
        };
        let browser = HeadlessBrowser::start(ExtensionEnv::new(settings, Arc::new(backend.clone())));
        let tab = open(&browser);
        if let Some(document) = browser.document(tab) {
            document.set_content(
                "Understanding ownership",
                "Each value has an owner.",
                vec!["https://doc.rust-lang.org/book".to_string()],
            );
        }
        Self {
            browser,
            backend,
            tab,
        }
    }

    /// A harness whose palette is already open.
    pub async fn opened() -> Self {
        let harness = Self::new();
        harness
            .browser
            .trigger_command(TOGGLE_COMMAND)
            .await
            .expect("palette opens");
        harness
    }

    pub fn document(&self) -> Arc<HeadlessDocument> {
        self.browser.document(self.tab).expect("tab is open")
    }

    pub fn world(&self) -> Arc<PageWorldHandle> {
        self.browser.page_world(self.tab).expect("page script running")
    }

    pub async fn snapshot(&self) -> PageSnapshot {
        self.world().snapshot().await.expect("page world answers")
    }

    pub fn send(&self, event: PageEvent) {
        self.world().send(event);
    }

    pub fn press(&self, key: Key, modifiers: Modifiers) {
        self.document().key_down(key, modifiers);
    }

    pub fn press_char(&self, text: &str, modifiers: Modifiers) {
        self.press(Key::Character(text.to_string()), modifiers);
    }

    pub fn press_named(&self, key: NamedKey, modifiers: Modifiers) {
        self.press(Key::Named(key), modifiers);
    }

    pub fn press_shortcut(&self) {
        self.press_char("K", Modifiers::CONTROL | Modifiers::SHIFT);
    }

    /// Let spawned work and timers up to `duration` run.
    pub async fn advance(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[test]
fn scenarios_binary_smoke_runs() {
    assert!(!VERSION.is_empty());
}
