/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Content script: one per page load, in the extension's isolated world.
//!
//! The message listener is registered as soon as the script runs; keyboard
//! listeners follow once the document is parsed. Both paths end in
//! [`ContentScript::toggle`], which makes sure the page-world script is
//! present and then forwards the toggle to it.

use std::sync::Arc;

use ghostshell_comms::{ContextAddress, Listener, SendError};
use ghostshell_core::{ActivationMessage, TabId, ToggleAck};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::injection::InjectionController;
use super::{ActivationBus, ExtensionEnv};
use crate::host::PageDocument;
use crate::input::{KeyboardRouter, ShortcutPressed};

/// `window` slot marking that the content script already runs in this page.
pub const CONTENT_SCRIPT_GLOBAL: &str = "__ghostUI_content";

/// Marker stored in the page globals while a content script is alive.
pub struct ContentScriptInstance {
    pub tab: TabId,
}

pub struct ContentScript {
    tab: TabId,
    document: Arc<dyn PageDocument>,
    bus: ActivationBus,
    injection: InjectionController,
    router: Arc<KeyboardRouter>,
    ready: bool,
}

impl ContentScript {
    /// Run the content script in `document`. A second run in the same page
    /// finds the first one and does nothing.
    pub fn boot(env: &ExtensionEnv, tab: TabId, document: Arc<dyn PageDocument>) {
        let (_, created) = document
            .globals()
            .get_or_insert_with(CONTENT_SCRIPT_GLOBAL, || {
                let listener = env.bus.register(ContextAddress::ContentScript(tab));
                let (shortcut_tx, shortcut_rx) = mpsc::unbounded_channel();
                let router = Arc::new(KeyboardRouter::new(
                    env.settings.shortcut,
                    document.clone(),
                    shortcut_tx,
                ));
                let script = ContentScript {
                    tab,
                    document: document.clone(),
                    bus: env.bus.clone(),
                    injection: InjectionController::new(
                        document.clone(),
                        &env.settings.page_script_src,
                        env.settings.injection,
                    ),
                    router,
                    ready: false,
                };
                env.supervisor.spawn(script.run(
                    listener,
                    shortcut_rx,
                    env.supervisor.cancellation(),
                ));
                ContentScriptInstance { tab }
            });
        if created {
            log::debug!("content script: started in {tab} on {}", document.url());
        } else {
            log::debug!("content script: already running in {tab}");
        }
    }

    async fn run(
        mut self,
        mut listener: Listener<ActivationMessage, ToggleAck>,
        mut shortcuts: mpsc::UnboundedReceiver<ShortcutPressed>,
        cancel: CancellationToken,
    ) {
        let mut document_ready = self.document.when_ready();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = &mut document_ready, if !self.ready => self.on_ready(),
                incoming = listener.recv() => {
                    let Some(incoming) = incoming else {
                        log::debug!("content script: {} unregistered", self.tab);
                        break;
                    };
                    let success = self.toggle().await;
                    if !incoming.respond(ToggleAck { success }) {
                        log::debug!("content script: background stopped waiting for the ack");
                    }
                }
                Some(ShortcutPressed) = shortcuts.recv() => {
                    self.toggle().await;
                }
            }
        }
    }

    fn on_ready(&mut self) {
        if self.ready {
            return;
        }
        self.ready = true;
        self.router.install();
        log::debug!("content script: keyboard listeners installed in {}", self.tab);
    }

    /// Make sure the page-world script is loaded, then toggle the palette.
    pub async fn toggle(&mut self) -> bool {
        if !self.ready {
            self.document.when_ready().await;
            self.on_ready();
        }

        if let Err(e) = self.injection.ensure_injected().await {
            log::warn!("content script: {e}");
            return false;
        }

        match self
            .bus
            .send(ContextAddress::PageWorld(self.tab), ActivationMessage::toggle())
            .await
        {
            Ok(ack) => ack.success,
            Err(SendError::NoReceiver) => {
                log::warn!("content script: page script loaded but is not listening");
                false
            }
            Err(e) => {
                log::warn!("content script: toggle not delivered to page script: {e}");
                false
            }
        }
    }
}
