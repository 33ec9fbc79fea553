/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Extension-side contexts: the background and the per-tab content script.

pub mod background;
pub mod content;
pub mod injection;
pub mod retry;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use ghostshell_comms::{MemoryBackend, MessageBus};
use ghostshell_core::{ActivationMessage, ToggleAck};
use parking_lot::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::input::ActivationShortcut;
use crate::palette::PaletteConfig;
use crate::prefs::GhostPreferences;
use injection::InjectionTiming;

/// Bus carrying toggles background → content script → page world.
pub type ActivationBus = MessageBus<ActivationMessage, ToggleAck>;

/// Supervises the long-running loop of every context.
///
/// Owns:
/// - a shared [`CancellationToken`] that every loop watches
/// - a [`JoinSet`] of the loops themselves
#[derive(Clone, Default)]
pub struct ContextSupervisor {
    cancel: CancellationToken,
    tasks: Arc<Mutex<JoinSet<()>>>,
}

impl ContextSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.tasks.lock();
        // Loops of navigated-away pages finish early; reap them here.
        while let Some(joined) = tasks.try_join_next() {
            if let Err(e) = joined {
                log::warn!("supervisor: context task ended abnormally: {e}");
            }
        }
        tasks.spawn(task);
    }

    /// Cancel every loop and wait for them to finish.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let mut tasks = std::mem::take(&mut *self.tasks.lock());
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                log::warn!("supervisor: context task ended abnormally: {e}");
            }
        }
    }
}

/// Settings shared by every context, derived from [`GhostPreferences`].
#[derive(Clone, Debug)]
pub struct ExtensionSettings {
    pub shortcut: ActivationShortcut,
    pub page_script_src: String,
    pub injection: InjectionTiming,
    pub content_script_settle: Duration,
    pub reply_timeout: Duration,
    pub palette: PaletteConfig,
}

impl ExtensionSettings {
    pub fn from_prefs(prefs: &GhostPreferences) -> Self {
        Self {
            shortcut: ActivationShortcut::new(prefs.platform(), prefs.shortcut_key),
            page_script_src: prefs.page_script_src.clone(),
            injection: prefs.injection_timing(),
            content_script_settle: prefs.content_script_settle(),
            reply_timeout: prefs.reply_timeout(),
            palette: prefs.palette_config(),
        }
    }
}

impl Default for ExtensionSettings {
    fn default() -> Self {
        Self::from_prefs(&GhostPreferences::default())
    }
}

/// Handles every context is started with.
#[derive(Clone)]
pub struct ExtensionEnv {
    pub bus: ActivationBus,
    pub backend: Arc<dyn MemoryBackend>,
    pub settings: ExtensionSettings,
    pub supervisor: ContextSupervisor,
}

impl ExtensionEnv {
    pub fn new(settings: ExtensionSettings, backend: Arc<dyn MemoryBackend>) -> Self {
        Self {
            bus: ActivationBus::new(settings.reply_timeout),
            backend,
            settings,
            supervisor: ContextSupervisor::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn spawn_reaps_finished_contexts() {
        let supervisor = ContextSupervisor::new();
        let (done_tx, mut done_rx) = tokio::sync::mpsc::unbounded_channel();
        for _ in 0..3 {
            let done_tx = done_tx.clone();
            supervisor.spawn(async move {
                let _ = done_tx.send(());
            });
        }
        for _ in 0..3 {
            done_rx.recv().await.expect("context finished");
        }

        let cancel = supervisor.cancellation();
        supervisor.spawn(async move { cancel.cancelled().await });
        assert_eq!(supervisor.tasks.lock().len(), 1);

        supervisor.shutdown().await;
        assert!(supervisor.tasks.lock().is_empty());
    }
}
