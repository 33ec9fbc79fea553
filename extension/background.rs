/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Background context: turns the registered command into a toggle for the
//! active tab.
//!
//! The content script may not be loaded yet (the extension was installed after
//! the tab opened, or the tab was restored). In that case the background
//! loads it programmatically, waits for it to settle and tries exactly once
//! more. Pages that refuse content scripts end the attempt silently.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ghostshell_comms::{ContextAddress, SendError};
use ghostshell_core::protocol::TOGGLE_COMMAND;
use ghostshell_core::{ActivationMessage, TabId, TabSession, ToggleAck};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use super::retry::RetryPolicy;
use super::{ActivationBus, ExtensionEnv};
use crate::diagnostics::{
    CHANNEL_ACTIVATION_ABANDONED, CHANNEL_ACTIVATION_FALLBACK_INJECT, CHANNEL_ACTIVATION_SENT,
    SPAN_ACTIVATION, emit_message, emit_span_duration,
};
use crate::host::BrowserTabs;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TabLoadStatus {
    Loading,
    Complete,
}

pub type CommandReply = oneshot::Sender<Result<ActivationReport, ActivationError>>;

/// Browser notifications the background listens to.
#[derive(Debug)]
pub enum BrowserEvent {
    Command {
        name: String,
        reply: Option<CommandReply>,
    },
    TabUpdated {
        tab: TabId,
        status: TabLoadStatus,
        url: String,
    },
    TabRemoved(TabId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActivationReport {
    pub tab: TabId,
    pub ack: ToggleAck,
    /// The content script had to be loaded before the toggle got through.
    pub injected_content_script: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActivationError {
    UnknownCommand(String),
    NoActiveTab,
    /// The tab refused the content script (browser-internal pages, stores).
    ContentScriptInjection { tab: TabId, reason: String },
    /// The content script was loaded but still did not answer.
    Abandoned { tab: TabId },
    Send { tab: TabId, error: SendError },
}

impl fmt::Display for ActivationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivationError::UnknownCommand(name) => write!(f, "unknown command {name:?}"),
            ActivationError::NoActiveTab => write!(f, "no active tab"),
            ActivationError::ContentScriptInjection { tab, reason } => {
                write!(f, "could not load content script into {tab}: {reason}")
            }
            ActivationError::Abandoned { tab } => {
                write!(f, "content script in {tab} did not answer after loading")
            }
            ActivationError::Send { tab, error } => write!(f, "toggle to {tab} failed: {error}"),
        }
    }
}

impl std::error::Error for ActivationError {}

fn toggle_wire_len() -> usize {
    serde_json::to_vec(&ActivationMessage::toggle())
        .map(|bytes| bytes.len())
        .unwrap_or_default()
}

pub struct ActivationDispatcher {
    tabs: Arc<dyn BrowserTabs>,
    bus: ActivationBus,
    sessions: HashMap<TabId, TabSession>,
    content_script_settle: Duration,
}

impl ActivationDispatcher {
    pub fn new(tabs: Arc<dyn BrowserTabs>, bus: ActivationBus, content_script_settle: Duration) -> Self {
        Self {
            tabs,
            bus,
            sessions: HashMap::new(),
            content_script_settle,
        }
    }

    pub fn session(&self, tab: TabId) -> Option<&TabSession> {
        self.sessions.get(&tab)
    }

    fn session_mut(&mut self, tab: TabId) -> &mut TabSession {
        self.sessions
            .entry(tab)
            .or_insert_with(|| TabSession::new(tab))
    }

    pub async fn on_command(&mut self, name: &str) -> Result<ActivationReport, ActivationError> {
        if name != TOGGLE_COMMAND {
            log::debug!("background: ignoring command {name:?}");
            return Err(ActivationError::UnknownCommand(name.to_string()));
        }
        self.on_shortcut().await
    }

    /// Toggle the palette in the active tab.
    pub async fn on_shortcut(&mut self) -> Result<ActivationReport, ActivationError> {
        let started = Instant::now();
        let active = self.tabs.active_tab().await;
        let result = match active {
            Some(tab) => self.activate(tab.id).await,
            None => Err(ActivationError::NoActiveTab),
        };
        emit_span_duration(
            SPAN_ACTIVATION,
            u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX),
        );
        match &result {
            Ok(report) => log::debug!("background: toggle acknowledged {report:?}"),
            // Expected on privileged pages; nothing for the user to see.
            Err(e) => log::info!("background: {e}"),
        }
        result
    }

    async fn activate(&mut self, tab: TabId) -> Result<ActivationReport, ActivationError> {
        let mut retry = RetryPolicy::once(self.content_script_settle);
        let mut injected_content_script = false;
        loop {
            emit_message(CHANNEL_ACTIVATION_SENT, toggle_wire_len());
            let error = match self
                .bus
                .send(ContextAddress::ContentScript(tab), ActivationMessage::toggle())
                .await
            {
                Ok(ack) => {
                    self.session_mut(tab).record_toggle_ack(ack.success);
                    return Ok(ActivationReport {
                        tab,
                        ack,
                        injected_content_script,
                    });
                }
                Err(error) => error,
            };

            if error != SendError::NoReceiver {
                return Err(ActivationError::Send { tab, error });
            }
            self.session_mut(tab).record_no_receiver();

            let Some(settle) = retry.next_delay() else {
                emit_message(CHANNEL_ACTIVATION_ABANDONED, 0);
                return Err(ActivationError::Abandoned { tab });
            };

            log::debug!("background: no content script in {tab}, loading it");
            if let Err(reason) = self.tabs.execute_content_script(tab).await {
                emit_message(CHANNEL_ACTIVATION_ABANDONED, reason.len());
                return Err(ActivationError::ContentScriptInjection { tab, reason });
            }
            emit_message(CHANNEL_ACTIVATION_FALLBACK_INJECT, 0);
            injected_content_script = true;
            tokio::time::sleep(settle).await;
        }
    }

    pub fn on_tab_updated(&mut self, tab: TabId, status: TabLoadStatus, url: &str) {
        match status {
            // A navigation replaces every script in the tab.
            TabLoadStatus::Loading => {
                self.sessions.remove(&tab);
            }
            TabLoadStatus::Complete => log::trace!("background: {tab} finished loading {url}"),
        }
    }

    pub fn on_tab_removed(&mut self, tab: TabId) {
        self.sessions.remove(&tab);
    }

    async fn handle(&mut self, event: BrowserEvent) {
        match event {
            BrowserEvent::Command { name, reply } => {
                let result = self.on_command(&name).await;
                if let Some(reply) = reply {
                    let _ = reply.send(result);
                }
            }
            BrowserEvent::TabUpdated { tab, status, url } => self.on_tab_updated(tab, status, &url),
            BrowserEvent::TabRemoved(tab) => self.on_tab_removed(tab),
        }
    }

    async fn run(mut self, mut events: mpsc::UnboundedReceiver<BrowserEvent>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => self.handle(event).await,
                    None => break,
                },
            }
        }
        log::debug!("background: stopped");
    }
}

/// Sending half of the background's event queue.
#[derive(Clone)]
pub struct BackgroundHandle {
    events: mpsc::UnboundedSender<BrowserEvent>,
}

impl BackgroundHandle {
    /// Start the background loop under the env's supervisor.
    pub fn spawn(env: &ExtensionEnv, tabs: Arc<dyn BrowserTabs>) -> Self {
        let (events, rx) = mpsc::unbounded_channel();
        let dispatcher =
            ActivationDispatcher::new(tabs, env.bus.clone(), env.settings.content_script_settle);
        env.supervisor
            .spawn(dispatcher.run(rx, env.supervisor.cancellation()));
        Self { events }
    }

    pub fn notify(&self, event: BrowserEvent) {
        if self.events.send(event).is_err() {
            log::debug!("background: event dropped, loop has stopped");
        }
    }

    /// Deliver a command and wait for its outcome.
    pub async fn command(&self, name: &str) -> Result<ActivationReport, ActivationError> {
        let (reply, outcome) = oneshot::channel();
        self.notify(BrowserEvent::Command {
            name: name.to_string(),
            reply: Some(reply),
        });
        outcome.await.unwrap_or(Err(ActivationError::NoActiveTab))
    }
}
