/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Event loop of the page-world script.
//!
//! Toggles from the content script, user input from the render surface and
//! completions of palette effects are all serialized through one loop, which
//! owns the [`MountController`] and the [`PaletteRuntime`].

use std::sync::Arc;

use ghostshell_comms::{ContextAddress, Listener};
use ghostshell_core::{ActivationMessage, CursorPoint, TabId, ToggleAck};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use super::mount::{MountController, MountState, MountTransition};
use crate::extension::ExtensionEnv;
use crate::host::{
    KeyListener, ListenerPhase, PageDocument, PageScraper, PointerEventKind, PointerListener,
};
use crate::input::{KeyEvent, KeyStroke, is_editable_context};
use crate::palette::keys::intent_for_key;
use crate::palette::{PaletteIntent, PaletteRuntime, PaletteState, PaletteTab, PaletteView};

/// `window` slot marking that the page-world script already runs.
pub const PAGE_WORLD_GLOBAL: &str = "__ghostUI_pageWorld";

/// Parts of the overlay a mouse button can go down on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerRegion {
    /// The title bar; starts a drag.
    Header,
    /// Outside the palette card.
    Backdrop,
    Card,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaletteControl {
    Tab(PaletteTab),
    Save,
    Close,
    Send,
}

#[derive(Debug)]
pub enum PageEvent {
    Key(KeyStroke),
    PointerDown {
        region: PointerRegion,
        cursor: CursorPoint,
    },
    Pointer {
        kind: PointerEventKind,
        cursor: CursorPoint,
    },
    Click(PaletteControl),
    ChatInput(String),
    Inspect(oneshot::Sender<PageSnapshot>),
}

/// Point-in-time copy of the page world, for drivers and tests.
#[derive(Clone, Debug)]
pub struct PageSnapshot {
    pub mount: MountState,
    pub palette: PaletteState,
    /// What the render root shows; `None` while unmounted.
    pub view: Option<PaletteView>,
    pub saved_urls: Vec<String>,
}

/// Input side of a running page world.
#[derive(Clone)]
pub struct PageWorldHandle {
    tab: TabId,
    events: mpsc::UnboundedSender<PageEvent>,
}

impl PageWorldHandle {
    pub fn tab(&self) -> TabId {
        self.tab
    }

    pub fn send(&self, event: PageEvent) {
        if self.events.send(event).is_err() {
            log::debug!("page world: {} has stopped, event dropped", self.tab);
        }
    }

    pub async fn snapshot(&self) -> Option<PageSnapshot> {
        let (reply, snapshot) = oneshot::channel();
        self.send(PageEvent::Inspect(reply));
        snapshot.await.ok()
    }
}

/// Forwards page key presses that no earlier listener claimed.
struct KeyForwarder {
    events: mpsc::UnboundedSender<PageEvent>,
}

impl KeyListener for KeyForwarder {
    fn on_key(&self, event: &KeyEvent, _phase: ListenerPhase) {
        if event.is_handled() {
            return;
        }
        let _ = self.events.send(PageEvent::Key(event.stroke()));
    }
}

/// Document-level mouse listener, attached only while dragging.
struct PointerForwarder {
    events: mpsc::UnboundedSender<PageEvent>,
}

impl PointerListener for PointerForwarder {
    fn on_pointer(&self, kind: PointerEventKind, cursor: CursorPoint) {
        let _ = self.events.send(PageEvent::Pointer { kind, cursor });
    }
}

pub struct PageWorld {
    tab: TabId,
    document: Arc<dyn PageDocument>,
    mount: MountController,
    palette: PaletteRuntime,
}

impl PageWorld {
    /// Start the page world in `document`, or return the one already running
    /// there. Loading the script twice never adds a second listener.
    pub fn boot(
        env: &ExtensionEnv,
        tab: TabId,
        document: Arc<dyn PageDocument>,
        scraper: Arc<dyn PageScraper>,
    ) -> Arc<PageWorldHandle> {
        let (handle, created) = document.globals().get_or_insert_with(PAGE_WORLD_GLOBAL, || {
            let listener = env.bus.register(ContextAddress::PageWorld(tab));
            let (events_tx, events_rx) = mpsc::unbounded_channel();
            let (completions_tx, completions_rx) = mpsc::unbounded_channel();

            document.add_key_listener(
                ListenerPhase::WindowBubble,
                Arc::new(KeyForwarder {
                    events: events_tx.clone(),
                }),
            );
            let palette = PaletteRuntime::new(
                env.settings.palette.clone(),
                env.backend.clone(),
                scraper,
                document.clone(),
                Arc::new(PointerForwarder {
                    events: events_tx.clone(),
                }),
                completions_tx,
            );
            let world = PageWorld {
                tab,
                document: document.clone(),
                mount: MountController::new(document.clone()),
                palette,
            };
            env.supervisor.spawn(world.run(
                listener,
                events_rx,
                completions_rx,
                env.supervisor.cancellation(),
            ));
            PageWorldHandle {
                tab,
                events: events_tx,
            }
        });
        if created {
            log::debug!("page world: started in {tab}");
        } else {
            log::debug!("page world: script loaded again in {tab}, keeping the running one");
        }
        handle
    }

    async fn run(
        mut self,
        mut listener: Listener<ActivationMessage, ToggleAck>,
        mut events: mpsc::UnboundedReceiver<PageEvent>,
        mut completions: mpsc::UnboundedReceiver<PaletteIntent>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                incoming = listener.recv() => {
                    let Some(incoming) = incoming else {
                        break;
                    };
                    let success = self.toggle();
                    incoming.respond(ToggleAck { success });
                }
                Some(event) = events.recv() => self.on_event(event),
                Some(intent) = completions.recv() => self.dispatch(intent),
            }
        }
        log::debug!("page world: {} stopped", self.tab);
    }

    /// Mount or unmount, keeping the palette in step with the mount.
    fn toggle(&mut self) -> bool {
        match self.mount.toggle() {
            Ok(MountTransition::Mounted { .. }) => {
                self.palette.dispatch(PaletteIntent::Open);
                self.present();
                true
            }
            Ok(MountTransition::Unmounted { .. }) => {
                self.palette.dispatch(PaletteIntent::Reset);
                true
            }
            Err(e) => {
                log::warn!("page world: cannot mount in {}: {e}", self.tab);
                false
            }
        }
    }

    fn dispatch(&mut self, intent: PaletteIntent) {
        if self.palette.dispatch(intent) && self.mount.is_mounted() {
            self.toggle();
            return;
        }
        self.present();
    }

    fn present(&self) {
        if let Some(root) = self.mount.mounted_root() {
            self.document.present(root, Some(&self.palette.view()));
        }
    }

    fn on_event(&mut self, event: PageEvent) {
        let intent = match event {
            PageEvent::Inspect(reply) => {
                let _ = reply.send(self.snapshot());
                return;
            }
            _ if !self.mount.is_mounted() => return,
            PageEvent::Key(stroke) => {
                let editable = self
                    .document
                    .active_element()
                    .is_some_and(|element| is_editable_context(&element));
                match intent_for_key(&stroke, self.palette.state(), editable) {
                    Some(intent) => intent,
                    None => return,
                }
            }
            PageEvent::PointerDown { region, cursor } => match region {
                PointerRegion::Header => PaletteIntent::BeginDrag { cursor },
                PointerRegion::Backdrop => PaletteIntent::Close,
                PointerRegion::Card => return,
            },
            PageEvent::Pointer { kind, cursor } => match kind {
                PointerEventKind::MouseMove => PaletteIntent::DragTo { cursor },
                PointerEventKind::MouseUp => PaletteIntent::EndDrag,
            },
            PageEvent::Click(control) => match control {
                PaletteControl::Tab(tab) => PaletteIntent::SelectTab(tab),
                PaletteControl::Save => PaletteIntent::RequestSave,
                PaletteControl::Close => PaletteIntent::Close,
                PaletteControl::Send => PaletteIntent::SubmitChatDraft,
            },
            PageEvent::ChatInput(text) => PaletteIntent::SetChatDraft(text),
        };
        self.dispatch(intent);
    }

    fn snapshot(&self) -> PageSnapshot {
        let state = self.palette.state();
        PageSnapshot {
            mount: self.mount.state(),
            palette: state.clone(),
            view: self.mount.is_mounted().then(|| self.palette.view()),
            saved_urls: self
                .palette
                .saved()
                .ordered(state.config.saved_order)
                .into_iter()
                .map(|memory| memory.url.clone())
                .collect(),
        }
    }
}
