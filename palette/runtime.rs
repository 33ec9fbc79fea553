/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Carries out [`PaletteEffect`]s.
//!
//! Backend calls and timers run as spawned tasks and report back through the
//! completion channel as [`PaletteIntent`]s, which the page world feeds into
//! [`PaletteRuntime::dispatch`] again.

use std::collections::VecDeque;
use std::sync::Arc;

use ghostshell_comms::MemoryBackend;
use ghostshell_core::{SavedMemorySet, ScrapedMemory};
use tokio::sync::mpsc;

use super::drag::DragListenerGuard;
use super::intents::{PaletteEffect, PaletteIntent};
use super::state::{PaletteConfig, PaletteState};
use super::view::PaletteView;
use crate::diagnostics::{
    CHANNEL_PALETTE_QUERY, CHANNEL_PALETTE_QUERY_FAILED, CHANNEL_PALETTE_SAVE,
    CHANNEL_PALETTE_SAVE_FAILED, emit_message,
};
use crate::host::{PageDocument, PageScraper, PointerListener};

pub struct PaletteRuntime {
    state: PaletteState,
    saved: SavedMemorySet,
    backend: Arc<dyn MemoryBackend>,
    scraper: Arc<dyn PageScraper>,
    document: Arc<dyn PageDocument>,
    pointer: Arc<dyn PointerListener>,
    completions: mpsc::UnboundedSender<PaletteIntent>,
    drag_guard: Option<DragListenerGuard>,
}

impl PaletteRuntime {
    pub fn new(
        config: PaletteConfig,
        backend: Arc<dyn MemoryBackend>,
        scraper: Arc<dyn PageScraper>,
        document: Arc<dyn PageDocument>,
        pointer: Arc<dyn PointerListener>,
        completions: mpsc::UnboundedSender<PaletteIntent>,
    ) -> Self {
        Self {
            state: PaletteState::new(config),
            saved: SavedMemorySet::new(),
            backend,
            scraper,
            document,
            pointer,
            completions,
            drag_guard: None,
        }
    }

    pub fn state(&self) -> &PaletteState {
        &self.state
    }

    pub fn saved(&self) -> &SavedMemorySet {
        &self.saved
    }

    pub fn view(&self) -> PaletteView {
        PaletteView::render(&self.state, &self.saved)
    }

    /// Apply `intent` and everything it triggers synchronously. Returns true
    /// when the palette asked to be unmounted.
    pub fn dispatch(&mut self, intent: PaletteIntent) -> bool {
        let mut unmount_requested = false;
        let mut queue = VecDeque::from([intent]);
        while let Some(intent) = queue.pop_front() {
            for effect in self.state.apply(intent, &mut self.saved) {
                match effect {
                    PaletteEffect::RequestUnmount => unmount_requested = true,
                    PaletteEffect::ScrapePreview => {
                        queue.push_back(PaletteIntent::PreviewScraped(self.scraper.scrape()));
                    }
                    PaletteEffect::Save { generation, memory } => {
                        self.spawn_save(generation, memory)
                    }
                    PaletteEffect::ScheduleStatusRevert { generation } => {
                        self.spawn_status_revert(generation)
                    }
                    PaletteEffect::Query { session, question } => {
                        self.spawn_query(session, question)
                    }
                    PaletteEffect::AcquireDragListeners => {
                        self.drag_guard = Some(DragListenerGuard::acquire(
                            self.document.clone(),
                            self.pointer.clone(),
                        ));
                    }
                    PaletteEffect::ReleaseDragListeners => self.drag_guard = None,
                }
            }
        }
        unmount_requested
    }

    fn spawn_save(&self, generation: u64, memory: ScrapedMemory) {
        emit_message(CHANNEL_PALETTE_SAVE, memory.body_text.len());
        let backend = self.backend.clone();
        let completions = self.completions.clone();
        tokio::spawn(async move {
            let result = backend.save_memory(&memory).await;
            if result.is_err() {
                emit_message(CHANNEL_PALETTE_SAVE_FAILED, 0);
            }
            let _ = completions.send(PaletteIntent::SaveCompleted {
                generation,
                memory,
                result,
            });
        });
    }

    fn spawn_status_revert(&self, generation: u64) {
        let delay = self.state.config.status_revert;
        let completions = self.completions.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = completions.send(PaletteIntent::SaveStatusExpired { generation });
        });
    }

    fn spawn_query(&self, session: u64, question: String) {
        emit_message(CHANNEL_PALETTE_QUERY, question.len());
        let backend = self.backend.clone();
        let completions = self.completions.clone();
        tokio::spawn(async move {
            let result = backend.query(&question).await;
            if result.is_err() {
                emit_message(CHANNEL_PALETTE_QUERY_FAILED, 0);
            }
            let _ = completions.send(PaletteIntent::QueryCompleted { session, result });
        });
    }
}
