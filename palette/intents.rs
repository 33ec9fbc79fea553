/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Palette reducer.
//!
//! [`PaletteState::apply`] is synchronous and deterministic. Anything that
//! has to happen outside the state (network calls, timers, listener
//! registration, unmounting) comes back as a [`PaletteEffect`] for the
//! runtime to carry out; results re-enter as intents.

use ghostshell_comms::{BackendError, RagAnswer, SaveReceipt};
use ghostshell_core::{ChatMessage, CursorPoint, PaletteOffset, SavedMemorySet, ScrapedMemory};

use super::state::{DUPLICATE_SAVE_MESSAGE, DragState, PaletteState, PaletteTab, SaveStatus};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NudgeDirection {
    Left,
    Right,
    Up,
    Down,
}

impl NudgeDirection {
    fn unit(self) -> PaletteOffset {
        match self {
            NudgeDirection::Left => PaletteOffset::new(-1, 0),
            NudgeDirection::Right => PaletteOffset::new(1, 0),
            NudgeDirection::Up => PaletteOffset::new(0, -1),
            NudgeDirection::Down => PaletteOffset::new(0, 1),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum PaletteIntent {
    /// The palette was just mounted.
    Open,
    /// The palette was just unmounted.
    Reset,
    /// User asked to close (Escape, backdrop, close button).
    Close,
    SelectTab(PaletteTab),
    HighlightNext,
    HighlightPrevious,
    Nudge(NudgeDirection),
    ResetPosition,
    BeginDrag {
        cursor: CursorPoint,
    },
    DragTo {
        cursor: CursorPoint,
    },
    EndDrag,
    PreviewScraped(ScrapedMemory),
    RequestSave,
    SaveCompleted {
        generation: u64,
        memory: ScrapedMemory,
        result: Result<SaveReceipt, BackendError>,
    },
    SaveStatusExpired {
        generation: u64,
    },
    SetChatDraft(String),
    SubmitChatDraft,
    QueryCompleted {
        session: u64,
        result: Result<RagAnswer, BackendError>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub enum PaletteEffect {
    RequestUnmount,
    ScrapePreview,
    Save { generation: u64, memory: ScrapedMemory },
    ScheduleStatusRevert { generation: u64 },
    Query { session: u64, question: String },
    AcquireDragListeners,
    ReleaseDragListeners,
}

impl PaletteState {
    pub fn apply(&mut self, intent: PaletteIntent, saved: &mut SavedMemorySet) -> Vec<PaletteEffect> {
        let mut effects = Vec::new();
        match intent {
            PaletteIntent::Open => {
                if !self.is_open {
                    self.reset();
                    self.is_open = true;
                    self.session += 1;
                    if self.active_tab == PaletteTab::Memory {
                        effects.push(PaletteEffect::ScrapePreview);
                    }
                }
            }
            PaletteIntent::Reset => {
                if self.drag.active {
                    effects.push(PaletteEffect::ReleaseDragListeners);
                }
                self.reset();
            }
            PaletteIntent::SaveCompleted {
                generation,
                memory,
                result,
            } => self.complete_save(generation, memory, result, saved, &mut effects),
            PaletteIntent::SaveStatusExpired { generation } => {
                if generation == self.save_generation && self.save_status.is_terminal() {
                    self.save_status = SaveStatus::Idle;
                    self.save_message.clear();
                }
            }
            PaletteIntent::QueryCompleted { session, result } => {
                self.complete_query(session, result)
            }
            _ if !self.is_open => {
                log::trace!("palette: {intent:?} ignored while closed");
            }
            PaletteIntent::Close => effects.push(PaletteEffect::RequestUnmount),
            PaletteIntent::SelectTab(tab) => {
                self.active_tab = tab;
                self.highlighted_index = 0;
                if tab == PaletteTab::Memory {
                    effects.push(PaletteEffect::ScrapePreview);
                }
            }
            PaletteIntent::HighlightNext => self.step_highlight(saved, 1),
            PaletteIntent::HighlightPrevious => self.step_highlight(saved, -1),
            PaletteIntent::Nudge(direction) => {
                self.position += direction.unit() * self.config.nudge_step;
            }
            PaletteIntent::ResetPosition => self.position = PaletteOffset::zero(),
            PaletteIntent::BeginDrag { cursor } => {
                if !self.drag.active {
                    self.drag = DragState {
                        active: true,
                        anchor: cursor - self.position,
                    };
                    effects.push(PaletteEffect::AcquireDragListeners);
                }
            }
            PaletteIntent::DragTo { cursor } => {
                if self.drag.active {
                    self.position = cursor - self.drag.anchor;
                }
            }
            PaletteIntent::EndDrag => {
                if self.drag.active {
                    self.drag.active = false;
                    effects.push(PaletteEffect::ReleaseDragListeners);
                }
            }
            PaletteIntent::PreviewScraped(memory) => self.preview = Some(memory),
            PaletteIntent::RequestSave => self.request_save(saved, &mut effects),
            PaletteIntent::SetChatDraft(text) => self.chat_draft = text,
            PaletteIntent::SubmitChatDraft => self.submit_chat_draft(&mut effects),
        }
        effects
    }

    fn step_highlight(&mut self, saved: &SavedMemorySet, delta: isize) {
        if !self.active_tab.has_list() {
            return;
        }
        let count = self.item_count(saved);
        if count == 0 {
            self.highlighted_index = 0;
            return;
        }
        let current = self.highlighted_index.min(count - 1) as isize;
        self.highlighted_index = (current + delta).rem_euclid(count as isize) as usize;
    }

    fn request_save(&mut self, saved: &SavedMemorySet, effects: &mut Vec<PaletteEffect>) {
        if self.active_tab != PaletteTab::Memory || self.save_status == SaveStatus::Saving {
            return;
        }
        let Some(memory) = self.preview.clone() else {
            log::debug!("palette: save requested before the page was scraped");
            return;
        };

        self.save_generation += 1;
        if saved.contains_url(&memory.url) || self.pending_saves.contains(&memory.url) {
            self.save_status = SaveStatus::Error;
            self.save_message = DUPLICATE_SAVE_MESSAGE.to_string();
            effects.push(PaletteEffect::ScheduleStatusRevert {
                generation: self.save_generation,
            });
            return;
        }

        self.save_status = SaveStatus::Saving;
        self.save_message.clear();
        self.pending_saves.insert(memory.url.clone());
        effects.push(PaletteEffect::Save {
            generation: self.save_generation,
            memory,
        });
    }

    fn complete_save(
        &mut self,
        generation: u64,
        memory: ScrapedMemory,
        result: Result<SaveReceipt, BackendError>,
        saved: &mut SavedMemorySet,
        effects: &mut Vec<PaletteEffect>,
    ) {
        let current = generation == self.save_generation && self.is_open;
        self.pending_saves.remove(&memory.url);
        match result {
            // The backend stored it either way; keep the local list in step.
            Ok(receipt) => match saved.insert(memory) {
                Ok(()) if current => {
                    self.save_status = SaveStatus::Success;
                    self.save_message = receipt.message;
                }
                Ok(()) => {}
                Err(duplicate) => {
                    log::debug!("palette: {duplicate}");
                    if current {
                        self.save_status = SaveStatus::Error;
                        self.save_message = DUPLICATE_SAVE_MESSAGE.to_string();
                    }
                }
            },
            Err(error) => {
                log::warn!("palette: failed to save memory: {error}");
                if current {
                    self.save_status = SaveStatus::Error;
                    self.save_message = format!("Failed to save memory: {error}");
                }
            }
        }
        if current {
            effects.push(PaletteEffect::ScheduleStatusRevert { generation });
        }
    }

    fn submit_chat_draft(&mut self, effects: &mut Vec<PaletteEffect>) {
        if self.active_tab != PaletteTab::Chat {
            return;
        }
        let question = self.chat_draft.trim().to_string();
        if question.is_empty() {
            return;
        }
        self.chat_draft.clear();
        self.transcript.push(ChatMessage::user(question.clone()));
        self.queries_in_flight += 1;
        effects.push(PaletteEffect::Query {
            session: self.session,
            question,
        });
    }

    fn complete_query(&mut self, session: u64, result: Result<RagAnswer, BackendError>) {
        if session != self.session || !self.is_open {
            log::debug!("palette: dropping answer for a closed session");
            return;
        }
        self.queries_in_flight = self.queries_in_flight.saturating_sub(1);
        let message = match result {
            Ok(answer) => ChatMessage::answer(answer.answer, answer.source, answer.hallucinated),
            Err(error) => {
                log::warn!("palette: failed to query RAG: {error}");
                ChatMessage::failure(&format!("Failed to query RAG: {error}"))
            }
        };
        self.transcript.push(message);
    }
}
