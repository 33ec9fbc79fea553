/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Diagnostics event stream.
//!
//! Components call [`emit_event`] with one of the `CHANNEL_*` ids; the call is
//! a no-op until a [`DiagnosticsState`] has installed the global sender.

use std::collections::{BTreeMap, VecDeque};
use std::sync::OnceLock;

use crossbeam_channel::{Receiver, Sender, unbounded};
use serde_json::{Value, json};

pub const CHANNEL_ACTIVATION_SENT: &str = "ghost.activation.sent";
pub const CHANNEL_ACTIVATION_FALLBACK_INJECT: &str = "ghost.activation.fallback_inject";
pub const CHANNEL_ACTIVATION_ABANDONED: &str = "ghost.activation.abandoned";
pub const CHANNEL_INJECTION_INSERTED: &str = "ghost.injection.inserted";
pub const CHANNEL_INJECTION_FAILED: &str = "ghost.injection.failed";
pub const CHANNEL_KEYBOARD_FORWARDED: &str = "ghost.keyboard.forwarded";
pub const CHANNEL_KEYBOARD_SUPPRESSED: &str = "ghost.keyboard.suppressed";
pub const CHANNEL_MOUNT_TOGGLED: &str = "ghost.mount.toggled";
pub const CHANNEL_MOUNT_NOT_READY: &str = "ghost.mount.not_ready";
pub const CHANNEL_PALETTE_SAVE: &str = "ghost.palette.save";
pub const CHANNEL_PALETTE_SAVE_FAILED: &str = "ghost.palette.save_failed";
pub const CHANNEL_PALETTE_QUERY: &str = "ghost.palette.query";
pub const CHANNEL_PALETTE_QUERY_FAILED: &str = "ghost.palette.query_failed";

pub const SPAN_ACTIVATION: &str = "ghost.activation";

const EVENT_RING_CAPACITY: usize = 256;

static GLOBAL_DIAGNOSTICS_TX: OnceLock<Sender<DiagnosticEvent>> = OnceLock::new();

#[cfg(test)]
thread_local! {
    static TEST_DIAGNOSTICS_TX: std::cell::RefCell<Option<Sender<DiagnosticEvent>>> =
        const { std::cell::RefCell::new(None) };
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DiagnosticEvent {
    MessageSent {
        channel_id: &'static str,
        byte_len: usize,
    },
    Span {
        name: &'static str,
        duration_us: u64,
    },
}

fn install_global_sender(sender: Sender<DiagnosticEvent>) {
    let _ = GLOBAL_DIAGNOSTICS_TX.set(sender.clone());

    #[cfg(test)]
    {
        TEST_DIAGNOSTICS_TX.with(|slot| {
            *slot.borrow_mut() = Some(sender);
        });
    }
}

pub fn emit_event(event: DiagnosticEvent) {
    // Unit tests run in parallel; each test thread only sees its own events.
    #[cfg(test)]
    {
        TEST_DIAGNOSTICS_TX.with(|slot| {
            if let Some(tx) = slot.borrow().as_ref() {
                let _ = tx.send(event);
            }
        });
    }

    #[cfg(not(test))]
    {
        if let Some(tx) = GLOBAL_DIAGNOSTICS_TX.get() {
            let _ = tx.send(event);
        }
    }
}

/// Shorthand for a [`DiagnosticEvent::MessageSent`] on `channel_id`.
pub fn emit_message(channel_id: &'static str, byte_len: usize) {
    emit_event(DiagnosticEvent::MessageSent {
        channel_id,
        byte_len,
    });
}

pub fn emit_span_duration(name: &'static str, duration_us: u64) {
    emit_event(DiagnosticEvent::Span { name, duration_us });
}

#[derive(Clone, Debug, Default)]
struct DiagnosticAggregates {
    message_counts: BTreeMap<&'static str, u64>,
    message_bytes: BTreeMap<&'static str, u64>,
    span_counts: BTreeMap<&'static str, u64>,
    span_total_us: BTreeMap<&'static str, u64>,
}

pub struct DiagnosticsState {
    event_rx: Receiver<DiagnosticEvent>,
    event_ring: VecDeque<DiagnosticEvent>,
    aggregates: DiagnosticAggregates,
}

impl DiagnosticsState {
    /// Create the aggregator and route [`emit_event`] into it. Only the first
    /// state created in a process receives events from other threads.
    pub fn new() -> Self {
        let (event_tx, event_rx) = unbounded();
        install_global_sender(event_tx);
        Self {
            event_rx,
            event_ring: VecDeque::new(),
            aggregates: DiagnosticAggregates::default(),
        }
    }

    pub fn drain(&mut self) {
        while let Ok(event) = self.event_rx.try_recv() {
            self.aggregate_event(&event);
            self.event_ring.push_back(event);
            while self.event_ring.len() > EVENT_RING_CAPACITY {
                self.event_ring.pop_front();
            }
        }
    }

    fn aggregate_event(&mut self, event: &DiagnosticEvent) {
        match event {
            DiagnosticEvent::MessageSent {
                channel_id,
                byte_len,
            } => {
                *self.aggregates.message_counts.entry(*channel_id).or_insert(0) += 1;
                *self.aggregates.message_bytes.entry(*channel_id).or_insert(0) += *byte_len as u64;
            }
            DiagnosticEvent::Span { name, duration_us } => {
                *self.aggregates.span_counts.entry(*name).or_insert(0) += 1;
                *self.aggregates.span_total_us.entry(*name).or_insert(0) += *duration_us;
            }
        }
    }

    pub fn channel_count(&self, channel: &'static str) -> u64 {
        self.aggregates
            .message_counts
            .get(channel)
            .copied()
            .unwrap_or(0)
    }

    pub fn recent_events(&self) -> impl Iterator<Item = &DiagnosticEvent> {
        self.event_ring.iter()
    }

    pub fn summary_json(&self) -> Value {
        let channels: serde_json::Map<String, Value> = self
            .aggregates
            .message_counts
            .iter()
            .map(|(channel, count)| {
                let bytes = self
                    .aggregates
                    .message_bytes
                    .get(channel)
                    .copied()
                    .unwrap_or(0);
                (
                    channel.to_string(),
                    json!({ "count": count, "bytes": bytes }),
                )
            })
            .collect();
        let spans: serde_json::Map<String, Value> = self
            .aggregates
            .span_counts
            .iter()
            .map(|(name, count)| {
                let total = self
                    .aggregates
                    .span_total_us
                    .get(name)
                    .copied()
                    .unwrap_or(0);
                let mean = if *count == 0 { 0 } else { total / count };
                (
                    name.to_string(),
                    json!({ "count": count, "mean_us": mean }),
                )
            })
            .collect();
        json!({ "channels": channels, "spans": spans })
    }
}

impl Default for DiagnosticsState {
    fn default() -> Self {
        Self::new()
    }
}
