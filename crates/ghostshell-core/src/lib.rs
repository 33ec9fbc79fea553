/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Portable data model shared by every Ghostshell execution context.
//!
//! Nothing in this crate touches a browser, a runtime or the network; the
//! background, content-script and page-world sides all agree on these types
//! and on the wire shapes they serialize to.

pub mod chat;
pub mod geometry;
pub mod memory;
pub mod protocol;
pub mod saved;
pub mod tab;

pub use chat::{ChatMessage, ChatSender, ChatTranscript};
pub use geometry::{CssPixel, CursorPoint, PaletteOffset};
pub use memory::{MemoryKind, ScrapedMemory};
pub use protocol::{ActivationAction, ActivationMessage, ToggleAck};
pub use saved::{DuplicateMemory, SavedMemorySet, SavedOrder};
pub use tab::{TabId, TabSession};
