/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Transport for Ghostshell: the request/reply bus that links the isolated
//! extension contexts, and the HTTP collaborators the palette talks to.

pub mod backend;
pub mod channel;

pub use backend::{BackendError, HttpBackend, MemoryBackend, RagAnswer, SaveReceipt};
pub use channel::{ContextAddress, Incoming, Listener, MessageBus, ReplyHandle, SendError};

#[cfg(any(test, feature = "test-support"))]
pub use backend::test_support;
