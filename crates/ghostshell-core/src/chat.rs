/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatSender {
    User,
    Bot,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: ChatSender,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// The answer came from the backend's fallback path and may be inaccurate.
    #[serde(default)]
    pub hallucinated: bool,
    #[serde(default)]
    pub error: bool,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            sender: ChatSender::User,
            text: text.into(),
            source: None,
            hallucinated: false,
            error: false,
        }
    }

    pub fn answer(text: impl Into<String>, source: impl Into<String>, hallucinated: bool) -> Self {
        Self {
            sender: ChatSender::Bot,
            text: text.into(),
            source: Some(source.into()),
            hallucinated,
            error: false,
        }
    }

    pub fn failure(description: &str) -> Self {
        Self {
            sender: ChatSender::Bot,
            text: format!("Error: {description}"),
            source: None,
            hallucinated: false,
            error: true,
        }
    }

    /// Source label as shown under an answer (`snake_case` ids read as words).
    pub fn source_label(&self) -> Option<String> {
        if self.error {
            return None;
        }
        self.source.as_ref().map(|source| source.replace('_', " "))
    }
}

/// Append-only chat history for one palette session.
#[derive(Clone, Debug, Default)]
pub struct ChatTranscript {
    messages: Vec<ChatMessage>,
}

impl ChatTranscript {
    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
