/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Inter-context wire messages.

use serde::{Deserialize, Serialize};

/// Name of the extension command bound to the activation shortcut.
pub const TOGGLE_COMMAND: &str = "toggle-ghost-ui";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivationAction {
    Toggle,
}

/// `{ "action": "toggle" }`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationMessage {
    pub action: ActivationAction,
}

impl ActivationMessage {
    pub const fn toggle() -> Self {
        Self {
            action: ActivationAction::Toggle,
        }
    }
}

/// `{ "success": bool }`, a best-effort acknowledgement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleAck {
    pub success: bool,
}
