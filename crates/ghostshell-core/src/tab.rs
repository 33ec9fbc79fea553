/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TabId(pub u32);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tab#{}", self.0)
    }
}

/// Background-side view of a tab.
///
/// The tab itself owns the truth; these flags are only inferred from the
/// outcome of the last messages exchanged with it and may be stale.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TabSession {
    pub tab_id: TabId,
    pub content_script_ready: bool,
    pub page_script_injected: bool,
    pub mounted: bool,
}

impl TabSession {
    pub fn new(tab_id: TabId) -> Self {
        Self {
            tab_id,
            content_script_ready: false,
            page_script_injected: false,
            mounted: false,
        }
    }

    /// A toggle was acknowledged: the content script answered and, when it
    /// reports success, the page-world script is loaded and flipped `mounted`.
    pub fn record_toggle_ack(&mut self, success: bool) {
        self.content_script_ready = true;
        if success {
            self.page_script_injected = true;
            self.mounted = !self.mounted;
        }
    }

    /// Nobody answered on the content-script side.
    pub fn record_no_receiver(&mut self) {
        self.content_script_ready = false;
    }
}
