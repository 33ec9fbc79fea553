/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! User preferences, read from `prefs.toml`.
//!
//! Every field is optional in the file; missing fields take the defaults
//! below, which are also the timings the extension ships with.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ghostshell_core::SavedOrder;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::extension::injection::InjectionTiming;
use crate::input::Platform;
use crate::palette::PaletteConfig;

pub const PREFS_FILE_NAME: &str = "prefs.toml";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GhostPreferences {
    pub backend_url: String,
    pub reply_timeout_ms: u64,
    /// Wait after programmatically loading the content script.
    pub content_script_settle_ms: u64,
    /// Wait after the page-world script reports loaded.
    pub page_script_settle_ms: u64,
    pub attachment_poll_ms: u64,
    pub attachment_poll_budget: u32,
    pub script_load_retry_ms: u64,
    pub save_status_revert_ms: u64,
    pub nudge_step_px: i32,
    pub saved_order: SavedOrder,
    pub shortcut_key: char,
    pub platform: Option<Platform>,
    pub page_script_src: String,
    pub tracing_filter: Option<String>,
}

impl Default for GhostPreferences {
    fn default() -> Self {
        Self {
            backend_url: "http://127.0.0.1:8000".to_string(),
            reply_timeout_ms: 3000,
            content_script_settle_ms: 500,
            page_script_settle_ms: 100,
            attachment_poll_ms: 50,
            attachment_poll_budget: 20,
            script_load_retry_ms: 100,
            save_status_revert_ms: 3000,
            nudge_step_px: 20,
            saved_order: SavedOrder::OldestFirst,
            shortcut_key: 'k',
            platform: None,
            page_script_src: "chrome-extension://ghostshell/injected.js".to_string(),
            tracing_filter: None,
        }
    }
}

#[derive(Debug)]
pub enum PrefsError {
    Io { path: PathBuf, error: String },
    Parse { path: PathBuf, error: String },
    BackendUrl(String),
}

impl fmt::Display for PrefsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrefsError::Io { path, error } => write!(f, "cannot read {}: {error}", path.display()),
            PrefsError::Parse { path, error } => {
                write!(f, "invalid preferences in {}: {error}", path.display())
            }
            PrefsError::BackendUrl(e) => write!(f, "invalid backend url: {e}"),
        }
    }
}

impl std::error::Error for PrefsError {}

impl GhostPreferences {
    /// `<config dir>/ghostshell/prefs.toml`, when the platform has one.
    pub fn default_path() -> Option<PathBuf> {
        let mut dir = dirs::config_dir()?;
        dir.push("ghostshell");
        dir.push(PREFS_FILE_NAME);
        Some(dir)
    }

    /// Load from `path`, or from [`Self::default_path`] when `None`.
    /// A missing file yields the defaults; an unreadable or malformed one is
    /// an error.
    pub fn load(path: Option<&Path>) -> Result<Self, PrefsError> {
        let Some(path) = path.map(Path::to_path_buf).or_else(Self::default_path) else {
            return Ok(Self::default());
        };
        match fs::read_to_string(&path) {
            Ok(text) => Self::from_toml(&text).map_err(|error| PrefsError::Parse { path, error }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("prefs: {} not found, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(PrefsError::Io {
                path,
                error: e.to_string(),
            }),
        }
    }

    pub fn from_toml(text: &str) -> Result<Self, String> {
        toml::from_str(text).map_err(|e| e.to_string())
    }

    pub fn backend_base(&self) -> Result<Url, PrefsError> {
        Url::parse(&self.backend_url).map_err(|e| PrefsError::BackendUrl(e.to_string()))
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }

    pub fn content_script_settle(&self) -> Duration {
        Duration::from_millis(self.content_script_settle_ms)
    }

    pub fn injection_timing(&self) -> InjectionTiming {
        InjectionTiming {
            attachment_poll: Duration::from_millis(self.attachment_poll_ms),
            attachment_poll_budget: self.attachment_poll_budget,
            settle: Duration::from_millis(self.page_script_settle_ms),
            load_retry: Duration::from_millis(self.script_load_retry_ms),
        }
    }

    pub fn palette_config(&self) -> PaletteConfig {
        PaletteConfig {
            nudge_step: self.nudge_step_px,
            saved_order: self.saved_order,
            status_revert: Duration::from_millis(self.save_status_revert_ms),
        }
    }

    pub fn platform(&self) -> Platform {
        self.platform.unwrap_or_else(Platform::current)
    }
}
