/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Ghostshell: a command palette injected into arbitrary pages on a shortcut.
//!
//! Three isolated contexts cooperate over the [`ghostshell_comms`] bus:
//! the background ([`extension::background`]), the per-tab content script
//! ([`extension::content`], [`input`]) and the page-world script ([`page`],
//! [`palette`]). The browser itself is reached only through [`host`] ports.

pub mod cli;
pub mod diagnostics;
pub mod extension;
pub mod host;
pub mod input;
pub mod page;
pub mod palette;
pub mod prefs;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Install the process-wide subscriber. `log` records are bridged into it.
#[cfg(feature = "tracing")]
pub fn init_tracing(filter: Option<&str>) {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = match filter {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish()
        .try_init();
}

#[cfg(not(feature = "tracing"))]
pub fn init_tracing(_filter: Option<&str>) {}
