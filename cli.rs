/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! `ghostshell` binary: drives the extension in the headless browser.
//!
//! Opens one tab, fires the activation command, optionally saves the page
//! and asks questions, then prints the palette view and a diagnostics
//! summary as JSON.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bpaf::Bpaf;
use ghostshell_comms::HttpBackend;
use ghostshell_core::TabId;
use ghostshell_core::protocol::TOGGLE_COMMAND;
use serde_json::json;

use crate::diagnostics::DiagnosticsState;
use crate::extension::background::ActivationError;
use crate::extension::{ExtensionEnv, ExtensionSettings};
use crate::host::headless::HeadlessBrowser;
use crate::input::Platform;
use crate::page::{PageEvent, PageSnapshot, PageWorldHandle, PaletteControl};
use crate::palette::{PaletteTab, SaveStatus};
use crate::prefs::{GhostPreferences, PrefsError};

const SNAPSHOT_POLL: Duration = Duration::from_millis(20);
const BACKEND_WAIT: Duration = Duration::from_secs(30);

#[derive(Clone, Debug, Bpaf)]
#[bpaf(options, version)]
/// Open a page in a headless browser and drive the Ghostshell palette on it.
pub struct CliOptions {
    /// Preferences file (default: <config dir>/ghostshell/prefs.toml)
    #[bpaf(long("prefs"), argument("PATH"))]
    pub prefs: Option<PathBuf>,
    /// Base URL of the memory/RAG backend
    #[bpaf(long("backend"), argument("URL"))]
    pub backend: Option<String>,
    /// tracing-subscriber env filter, e.g. `ghostshell=debug`
    #[bpaf(long("tracing-filter"), argument("FILTER"))]
    pub tracing_filter: Option<String>,
    /// Page to open
    #[bpaf(long("url"), argument("URL"), fallback("https://example.com/".to_string()))]
    pub url: String,
    /// Save the page to memory after opening the palette
    #[bpaf(long("save"), switch)]
    pub save: bool,
    /// Ask a question on the Chat tab (repeatable)
    #[bpaf(long("ask"), argument("QUESTION"))]
    pub ask: Vec<String>,
    /// Modifier convention for the shortcut: `mac` or `other`
    #[bpaf(long("platform"), argument::<String>("PLATFORM"), parse(parse_platform), optional)]
    pub platform: Option<Platform>,
}

fn parse_platform(value: String) -> Result<Platform, String> {
    match value.to_ascii_lowercase().as_str() {
        "mac" | "apple" | "macos" => Ok(Platform::Apple),
        "other" | "linux" | "windows" => Ok(Platform::Other),
        other => Err(format!("unknown platform {other:?}, expected `mac` or `other`")),
    }
}

#[derive(Debug)]
pub enum CliError {
    Prefs(PrefsError),
    Backend(String),
    Runtime(std::io::Error),
    Activation(ActivationError),
    /// The toggle was acknowledged but the page script never started.
    NoPageWorld(TabId),
    Timeout(&'static str),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Prefs(e) => write!(f, "{e}"),
            CliError::Backend(e) => write!(f, "cannot build backend client: {e}"),
            CliError::Runtime(e) => write!(f, "cannot start async runtime: {e}"),
            CliError::Activation(e) => write!(f, "activation failed: {e}"),
            CliError::NoPageWorld(tab) => write!(f, "page script is not running in {tab}"),
            CliError::Timeout(what) => write!(f, "timed out waiting for {what}"),
        }
    }
}

impl std::error::Error for CliError {}

impl From<PrefsError> for CliError {
    fn from(e: PrefsError) -> Self {
        CliError::Prefs(e)
    }
}

impl From<ActivationError> for CliError {
    fn from(e: ActivationError) -> Self {
        CliError::Activation(e)
    }
}

pub fn main() {
    let options = cli_options().run();
    if let Err(e) = run(options) {
        log::error!("{e}");
        eprintln!("ghostshell: {e}");
        std::process::exit(1);
    }
}

fn run(options: CliOptions) -> Result<(), CliError> {
    let prefs = GhostPreferences::load(options.prefs.as_deref());
    let tracing_filter = options.tracing_filter.clone().or_else(|| {
        prefs
            .as_ref()
            .ok()
            .and_then(|prefs| prefs.tracing_filter.clone())
    });
    crate::init_tracing(tracing_filter.as_deref());
    let prefs = apply_overrides(prefs?, &options);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;
    let output = runtime.block_on(drive(&options, &prefs))?;
    println!(
        "{}",
        serde_json::to_string_pretty(&output).unwrap_or_else(|_| output.to_string())
    );
    Ok(())
}

fn apply_overrides(mut prefs: GhostPreferences, options: &CliOptions) -> GhostPreferences {
    if let Some(backend) = &options.backend {
        prefs.backend_url = backend.clone();
    }
    if options.platform.is_some() {
        prefs.platform = options.platform;
    }
    prefs
}

async fn drive(options: &CliOptions, prefs: &GhostPreferences) -> Result<serde_json::Value, CliError> {
    let base = prefs.backend_base()?;
    let backend = HttpBackend::new(&base).map_err(|e| CliError::Backend(e.to_string()))?;
    let mut diagnostics = DiagnosticsState::new();

    let browser = HeadlessBrowser::start(ExtensionEnv::new(
        ExtensionSettings::from_prefs(prefs),
        Arc::new(backend),
    ));
    let tab = browser.open_tab(&options.url);
    let report = browser.trigger_command(TOGGLE_COMMAND).await?;
    log::info!(
        "toggled {} (ack {}, content script loaded on demand: {})",
        report.tab,
        report.ack.success,
        report.injected_content_script
    );

    let world = browser.page_world(tab).ok_or(CliError::NoPageWorld(tab))?;
    if options.save {
        world.send(PageEvent::Click(PaletteControl::Save));
        wait_for(&world, "the save to finish", |snapshot| {
            snapshot.palette.save_status != SaveStatus::Saving
        })
        .await?;
    }
    if !options.ask.is_empty() {
        world.send(PageEvent::Click(PaletteControl::Tab(PaletteTab::Chat)));
    }
    for question in &options.ask {
        world.send(PageEvent::ChatInput(question.clone()));
        world.send(PageEvent::Click(PaletteControl::Send));
        wait_for(&world, "the answer", |snapshot| !snapshot.palette.loading()).await?;
    }

    let snapshot = wait_for(&world, "the final view", |_| true).await?;
    browser.shutdown().await;
    diagnostics.drain();

    Ok(json!({
        "tab": report.tab.0,
        "mounted": snapshot.mount.mounted,
        "saved": snapshot.saved_urls,
        "view": snapshot.view,
        "diagnostics": diagnostics.summary_json(),
    }))
}

async fn wait_for(
    world: &PageWorldHandle,
    what: &'static str,
    done: impl Fn(&PageSnapshot) -> bool,
) -> Result<PageSnapshot, CliError> {
    let poll = async {
        loop {
            let snapshot = world.snapshot().await?;
            if done(&snapshot) {
                return Some(snapshot);
            }
            tokio::time::sleep(SNAPSHOT_POLL).await;
        }
    };
    match tokio::time::timeout(BACKEND_WAIT, poll).await {
        Ok(Some(snapshot)) => Ok(snapshot),
        Ok(None) => Err(CliError::NoPageWorld(world.tab())),
        Err(_) => Err(CliError::Timeout(what)),
    }
}
