/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Loads the page-world script into the page, at most once per page load.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::diagnostics::{CHANNEL_INJECTION_FAILED, CHANNEL_INJECTION_INSERTED, emit_message};
use crate::extension::retry::RetryPolicy;
use crate::host::{AttachmentPoint, PageDocument};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InjectionTiming {
    /// Interval between checks for an element to append the script to.
    pub attachment_poll: Duration,
    /// Checks made before giving up on finding one.
    pub attachment_poll_budget: u32,
    /// Wait after the script loaded, before reporting readiness.
    pub settle: Duration,
    /// Wait before the single retry after a load error.
    pub load_retry: Duration,
}

impl Default for InjectionTiming {
    fn default() -> Self {
        Self {
            attachment_poll: Duration::from_millis(50),
            attachment_poll_budget: 20,
            settle: Duration::from_millis(100),
            load_retry: Duration::from_millis(100),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InjectionError {
    NoAttachmentPoint { checks: u32 },
    LoadFailed(String),
}

impl fmt::Display for InjectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InjectionError::NoAttachmentPoint { checks } => {
                write!(f, "no element to attach the page script to after {checks} checks")
            }
            InjectionError::LoadFailed(e) => write!(f, "page script failed to load: {e}"),
        }
    }
}

impl std::error::Error for InjectionError {}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InjectionReport {
    AlreadyInjected,
    Injected { parent: AttachmentPoint },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InjectionState {
    pub script_injected: bool,
}

pub struct InjectionController {
    document: Arc<dyn PageDocument>,
    script_src: String,
    timing: InjectionTiming,
    state: InjectionState,
}

impl InjectionController {
    pub fn new(document: Arc<dyn PageDocument>, script_src: &str, timing: InjectionTiming) -> Self {
        Self {
            document,
            script_src: script_src.to_string(),
            timing,
            state: InjectionState::default(),
        }
    }

    pub fn state(&self) -> InjectionState {
        self.state
    }

    pub async fn ensure_injected(&mut self) -> Result<InjectionReport, InjectionError> {
        if self.state.script_injected {
            return Ok(InjectionReport::AlreadyInjected);
        }

        let mut retry = RetryPolicy::once(self.timing.load_retry);
        loop {
            match self.inject_once().await {
                Ok(parent) => {
                    tokio::time::sleep(self.timing.settle).await;
                    log::debug!("injection: page script ready under {}", parent.tag_name());
                    emit_message(CHANNEL_INJECTION_INSERTED, self.script_src.len());
                    return Ok(InjectionReport::Injected { parent });
                }
                Err(InjectionError::LoadFailed(e)) => {
                    self.state.script_injected = false;
                    match retry.next_delay() {
                        Some(delay) => {
                            log::warn!("injection: page script failed to load ({e}), retrying");
                            tokio::time::sleep(delay).await;
                        }
                        None => {
                            emit_message(CHANNEL_INJECTION_FAILED, e.len());
                            return Err(InjectionError::LoadFailed(e));
                        }
                    }
                }
                Err(error) => {
                    emit_message(CHANNEL_INJECTION_FAILED, 0);
                    return Err(error);
                }
            }
        }
    }

    async fn inject_once(&mut self) -> Result<AttachmentPoint, InjectionError> {
        let parent = self.wait_for_attachment_point().await?;
        let load = self.document.insert_script(parent, &self.script_src);
        self.state.script_injected = true;
        load.await.map_err(InjectionError::LoadFailed)?;
        Ok(parent)
    }

    async fn wait_for_attachment_point(&self) -> Result<AttachmentPoint, InjectionError> {
        let mut checks = 0;
        loop {
            checks += 1;
            if let Some(point) = AttachmentPoint::PREFERENCE
                .into_iter()
                .find(|point| self.document.has_attachment_point(*point))
            {
                return Ok(point);
            }
            if checks >= self.timing.attachment_poll_budget {
                return Err(InjectionError::NoAttachmentPoint { checks });
            }
            tokio::time::sleep(self.timing.attachment_poll).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::headless::{DocumentShape, HeadlessDocument};

    const SRC: &str = "chrome-extension://ghostshell/injected.js";

    #[tokio::test(start_paused = true)]
    async fn prefers_head_and_injects_once() {
        let document = HeadlessDocument::new("https://a.test");
        let mut controller =
            InjectionController::new(document.clone(), SRC, InjectionTiming::default());

        let first = controller.ensure_injected().await;
        let second = controller.ensure_injected().await;

        assert_eq!(
            first,
            Ok(InjectionReport::Injected {
                parent: AttachmentPoint::Head
            })
        );
        assert_eq!(second, Ok(InjectionReport::AlreadyInjected));
        assert_eq!(document.inserted_scripts(), [(AttachmentPoint::Head, SRC.to_string())]);
    }

    #[tokio::test(start_paused = true)]
    async fn falls_back_to_body_when_only_body_exists() {
        let document = HeadlessDocument::with_shape(
            "https://a.test",
            DocumentShape {
                head: false,
                document_element: false,
                body: true,
            },
        );
        let mut controller =
            InjectionController::new(document.clone(), SRC, InjectionTiming::default());

        assert_eq!(
            controller.ensure_injected().await,
            Ok(InjectionReport::Injected {
                parent: AttachmentPoint::Body
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn waits_for_attachment_point_to_appear() {
        let document = HeadlessDocument::with_shape("https://a.test", DocumentShape::EMPTY);
        let mut controller =
            InjectionController::new(document.clone(), SRC, InjectionTiming::default());

        let grow = {
            let document = document.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(120)).await;
                document.set_shape(DocumentShape::COMPLETE);
            })
        };

        let started = tokio::time::Instant::now();
        let report = controller.ensure_injected().await;
        grow.await.expect("shape task");

        assert!(matches!(report, Ok(InjectionReport::Injected { .. })));
        // Found on the check at 150ms, then the 100ms settle.
        assert_eq!(started.elapsed(), Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_poll_budget() {
        let document = HeadlessDocument::with_shape("https://a.test", DocumentShape::EMPTY);
        let timing = InjectionTiming {
            attachment_poll_budget: 4,
            ..InjectionTiming::default()
        };
        let mut controller = InjectionController::new(document.clone(), SRC, timing);

        assert_eq!(
            controller.ensure_injected().await,
            Err(InjectionError::NoAttachmentPoint { checks: 4 })
        );
        assert!(!controller.state().script_injected);
        assert!(document.inserted_scripts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn load_error_is_retried_once() {
        let document = HeadlessDocument::new("https://a.test");
        document.fail_next_script_loads(1);
        let mut controller =
            InjectionController::new(document.clone(), SRC, InjectionTiming::default());

        assert!(matches!(
            controller.ensure_injected().await,
            Ok(InjectionReport::Injected { .. })
        ));
        assert_eq!(document.inserted_scripts().len(), 2);
        assert!(controller.state().script_injected);
    }

    #[tokio::test(start_paused = true)]
    async fn second_load_error_is_reported() {
        let document = HeadlessDocument::new("https://a.test");
        document.fail_next_script_loads(2);
        let mut controller =
            InjectionController::new(document.clone(), SRC, InjectionTiming::default());

        assert!(matches!(
            controller.ensure_injected().await,
            Err(InjectionError::LoadFailed(_))
        ));
        assert_eq!(document.inserted_scripts().len(), 2);
        assert!(!controller.state().script_injected);
    }
}
