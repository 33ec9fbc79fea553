/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Owner of the page's `mounted` flag and its render root.

use std::fmt;
use std::sync::Arc;

use crate::diagnostics::{CHANNEL_MOUNT_NOT_READY, CHANNEL_MOUNT_TOGGLED, emit_message};
use crate::host::{ElementId, PageDocument};

/// Element id of the palette container, shared by every script load.
pub const RENDER_ROOT_ID: &str = "__ghostUI_root";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MountTransition {
    Mounted { root: ElementId },
    Unmounted { root: ElementId },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MountError {
    /// The document has nowhere to put the render root yet.
    NotReady,
}

impl fmt::Display for MountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MountError::NotReady => write!(f, "render root cannot be created yet"),
        }
    }
}

impl std::error::Error for MountError {}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MountState {
    pub mounted: bool,
    pub root: Option<ElementId>,
}

pub struct MountController {
    document: Arc<dyn PageDocument>,
    state: MountState,
}

impl MountController {
    pub fn new(document: Arc<dyn PageDocument>) -> Self {
        Self {
            document,
            state: MountState::default(),
        }
    }

    pub fn state(&self) -> MountState {
        self.state
    }

    pub fn is_mounted(&self) -> bool {
        self.state.mounted
    }

    /// Root currently showing the palette, if mounted.
    pub fn mounted_root(&self) -> Option<ElementId> {
        self.state.root.filter(|_| self.state.mounted)
    }

    /// Flip between mounted and unmounted. The only writer of `mounted`.
    pub fn toggle(&mut self) -> Result<MountTransition, MountError> {
        let transition = if self.state.mounted {
            let root = self.render_root()?;
            self.document.present(root, None);
            self.state.mounted = false;
            MountTransition::Unmounted { root }
        } else {
            let root = self.render_root().inspect_err(|_| {
                emit_message(CHANNEL_MOUNT_NOT_READY, 0);
            })?;
            self.state.mounted = true;
            MountTransition::Mounted { root }
        };
        log::debug!("mount: {transition:?}");
        emit_message(CHANNEL_MOUNT_TOGGLED, 1);
        Ok(transition)
    }

    fn render_root(&mut self) -> Result<ElementId, MountError> {
        if let Some(root) = self.state.root {
            return Ok(root);
        }
        let root = self
            .document
            .find_element(RENDER_ROOT_ID)
            .or_else(|| self.document.create_render_root(RENDER_ROOT_ID))
            .ok_or(MountError::NotReady)?;
        self.state.root = Some(root);
        Ok(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::headless::{DocumentShape, HeadlessDocument};
    use proptest::prelude::*;

    #[test]
    fn two_toggles_restore_unmounted_state() {
        let document = HeadlessDocument::new("https://a.test");
        let mut mount = MountController::new(document.clone());

        let first = mount.toggle().expect("document is ready");
        let second = mount.toggle().expect("document is ready");

        assert!(matches!(first, MountTransition::Mounted { .. }));
        assert!(matches!(second, MountTransition::Unmounted { .. }));
        assert!(!mount.is_mounted());
        assert_eq!(document.render_root_count(), 1);
    }

    #[test]
    fn not_ready_without_document_element() {
        let document = HeadlessDocument::with_shape("https://a.test", DocumentShape::EMPTY);
        let mut mount = MountController::new(document.clone());

        assert_eq!(mount.toggle(), Err(MountError::NotReady));
        assert!(!mount.is_mounted());

        document.set_shape(DocumentShape::COMPLETE);
        assert!(mount.toggle().is_ok());
        assert!(mount.is_mounted());
    }

    #[test]
    fn second_controller_reuses_existing_root() {
        let document = HeadlessDocument::new("https://a.test");
        let mut first = MountController::new(document.clone());
        let mut second = MountController::new(document.clone());

        let MountTransition::Mounted { root: a } = first.toggle().expect("ready") else {
            panic!("first toggle mounts");
        };
        let MountTransition::Mounted { root: b } = second.toggle().expect("ready") else {
            panic!("first toggle mounts");
        };

        assert_eq!(a, b);
        assert_eq!(document.render_root_count(), 1);
    }

    proptest! {
        #[test]
        fn proptest_toggle_parity_and_single_root(toggles in 0_usize..24) {
            let document = HeadlessDocument::new("https://a.test");
            let mut mount = MountController::new(document.clone());
            for _ in 0..toggles {
                prop_assert!(mount.toggle().is_ok());
            }
            prop_assert_eq!(mount.is_mounted(), toggles % 2 == 1);
            prop_assert!(document.render_root_count() <= 1);
        }
    }
}
