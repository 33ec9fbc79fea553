/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Page-world script: runs in the page's own JavaScript world and owns the
//! palette's mount and state.

pub mod mount;
pub mod world;

pub use mount::{MountController, MountError, MountState, MountTransition, RENDER_ROOT_ID};
pub use world::{PageEvent, PageSnapshot, PageWorld, PageWorldHandle, PaletteControl, PointerRegion};
