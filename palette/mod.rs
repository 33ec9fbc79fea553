/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Command palette: state, reducer, key bindings, render view and the effect
//! runtime that runs inside the page world.

pub mod drag;
pub mod intents;
pub mod keys;
pub mod runtime;
pub mod state;
pub mod view;

pub use intents::{NudgeDirection, PaletteEffect, PaletteIntent};
pub use runtime::PaletteRuntime;
pub use state::{ASK_SUGGESTIONS, PaletteConfig, PaletteState, PaletteTab, SaveStatus};
pub use view::PaletteView;
