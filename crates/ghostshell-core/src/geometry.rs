/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use euclid::{Point2D, Vector2D};

/// Unit tag for page client coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CssPixel;

/// Signed translation of the palette from its centred home position.
pub type PaletteOffset = Vector2D<i32, CssPixel>;

/// Mouse cursor in page client coordinates.
pub type CursorPoint = Point2D<i32, CssPixel>;
