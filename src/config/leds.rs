// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

use serde::Deserialize;

/// A YAML representation of a single LED group (a strip or strip segment).
#[derive(Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct LedGroup {
    /// The 1-based position of the group on the canvas.
    order: usize,

    /// The number of LEDs in the group.
    count: usize,
}

impl LedGroup {
    /// Creates a new LED group.
    pub fn new(order: usize, count: usize) -> LedGroup {
        LedGroup { order, count }
    }

    /// Gets the 1-based canvas position.
    pub fn order(&self) -> usize {
        self.order
    }

    /// Gets the LED count.
    pub fn count(&self) -> usize {
        self.count
    }
}
