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
use serde::Serialize;

use super::canvas::Canvas;

/// The decoded state of a single LED.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct LedState {
    /// An index into the consumer's colormap.
    pub color_index: i64,
    /// The brightness, from 0 to 1.
    pub brightness: f64,
}

/// A complete decoded frame: one list of LED states per group, in canvas order.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RenderState {
    groups: Vec<Vec<LedState>>,
}

impl RenderState {
    pub fn groups(&self) -> &[Vec<LedState>] {
        &self.groups
    }

    /// All LEDs across all groups, in order.
    pub fn leds(&self) -> impl Iterator<Item = &LedState> {
        self.groups.iter().flatten()
    }

    pub fn led_count(&self) -> usize {
        self.groups.iter().map(Vec::len).sum()
    }
}

/// Turns the canvas into a [`RenderState`]. The state is allocated on the first decode and
/// overwritten in place afterwards.
#[derive(Default)]
pub struct StateDecoder {
    state: RenderState,
}

impl StateDecoder {
    pub fn new() -> StateDecoder {
        StateDecoder::default()
    }

    pub fn decode(&mut self, canvas: &Canvas) -> &RenderState {
        if self.state.groups.is_empty() {
            self.state.groups = canvas
                .groups()
                .iter()
                .map(|group| vec![LedState::default(); group.count()])
                .collect();
        }
        debug_assert_eq!(self.state.groups.len(), canvas.groups().len());

        for (leds, group) in self.state.groups.iter_mut().zip(canvas.groups()) {
            debug_assert_eq!(leds.len(), group.count());
            for ((led, color), brightness) in leds
                .iter_mut()
                .zip(group.colors())
                .zip(group.brightness())
            {
                led.color_index = *color;
                led.brightness = brightness.clamp(0.0, 1.0);
            }
        }

        &self.state
    }
}
