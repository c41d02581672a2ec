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
use std::collections::HashMap;

use crate::config::{ConfigError, LedGroup};

/// The fixed LED layout: ordered groups and their LED counts.
#[derive(Clone, Debug, PartialEq)]
pub struct Topology {
    groups: Vec<(String, usize)>,
}

impl Topology {
    /// Builds the topology from the configured LED groups. The group orders must be exactly
    /// `1..=N` and every group needs at least one LED.
    pub fn from_groups(leds: &HashMap<String, LedGroup>) -> Result<Topology, ConfigError> {
        let mut slots: Vec<Option<(String, usize)>> = vec![None; leds.len()];
        for (name, group) in leds.iter() {
            if group.count() == 0 {
                return Err(ConfigError::Topology(format!(
                    "group {} has no LEDs",
                    name
                )));
            }
            let slot = group
                .order()
                .checked_sub(1)
                .and_then(|idx| slots.get_mut(idx))
                .ok_or_else(|| {
                    ConfigError::Topology(format!(
                        "group {} has order {}, expected 1 to {}",
                        name,
                        group.order(),
                        leds.len()
                    ))
                })?;
            if let Some((other, _)) = slot {
                return Err(ConfigError::Topology(format!(
                    "groups {} and {} share order {}",
                    other,
                    name,
                    group.order()
                )));
            }
            *slot = Some((name.clone(), group.count()));
        }

        Ok(Topology {
            groups: slots.into_iter().flatten().collect(),
        })
    }

    /// Gets the ordered groups as `(name, count)` pairs.
    pub fn groups(&self) -> &[(String, usize)] {
        &self.groups
    }

    /// The total number of LEDs across all groups.
    pub fn led_count(&self) -> usize {
        self.groups.iter().map(|(_, count)| count).sum()
    }

    /// The LED count of each group, keyed by group name.
    pub fn group_counts(&self) -> HashMap<String, usize> {
        self.groups.iter().cloned().collect()
    }
}

/// A single group on the canvas. The value arrays never change length.
#[derive(Clone, Debug)]
pub struct CanvasGroup {
    name: String,
    colors: Vec<i64>,
    brightness: Vec<f64>,
}

impl CanvasGroup {
    fn new(name: &str, count: usize) -> CanvasGroup {
        CanvasGroup {
            name: name.to_string(),
            colors: vec![0; count],
            brightness: vec![0.0; count],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn count(&self) -> usize {
        self.colors.len()
    }

    pub fn colors(&self) -> &[i64] {
        &self.colors
    }

    pub fn colors_mut(&mut self) -> &mut [i64] {
        &mut self.colors
    }

    pub fn brightness(&self) -> &[f64] {
        &self.brightness
    }

    pub fn brightness_mut(&mut self) -> &mut [f64] {
        &mut self.brightness
    }

    /// Sets a single LED.
    pub fn set(&mut self, idx: usize, color_index: i64, brightness: f64) {
        self.colors[idx] = color_index;
        self.brightness[idx] = brightness;
    }
}

/// The shared, mutable LED state that effect programs draw on.
#[derive(Clone, Debug)]
pub struct Canvas {
    groups: Vec<CanvasGroup>,
}

impl Canvas {
    /// Allocates a blank canvas for the given topology.
    pub fn new(topology: &Topology) -> Canvas {
        Canvas {
            groups: topology
                .groups()
                .iter()
                .map(|(name, count)| CanvasGroup::new(name, *count))
                .collect(),
        }
    }

    pub fn groups(&self) -> &[CanvasGroup] {
        &self.groups
    }

    pub fn groups_mut(&mut self) -> &mut [CanvasGroup] {
        &mut self.groups
    }

    /// Sets every LED of every group to the given values.
    pub fn fill(&mut self, color_index: i64, brightness: f64) {
        for group in self.groups.iter_mut() {
            group.colors.fill(color_index);
            group.brightness.fill(brightness);
        }
    }
}
