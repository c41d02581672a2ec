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

/// The result of removing an effect from the history.
#[derive(Debug, PartialEq)]
pub struct Removal {
    /// Whether the removed entry was the top of the stack.
    pub was_top: bool,
    /// The top of the stack after the removal.
    pub new_top: Option<String>,
}

/// The ordered record of activated effects. The last entry is the one being rendered.
///
/// The same effect may appear several times. Activations are expected to be few, so this is
/// a plain list that is scanned on removal.
#[derive(Debug, Default, Clone)]
pub struct EffectStack {
    entries: Vec<String>,
}

impl EffectStack {
    pub fn new() -> EffectStack {
        EffectStack::default()
    }

    /// Records a new activation on top of the stack.
    pub fn push(&mut self, name: &str) {
        self.entries.push(name.to_string());
    }

    /// Removes the most recent activation of the given effect. Returns `None` if the effect
    /// is not in the history.
    pub fn remove_last(&mut self, name: &str) -> Option<Removal> {
        let idx = self.entries.iter().rposition(|entry| entry == name)?;
        let was_top = idx == self.entries.len() - 1;
        self.entries.remove(idx);

        Some(Removal {
            was_top,
            new_top: self.top().map(str::to_string),
        })
    }

    /// The effect currently on top.
    pub fn top(&self) -> Option<&str> {
        self.entries.last().map(String::as_str)
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
