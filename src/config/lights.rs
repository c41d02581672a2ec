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

const DEFAULT_PATH: &str = "data/lights/effects";
const DEFAULT_EXT: &str = "lua";
const DEFAULT_INSTRUCTION_LIMIT: u32 = 1_000_000;
const DEFAULT_MEMORY_LIMIT: usize = 16 * 1024 * 1024;

/// A YAML representation of the light effect configuration.
#[derive(Deserialize, Clone, Debug)]
pub struct Lights {
    /// The directory containing the effect scripts.
    path: Option<String>,

    /// The file extension of effect scripts, with or without the leading dot.
    ext: Option<String>,

    /// The number of script instructions after which a frame is aborted.
    instruction_limit: Option<u32>,

    /// The maximum memory, in bytes, the script state may allocate.
    memory_limit: Option<usize>,
}

impl Default for Lights {
    fn default() -> Self {
        Lights::new(None, None)
    }
}

impl Lights {
    /// Creates a new light effect configuration.
    pub fn new(path: Option<String>, ext: Option<String>) -> Lights {
        Lights {
            path,
            ext,
            instruction_limit: None,
            memory_limit: None,
        }
    }

    /// Gets the effect directory.
    pub fn path(&self) -> &str {
        self.path.as_deref().unwrap_or(DEFAULT_PATH)
    }

    /// Gets the effect file extension without its leading dot.
    pub fn ext(&self) -> &str {
        self.ext
            .as_deref()
            .map(|ext| ext.trim_start_matches('.'))
            .unwrap_or(DEFAULT_EXT)
    }

    /// Gets the per-call instruction limit for scripts.
    pub fn instruction_limit(&self) -> u32 {
        self.instruction_limit.unwrap_or(DEFAULT_INSTRUCTION_LIMIT)
    }

    /// Gets the memory limit for the script state.
    pub fn memory_limit(&self) -> usize {
        self.memory_limit.unwrap_or(DEFAULT_MEMORY_LIMIT)
    }
}
