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
use std::fmt;
use std::path::PathBuf;

use super::script::ScriptError;

/// Errors surfaced by the renderer API.
#[derive(Debug, thiserror::Error)]
pub enum RendererError {
    /// The effect is not loaded (set) or was never activated (stop).
    #[error("light effect could not be found: {0}")]
    EffectNotFound(String),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Script(#[from] ScriptError),

    /// The render loop has shut down.
    #[error("light renderer is not running")]
    Closed,

    #[error("unable to start light renderer: {0}")]
    Spawn(#[from] std::io::Error),
}

/// A single effect file that failed to load.
#[derive(Debug, thiserror::Error)]
#[error("effect {name} ({}): {source}", .path.display())]
pub struct EffectLoadError {
    pub name: String,
    pub path: PathBuf,
    #[source]
    pub source: ScriptError,
}

/// Errors from loading an effect directory. Failing effects never prevent the others from
/// being loaded.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("unable to read effect directory {}: {source}", .path.display())]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}", EffectFailures(.0))]
    Effects(Vec<EffectLoadError>),
}

struct EffectFailures<'a>(&'a [EffectLoadError]);

impl fmt::Display for EffectFailures<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} effect(s) failed to load", self.0.len())?;
        for failure in self.0 {
            write!(f, "\n- {}", failure)?;
        }
        Ok(())
    }
}
