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
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

pub use self::error::ConfigError;
pub use self::leds::LedGroup;
pub use self::lights::Lights;

mod error;
mod leds;
mod lights;

/// The environment variable prefix used to override file based settings,
/// e.g. `DEICHWAVE_LIGHTS__EXT=.lua`.
const ENV_PREFIX: &str = "DEICHWAVE";

/// The complete configuration for the light renderer.
#[derive(Deserialize, Clone, Default)]
pub struct Settings {
    /// Enables debug logging.
    #[serde(default)]
    debug: bool,

    /// Light effect settings.
    #[serde(default)]
    lights: Lights,

    /// The LED groups, keyed by name.
    #[serde(default)]
    leds: HashMap<String, LedGroup>,
}

impl Settings {
    /// Creates new settings.
    pub fn new(debug: bool, lights: Lights, leds: HashMap<String, LedGroup>) -> Settings {
        Settings {
            debug,
            lights,
            leds,
        }
    }

    /// Whether debug logging was requested.
    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Gets the light effect settings.
    pub fn lights(&self) -> &Lights {
        &self.lights
    }

    /// Gets the LED groups.
    pub fn leds(&self) -> &HashMap<String, LedGroup> {
        &self.leds
    }
}

/// Loads the settings from the given file, layered under environment overrides. A missing
/// file is not an error, the defaults and environment are used instead.
pub fn load_settings(file: &Path) -> Result<Settings, ConfigError> {
    let settings: Settings = config::Config::builder()
        .add_source(config::File::from(file).required(false))
        .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()?
        .try_deserialize()?;

    debug!(
        file = %file.display(),
        groups = settings.leds.len(),
        effects = settings.lights.path(),
        "Loaded settings."
    );
    Ok(settings)
}
