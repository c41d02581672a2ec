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

//! Execution backends for effect programs.
//!
//! The renderer only knows the [`ScriptBackend`] contract: compile a source into a program
//! plus its declared cadence, then run that program against the canvas for a given tick.

use std::time::Duration;

use super::canvas::Canvas;

pub mod lua;
pub mod native;

pub use self::lua::LuaBackend;
pub use self::native::NativeBackend;

/// Errors raised while compiling or running an effect program.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("unable to read effect source: {0}")]
    Io(#[from] std::io::Error),

    #[error("script error: {0}")]
    Lua(#[from] mlua::Error),

    /// The program does not follow the effect contract (missing `info`, `frame`, ...).
    #[error("invalid effect: {0}")]
    Contract(String),

    /// The program failed while producing a frame.
    #[error("frame failed: {0}")]
    Frame(String),
}

/// The cadence an effect declares about itself.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EffectInfo {
    /// Tick values run from 0 to `max_tick - 1`. Zero means the tick is always 0.
    pub max_tick: usize,
    /// The delay between autonomous frames. Zero means frames are only rendered on request.
    pub frame_interval: Duration,
}

impl EffectInfo {
    pub fn new(max_tick: usize, frame_interval: Duration) -> EffectInfo {
        EffectInfo {
            max_tick,
            frame_interval,
        }
    }

    /// Validates the raw values declared by a script: `maxtick` as an integer and `frametime`
    /// in seconds.
    pub fn from_declared(max_tick: i64, frame_time: f64) -> Result<EffectInfo, ScriptError> {
        let max_tick = usize::try_from(max_tick).map_err(|_| {
            ScriptError::Contract(format!("info.maxtick must be >= 0, got {}", max_tick))
        })?;
        let frame_interval = Duration::try_from_secs_f64(frame_time).map_err(|_| {
            ScriptError::Contract(format!(
                "info.frametime must be a finite number >= 0, got {}",
                frame_time
            ))
        })?;

        Ok(EffectInfo::new(max_tick, frame_interval))
    }

    /// The interval of the next autonomous frame, if the effect schedules itself.
    pub fn next_frame_in(&self) -> Option<Duration> {
        if self.frame_interval.is_zero() {
            None
        } else {
            Some(self.frame_interval)
        }
    }
}

/// A way to compile and execute effect programs.
///
/// Backends live on the render loop thread and are never shared, so they need not be `Send`.
pub trait ScriptBackend {
    /// A compiled, runnable effect.
    type Program;

    /// Compiles the source of the named effect and extracts its declared cadence.
    fn compile(
        &mut self,
        name: &str,
        source: &str,
    ) -> Result<(Self::Program, EffectInfo), ScriptError>;

    /// Runs one frame of the program, updating the canvas in place.
    fn run(
        &mut self,
        program: &Self::Program,
        canvas: &mut Canvas,
        tick: usize,
    ) -> Result<(), ScriptError>;
}
