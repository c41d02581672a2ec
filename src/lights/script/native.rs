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
use std::sync::Arc;

use super::{EffectInfo, ScriptBackend, ScriptError};
use crate::lights::canvas::Canvas;

/// A frame function for a native effect.
pub type NativeFrame = Arc<dyn Fn(&mut Canvas, usize) -> Result<(), String> + Send + Sync>;

/// A native effect, resolved by name at compile time.
#[derive(Clone)]
pub struct NativeProgram {
    frame: NativeFrame,
}

/// Effects written as Rust closures. Compiling an effect looks its name up in the registered
/// effects, the source is ignored.
///
/// Frames draw on a scratch copy of the canvas that only replaces the canvas on success.
#[derive(Clone, Default)]
pub struct NativeBackend {
    effects: HashMap<String, (EffectInfo, NativeFrame)>,
}

impl NativeBackend {
    pub fn new() -> NativeBackend {
        NativeBackend::default()
    }

    /// Registers a native effect under the given name.
    pub fn register<F>(&mut self, name: &str, info: EffectInfo, frame: F)
    where
        F: Fn(&mut Canvas, usize) -> Result<(), String> + Send + Sync + 'static,
    {
        self.effects
            .insert(name.to_string(), (info, Arc::new(frame)));
    }

    /// Builder flavor of [`NativeBackend::register`].
    pub fn with_effect<F>(mut self, name: &str, info: EffectInfo, frame: F) -> NativeBackend
    where
        F: Fn(&mut Canvas, usize) -> Result<(), String> + Send + Sync + 'static,
    {
        self.register(name, info, frame);
        self
    }
}

impl ScriptBackend for NativeBackend {
    type Program = NativeProgram;

    fn compile(
        &mut self,
        name: &str,
        _source: &str,
    ) -> Result<(NativeProgram, EffectInfo), ScriptError> {
        match self.effects.get(name) {
            Some((info, frame)) => Ok((
                NativeProgram {
                    frame: frame.clone(),
                },
                *info,
            )),
            None => Err(ScriptError::Contract(format!(
                "no native effect named {}",
                name
            ))),
        }
    }

    fn run(
        &mut self,
        program: &NativeProgram,
        canvas: &mut Canvas,
        tick: usize,
    ) -> Result<(), ScriptError> {
        let mut scratch = canvas.clone();
        (program.frame)(&mut scratch, tick).map_err(ScriptError::Frame)?;
        *canvas = scratch;
        Ok(())
    }
}
