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

//! Lua effect programs.
//!
//! An effect file is a chunk that returns its module table:
//!
//! ```lua
//! return {
//!     info = { maxtick = 20, frametime = 0.05 },
//!     frame = function(leds, tick)
//!         for _, group in ipairs(leds) do
//!             for i = 1, group.count do
//!                 group.color[i] = tick * 12
//!                 group.brightness[i] = 1.0
//!             end
//!         end
//!         return leds
//!     end,
//! }
//! ```
//!
//! Every chunk runs in its own whitelist-only environment. Only the base functions below
//! plus `math`, `string` and `table` are reachable, `print` goes to the log. An instruction
//! hook aborts runaway scripts and the state carries a memory limit.

use mlua::{Function, HookTriggers, Lua, LuaOptions, MultiValue, StdLib, Table, Value};
use tracing::{debug, warn};

use super::{EffectInfo, ScriptBackend, ScriptError};
use crate::config::Lights;
use crate::lights::canvas::{Canvas, Topology};

const SAFE_GLOBALS: &[&str] = &[
    "assert",
    "error",
    "getmetatable",
    "ipairs",
    "next",
    "pairs",
    "pcall",
    "rawequal",
    "rawget",
    "rawlen",
    "rawset",
    "select",
    "setmetatable",
    "tonumber",
    "tostring",
    "type",
    "xpcall",
];

const SAFE_LIBS: &[&str] = &["math", "string", "table"];

/// A compiled Lua effect.
pub struct LuaProgram {
    frame: Function,
}

/// Runs effects in a single sandboxed Lua state that owns the `leds` canvas table.
pub struct LuaBackend {
    lua: Lua,
    leds: Table,
    instruction_limit: u32,
}

impl LuaBackend {
    /// Creates a new Lua state with a canvas table shaped like the topology.
    pub fn new(
        topology: &Topology,
        instruction_limit: u32,
        memory_limit: usize,
    ) -> Result<LuaBackend, ScriptError> {
        let lua = Lua::new_with(
            StdLib::MATH | StdLib::STRING | StdLib::TABLE,
            LuaOptions::new(),
        )?;
        lua.set_memory_limit(memory_limit)?;

        let leds = canvas_table(&lua, &Canvas::new(topology))?;

        Ok(LuaBackend {
            lua,
            leds,
            instruction_limit: instruction_limit.max(1),
        })
    }

    /// Creates a new Lua backend using the limits from the light settings.
    pub fn from_settings(lights: &Lights, topology: &Topology) -> Result<LuaBackend, ScriptError> {
        Self::new(topology, lights.instruction_limit(), lights.memory_limit())
    }

    /// Builds the environment table a single effect chunk runs in.
    fn sandbox(&self, name: &str) -> mlua::Result<Table> {
        let env = self.lua.create_table()?;
        let globals = self.lua.globals();
        for global in SAFE_GLOBALS.iter().chain(SAFE_LIBS.iter()) {
            let value: Value = globals.get(*global)?;
            if !value.is_nil() {
                env.set(*global, value)?;
            }
        }

        let effect = name.to_string();
        let print = self.lua.create_function(move |_, args: MultiValue| {
            let line = args.iter().map(display).collect::<Vec<String>>().join("\t");
            debug!(effect = effect.as_str(), "{}", line);
            Ok(())
        })?;
        env.set("print", print)?;

        Ok(env)
    }

    /// Runs the given closure with the instruction limit hook installed. Once the limit is
    /// hit, every following instruction fails as well, so `pcall` can't swallow the abort.
    fn limited<R>(&self, run: impl FnOnce() -> mlua::Result<R>) -> mlua::Result<R> {
        let limit = self.instruction_limit;
        self.lua.set_hook(
            HookTriggers::new().every_nth_instruction(limit),
            move |lua, _debug| {
                lua.set_hook(
                    HookTriggers::new().every_nth_instruction(1),
                    move |_lua, _debug| Err(limit_exceeded(limit)),
                );
                Err(limit_exceeded(limit))
            },
        );
        let result = run();
        self.lua.remove_hook();
        result
    }

    fn frame(
        &mut self,
        program: &LuaProgram,
        canvas: &mut Canvas,
        tick: usize,
    ) -> Result<(), ScriptError> {
        let leds = self.leds.clone();
        let leds = match self.limited(|| program.frame.call::<Value>((leds, tick)))? {
            Value::Table(returned) => returned,
            Value::Nil => self.leds.clone(),
            other => {
                return Err(ScriptError::Frame(format!(
                    "frame returned {} instead of the led table",
                    other.type_name()
                )))
            }
        };

        read_canvas(&leds, canvas)?;
        self.leds = leds;
        Ok(())
    }
}

impl ScriptBackend for LuaBackend {
    type Program = LuaProgram;

    fn compile(
        &mut self,
        name: &str,
        source: &str,
    ) -> Result<(LuaProgram, EffectInfo), ScriptError> {
        let env = self.sandbox(name)?;
        let chunk = self
            .lua
            .load(source)
            .set_name(format!("={}", name))
            .set_environment(env);
        let module = match self.limited(move || chunk.eval::<Value>())? {
            Value::Table(module) => module,
            other => {
                return Err(ScriptError::Contract(format!(
                    "effect must return a table, got {}",
                    other.type_name()
                )))
            }
        };

        let info = match module.raw_get::<Value>("info")? {
            Value::Table(info) => info,
            _ => return Err(ScriptError::Contract("missing info table".into())),
        };
        let max_tick = info
            .raw_get::<Option<i64>>("maxtick")?
            .ok_or_else(|| ScriptError::Contract("missing info.maxtick".into()))?;
        let frame_time = info
            .raw_get::<Option<f64>>("frametime")?
            .ok_or_else(|| ScriptError::Contract("missing info.frametime".into()))?;
        let frame = match module.raw_get::<Value>("frame")? {
            Value::Function(frame) => frame,
            _ => return Err(ScriptError::Contract("missing frame function".into())),
        };

        Ok((
            LuaProgram { frame },
            EffectInfo::from_declared(max_tick, frame_time)?,
        ))
    }

    fn run(
        &mut self,
        program: &LuaProgram,
        canvas: &mut Canvas,
        tick: usize,
    ) -> Result<(), ScriptError> {
        let result = self.frame(program, canvas, tick);
        if result.is_err() {
            // The failed frame may have written into the script's view of the canvas.
            match canvas_table(&self.lua, canvas) {
                Ok(leds) => self.leds = leds,
                Err(e) => warn!(err = %e, "Unable to reset the script canvas."),
            }
        }
        result
    }
}

/// Builds the `leds` table scripts draw on from the given canvas.
fn canvas_table(lua: &Lua, canvas: &Canvas) -> mlua::Result<Table> {
    let leds = lua.create_table()?;
    for (idx, group) in canvas.groups().iter().enumerate() {
        let table = lua.create_table()?;
        table.set("name", group.name())?;
        table.set("count", group.count())?;
        table.set("color", lua.create_sequence_from(group.colors().iter().copied())?)?;
        table.set(
            "brightness",
            lua.create_sequence_from(group.brightness().iter().copied())?,
        )?;
        leds.raw_set(idx + 1, table)?;
    }
    Ok(leds)
}

fn limit_exceeded(limit: u32) -> mlua::Error {
    mlua::Error::RuntimeError(format!("instruction limit exceeded ({})", limit))
}

/// Copies the LED table positionally into the canvas without invoking metamethods. Any
/// missing or mistyped value fails the whole frame.
fn read_canvas(leds: &Table, canvas: &mut Canvas) -> Result<(), ScriptError> {
    let mut frame: Vec<Vec<(i64, f64)>> = Vec::with_capacity(canvas.groups().len());
    for (idx, group) in canvas.groups().iter().enumerate() {
        let invalid = |field: &str, err: mlua::Error| {
            ScriptError::Frame(format!("group {} {}: {}", group.name(), field, err))
        };
        let table: Table = leds.raw_get(idx + 1).map_err(|e| invalid("table", e))?;
        let colors: Table = table.raw_get("color").map_err(|e| invalid("color", e))?;
        let levels: Table = table
            .raw_get("brightness")
            .map_err(|e| invalid("brightness", e))?;

        let mut values = Vec::with_capacity(group.count());
        for led in 1..=group.count() {
            let color: i64 = colors.raw_get(led).map_err(|e| invalid("color", e))?;
            let level: f64 = levels.raw_get(led).map_err(|e| invalid("brightness", e))?;
            values.push((color, level));
        }
        frame.push(values);
    }

    for (group, values) in canvas.groups_mut().iter_mut().zip(frame) {
        for (led, (color, level)) in values.into_iter().enumerate() {
            group.set(led, color, level);
        }
    }
    Ok(())
}

fn display(value: &Value) -> String {
    match value {
        Value::Nil => "nil".to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s
            .to_str()
            .map_or_else(|_| "<invalid utf8>".into(), |s| s.to_string()),
        other => other.type_name().to_string(),
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;
    use std::time::Duration;

    use super::*;
    use crate::config::LedGroup;

    fn topology() -> Topology {
        let leds: HashMap<String, LedGroup> = [
            ("front".to_string(), LedGroup::new(1, 2)),
            ("rear".to_string(), LedGroup::new(2, 3)),
        ]
        .into_iter()
        .collect();
        Topology::from_groups(&leds).expect("valid topology")
    }

    fn backend() -> (LuaBackend, Canvas) {
        let topology = topology();
        (
            LuaBackend::new(&topology, 100_000, 8 * 1024 * 1024).expect("lua backend"),
            Canvas::new(&topology),
        )
    }

    const TICK_EFFECT: &str = r#"
        return {
            info = { maxtick = 4, frametime = 0.25 },
            frame = function(leds, tick)
                for _, group in ipairs(leds) do
                    for i = 1, group.count do
                        group.color[i] = tick * 10 + i
                        group.brightness[i] = 0.5
                    end
                end
                return leds
            end,
        }
    "#;

    #[test]
    fn test_compile_and_run() -> Result<(), ScriptError> {
        let (mut backend, mut canvas) = backend();
        let (program, info) = backend.compile("tick", TICK_EFFECT)?;
        assert_eq!(4, info.max_tick);
        assert_eq!(Duration::from_millis(250), info.frame_interval);

        backend.run(&program, &mut canvas, 2)?;
        assert_eq!(&[21, 22], canvas.groups()[0].colors());
        assert_eq!(&[21, 22, 23], canvas.groups()[1].colors());
        assert_eq!(&[0.5, 0.5, 0.5], canvas.groups()[1].brightness());
        Ok(())
    }

    #[test]
    fn test_group_fields() -> Result<(), ScriptError> {
        let (mut backend, mut canvas) = backend();
        let (program, _) = backend.compile(
            "fields",
            r#"
            return {
                info = { maxtick = 0, frametime = 0 },
                frame = function(leds, tick)
                    assert(leds[1].name == "front")
                    assert(leds[2].name == "rear")
                    leds[2].color[leds[2].count] = #leds
                end,
            }
            "#,
        )?;

        // Returning nothing keeps the in-place changes.
        backend.run(&program, &mut canvas, 0)?;
        assert_eq!(&[0, 0, 2], canvas.groups()[1].colors());
        Ok(())
    }

    #[test]
    fn test_canvas_is_shared_between_effects() -> Result<(), ScriptError> {
        let (mut backend, mut canvas) = backend();
        let (tick, _) = backend.compile("tick", TICK_EFFECT)?;
        let (dim, _) = backend.compile(
            "dim",
            r#"
            return {
                info = { maxtick = 0, frametime = 0 },
                frame = function(leds, tick)
                    leds[1].brightness[1] = 0.1
                    return leds
                end,
            }
            "#,
        )?;

        backend.run(&tick, &mut canvas, 1)?;
        backend.run(&dim, &mut canvas, 0)?;
        assert_eq!(&[11, 12], canvas.groups()[0].colors());
        assert_eq!(&[0.1, 0.5], canvas.groups()[0].brightness());
        Ok(())
    }

    #[test]
    fn test_contract_violations() {
        let (mut backend, _) = backend();
        assert!(matches!(
            backend.compile("nothing", "local x = 1"),
            Err(ScriptError::Contract(_))
        ));
        assert!(matches!(
            backend.compile("noinfo", "return { frame = function() end }"),
            Err(ScriptError::Contract(_))
        ));
        assert!(matches!(
            backend.compile(
                "noframe",
                "return { info = { maxtick = 1, frametime = 0 } }"
            ),
            Err(ScriptError::Contract(_))
        ));
        assert!(matches!(
            backend.compile(
                "negative",
                "return { info = { maxtick = -1, frametime = 0 }, frame = function() end }"
            ),
            Err(ScriptError::Contract(_))
        ));
        assert!(matches!(
            backend.compile("syntax", "return {"),
            Err(ScriptError::Lua(_))
        ));
    }

    #[test]
    fn test_sandbox() -> Result<(), ScriptError> {
        let (mut backend, mut canvas) = backend();
        assert!(backend
            .compile("escape", "os.execute('true') return {}")
            .is_err());
        assert!(backend
            .compile("require", "local m = require('os') return {}")
            .is_err());

        let (first, _) = backend.compile(
            "first",
            r#"
            leaked = 1
            return { info = { maxtick = 0, frametime = 0 }, frame = function(leds) return leds end }
            "#,
        )?;
        let (second, _) = backend.compile(
            "second",
            r#"
            return {
                info = { maxtick = 0, frametime = 0 },
                frame = function(leds)
                    assert(leaked == nil, "globals leak between effects")
                    print("no leak")
                    return leds
                end,
            }
            "#,
        )?;
        backend.run(&first, &mut canvas, 0)?;
        backend.run(&second, &mut canvas, 0)?;
        Ok(())
    }

    #[test]
    fn test_runaway_frame_is_aborted() -> Result<(), ScriptError> {
        let topology = topology();
        let mut backend = LuaBackend::new(&topology, 10_000, 8 * 1024 * 1024)?;
        let mut canvas = Canvas::new(&topology);
        let (program, _) = backend.compile(
            "spin",
            r#"
            return {
                info = { maxtick = 0, frametime = 0 },
                frame = function(leds) while true do end end,
            }
            "#,
        )?;

        assert!(backend.run(&program, &mut canvas, 0).is_err());

        // The state stays usable afterwards.
        let (program, _) = backend.compile("tick", TICK_EFFECT)?;
        backend.run(&program, &mut canvas, 0)?;
        assert_eq!(&[1, 2], canvas.groups()[0].colors());
        Ok(())
    }

    #[test]
    fn test_invalid_frame_keeps_canvas() -> Result<(), ScriptError> {
        let (mut backend, mut canvas) = backend();
        let (good, _) = backend.compile("tick", TICK_EFFECT)?;
        backend.run(&good, &mut canvas, 0)?;

        let (bad, _) = backend.compile(
            "bad",
            r#"
            return {
                info = { maxtick = 0, frametime = 0 },
                frame = function(leds)
                    local copy = { { color = { 5, 5 }, brightness = { 1, 1 } } }
                    return copy
                end,
            }
            "#,
        )?;
        assert!(matches!(
            backend.run(&bad, &mut canvas, 0),
            Err(ScriptError::Frame(_))
        ));
        assert_eq!(&[1, 2], canvas.groups()[0].colors());

        let (wrong, _) = backend.compile(
            "wrong",
            r#"
            return {
                info = { maxtick = 0, frametime = 0 },
                frame = function(leds) return 42 end,
            }
            "#,
        )?;
        assert!(matches!(
            backend.run(&wrong, &mut canvas, 0),
            Err(ScriptError::Frame(_))
        ));
        Ok(())
    }

    #[test]
    fn test_limit_survives_pcall() -> Result<(), ScriptError> {
        let topology = topology();
        let mut backend = LuaBackend::new(&topology, 10_000, 8 * 1024 * 1024)?;
        let mut canvas = Canvas::new(&topology);

        let (caught, _) = backend.compile(
            "caught",
            r#"
            return {
                info = { maxtick = 0, frametime = 0 },
                frame = function(leds)
                    local survived = 0
                    for _ = 1, 2000 do
                        pcall(function() while true do end end)
                        survived = survived + 1
                    end
                    leds[1].color[1] = survived
                end,
            }
            "#,
        )?;
        assert!(backend.run(&caught, &mut canvas, 0).is_err());
        assert_eq!(&[0, 0], canvas.groups()[0].colors());

        let (handled, _) = backend.compile(
            "handled",
            r#"
            return {
                info = { maxtick = 0, frametime = 0 },
                frame = function(leds)
                    while true do
                        xpcall(function() while true do end end, function(e) return e end)
                    end
                end,
            }
            "#,
        )?;
        assert!(backend.run(&handled, &mut canvas, 0).is_err());

        let (forever, _) = backend.compile(
            "forever",
            r#"
            return {
                info = { maxtick = 0, frametime = 0 },
                frame = function(leds)
                    while true do pcall(function() while true do end end) end
                end,
            }
            "#,
        )?;
        assert!(backend.run(&forever, &mut canvas, 0).is_err());

        // The limit is armed fresh for every call.
        let (program, _) = backend.compile("tick", TICK_EFFECT)?;
        backend.run(&program, &mut canvas, 1)?;
        assert_eq!(&[11, 12], canvas.groups()[0].colors());
        Ok(())
    }

    #[test]
    fn test_compile_ignores_metamethods() {
        let topology = topology();
        let mut backend =
            LuaBackend::new(&topology, 10_000, 8 * 1024 * 1024).expect("lua backend");
        let result = backend.compile(
            "trap",
            r#"
            return setmetatable({}, { __index = function() while true do end end })
            "#,
        );
        assert!(matches!(result, Err(ScriptError::Contract(_))));
    }

    #[test]
    fn test_failed_frame_discards_script_writes() -> Result<(), ScriptError> {
        let (mut backend, mut canvas) = backend();
        let (bad, _) = backend.compile(
            "bad",
            r#"
            return {
                info = { maxtick = 0, frametime = 0 },
                frame = function(leds)
                    leds[1].color[1] = 99
                    leds[2].brightness = nil
                    error("boom")
                end,
            }
            "#,
        )?;
        let (good, _) = backend.compile(
            "good",
            r#"
            return {
                info = { maxtick = 0, frametime = 0 },
                frame = function(leds)
                    leds[1].color[2] = 7
                end,
            }
            "#,
        )?;

        assert!(backend.run(&bad, &mut canvas, 0).is_err());
        assert_eq!(&[0, 0], canvas.groups()[0].colors());

        backend.run(&good, &mut canvas, 0)?;
        assert_eq!(&[0, 7], canvas.groups()[0].colors());
        assert_eq!(&[0.0, 0.0, 0.0], canvas.groups()[1].brightness());
        Ok(())
    }
}
