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

//! Loading and bookkeeping of compiled effects.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use super::error::{EffectLoadError, LoadError};
use super::script::{EffectInfo, ScriptBackend, ScriptError};
use crate::util::effect_name;

/// A loaded effect program with its declared cadence.
pub struct Effect<P> {
    pub name: String,
    pub path: PathBuf,
    pub info: EffectInfo,
    pub program: P,
}

/// A sorted, thread safe view of the loaded effects and their cadence.
pub type EffectIndex = Arc<RwLock<BTreeMap<String, EffectInfo>>>;

/// All loaded effects. Lives on the render loop, the index can be read from anywhere.
pub struct Catalog<P> {
    effects: HashMap<String, Effect<P>>,
    index: EffectIndex,
}

impl<P> Catalog<P> {
    pub fn new() -> Catalog<P> {
        Self::with_index(Arc::new(RwLock::new(BTreeMap::new())))
    }

    /// Creates an empty catalog that publishes into an existing index.
    pub fn with_index(index: EffectIndex) -> Catalog<P> {
        index.write().clear();
        Catalog {
            effects: HashMap::new(),
            index,
        }
    }

    /// Gets a handle to the shared effect index.
    pub fn index(&self) -> EffectIndex {
        self.index.clone()
    }

    pub fn get(&self, name: &str) -> Option<&Effect<P>> {
        self.effects.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.effects.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Adds an effect, replacing any effect with the same name.
    pub fn insert(&mut self, effect: Effect<P>) {
        self.index.write().insert(effect.name.clone(), effect.info);
        if let Some(previous) = self.effects.insert(effect.name.clone(), effect) {
            debug!(
                name = previous.name.as_str(),
                replaced = %previous.path.display(),
                "Replaced previously loaded effect."
            );
        }
    }

    /// Recurses into the given directory and compiles every file with the given extension.
    /// Files that fail to compile are collected into [`LoadError::Effects`] after all other
    /// effects have been loaded. Returns the number of effects loaded.
    pub fn load<B>(&mut self, root: &Path, ext: &str, backend: &mut B) -> Result<usize, LoadError>
    where
        B: ScriptBackend<Program = P>,
    {
        let mut files = Vec::new();
        let mut failures = Vec::new();
        collect_files(root, ext, &mut files).map_err(|source| LoadError::Directory {
            path: root.to_path_buf(),
            source,
        })?;

        let mut loaded = 0;
        let mut seen = HashSet::new();
        for (path, result) in files {
            let name = effect_name(&path).to_string();
            if !seen.insert(name.clone()) {
                warn!(
                    name = name.as_str(),
                    path = %path.display(),
                    "Duplicate effect name, the later file wins."
                );
            }
            let compiled = result
                .map_err(ScriptError::from)
                .and_then(|_| fs::read_to_string(&path).map_err(ScriptError::from))
                .and_then(|source| backend.compile(&name, &source));

            match compiled {
                Ok((program, info)) => {
                    debug!(
                        name = name.as_str(),
                        max_tick = info.max_tick,
                        frame_interval = ?info.frame_interval,
                        "Added effect."
                    );
                    self.insert(Effect {
                        name,
                        path,
                        info,
                        program,
                    });
                    loaded += 1;
                }
                Err(source) => {
                    warn!(
                        name = name.as_str(),
                        path = %path.display(),
                        err = %source,
                        "Failed to load effect."
                    );
                    failures.push(EffectLoadError { name, path, source });
                }
            }
        }

        info!(
            root = %root.display(),
            loaded,
            failed = failures.len(),
            "Loaded light effects."
        );
        if failures.is_empty() {
            Ok(loaded)
        } else {
            Err(LoadError::Effects(failures))
        }
    }
}

impl<P> Default for Catalog<P> {
    fn default() -> Self {
        Catalog::new()
    }
}

/// Walks the directory in sorted order so that duplicate effect names resolve the same way
/// on every load. Unreadable subdirectories are reported per entry instead of aborting.
fn collect_files(
    dir: &Path,
    ext: &str,
    files: &mut Vec<(PathBuf, std::io::Result<()>)>,
) -> std::io::Result<()> {
    let mut entries = fs::read_dir(dir)?
        .map(|entry| entry.map(|entry| entry.path()))
        .collect::<std::io::Result<Vec<PathBuf>>>()?;
    entries.sort();

    for path in entries {
        if path.is_dir() {
            if let Err(e) = collect_files(&path, ext, files) {
                files.push((path, Err(e)));
            }
        } else if path.extension().is_some_and(|e| e == ext) {
            files.push((path, Ok(())));
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;
    use std::error::Error;
    use std::fs;

    use super::*;
    use crate::config::LedGroup;
    use crate::lights::canvas::{Canvas, Topology};
    use crate::lights::script::LuaBackend;

    const EFFECT: &str = r#"
        return {
            info = { maxtick = 3, frametime = 0.1 },
            frame = function(leds, tick) return leds end,
        }
    "#;

    fn topology() -> Topology {
        let leds: HashMap<String, LedGroup> = [
            ("front".to_string(), LedGroup::new(1, 2)),
            ("rear".to_string(), LedGroup::new(2, 7)),
        ]
        .into_iter()
        .collect();
        Topology::from_groups(&leds).expect("valid topology")
    }

    fn backend() -> LuaBackend {
        LuaBackend::new(&topology(), 100_000, 8 * 1024 * 1024).expect("lua backend")
    }

    #[test]
    fn test_load() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("Rainbow.lua"), EFFECT)?;
        fs::write(dir.path().join("flash.lua"), EFFECT)?;
        fs::write(dir.path().join("notes.txt"), "not an effect")?;
        fs::create_dir(dir.path().join("party"))?;
        fs::write(dir.path().join("party").join("Strobe.lua"), EFFECT)?;

        let mut catalog = Catalog::new();
        assert_eq!(3, catalog.load(dir.path(), "lua", &mut backend())?);

        let names: Vec<String> = catalog.index().read().keys().cloned().collect();
        assert_eq!(vec!["Rainbow", "Strobe", "flash"], names);
        assert!(catalog.contains("Strobe"));
        assert!(!catalog.contains("notes"));

        let flash = catalog.get("flash").expect("flash loaded");
        assert_eq!(3, flash.info.max_tick);
        assert_eq!(dir.path().join("flash.lua"), flash.path);
        Ok(())
    }

    #[test]
    fn test_load_continues_after_failures() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("a_broken.lua"), "return {")?;
        fs::write(dir.path().join("b_good.lua"), EFFECT)?;
        fs::write(dir.path().join("c_noframe.lua"), "return { info = {} }")?;

        let mut catalog = Catalog::new();
        let err = catalog
            .load(dir.path(), "lua", &mut backend())
            .expect_err("two effects are broken");

        match err {
            LoadError::Effects(failures) => {
                let names: Vec<&str> = failures.iter().map(|f| f.name.as_str()).collect();
                assert_eq!(vec!["a_broken", "c_noframe"], names);
            }
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(1, catalog.len());
        assert!(catalog.contains("b_good"));
        Ok(())
    }

    #[test]
    fn test_load_duplicate_names() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        fs::create_dir(dir.path().join("a"))?;
        fs::create_dir(dir.path().join("b"))?;
        fs::write(dir.path().join("a").join("flash.lua"), EFFECT)?;
        fs::write(
            dir.path().join("b").join("flash.lua"),
            "return { info = { maxtick = 7, frametime = 0 }, frame = function() end }",
        )?;

        let mut catalog = Catalog::new();
        catalog.load(dir.path(), "lua", &mut backend())?;

        assert_eq!(1, catalog.len());
        let flash = catalog.get("flash").expect("flash loaded");
        assert_eq!(7, flash.info.max_tick);
        assert_eq!(dir.path().join("b").join("flash.lua"), flash.path);
        Ok(())
    }

    #[test]
    fn test_load_missing_directory() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let mut catalog = Catalog::new();
        assert!(matches!(
            catalog.load(&dir.path().join("missing"), "lua", &mut backend()),
            Err(LoadError::Directory { .. })
        ));
        assert!(catalog.is_empty());
        Ok(())
    }

    #[test]
    fn test_bundled_effects() -> Result<(), Box<dyn Error>> {
        let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("data/lights/effects");
        let mut backend = backend();
        let mut catalog = Catalog::new();
        catalog.load(&root, "lua", &mut backend)?;

        let names: Vec<String> = catalog.index().read().keys().cloned().collect();
        assert_eq!(vec!["blaulicht", "default", "flash", "kitt", "red"], names);

        let mut canvas = Canvas::new(&topology());
        for name in names.iter() {
            let effect = catalog.get(name).expect("effect loaded");
            for tick in 0..effect.info.max_tick.max(1) {
                backend.run(&effect.program, &mut canvas, tick)?;
                for group in canvas.groups() {
                    assert!(group.brightness().iter().all(|b| (0.0..=1.0).contains(b)));
                }
            }
        }
        Ok(())
    }
}
