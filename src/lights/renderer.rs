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

//! The public face of the light renderer.
//!
//! [`Renderer`] owns the render thread and talks to it over a command queue. Replies come
//! back on oneshot channels, so the API is async while the render loop itself stays on its
//! own thread.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::oneshot;
use tracing::{debug, error, info};

use super::canvas::Topology;
use super::catalog::{Catalog, EffectIndex};
use super::error::RendererError;
use super::scheduler::{Command, Scheduler};
use super::script::{EffectInfo, LuaBackend, ScriptBackend, ScriptError};
use super::state::RenderState;
use crate::config::Lights;

/// A snapshot of the render loop.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Status {
    /// The effect on top of the history.
    pub active: Option<String>,
    /// The tick of the last rendered frame.
    pub tick: usize,
    /// All activations, oldest first.
    pub history: Vec<String>,
    /// Whether a frame is scheduled.
    pub timer_armed: bool,
}

/// A handle to the light renderer. Handles are cheap to clone and may be used from any thread.
///
/// All mutations are queued to a single render thread and applied in the order they were
/// submitted. The render thread stops once [`Renderer::shutdown`] is called or every handle
/// is dropped.
#[derive(Clone)]
pub struct Renderer {
    inner: Arc<Inner>,
}

struct Inner {
    commands: Sender<Command>,
    effects: EffectIndex,
    topology: Topology,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Renderer {
    /// Starts a renderer that runs Lua effects with the limits from the given settings.
    pub fn new(lights: &Lights, topology: Topology) -> Result<Renderer, RendererError> {
        let lights = lights.clone();
        let ext = lights.ext().to_string();
        Self::with_backend(topology, &ext, move |topology| {
            LuaBackend::from_settings(&lights, topology)
        })
    }

    /// Starts a renderer with a custom script backend. The backend is built on the render
    /// thread by the given factory, so it does not need to be [`Send`].
    pub fn with_backend<B, F>(
        topology: Topology,
        ext: &str,
        factory: F,
    ) -> Result<Renderer, RendererError>
    where
        B: ScriptBackend + 'static,
        F: FnOnce(&Topology) -> Result<B, ScriptError> + Send + 'static,
    {
        let (commands, receiver) = crossbeam_channel::unbounded();
        let (ready, started) = crossbeam_channel::bounded(1);
        let effects = EffectIndex::default();

        let index = effects.clone();
        let thread_topology = topology.clone();
        let ext = ext.trim_start_matches('.').to_string();
        let thread = thread::Builder::new()
            .name("light-renderer".into())
            .spawn(move || {
                let backend = match factory(&thread_topology) {
                    Ok(backend) => backend,
                    Err(e) => {
                        let _ = ready.send(Err(e));
                        return;
                    }
                };
                let _ = ready.send(Ok(()));

                let catalog = Catalog::with_index(index);
                Scheduler::new(backend, &ext, &thread_topology, catalog).run(receiver);
            })?;

        match started.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = thread.join();
                return Err(e.into());
            }
            Err(_) => return Err(RendererError::Closed),
        }

        info!(leds = topology.led_count(), "Started light renderer.");
        Ok(Renderer {
            inner: Arc::new(Inner {
                commands,
                effects,
                topology,
                thread: Mutex::new(Some(thread)),
            }),
        })
    }

    /// Loads every effect below the given directory, replacing effects with the same name.
    /// Effects that fail to load are reported together once all others are loaded.
    pub async fn load_effects(&self, root: &Path) -> Result<usize, RendererError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::LoadEffects {
            root: root.to_path_buf(),
            reply,
        })?;
        let loaded = response.await.map_err(|_| RendererError::Closed)??;
        Ok(loaded)
    }

    /// Activates an effect and renders its first frame.
    pub async fn set_effect(&self, name: &str) -> Result<(), RendererError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::SetEffect {
            name: name.to_string(),
            reply,
        })?;
        response.await.map_err(|_| RendererError::Closed)?
    }

    /// Removes the most recent activation of an effect. If it was being rendered, the
    /// previous effect resumes immediately.
    pub async fn stop_effect(&self, name: &str) -> Result<(), RendererError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::StopEffect {
            name: name.to_string(),
            reply,
        })?;
        response.await.map_err(|_| RendererError::Closed)?
    }

    /// Clears the effect history. The last frame stays on the LEDs.
    pub async fn stop_all(&self) -> Result<(), RendererError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::StopAll { reply })?;
        response.await.map_err(|_| RendererError::Closed)
    }

    /// Renders the active effect now.
    pub async fn next_frame(&self) -> Result<(), RendererError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::NextFrame { reply })?;
        response.await.map_err(|_| RendererError::Closed)
    }

    pub async fn status(&self) -> Result<Status, RendererError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Status { reply })?;
        response.await.map_err(|_| RendererError::Closed)
    }

    /// The names of all loaded effects, sorted.
    pub fn list_effects(&self) -> Vec<String> {
        self.inner.effects.read().keys().cloned().collect()
    }

    /// The declared cadence of a loaded effect.
    pub fn effect_info(&self, name: &str) -> Option<EffectInfo> {
        self.inner.effects.read().get(name).copied()
    }

    pub fn topology(&self) -> &Topology {
        &self.inner.topology
    }

    pub fn led_count(&self) -> usize {
        self.inner.topology.led_count()
    }

    pub fn group_counts(&self) -> HashMap<String, usize> {
        self.inner.topology.group_counts()
    }

    /// Registers a consumer that is called with every rendered frame. Consumers run on the
    /// render thread and must not block.
    pub fn receive_frame<F>(&self, consumer: F) -> Result<(), RendererError>
    where
        F: FnMut(&RenderState) + Send + 'static,
    {
        self.send(Command::ReceiveFrame(Box::new(consumer)))
    }

    /// Subscribes to rendered frames through a bounded channel. Frames are dropped for this
    /// subscriber while its channel is full.
    pub fn subscribe(&self, capacity: usize) -> Result<Receiver<RenderState>, RendererError> {
        let (frames, receiver) = crossbeam_channel::bounded(capacity.max(1));
        self.receive_frame(move |state| {
            if let Err(TrySendError::Full(_)) = frames.try_send(state.clone()) {
                debug!("Frame subscriber is lagging, dropping frame.");
            }
        })?;
        Ok(receiver)
    }

    /// Stops the render loop and waits for the render thread to exit. Calling this more than
    /// once is harmless.
    pub fn shutdown(&self) {
        let _ = self.inner.commands.send(Command::Shutdown);

        let Some(thread) = self.inner.thread.lock().take() else {
            return;
        };
        // A consumer shutting down the renderer can't wait for itself.
        if thread.thread().id() == thread::current().id() {
            return;
        }
        if thread.join().is_err() {
            error!("Light renderer thread panicked.");
        }
        info!("Light renderer shut down.");
    }

    fn send(&self, command: Command) -> Result<(), RendererError> {
        self.inner
            .commands
            .send(command)
            .map_err(|_| RendererError::Closed)
    }
}
