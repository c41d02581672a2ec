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

//! The render loop.
//!
//! A single thread owns the canvas, the tick, the effect history and the frame timer. Every
//! mutation arrives as a [`Command`] on one queue, and the timer is the deadline of the
//! next receive, so there is never more than one pending timer and never more than one
//! render in flight.

use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use tokio::sync::oneshot;
use tracing::{debug, error, info, span, warn, Level};

use super::canvas::{Canvas, Topology};
use super::catalog::Catalog;
use super::error::{LoadError, RendererError};
use super::history::EffectStack;
use super::renderer::Status;
use super::script::ScriptBackend;
use super::state::{RenderState, StateDecoder};

/// A registered receiver of decoded frames.
pub(crate) type FrameConsumer = Box<dyn FnMut(&RenderState) + Send>;

/// Requests handled by the render loop.
pub(crate) enum Command {
    LoadEffects {
        root: PathBuf,
        reply: oneshot::Sender<Result<usize, LoadError>>,
    },
    SetEffect {
        name: String,
        reply: oneshot::Sender<Result<(), RendererError>>,
    },
    StopEffect {
        name: String,
        reply: oneshot::Sender<Result<(), RendererError>>,
    },
    StopAll {
        reply: oneshot::Sender<()>,
    },
    NextFrame {
        reply: oneshot::Sender<()>,
    },
    ReceiveFrame(FrameConsumer),
    Status {
        reply: oneshot::Sender<Status>,
    },
    Shutdown,
}

/// Computes the tick for the next render of `effect`. Switching effects starts over at 0,
/// otherwise the tick counts up to `max_tick - 1` and wraps.
pub(crate) fn next_tick(
    previous: Option<&str>,
    effect: &str,
    tick: usize,
    max_tick: usize,
) -> usize {
    if previous != Some(effect) {
        0
    } else if max_tick > 0 && tick < max_tick - 1 {
        tick + 1
    } else {
        0
    }
}

pub(crate) struct Scheduler<B: ScriptBackend> {
    backend: B,
    ext: String,
    catalog: Catalog<B::Program>,
    history: EffectStack,
    /// The last rendered effect. Cleared when the history empties.
    current: Option<String>,
    tick: usize,
    canvas: Canvas,
    decoder: StateDecoder,
    consumers: Vec<FrameConsumer>,
    /// When the frame timer fires next, if armed.
    deadline: Option<Instant>,
}

impl<B: ScriptBackend> Scheduler<B> {
    pub(crate) fn new(
        backend: B,
        ext: &str,
        topology: &Topology,
        catalog: Catalog<B::Program>,
    ) -> Scheduler<B> {
        Scheduler {
            backend,
            ext: ext.to_string(),
            catalog,
            history: EffectStack::new(),
            current: None,
            tick: 0,
            canvas: Canvas::new(topology),
            decoder: StateDecoder::new(),
            consumers: Vec::new(),
            deadline: None,
        }
    }

    /// Processes commands and timer expirations until shutdown or until every sender is gone.
    pub(crate) fn run(mut self, commands: Receiver<Command>) {
        let span = span!(Level::INFO, "light renderer");
        let _enter = span.enter();

        info!(groups = self.canvas.groups().len(), "Light renderer started.");
        loop {
            let command = match self.deadline {
                Some(deadline) if Instant::now() >= deadline => {
                    self.timer_fired();
                    continue;
                }
                Some(deadline) => match commands.recv_deadline(deadline) {
                    Ok(command) => command,
                    Err(RecvTimeoutError::Timeout) => {
                        self.timer_fired();
                        continue;
                    }
                    Err(RecvTimeoutError::Disconnected) => break,
                },
                None => match commands.recv() {
                    Ok(command) => command,
                    Err(_) => break,
                },
            };

            if !self.handle(command) {
                break;
            }
        }

        self.cancel_timer();
        info!("Light renderer stopped.");
    }

    /// Handles a single command. Returns false if the loop should stop.
    fn handle(&mut self, command: Command) -> bool {
        // A dropped reply receiver only means the caller stopped waiting.
        match command {
            Command::LoadEffects { root, reply } => {
                let _ = reply.send(self.load_effects(&root));
            }
            Command::SetEffect { name, reply } => {
                let _ = reply.send(self.set_effect(&name));
            }
            Command::StopEffect { name, reply } => {
                let _ = reply.send(self.stop_effect(&name));
            }
            Command::StopAll { reply } => {
                self.stop_all();
                let _ = reply.send(());
            }
            Command::NextFrame { reply } => {
                self.next_frame();
                let _ = reply.send(());
            }
            Command::ReceiveFrame(consumer) => self.consumers.push(consumer),
            Command::Status { reply } => {
                let _ = reply.send(self.status());
            }
            Command::Shutdown => return false,
        }
        true
    }

    pub(crate) fn load_effects(&mut self, root: &Path) -> Result<usize, LoadError> {
        let result = self.catalog.load(root, &self.ext, &mut self.backend);

        // A reloaded effect may declare fewer ticks than the current position.
        if let Some(effect) = self.current.as_deref().and_then(|c| self.catalog.get(c)) {
            if effect.info.max_tick == 0 || self.tick >= effect.info.max_tick {
                self.tick = 0;
            }
        }
        result
    }

    pub(crate) fn set_effect(&mut self, name: &str) -> Result<(), RendererError> {
        if !self.catalog.contains(name) {
            return Err(RendererError::EffectNotFound(name.to_string()));
        }

        self.history.push(name);
        info!(name, "Setting light effect.");
        self.render(name);
        Ok(())
    }

    pub(crate) fn stop_effect(&mut self, name: &str) -> Result<(), RendererError> {
        let removal = self
            .history
            .remove_last(name)
            .ok_or_else(|| RendererError::EffectNotFound(name.to_string()))?;
        info!(name, "Stopped light effect.");

        if removal.was_top {
            match removal.new_top {
                Some(top) => self.render(&top),
                None => self.go_idle(),
            }
        }
        Ok(())
    }

    /// Drops the whole history. The last frame stays on the LEDs.
    pub(crate) fn stop_all(&mut self) {
        self.history.clear();
        info!("Stopped all light effects.");
        self.go_idle();
    }

    /// Renders the effect on top of the history, the same way the frame timer does.
    pub(crate) fn next_frame(&mut self) {
        match self.history.top().map(str::to_string) {
            Some(top) => self.render(&top),
            None => debug!("No active light effect, skipping frame."),
        }
    }

    pub(crate) fn status(&self) -> Status {
        Status {
            active: self.history.top().map(str::to_string),
            tick: self.tick,
            history: self.history.entries().to_vec(),
            timer_armed: self.deadline.is_some(),
        }
    }

    fn timer_fired(&mut self) {
        self.deadline = None;
        self.next_frame();
    }

    fn cancel_timer(&mut self) {
        self.deadline = None;
    }

    fn go_idle(&mut self) {
        self.cancel_timer();
        self.current = None;
        debug!("Light effect history is empty, holding the last frame.");
    }

    fn render(&mut self, name: &str) {
        self.cancel_timer();
        let Some(effect) = self.catalog.get(name) else {
            warn!(name, "Light effect is not loaded, skipping frame.");
            return;
        };

        if let Some(interval) = effect.info.next_frame_in() {
            self.deadline = Some(Instant::now() + interval);
        }

        self.tick = next_tick(self.current.as_deref(), name, self.tick, effect.info.max_tick);
        if self.current.as_deref() != Some(name) {
            self.current = Some(name.to_string());
        }

        let tick = self.tick;
        let frame = panic::catch_unwind(AssertUnwindSafe(|| {
            self.backend.run(&effect.program, &mut self.canvas, tick)
        }));
        match frame {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(name, tick, err = %e, "Light effect frame failed, skipping.");
                return;
            }
            Err(_) => {
                error!(name, tick, "Light effect frame panicked, skipping.");
                return;
            }
        }

        let state = self.decoder.decode(&self.canvas);
        for consumer in self.consumers.iter_mut() {
            consumer(state);
        }
    }
}
