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

//! The light effect renderer: loads effect scripts, runs the active one at its own
//! cadence and fans decoded frames out to consumers (LED drivers, previews).

pub mod canvas;
pub mod catalog;
pub mod colormap;
pub mod error;
pub mod history;
pub mod renderer;
mod scheduler;
pub mod script;
pub mod state;

pub use canvas::{Canvas, Topology};
pub use error::RendererError;
pub use renderer::{Renderer, Status};
pub use script::{EffectInfo, ScriptBackend, ScriptError};
pub use state::{LedState, RenderState};
