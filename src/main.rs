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
use std::error::Error;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{crate_version, Parser, Subcommand};
use crossbeam_channel::Receiver;
use deichwave_lights::config::{self, Settings};
use deichwave_lights::lights::colormap::Colormap;
use deichwave_lights::lights::{RenderState, Renderer, Topology};
use duration_string::DurationString;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// The number of colors in the preview palette.
const PREVIEW_COLORS: usize = 256;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A scriptable light effect renderer."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Loads and lists all light effects.
    Effects {
        /// The path to the config file.
        config: PathBuf,
    },
    /// Prints the configured LED groups.
    Topology {
        /// The path to the config file.
        config: PathBuf,
    },
    /// Renders the given effects and prints every frame to the terminal.
    Preview {
        /// The path to the config file.
        config: PathBuf,
        /// The effects to activate, in order. The last one is rendered.
        #[arg(required = true)]
        effects: Vec<String>,
        /// How long to render for.
        #[arg(short, long, default_value = "10s")]
        duration: String,
        /// Print frames as JSON lines instead of colors.
        #[arg(short, long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let config_path = match &cli.command {
        Commands::Effects { config } => config,
        Commands::Topology { config } => config,
        Commands::Preview { config, .. } => config,
    };
    let settings = config::load_settings(config_path)?;
    init_tracing(settings.debug());
    let topology = Topology::from_groups(settings.leds())?;

    match cli.command {
        Commands::Effects { .. } => {
            let renderer = Renderer::new(settings.lights(), topology)?;
            let path = settings.lights().path();
            let result = renderer.load_effects(Path::new(path)).await;

            let effects = renderer.list_effects();
            if effects.is_empty() {
                println!("No effects found in {}.", path);
            } else {
                println!("Effects (count: {}):", effects.len());
                for name in effects.iter() {
                    match renderer.effect_info(name) {
                        Some(info) => println!(
                            "- {} (max tick: {}, frame time: {:?})",
                            name, info.max_tick, info.frame_interval
                        ),
                        None => println!("- {}", name),
                    }
                }
            }

            renderer.shutdown();
            result?;
        }
        Commands::Topology { .. } => {
            if topology.groups().is_empty() {
                println!("No LED groups configured.");
                return Ok(());
            }

            println!(
                "LED groups (count: {}, LEDs: {}):",
                topology.groups().len(),
                topology.led_count()
            );
            for (name, count) in topology.groups() {
                println!("- {}: {}", name, count);
            }
        }
        Commands::Preview {
            effects,
            duration,
            json,
            ..
        } => {
            let duration: Duration = DurationString::from_string(duration)?.into();
            preview(&settings, topology, &effects, duration, json).await?;
        }
    }

    Ok(())
}

/// Logs to stderr so that frames printed to stdout stay clean.
fn init_tracing(debug: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if debug { "debug" } else { "info" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn preview(
    settings: &Settings,
    topology: Topology,
    effects: &[String],
    duration: Duration,
    json: bool,
) -> Result<(), Box<dyn Error>> {
    let renderer = Renderer::new(settings.lights(), topology)?;
    if let Err(e) = renderer
        .load_effects(Path::new(settings.lights().path()))
        .await
    {
        warn!(err = %e, "Not all light effects could be loaded.");
    }

    let frames = renderer.subscribe(64)?;
    let printer = tokio::task::spawn_blocking(move || print_frames(frames, json));

    for effect in effects {
        if let Err(e) = renderer.set_effect(effect).await {
            renderer.shutdown();
            return Err(e.into());
        }
    }

    info!(?duration, "Previewing light effects.");
    tokio::select! {
        _ = tokio::time::sleep(duration) => {},
        _ = tokio::signal::ctrl_c() => info!("Interrupted."),
    }

    renderer.shutdown();
    printer.await??;
    Ok(())
}

/// Prints frames until the renderer shuts down.
fn print_frames(frames: Receiver<RenderState>, json: bool) -> io::Result<()> {
    let colormap = Colormap::rainbow(PREVIEW_COLORS);
    let stdout = io::stdout();

    for frame in frames.iter() {
        let mut out = stdout.lock();
        if json {
            serde_json::to_writer(&mut out, &frame)?;
            writeln!(out)?;
            continue;
        }

        let mut line = String::new();
        for group in frame.groups() {
            for led in group {
                let color = colormap.color(led.color_index, led.brightness);
                line.push_str(&format!(
                    "\x1b[48;2;{};{};{}m  ",
                    color.r, color.g, color.b
                ));
            }
            line.push_str("\x1b[0m|");
        }
        writeln!(out, "{}", line)?;
    }
    Ok(())
}
