//! Cloven: real-time ray-marched Mandelbulb viewer.
//! - egui/eframe UI with a CPU or wgpu ray marcher
//! - fly camera with mouse look and keyboard movement
//! - interactive color-gradient editor driving the fractal coloring
//! - save/load JSON or TOML (.clvproj) projects, .clvgrad gradients
//! - headless still rendering and gradient lookup export

mod app;
mod camera;
mod gradient;
mod project;
mod render;
mod settings;
mod uniforms;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use eframe::egui;
use env_logger::Env;

use crate::{
    app::ClovenApp,
    camera::FlyCamera,
    gradient::GradientEngine,
    project::{Project, ProjectError},
    render::RenderError,
    uniforms::FrameUniforms,
};

#[cfg(feature = "gpu")]
use crate::render::{GpuRenderer, RenderBackend};

// ------------------------- CLI -------------------------

#[derive(Parser)]
#[command(name = "cloven")]
#[command(about = "Real-time ray-marched Mandelbulb viewer")]
struct Args {
    /// Project file to open (.clvproj / .toml / .json)
    #[arg(short, long)]
    project: Option<PathBuf>,

    /// Headless commands (no window)
    #[command(subcommand)]
    cmd: Option<Cmd>,
}

#[derive(Subcommand)]
enum Cmd {
    /// Render a still frame of a project to PNG
    Render {
        project: PathBuf,
        #[arg(short, long)]
        out: PathBuf,
        #[arg(long, default_value_t = 1280)]
        width: u32,
        #[arg(long, default_value_t = 720)]
        height: u32,
    },
    /// Write the 256x1 gradient lookup texture to PNG
    Lut {
        /// Take the gradient from this project instead of the default ramp
        #[arg(short, long)]
        project: Option<PathBuf>,
        #[arg(short, long)]
        out: PathBuf,
    },
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error("project: {0}")]
    Project(#[from] ProjectError),
    #[error("render: {0}")]
    Render(#[from] RenderError),
    #[error("window: {0}")]
    Gui(#[from] eframe::Error),
}

// ------------------------- Headless -------------------------

fn render_still(project: &Project, size: (u32, u32), out: &Path) -> Result<(), CliError> {
    let camera = FlyCamera::from_pose(&project.camera);
    let lut = GradientEngine::from_stops(project.gradient.iter().copied()).generate_texture_bytes();
    let mut settings = project.settings.clone();
    settings.sanitize();
    let uniforms = FrameUniforms::new(&settings, &camera, size, 0.0);

    #[cfg(feature = "gpu")]
    let mut gpu = if project.backend == RenderBackend::Gpu {
        match GpuRenderer::new() {
            Ok(renderer) => Some(renderer),
            Err(err) => {
                log::warn!("GPU init failed: {err}. Falling back to CPU.");
                None
            }
        }
    } else {
        None
    };

    log::info!(
        "rendering {}x{} with {} backend",
        size.0,
        size.1,
        project.backend.label()
    );
    let pixels = render::render_frame(
        &uniforms,
        &lut,
        project.backend,
        #[cfg(feature = "gpu")]
        gpu.as_mut(),
    );
    render::save_png(out, size, pixels)?;
    log::info!("wrote {}", out.display());
    Ok(())
}

fn write_lut(project: Option<&Path>, out: &Path) -> Result<(), CliError> {
    let engine = match project {
        Some(path) => GradientEngine::from_stops(project::load_project(path)?.gradient),
        None => GradientEngine::new(),
    };
    render::save_lut_png(out, &engine.generate_texture_bytes())?;
    log::info!("wrote {}", out.display());
    Ok(())
}

// ------------------------- Entry -------------------------

fn run(args: Args) -> Result<(), CliError> {
    match args.cmd {
        Some(Cmd::Render {
            project,
            out,
            width,
            height,
        }) => {
            let project = project::load_project(&project)?;
            render_still(&project, (width.max(1), height.max(1)), &out)
        }
        Some(Cmd::Lut { project, out }) => write_lut(project.as_deref(), &out),
        None => {
            let project = match args.project {
                Some(path) => project::load_project(&path).unwrap_or_else(|err| {
                    log::error!("could not open {}: {err}", path.display());
                    Project::default()
                }),
                None => Project::default(),
            };
            let options = eframe::NativeOptions {
                viewport: egui::ViewportBuilder::default()
                    .with_inner_size([1280.0, 840.0])
                    .with_min_inner_size([640.0, 480.0]),
                ..Default::default()
            };
            eframe::run_native(
                "Cloven",
                options,
                Box::new(|_cc| Box::new(ClovenApp::new(project))),
            )?;
            Ok(())
        }
    }
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    if let Err(err) = run(Args::parse()) {
        log::error!("{err}");
        std::process::exit(1);
    }
}
