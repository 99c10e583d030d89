//! Session persistence: whole projects as JSON or TOML, gradients as JSON.

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    camera::CameraPose,
    gradient::{ColorStop, GradientEngine},
    render::RenderBackend,
    settings::RenderSettings,
};

pub const PROJECT_EXTENSION: &str = "clvproj";
pub const GRADIENT_EXTENSION: &str = "clvgrad";

#[derive(thiserror::Error, Debug)]
pub enum ProjectError {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("TOML: {0}")]
    TomlDe(#[from] toml::de::Error),
    #[error("TOML: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("gradient has no stops")]
    EmptyGradient,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Project {
    pub name: String,
    pub backend: RenderBackend,
    pub camera: CameraPose,
    pub gradient: Vec<ColorStop>,
    pub settings: RenderSettings,
}

impl Default for Project {
    fn default() -> Self {
        Self {
            name: "Untitled".into(),
            backend: RenderBackend::default(),
            camera: CameraPose::default(),
            gradient: GradientEngine::new().to_stops(),
            settings: RenderSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Toml,
    Guess,
}

fn format_of(path: &Path) -> Format {
    match path.extension().and_then(|ext| ext.to_str()).unwrap_or("") {
        "json" => Format::Json,
        "toml" | PROJECT_EXTENSION => Format::Toml,
        _ => Format::Guess,
    }
}

pub fn load_project(path: &Path) -> Result<Project, ProjectError> {
    let data = fs::read_to_string(path)?;
    let mut project: Project = match format_of(path) {
        Format::Json => serde_json::from_str(&data)?,
        Format::Toml => toml::from_str(&data)?,
        Format::Guess => match serde_json::from_str(&data) {
            Ok(project) => project,
            Err(_) => toml::from_str(&data)?,
        },
    };
    project.settings.sanitize();
    log::info!("loaded project {:?} from {}", project.name, path.display());
    Ok(project)
}

/// Writes TOML for `.toml`/`.clvproj` paths and JSON otherwise.
pub fn save_project(path: &Path, project: &Project) -> Result<(), ProjectError> {
    let data = match format_of(path) {
        Format::Toml => toml::to_string_pretty(project)?,
        Format::Json | Format::Guess => serde_json::to_string_pretty(project)?,
    };
    fs::write(path, data)?;
    log::info!("saved project to {}", path.display());
    Ok(())
}

pub fn load_gradient(path: &Path) -> Result<Vec<ColorStop>, ProjectError> {
    let data = fs::read_to_string(path)?;
    let stops: Vec<ColorStop> = serde_json::from_str(&data)?;
    if stops.is_empty() {
        return Err(ProjectError::EmptyGradient);
    }
    Ok(stops)
}

pub fn save_gradient(path: &Path, stops: &[ColorStop]) -> Result<(), ProjectError> {
    fs::write(path, serde_json::to_string_pretty(stops)?)?;
    Ok(())
}

pub fn save_project_dialog(project: &Project) {
    let Some(path) = rfd::FileDialog::new()
        .add_filter("Cloven project", &[PROJECT_EXTENSION, "toml"])
        .add_filter("JSON", &["json"])
        .set_file_name(format!("{}.{PROJECT_EXTENSION}", project.name))
        .save_file()
    else {
        return;
    };
    if let Err(err) = save_project(&path, project) {
        log::error!("saving {} failed: {err}", path.display());
    }
}

pub fn open_project_dialog() -> Option<Project> {
    let path = rfd::FileDialog::new()
        .add_filter("Project", &[PROJECT_EXTENSION, "toml", "json"])
        .pick_file()?;
    load_project(&path)
        .map_err(|err| log::error!("loading {} failed: {err}", path.display()))
        .ok()
}

pub fn save_gradient_dialog(stops: &[ColorStop]) {
    let Some(path) = rfd::FileDialog::new()
        .add_filter("Gradient", &[GRADIENT_EXTENSION])
        .set_file_name(format!("gradient.{GRADIENT_EXTENSION}"))
        .save_file()
    else {
        return;
    };
    if let Err(err) = save_gradient(&path, stops) {
        log::error!("saving {} failed: {err}", path.display());
    }
}

pub fn open_gradient_dialog() -> Option<Vec<ColorStop>> {
    let path = rfd::FileDialog::new()
        .add_filter("Gradient", &[GRADIENT_EXTENSION])
        .pick_file()?;
    load_gradient(&path)
        .map_err(|err| log::error!("loading {} failed: {err}", path.display()))
        .ok()
}
