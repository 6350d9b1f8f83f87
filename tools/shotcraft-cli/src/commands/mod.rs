pub mod check;
pub mod devices;
pub mod export;
pub mod layout;
pub mod poster;

use std::path::Path;

use anyhow::Context;

use shotcraft_project_model::{DeviceSize, ProjectFile};

pub fn load_project(path: &Path) -> anyhow::Result<ProjectFile> {
    ProjectFile::load(path).with_context(|| format!("Failed to load project {}", path.display()))
}

/// The project's devices, narrowed to `names` when any are given.
pub fn select_devices(project: &ProjectFile, names: &[String]) -> anyhow::Result<Vec<DeviceSize>> {
    let devices = project.project.resolved_devices()?;
    if names.is_empty() {
        return Ok(devices);
    }
    names
        .iter()
        .map(|name| {
            devices
                .iter()
                .find(|d| &d.name == name)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("Device '{name}' is not part of this project"))
        })
        .collect()
}
