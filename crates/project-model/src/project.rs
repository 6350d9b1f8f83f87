//! Project manifest: screens, target devices, and languages.
//!
//! A project is stored as a single JSON file. Media paths inside it may be
//! relative, in which case they are resolved against the manifest directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::device::DeviceSize;
use crate::screen::{LocalizedText, Screen};

/// Top-level project (`project.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub name: String,

    #[serde(default)]
    pub screens: Vec<Screen>,

    /// Target devices, by catalogue name or inline custom definition.
    #[serde(default)]
    pub devices: Vec<DeviceRef>,

    #[serde(default = "default_languages")]
    pub languages: Vec<Language>,
}

/// A device in a project: either a catalogue name or a full definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DeviceRef {
    Named(String),
    Custom(DeviceSize),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Language {
    pub code: String,
    #[serde(default)]
    pub display_name: String,
}

impl Language {
    pub fn new(code: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            display_name: display_name.into(),
        }
    }

    /// Languages offered for new projects.
    pub fn supported() -> Vec<Language> {
        [
            ("en", "English"),
            ("ja", "Japanese"),
            ("zh-Hans", "Chinese (Simplified)"),
            ("zh-Hant", "Chinese (Traditional)"),
            ("ko", "Korean"),
            ("fr", "French"),
            ("de", "German"),
            ("es", "Spanish"),
            ("pt-BR", "Portuguese (Brazil)"),
            ("it", "Italian"),
            ("nl", "Dutch"),
            ("ru", "Russian"),
            ("ar", "Arabic"),
            ("th", "Thai"),
            ("vi", "Vietnamese"),
        ]
        .into_iter()
        .map(|(code, name)| Language::new(code, name))
        .collect()
    }

    /// Display name, falling back to the code.
    pub fn label(&self) -> &str {
        if self.display_name.is_empty() {
            &self.code
        } else {
            &self.display_name
        }
    }
}

fn default_languages() -> Vec<Language> {
    vec![Language::new("en", "English")]
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        let mut screen = Screen::new("Screen 1");
        screen.set_text("en", LocalizedText::new("Your App Title", "A brief description"));
        Self {
            name: name.into(),
            screens: vec![screen],
            devices: ["iPhone 6.9\"", "iPhone 6.5\"", "iPad 13\""]
                .into_iter()
                .map(|n| DeviceRef::Named(n.to_string()))
                .collect(),
            languages: default_languages(),
        }
    }

    /// Resolve device references against the catalogue.
    pub fn resolved_devices(&self) -> Result<Vec<DeviceSize>, ProjectError> {
        self.devices
            .iter()
            .map(|device| match device {
                DeviceRef::Named(name) => {
                    DeviceSize::find(name).ok_or_else(|| ProjectError::UnknownDevice {
                        name: name.clone(),
                    })
                }
                DeviceRef::Custom(size) => Ok(size.clone()),
            })
            .collect()
    }

    pub fn screen(&self, name: &str) -> Option<&Screen> {
        self.screens.iter().find(|s| s.name == name || s.id == name)
    }

    pub fn language(&self, code: &str) -> Option<&Language> {
        self.languages.iter().find(|l| l.code == code)
    }
}

/// A project loaded from disk.
#[derive(Debug, Clone)]
pub struct ProjectFile {
    /// Path to the manifest.
    pub path: PathBuf,

    /// Project with media paths resolved to absolute locations.
    pub project: Project,
}

impl ProjectFile {
    /// Load a project manifest.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ProjectError> {
        let path = path.as_ref().to_path_buf();

        let json = std::fs::read_to_string(&path).map_err(|e| ProjectError::IoError {
            path: path.clone(),
            source: e,
        })?;

        let mut project: Project =
            serde_json::from_str(&json).map_err(|e| ProjectError::ParseError {
                path: path.clone(),
                source: e,
            })?;

        let base = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        for screen in &mut project.screens {
            screen.resolve_paths(&base);
        }

        // Fail early on typos in device names rather than mid-export.
        project.resolved_devices()?;

        Ok(Self { path, project })
    }

    /// Write the project manifest.
    pub fn save(&self) -> Result<(), ProjectError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ProjectError::IoError {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let json =
            serde_json::to_string_pretty(&self.project).map_err(|e| ProjectError::ParseError {
                path: self.path.clone(),
                source: e,
            })?;
        std::fs::write(&self.path, json).map_err(|e| ProjectError::IoError {
            path: self.path.clone(),
            source: e,
        })?;

        Ok(())
    }
}

/// Errors from project operations.
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Unknown device: {name}")]
    UnknownDevice { name: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceCategory;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "shotcraft-project-{}-{}",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_new_project_defaults() {
        let project = Project::new("Demo");
        assert_eq!(project.screens.len(), 1);
        assert_eq!(project.languages[0].code, "en");
        let devices = project.resolved_devices().unwrap();
        assert_eq!(devices.len(), 3);
        assert_eq!(devices[2].category, DeviceCategory::IPad);
    }

    #[test]
    fn test_save_and_load_resolves_media() {
        let dir = temp_dir("roundtrip");
        let mut project = Project::new("Demo");
        project.screens[0].set_video("en", DeviceCategory::IPhone, "media/clip.mov", 1.0);
        project
            .devices
            .push(DeviceRef::Custom(DeviceSize::custom("Banner", 1200, 600)));

        let file = ProjectFile {
            path: dir.join("project.json"),
            project,
        };
        file.save().unwrap();

        let loaded = ProjectFile::load(dir.join("project.json")).unwrap();
        assert_eq!(
            loaded.project.screens[0].video_for("en", DeviceCategory::IPhone),
            Some(dir.join("media/clip.mov").as_path())
        );
        let devices = loaded.project.resolved_devices().unwrap();
        assert_eq!(devices.last().unwrap().category, DeviceCategory::Custom);
    }

    #[test]
    fn test_unknown_device_rejected() {
        let dir = temp_dir("unknown");
        let path = dir.join("project.json");
        std::fs::write(
            &path,
            r#"{ "name": "x", "devices": ["iPhone 99\""], "screens": [] }"#,
        )
        .unwrap();
        assert!(matches!(
            ProjectFile::load(&path),
            Err(ProjectError::UnknownDevice { .. })
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = ProjectFile::load("/nonexistent/shotcraft/project.json").unwrap_err();
        assert!(matches!(err, ProjectError::IoError { .. }));
    }
}
