use std::path::PathBuf;

use crate::settings::Settings;
use crate::task_error::TaskError;

/// A locally built image, identified by its source directory and tool version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    name: String,
    version: String,
    registry: String,
}

impl Image {
    pub fn new(name: String, version: String, settings: &Settings) -> Result<Self, TaskError> {
        // Validate the image name and version.
        if name.is_empty() {
            return Err(TaskError::Empty("image name"));
        }
        if name.contains(':') {
            return Err(TaskError::InvalidImageName(name));
        }
        if version.is_empty() {
            return Err(TaskError::Empty("tool version"));
        }

        Ok(Self {
            name,
            version,
            registry: settings.image.registry.clone(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// The tag the image is built and run under, e.g. `local/php-cli:8.3`.
    pub fn tag(&self) -> String {
        self.tag_with(&self.version)
    }

    pub fn tag_with(&self, version: &str) -> String {
        format!("{}/{}:{}", self.registry, self.name, version)
    }

    /// Path of the image's container definition file, relative to the working directory.
    pub fn dockerfile(&self, settings: &Settings) -> PathBuf {
        let mut path = PathBuf::new();
        path.push(&self.name);
        path.push(&settings.image.dockerfile);
        path
    }
}
