//! Configuration System
//!
//! Layered configuration for storage locations, grade feature flags and
//! logging, with environment variable overrides and validation.

use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub use crate::flags::GradesConfig;

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;
pub use sources::global_file::global_config_path;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Storage locations
    #[serde(default)]
    pub storage: StorageConfig,

    /// Grade feature flags
    #[serde(default)]
    pub grades: GradesConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Storage locations; relative paths resolve against the workspace root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Sled database holding grades and scores
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,

    /// Directory of course definition files
    #[serde(default = "default_courses_path")]
    pub courses_path: PathBuf,
}

fn default_store_path() -> PathBuf {
    PathBuf::from(".coursegrade/store")
}

fn default_courses_path() -> PathBuf {
    PathBuf::from("courses")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            courses_path: default_courses_path(),
        }
    }
}

impl StorageConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.store_path.as_os_str().is_empty() {
            return Err("Store path cannot be empty".to_string());
        }
        if self.courses_path.as_os_str().is_empty() {
            return Err("Courses path cannot be empty".to_string());
        }
        Ok(())
    }

    pub fn resolve_store_path(&self, workspace_root: &Path) -> PathBuf {
        resolve(workspace_root, &self.store_path)
    }

    pub fn resolve_courses_path(&self, workspace_root: &Path) -> PathBuf {
        resolve(workspace_root, &self.courses_path)
    }
}

fn resolve(workspace_root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        workspace_root.join(path)
    }
}

/// Configuration validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    Storage(String),
    Grades(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Storage(msg) => write!(f, "Storage: {}", msg),
            ValidationError::Grades(msg) => write!(f, "Grades: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl AppConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = self.storage.validate() {
            errors.push(ValidationError::Storage(e));
        }
        if let Err(e) = self.grades.validate() {
            errors.push(ValidationError::Grades(e));
        }
        if let Err(e) = self.logging.validate() {
            errors.push(ValidationError::Logging(e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
