//! ConfigLoader: the single entry point for building an [`AppConfig`].

use crate::config::merge::merge_policy;
use crate::config::sources::{global_file, workspace_file};
use crate::config::AppConfig;
use crate::error::GradeError;
use config::File;
use std::path::Path;
use tracing::debug;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load layered configuration for a workspace
    ///
    /// Defaults, then the global file, then workspace files, then environment.
    pub fn load(workspace_root: &Path) -> Result<AppConfig, GradeError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = workspace_file::add_to_builder(builder, workspace_root)?;
        let builder = builder.add_source(merge_policy::environment_source());

        let config: AppConfig = builder.build()?.try_deserialize()?;
        debug!(workspace = %workspace_root.display(), "Configuration loaded");
        Self::validated(config)
    }

    /// Load configuration from one explicit file (plus defaults and environment)
    pub fn load_from_file(path: &Path) -> Result<AppConfig, GradeError> {
        if !path.exists() {
            return Err(GradeError::Settings(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        let config: AppConfig = merge_policy::builder_with_defaults()?
            .add_source(File::from(path))
            .add_source(merge_policy::environment_source())
            .build()?
            .try_deserialize()?;
        Self::validated(config)
    }

    fn validated(config: AppConfig) -> Result<AppConfig, GradeError> {
        config.validate().map_err(|errors| {
            let error_msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            GradeError::Settings(format!(
                "Configuration validation failed:\n{}",
                error_msgs.join("\n")
            ))
        })?;
        Ok(config)
    }
}
