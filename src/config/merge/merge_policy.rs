//! Merge rules: defaults, override order, conflict handling.

use config::builder::DefaultState;
use config::Config;
use config::ConfigBuilder;
use config::ConfigError;
use config::Environment;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("storage.store_path", ".coursegrade/store")?
        .set_default("storage.courses_path", "courses")?
        .set_default("grades.persistent_grades_enabled", true)?
        .set_default("grades.enabled_for_all_courses", true)?
        .set_default("grades.assume_zero_if_absent", false)?
        .set_default("grades.write_only_if_engaged", false)
}

/// Environment overrides, e.g. `COURSEGRADE_GRADES__ASSUME_ZERO_IF_ABSENT=true`.
/// Always applied last.
pub fn environment_source() -> Environment {
    Environment::with_prefix("COURSEGRADE")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}
