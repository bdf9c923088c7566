//! Grade feature flags
//!
//! Per-course switches deciding whether grades are persisted and whether an
//! absent grade resolves to zero.

use crate::types::CourseKey;
use serde::{Deserialize, Serialize};

/// Policy predicates consulted during grade resolution
pub trait GradeFlags: Send + Sync {
    /// Absent grades resolve to a zero grade instead of being computed
    fn assume_zero_if_absent(&self, course_key: &CourseKey) -> bool;

    /// Grades for this course are read from and written to the store
    fn should_persist_grades(&self, course_key: &CourseKey) -> bool;

    /// Only persist grades for learners who attempted graded work
    fn write_only_if_engaged(&self) -> bool;
}

/// Flag settings, loaded from the `[grades]` config section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradesConfig {
    /// Global switch for grade persistence
    #[serde(default = "default_true")]
    pub persistent_grades_enabled: bool,

    /// Persist for every course, not just those listed
    #[serde(default = "default_true")]
    pub enabled_for_all_courses: bool,

    #[serde(default)]
    pub persistent_grades_courses: Vec<String>,

    #[serde(default)]
    pub assume_zero_if_absent: bool,

    #[serde(default)]
    pub assume_zero_courses: Vec<String>,

    #[serde(default)]
    pub write_only_if_engaged: bool,
}

fn default_true() -> bool {
    true
}

impl Default for GradesConfig {
    fn default() -> Self {
        Self {
            persistent_grades_enabled: true,
            enabled_for_all_courses: true,
            persistent_grades_courses: Vec::new(),
            assume_zero_if_absent: false,
            assume_zero_courses: Vec::new(),
            write_only_if_engaged: false,
        }
    }
}

impl GradesConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self
            .persistent_grades_courses
            .iter()
            .chain(self.assume_zero_courses.iter())
            .any(|c| c.trim().is_empty())
        {
            return Err("Course lists cannot contain empty course keys".to_string());
        }
        Ok(())
    }
}

impl GradeFlags for GradesConfig {
    fn assume_zero_if_absent(&self, course_key: &CourseKey) -> bool {
        self.assume_zero_if_absent
            || self
                .assume_zero_courses
                .iter()
                .any(|c| c == course_key.as_str())
    }

    fn should_persist_grades(&self, course_key: &CourseKey) -> bool {
        self.persistent_grades_enabled
            && (self.enabled_for_all_courses
                || self
                    .persistent_grades_courses
                    .iter()
                    .any(|c| c == course_key.as_str()))
    }

    fn write_only_if_engaged(&self) -> bool {
        self.write_only_if_engaged
    }
}
