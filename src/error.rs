//! Error types for course grade resolution.

use crate::types::{CourseKey, LearnerId};
use thiserror::Error;

/// Storage-related errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl From<sled::Error> for StorageError {
    fn from(err: sled::Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

/// Errors surfaced by grade resolution
#[derive(Debug, Error)]
pub enum GradeError {
    /// Not enough input to establish which course is being graded
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("No stored grade for learner {learner} in course {course_key}")]
    NotFound {
        learner: LearnerId,
        course_key: CourseKey,
    },

    #[error("Grade calculation failed: {0}")]
    Calculator(String),

    #[error("Course content error: {0}")]
    Content(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Settings error: {0}")]
    Settings(String),
}

impl From<config::ConfigError> for GradeError {
    fn from(err: config::ConfigError) -> Self {
        GradeError::Settings(err.to_string())
    }
}
