//! Coursegrade: Course Grade Resolution
//!
//! Resolves a learner's course grade, serving the persisted grade while it is
//! still valid under the course's grading policy and recomputing, persisting,
//! and announcing it otherwise.

pub mod cache;
pub mod cli;
pub mod config;
pub mod course;
pub mod engine;
pub mod error;
pub mod flags;
pub mod grade;
pub mod logging;
pub mod signals;
pub mod store;
pub mod types;

pub use engine::{GradeEngine, GradeResult, GradeResults, ResolutionStrategy};
pub use error::{GradeError, StorageError};
