//! Persisted course grades
//!
//! One row per (learner, course), upserted and never deleted. Each row records
//! the grading-policy fingerprint it was computed under so readers can tell
//! whether it is still valid.

pub mod persistence;
pub mod scores;

pub use persistence::SledGradeStore;
pub use scores::{Score, ScoreSource, SledScoreStore};

use crate::course::CourseContext;
use crate::error::{GradeError, StorageError};
use crate::grade::GradeBreakdown;
use crate::types::{CourseKey, LearnerId, PolicyHash};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// StoredGrade: last persisted grade for a learner in a course
///
/// `passed_at` is set exactly when the grade is passing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredGrade {
    pub learner_id: LearnerId,
    pub course_key: CourseKey,
    pub content_version: Option<String>,
    pub content_edited_at: Option<DateTime<Utc>>,
    pub grading_policy_hash: PolicyHash,
    pub percent: f64,
    /// Empty when no letter grade was reached
    pub letter_grade: String,
    pub passed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub attempted: bool,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl StoredGrade {
    pub fn passed(&self) -> bool {
        self.passed_at.is_some()
    }

    /// Build the row to upsert for a freshly computed grade
    ///
    /// A passing grade keeps the earliest `passed_at` on record; a failing one
    /// clears it.
    pub fn record(
        context: &CourseContext,
        learner: LearnerId,
        breakdown: &GradeBreakdown,
        previous: Option<&StoredGrade>,
        now: DateTime<Utc>,
    ) -> Result<Self, GradeError> {
        let passed_at = if breakdown.passed {
            previous.and_then(|p| p.passed_at).or(Some(now))
        } else {
            None
        };

        Ok(Self {
            learner_id: learner,
            course_key: context.course_key().clone(),
            content_version: context.content_version()?,
            content_edited_at: context.content_edited_at()?,
            grading_policy_hash: context.grading_policy_hash()?.clone(),
            percent: breakdown.percent,
            letter_grade: breakdown.letter_grade.clone().unwrap_or_default(),
            passed_at,
            attempted: breakdown.attempted,
            created_at: previous.map_or(now, |p| p.created_at),
            modified_at: now,
        })
    }
}

impl std::fmt::Display for StoredGrade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "StoredGrade(percent: {}, letter_grade: {}, passed: {}, grading_policy: {})",
            self.percent,
            self.letter_grade,
            self.passed(),
            self.grading_policy_hash
        )
    }
}

/// Durable grade storage keyed by (learner, course)
pub trait GradeStore: Send + Sync {
    fn get(
        &self,
        learner: LearnerId,
        course_key: &CourseKey,
    ) -> Result<Option<StoredGrade>, StorageError>;

    /// Insert or replace the row for the grade's (learner, course)
    fn upsert(&self, grade: &StoredGrade) -> Result<(), StorageError>;

    /// Strict lookup: a missing row is [`GradeError::NotFound`]
    fn read(&self, learner: LearnerId, course_key: &CourseKey) -> Result<StoredGrade, GradeError> {
        self.get(learner, course_key)?
            .ok_or_else(|| GradeError::NotFound {
                learner,
                course_key: course_key.clone(),
            })
    }
}

/// Process-local grade store; counts writes
#[derive(Default)]
pub struct InMemoryGradeStore {
    rows: RwLock<HashMap<(LearnerId, CourseKey), StoredGrade>>,
    writes: AtomicUsize,
}

impl InMemoryGradeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }
}

impl GradeStore for InMemoryGradeStore {
    fn get(
        &self,
        learner: LearnerId,
        course_key: &CourseKey,
    ) -> Result<Option<StoredGrade>, StorageError> {
        Ok(self
            .rows
            .read()
            .get(&(learner, course_key.clone()))
            .cloned())
    }

    fn upsert(&self, grade: &StoredGrade) -> Result<(), StorageError> {
        self.rows.write().insert(
            (grade.learner_id, grade.course_key.clone()),
            grade.clone(),
        );
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
