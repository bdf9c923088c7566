//! Resolved course grades
//!
//! A [`ResolvedGrade`] is the in-memory result of one resolution: either a
//! freshly computed breakdown, a grade materialized from storage, or the zero
//! grade used when nothing is on record.

pub mod calculator;

pub use calculator::{GradeCalculator, WeightedGradeCalculator};

use crate::store::StoredGrade;
use crate::types::{CourseKey, LearnerId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Per assignment type contribution to a computed grade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionSummary {
    pub kind: String,
    pub weight: f64,
    /// Average fraction after padding and drops
    pub average: f64,
    /// Scores counted after drops
    pub counted: usize,
    pub dropped: usize,
}

/// Output of a grade calculator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeBreakdown {
    /// Fraction in 0.0..=1.0, rounded to two decimals
    pub percent: f64,
    pub letter_grade: Option<String>,
    pub passed: bool,
    pub attempted: bool,
    #[serde(default)]
    pub sections: Vec<SectionSummary>,
}

/// Where a resolved grade came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum GradeSource {
    /// Served from storage; policy hash matched or was not checked
    Stored,
    /// Nothing on record and the course assumes zero
    Zero,
    Computed { persisted: bool },
}

/// Tri-state pass status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassStatus {
    Passed,
    NotPassed,
    NotAttempted,
}

impl fmt::Display for PassStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PassStatus::Passed => "passed",
            PassStatus::NotPassed => "not passed",
            PassStatus::NotAttempted => "not attempted",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedGrade {
    pub learner: LearnerId,
    pub course_key: CourseKey,
    pub percent: f64,
    pub letter_grade: Option<String>,
    pub passed: bool,
    pub attempted: bool,
    #[serde(default)]
    pub sections: Vec<SectionSummary>,
    pub source: GradeSource,
}

impl ResolvedGrade {
    /// Zero grade: nothing earned, nothing attempted
    pub fn zero(learner: LearnerId, course_key: CourseKey) -> Self {
        Self {
            learner,
            course_key,
            percent: 0.0,
            letter_grade: None,
            passed: false,
            attempted: false,
            sections: Vec::new(),
            source: GradeSource::Zero,
        }
    }

    pub fn from_breakdown(
        learner: LearnerId,
        course_key: CourseKey,
        breakdown: GradeBreakdown,
        persisted: bool,
    ) -> Self {
        Self {
            learner,
            course_key,
            percent: breakdown.percent,
            letter_grade: breakdown.letter_grade,
            passed: breakdown.passed,
            attempted: breakdown.attempted,
            sections: breakdown.sections,
            source: GradeSource::Computed { persisted },
        }
    }

    pub fn from_stored(stored: &StoredGrade) -> Self {
        Self {
            learner: stored.learner_id,
            course_key: stored.course_key.clone(),
            percent: stored.percent,
            letter_grade: (!stored.letter_grade.is_empty()).then(|| stored.letter_grade.clone()),
            passed: stored.passed(),
            attempted: stored.attempted,
            sections: Vec::new(),
            source: GradeSource::Stored,
        }
    }

    pub fn pass_status(&self) -> PassStatus {
        if self.passed {
            PassStatus::Passed
        } else if self.attempted {
            PassStatus::NotPassed
        } else {
            PassStatus::NotAttempted
        }
    }

    pub fn is_zero(&self) -> bool {
        self.source == GradeSource::Zero
    }
}

impl fmt::Display for ResolvedGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "percent: {}, letter_grade: {}, passed: {}, attempted: {}",
            self.percent,
            self.letter_grade.as_deref().unwrap_or(""),
            self.passed,
            self.attempted
        )
    }
}
