//! Grade calculation
//!
//! The engine treats calculation as a black box behind [`GradeCalculator`].
//! [`WeightedGradeCalculator`] is the stock implementation: weighted
//! assignment-type averages with minimum counts and dropped lowest scores.

use crate::cache::DerivedDataCache;
use crate::course::{AssignmentType, CourseContext};
use crate::error::GradeError;
use crate::grade::{GradeBreakdown, SectionSummary};
use crate::store::scores::{Score, ScoreSource};
use crate::types::{BlockId, LearnerId};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Computes a fresh grade for a learner from course content and scores
pub trait GradeCalculator: Send + Sync {
    fn compute(
        &self,
        learner: LearnerId,
        context: &CourseContext,
    ) -> Result<GradeBreakdown, GradeError>;
}

pub struct WeightedGradeCalculator {
    scores: Arc<dyn ScoreSource>,
    cache: Arc<DerivedDataCache>,
}

impl WeightedGradeCalculator {
    pub fn new(scores: Arc<dyn ScoreSource>, cache: Arc<DerivedDataCache>) -> Self {
        Self { scores, cache }
    }
}

impl GradeCalculator for WeightedGradeCalculator {
    fn compute(
        &self,
        learner: LearnerId,
        context: &CourseContext,
    ) -> Result<GradeBreakdown, GradeError> {
        let structure = context.structure()?;
        let policy = &structure.grading_policy;
        policy
            .validate()
            .map_err(|e| GradeError::Calculator(format!("Invalid grading policy: {}", e)))?;
        let graded = self.cache.graded_blocks(
            &structure.course_key,
            structure.version.as_deref(),
            || structure.graded_blocks_by_format(),
        );

        let scores = self
            .scores
            .scores_for(learner, &structure.course_key)
            .map_err(|e| GradeError::Calculator(format!("Failed to read scores: {}", e)))?;

        let attempted = graded
            .values()
            .flatten()
            .any(|block| scores.get(block).map_or(false, |s| s.attempted));

        let mut total = 0.0;
        let mut sections = Vec::with_capacity(policy.graders.len());
        for grader in &policy.graders {
            let blocks = graded.get(&grader.kind).map(Vec::as_slice).unwrap_or(&[]);
            let section = summarize(grader, blocks, &scores);
            total += section.weight * section.average;
            sections.push(section);
        }

        let percent = round_to_hundredths(total);
        let letter_grade = policy.letter_for(percent).map(str::to_string);
        let passed = letter_grade.is_some();

        debug!(
            learner = %learner,
            course_key = %structure.course_key,
            percent,
            attempted,
            "Computed course grade"
        );

        Ok(GradeBreakdown {
            percent,
            letter_grade,
            passed,
            attempted,
            sections,
        })
    }
}

fn summarize(
    grader: &AssignmentType,
    blocks: &[BlockId],
    scores: &HashMap<BlockId, Score>,
) -> SectionSummary {
    let mut fractions: Vec<f64> = blocks
        .iter()
        .map(|block| scores.get(block).map_or(0.0, Score::fraction))
        .collect();
    if fractions.len() < grader.min_count {
        fractions.resize(grader.min_count, 0.0);
    }
    fractions.sort_by(|a, b| a.total_cmp(b));

    let dropped = grader.drop_count.min(fractions.len());
    let counted = &fractions[dropped..];
    let average = if counted.is_empty() {
        0.0
    } else {
        counted.iter().sum::<f64>() / counted.len() as f64
    };

    SectionSummary {
        kind: grader.kind.clone(),
        weight: grader.weight,
        average,
        counted: counted.len(),
        dropped,
    }
}

fn round_to_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
