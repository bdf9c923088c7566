//! Grading policy and its BLAKE3 fingerprint

use crate::types::PolicyHash;
use blake3::Hasher;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Upper bound on `min_count` and `drop_count` of one assignment type
pub const MAX_ASSIGNMENTS_PER_TYPE: usize = 1_000;

/// One weighted category of graded work (homework, exams, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentType {
    /// Block format this category collects, e.g. "Homework"
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub short_label: String,

    /// Fraction of the course grade contributed by this category
    pub weight: f64,

    /// Minimum number of assignments expected; missing ones count as zero
    #[serde(default)]
    pub min_count: usize,

    /// Number of lowest scores dropped before averaging
    #[serde(default)]
    pub drop_count: usize,
}

/// Rules for turning raw scores into a percent and letter grade
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GradingPolicy {
    #[serde(default)]
    pub graders: Vec<AssignmentType>,

    /// Letter grade -> minimum fraction (0.0..=1.0) required
    #[serde(default)]
    pub cutoffs: BTreeMap<String, f64>,
}

impl GradingPolicy {
    /// Validate weights and cutoffs
    pub fn validate(&self) -> Result<(), String> {
        let mut total = 0.0;
        for grader in &self.graders {
            if grader.kind.is_empty() {
                return Err("Assignment type cannot be empty".to_string());
            }
            if !(0.0..=1.0).contains(&grader.weight) {
                return Err(format!(
                    "Assignment type '{}' has weight {} outside 0..=1",
                    grader.kind, grader.weight
                ));
            }
            if grader.min_count > MAX_ASSIGNMENTS_PER_TYPE
                || grader.drop_count > MAX_ASSIGNMENTS_PER_TYPE
            {
                return Err(format!(
                    "Assignment type '{}' counts exceed {}",
                    grader.kind, MAX_ASSIGNMENTS_PER_TYPE
                ));
            }
            total += grader.weight;
        }
        if total > 1.0 + 1e-9 {
            return Err(format!("Assignment weights sum to {}, above 1", total));
        }
        for (letter, cutoff) in &self.cutoffs {
            if !(0.0..=1.0).contains(cutoff) {
                return Err(format!("Cutoff for '{}' is {} outside 0..=1", letter, cutoff));
            }
        }
        Ok(())
    }

    /// Highest letter whose cutoff is met by `fraction`
    pub fn letter_for(&self, fraction: f64) -> Option<&str> {
        self.cutoffs
            .iter()
            .filter(|(_, cutoff)| fraction + 1e-9 >= **cutoff)
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(letter, _)| letter.as_str())
    }

    pub fn hash(&self) -> PolicyHash {
        compute_policy_hash(self)
    }
}

/// Compute the policy fingerprint
///
/// hash("grading_policy" || graders_count || graders || cutoffs)
///
/// Graders are hashed in declaration order, cutoffs in key order, so equal
/// policies always produce the same fingerprint.
pub fn compute_policy_hash(policy: &GradingPolicy) -> PolicyHash {
    let mut hasher = Hasher::new();

    hasher.update(b"grading_policy");

    hasher.update(&(policy.graders.len() as u64).to_be_bytes());
    for grader in &policy.graders {
        update_str(&mut hasher, &grader.kind);
        update_str(&mut hasher, &grader.short_label);
        hasher.update(&grader.weight.to_bits().to_be_bytes());
        hasher.update(&(grader.min_count as u64).to_be_bytes());
        hasher.update(&(grader.drop_count as u64).to_be_bytes());
    }

    hasher.update(&(policy.cutoffs.len() as u64).to_be_bytes());
    for (letter, cutoff) in &policy.cutoffs {
        update_str(&mut hasher, letter);
        hasher.update(&cutoff.to_bits().to_be_bytes());
    }

    PolicyHash::from_hash(hasher.finalize().as_bytes())
}

// Length-prefixed so adjacent fields cannot alias
fn update_str(hasher: &mut Hasher, value: &str) {
    hasher.update(&(value.len() as u64).to_be_bytes());
    hasher.update(value.as_bytes());
}
