//! Durable sled-backed learner score store.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sled::{Db, Tree};

use crate::error::StorageError;
use crate::types::{BlockId, CourseKey, LearnerId};

const TREE_SCORES: &str = "scores";

/// Raw score for one graded block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub earned: f64,
    pub possible: f64,
    pub attempted: bool,
    pub recorded_at: DateTime<Utc>,
}

impl Score {
    /// Earned fraction clamped to 0..=1; zero when nothing is possible
    pub fn fraction(&self) -> f64 {
        if self.possible <= 0.0 {
            return 0.0;
        }
        (self.earned / self.possible).clamp(0.0, 1.0)
    }
}

/// Source of a learner's block scores in a course
pub trait ScoreSource: Send + Sync {
    fn scores_for(
        &self,
        learner: LearnerId,
        course_key: &CourseKey,
    ) -> Result<HashMap<BlockId, Score>, StorageError>;
}

#[derive(Clone)]
pub struct SledScoreStore {
    db: Db,
    scores: Tree,
}

impl SledScoreStore {
    pub fn new(db: Db) -> Result<Self, StorageError> {
        let scores = db.open_tree(TREE_SCORES)?;
        Ok(Self { db, scores })
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    pub fn record(
        &self,
        learner: LearnerId,
        course_key: &CourseKey,
        block: &str,
        score: &Score,
    ) -> Result<(), StorageError> {
        let mut key = score_prefix(learner, course_key);
        key.extend_from_slice(block.as_bytes());
        let value = serde_json::to_vec(score)?;
        self.scores.insert(key, value)?;
        Ok(())
    }
}

// course_key || 0x00 || learner (8 bytes, big-endian) || 0x00
fn score_prefix(learner: LearnerId, course_key: &CourseKey) -> Vec<u8> {
    let mut key = Vec::with_capacity(course_key.as_str().len() + 10);
    key.extend_from_slice(course_key.as_str().as_bytes());
    key.push(0);
    key.extend_from_slice(&learner.0.to_be_bytes());
    key.push(0);
    key
}

impl ScoreSource for SledScoreStore {
    fn scores_for(
        &self,
        learner: LearnerId,
        course_key: &CourseKey,
    ) -> Result<HashMap<BlockId, Score>, StorageError> {
        let prefix = score_prefix(learner, course_key);
        let mut out = HashMap::new();
        for item in self.scores.scan_prefix(&prefix) {
            let (key, value) = item?;
            let block = String::from_utf8(key[prefix.len()..].to_vec())
                .map_err(|e| StorageError::Serialization(e.to_string()))?;
            let score: Score = serde_json::from_slice(&value)?;
            out.insert(block, score);
        }
        Ok(out)
    }
}
