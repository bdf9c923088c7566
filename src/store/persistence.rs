//! Persistence layer for stored grades

use crate::error::StorageError;
use crate::store::{GradeStore, StoredGrade};
use crate::types::{CourseKey, LearnerId};
use sled::{Db, Tree};
use std::path::Path;

const TREE_GRADES: &str = "course_grades";

/// Sled-based implementation of GradeStore
///
/// Rows are JSON-encoded under `learner_id (8 bytes, big-endian) || course_key`.
#[derive(Clone)]
pub struct SledGradeStore {
    db: Db,
    grades: Tree,
}

impl SledGradeStore {
    /// Open (or create) a store at the given directory
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = sled::open(path).map_err(|e| {
            StorageError::Backend(format!("Failed to open sled database: {}", e))
        })?;
        Self::from_db(db)
    }

    /// Use an already open database
    pub fn from_db(db: Db) -> Result<Self, StorageError> {
        let grades = db.open_tree(TREE_GRADES)?;
        Ok(Self { db, grades })
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    /// Flush all pending writes to disk
    pub fn flush(&self) -> Result<(), StorageError> {
        self.grades.flush()?;
        Ok(())
    }
}

fn encode_key(learner: LearnerId, course_key: &CourseKey) -> Vec<u8> {
    let mut key = Vec::with_capacity(8 + course_key.as_str().len());
    key.extend_from_slice(&learner.0.to_be_bytes());
    key.extend_from_slice(course_key.as_str().as_bytes());
    key
}

impl GradeStore for SledGradeStore {
    fn get(
        &self,
        learner: LearnerId,
        course_key: &CourseKey,
    ) -> Result<Option<StoredGrade>, StorageError> {
        let Some(raw) = self.grades.get(encode_key(learner, course_key))? else {
            return Ok(None);
        };
        let row = serde_json::from_slice(&raw)?;
        Ok(Some(row))
    }

    fn upsert(&self, grade: &StoredGrade) -> Result<(), StorageError> {
        let key = encode_key(grade.learner_id, &grade.course_key);
        let value = serde_json::to_vec(grade)?;
        self.grades.insert(key, value)?;
        Ok(())
    }
}
