//! Core identifier types shared across the crate.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric learner identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LearnerId(pub u64);

impl fmt::Display for LearnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A learner being graded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Learner {
    pub id: LearnerId,
    pub username: String,
}

impl Learner {
    pub fn new(id: u64, username: impl Into<String>) -> Self {
        Self {
            id: LearnerId(id),
            username: username.into(),
        }
    }
}

/// Course identifier, e.g. `course-v1:Org+Num+Run`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CourseKey(String);

impl CourseKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CourseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CourseKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Identifier of a content block within a course
pub type BlockId = String;

/// BLAKE3 hash bytes
pub type Hash = [u8; 32];

/// Fingerprint of a grading policy, stored hex-encoded alongside persisted grades
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyHash(String);

impl PolicyHash {
    pub fn from_hash(hash: &Hash) -> Self {
        Self(hex::encode(hash))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PolicyHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
