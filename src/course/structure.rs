//! Course objects and collected content structures.

use crate::course::policy::GradingPolicy;
use crate::types::{BlockId, CourseKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Course descriptor as authored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub key: CourseKey,

    #[serde(default)]
    pub display_name: String,

    /// Course end; forwarded to listeners as the grading deadline
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,

    #[serde(default)]
    pub version: Option<String>,

    #[serde(default)]
    pub edited_on: Option<DateTime<Utc>>,

    #[serde(default)]
    pub grading_policy: GradingPolicy,
}

/// A block in the course tree that may carry a score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradedBlock {
    pub id: BlockId,

    #[serde(default)]
    pub display_name: String,

    /// Assignment type this block counts toward
    #[serde(default)]
    pub format: Option<String>,

    #[serde(default)]
    pub graded: bool,
}

/// Snapshot of a course's content as collected for grading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentStructure {
    pub course_key: CourseKey,

    #[serde(default)]
    pub version: Option<String>,

    #[serde(default)]
    pub edited_on: Option<DateTime<Utc>>,

    #[serde(default)]
    pub grading_policy: GradingPolicy,

    #[serde(default)]
    pub blocks: Vec<GradedBlock>,
}

impl ContentStructure {
    /// Graded blocks grouped by assignment format, each group in structure order
    pub fn graded_blocks_by_format(&self) -> BTreeMap<String, Vec<BlockId>> {
        let mut grouped: BTreeMap<String, Vec<BlockId>> = BTreeMap::new();
        for block in self.blocks.iter().filter(|b| b.graded) {
            if let Some(format) = &block.format {
                grouped
                    .entry(format.clone())
                    .or_default()
                    .push(block.id.clone());
            }
        }
        grouped
    }
}
