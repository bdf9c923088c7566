//! Per-course derived data cache
//!
//! Holds data derived from a course's content structure (graded blocks grouped
//! by assignment type) so that grading many learners does not regroup the same
//! structure for each of them. Batch grading wraps its run in a
//! [`CourseTransaction`], which invalidates the course's entry when released.

use crate::types::{BlockId, CourseKey};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

pub type GradedBlocks = BTreeMap<String, Vec<BlockId>>;

struct CourseEntry {
    version: Option<String>,
    graded_blocks: Arc<GradedBlocks>,
}

#[derive(Default)]
pub struct DerivedDataCache {
    entries: RwLock<HashMap<CourseKey, CourseEntry>>,
    invalidations: AtomicUsize,
}

impl DerivedDataCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Graded blocks for a course version, building them on a miss
    ///
    /// An entry recorded for a different content version is replaced.
    pub fn graded_blocks(
        &self,
        course_key: &CourseKey,
        version: Option<&str>,
        build: impl FnOnce() -> GradedBlocks,
    ) -> Arc<GradedBlocks> {
        if let Some(entry) = self.entries.read().get(course_key) {
            if entry.version.as_deref() == version {
                return Arc::clone(&entry.graded_blocks);
            }
        }

        let graded_blocks = Arc::new(build());
        self.entries.write().insert(
            course_key.clone(),
            CourseEntry {
                version: version.map(str::to_string),
                graded_blocks: Arc::clone(&graded_blocks),
            },
        );
        graded_blocks
    }

    pub fn contains(&self, course_key: &CourseKey) -> bool {
        self.entries.read().contains_key(course_key)
    }

    pub fn invalidate(&self, course_key: &CourseKey) {
        self.entries.write().remove(course_key);
        self.invalidations.fetch_add(1, Ordering::SeqCst);
        debug!(course_key = %course_key, "Invalidated derived data cache");
    }

    /// Total number of invalidations performed
    pub fn invalidations(&self) -> usize {
        self.invalidations.load(Ordering::SeqCst)
    }

    /// Open a scope that invalidates `course_key` exactly once when released or dropped
    pub fn begin(&self, course_key: CourseKey) -> CourseTransaction<'_> {
        CourseTransaction {
            cache: self,
            course_key,
            released: false,
        }
    }
}

/// Scoped cache ownership for one batch over a course
pub struct CourseTransaction<'a> {
    cache: &'a DerivedDataCache,
    course_key: CourseKey,
    released: bool,
}

impl CourseTransaction<'_> {
    pub fn course_key(&self) -> &CourseKey {
        &self.course_key
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Invalidate the course entry; later calls are no-ops
    pub fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.cache.invalidate(&self.course_key);
        }
    }
}

impl Drop for CourseTransaction<'_> {
    fn drop(&mut self) {
        self.release();
    }
}
