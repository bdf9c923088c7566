//! Course context
//!
//! Resolves the identity and grading-policy fingerprint of the course being
//! graded from whichever inputs the caller has at hand: a full course object,
//! an already collected content structure, or only the course key. Anything
//! not supplied is loaded lazily through a [`ContentLoader`] and kept for the
//! lifetime of the context, so repeated property access costs one fetch.

pub mod loader;
pub mod policy;
pub mod structure;

pub use loader::{ContentLoader, CourseDefinition, FileContentLoader, InMemoryContentLoader};
pub use policy::{compute_policy_hash, AssignmentType, GradingPolicy};
pub use structure::{ContentStructure, Course, GradedBlock};

use crate::error::GradeError;
use crate::types::{CourseKey, LearnerId, PolicyHash};
use chrono::{DateTime, Utc};
use std::cell::OnceCell;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Caller-supplied inputs identifying a course; at least one must be set
#[derive(Debug, Clone, Default)]
pub struct CourseInputs {
    pub course: Option<Arc<Course>>,
    pub structure: Option<Arc<ContentStructure>>,
    pub course_key: Option<CourseKey>,
}

impl CourseInputs {
    pub fn for_course(course: Course) -> Self {
        Self::default().with_course(Arc::new(course))
    }

    pub fn for_structure(structure: ContentStructure) -> Self {
        Self::default().with_structure(Arc::new(structure))
    }

    pub fn for_key(course_key: impl Into<CourseKey>) -> Self {
        Self::default().with_course_key(course_key.into())
    }

    pub fn with_course(mut self, course: Arc<Course>) -> Self {
        self.course = Some(course);
        self
    }

    pub fn with_structure(mut self, structure: Arc<ContentStructure>) -> Self {
        self.structure = Some(structure);
        self
    }

    pub fn with_course_key(mut self, course_key: CourseKey) -> Self {
        self.course_key = Some(course_key);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.course.is_none() && self.structure.is_none() && self.course_key.is_none()
    }
}

/// Identity and versioning metadata for one (learner, course) resolution
///
/// Never mutated after construction beyond filling its lazy caches.
#[derive(Clone)]
pub struct CourseContext {
    learner: Option<LearnerId>,
    course_key: CourseKey,
    loader: Arc<dyn ContentLoader>,
    course: OnceCell<Arc<Course>>,
    structure: OnceCell<Arc<ContentStructure>>,
    grading_policy_hash: OnceCell<PolicyHash>,
}

impl CourseContext {
    /// Build a context, failing with [`GradeError::Configuration`] when the
    /// inputs cannot establish a course key or disagree about it.
    pub fn new(
        learner: Option<LearnerId>,
        inputs: CourseInputs,
        loader: Arc<dyn ContentLoader>,
    ) -> Result<Self, GradeError> {
        let course_key = resolve_course_key(&inputs)?;

        let course = OnceCell::new();
        if let Some(c) = inputs.course {
            let _ = course.set(c);
        }
        let structure = OnceCell::new();
        if let Some(s) = inputs.structure {
            let _ = structure.set(s);
        }

        Ok(Self {
            learner,
            course_key,
            loader,
            course,
            structure,
            grading_policy_hash: OnceCell::new(),
        })
    }

    /// Same course snapshot, bound to another learner
    pub fn for_learner(&self, learner: LearnerId) -> Self {
        let mut context = self.clone();
        context.learner = Some(learner);
        context
    }

    pub fn learner(&self) -> Option<LearnerId> {
        self.learner
    }

    pub fn course_key(&self) -> &CourseKey {
        &self.course_key
    }

    /// Course descriptor, loaded on first use
    pub fn course(&self) -> Result<&Arc<Course>, GradeError> {
        get_or_try_init(&self.course, || {
            debug!(course_key = %self.course_key, "Loading course descriptor");
            self.loader.load_course(&self.course_key).map(Arc::new)
        })
    }

    /// Collected content structure, loaded on first use
    pub fn structure(&self) -> Result<&Arc<ContentStructure>, GradeError> {
        get_or_try_init(&self.structure, || {
            debug!(course_key = %self.course_key, "Loading content structure");
            self.loader.load_structure(&self.course_key).map(Arc::new)
        })
    }

    /// Effective grading policy of the collected structure
    pub fn grading_policy(&self) -> Result<&GradingPolicy, GradeError> {
        Ok(&self.structure()?.grading_policy)
    }

    pub fn grading_policy_hash(&self) -> Result<&PolicyHash, GradeError> {
        get_or_try_init(&self.grading_policy_hash, || {
            Ok(compute_policy_hash(self.grading_policy()?))
        })
    }

    pub fn content_version(&self) -> Result<Option<String>, GradeError> {
        match self.course.get() {
            Some(course) => Ok(course.version.clone()),
            None => Ok(self.structure()?.version.clone()),
        }
    }

    pub fn content_edited_at(&self) -> Result<Option<DateTime<Utc>>, GradeError> {
        match self.course.get() {
            Some(course) => Ok(course.edited_on),
            None => Ok(self.structure()?.edited_on),
        }
    }

    /// Course end, used as the deadline attached to grade notifications
    pub fn deadline(&self) -> Result<Option<DateTime<Utc>>, GradeError> {
        Ok(self.course()?.end)
    }

    /// Identity string with version and policy fingerprint, for logging
    pub fn full_string(&self) -> String {
        let version = self.content_version().ok().flatten();
        let edited_on = self.content_edited_at().ok().flatten();
        let policy = self
            .grading_policy_hash()
            .map(|h| h.to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        format!(
            "Course: course_key: {}, version: {}, edited_on: {}, grading_policy: {}",
            self.course_key,
            version.as_deref().unwrap_or("none"),
            edited_on
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "none".to_string()),
            policy
        )
    }
}

impl fmt::Display for CourseContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Course: course_key: {}", self.course_key)
    }
}

impl fmt::Debug for CourseContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CourseContext")
            .field("learner", &self.learner)
            .field("course_key", &self.course_key)
            .field("course_loaded", &self.course.get().is_some())
            .field("structure_loaded", &self.structure.get().is_some())
            .finish()
    }
}

/// Course key from the course, then the structure, then the bare key; all
/// supplied keys must agree
fn resolve_course_key(inputs: &CourseInputs) -> Result<CourseKey, GradeError> {
    let candidates = [
        inputs.course.as_ref().map(|c| &c.key),
        inputs.structure.as_ref().map(|s| &s.course_key),
        inputs.course_key.as_ref(),
    ];
    let mut keys = candidates.into_iter().flatten();
    let course_key = keys.next().cloned().ok_or_else(|| {
        GradeError::Configuration(
            "One of course, content structure, or course key must be provided".to_string(),
        )
    })?;
    if let Some(conflict) = keys.find(|k| **k != course_key) {
        return Err(GradeError::Configuration(format!(
            "Conflicting course keys supplied: {} and {}",
            course_key, conflict
        )));
    }
    Ok(course_key)
}

fn get_or_try_init<T>(
    cell: &OnceCell<T>,
    init: impl FnOnce() -> Result<T, GradeError>,
) -> Result<&T, GradeError> {
    if let Some(value) = cell.get() {
        return Ok(value);
    }
    let value = init()?;
    Ok(cell.get_or_init(|| value))
}
