//! Grade Resolution Engine
//!
//! Resolves a learner's course grade, preferring a stored grade while it is
//! still valid under the course's current grading policy:
//!
//! ```text
//! START -> FAST_RETURN   stored, policy hash matches
//!       -> ZERO_RETURN   absent, course assumes zero
//!       -> RECOMPUTE -> PERSISTED | UNPERSISTED -> NOTIFIED -> DONE
//! ```
//!
//! Concurrent recomputations for the same (learner, course) are not
//! serialized; the store keeps whichever upsert lands last.

use crate::cache::{CourseTransaction, DerivedDataCache};
use crate::course::{ContentLoader, CourseContext, CourseInputs};
use crate::error::GradeError;
use crate::flags::GradeFlags;
use crate::grade::{GradeCalculator, ResolvedGrade};
use crate::signals::{panic_message, GradeChanged, GradeNowPassed, GradeSignals};
use crate::store::{GradeStore, StoredGrade};
use crate::types::Learner;
use chrono::Utc;
use std::iter::FusedIterator;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// How a batch resolves each learner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionStrategy {
    /// Serve stored grades that match the current policy, recompute otherwise
    CreateIfStale,
    /// Always recompute
    ForceUpdate,
}

impl ResolutionStrategy {
    pub fn from_force_update(force_update: bool) -> Self {
        if force_update {
            ResolutionStrategy::ForceUpdate
        } else {
            ResolutionStrategy::CreateIfStale
        }
    }
}

/// One element of a batch: the learner and either a grade or the error that
/// prevented grading them
#[derive(Debug)]
pub struct GradeResult {
    pub learner: Learner,
    pub outcome: Result<ResolvedGrade, GradeError>,
}

impl GradeResult {
    pub fn grade(&self) -> Option<&ResolvedGrade> {
        self.outcome.as_ref().ok()
    }

    pub fn error(&self) -> Option<&GradeError> {
        self.outcome.as_ref().err()
    }

    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

pub struct GradeEngine {
    store: Arc<dyn GradeStore>,
    calculator: Arc<dyn GradeCalculator>,
    loader: Arc<dyn ContentLoader>,
    flags: Arc<dyn GradeFlags>,
    signals: GradeSignals,
    cache: Arc<DerivedDataCache>,
}

impl GradeEngine {
    pub fn new(
        store: Arc<dyn GradeStore>,
        calculator: Arc<dyn GradeCalculator>,
        loader: Arc<dyn ContentLoader>,
        flags: Arc<dyn GradeFlags>,
        cache: Arc<DerivedDataCache>,
    ) -> Self {
        Self {
            store,
            calculator,
            loader,
            flags,
            signals: GradeSignals::new(),
            cache,
        }
    }

    pub fn with_signals(mut self, signals: GradeSignals) -> Self {
        self.signals = signals;
        self
    }

    pub fn cache(&self) -> &Arc<DerivedDataCache> {
        &self.cache
    }

    pub fn context(
        &self,
        learner: Option<&Learner>,
        inputs: CourseInputs,
    ) -> Result<CourseContext, GradeError> {
        CourseContext::new(learner.map(|l| l.id), inputs, Arc::clone(&self.loader))
    }

    /// Grade for display: the stored grade if its policy hash is current, a
    /// zero grade if absent and the course assumes zero, otherwise recomputed.
    pub fn create(&self, learner: &Learner, inputs: CourseInputs) -> Result<ResolvedGrade, GradeError> {
        let context = self.context(Some(learner), inputs)?;
        self.create_in_context(learner, &context)
    }

    /// Stored grade without checking policy freshness
    ///
    /// `Ok(None)` when nothing is stored and the course does not assume zero.
    pub fn read(
        &self,
        learner: &Learner,
        inputs: CourseInputs,
    ) -> Result<Option<ResolvedGrade>, GradeError> {
        let context = self.context(Some(learner), inputs)?;
        match self.read_stored(learner, &context) {
            Ok((grade, _)) => Ok(Some(grade)),
            Err(GradeError::NotFound { .. }) => {
                if self.flags.assume_zero_if_absent(context.course_key()) {
                    Ok(Some(self.create_zero(learner, &context)))
                } else {
                    Ok(None)
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Recompute, persist, and notify regardless of what is stored
    pub fn update(&self, learner: &Learner, inputs: CourseInputs) -> Result<ResolvedGrade, GradeError> {
        let context = self.context(Some(learner), inputs)?;
        self.recompute(learner, &context, false, None)
    }

    /// Lazily grade many learners against one course snapshot
    ///
    /// The content structure is fetched once, before the first learner, and
    /// so is the course descriptor when it can be loaded; without it grades
    /// are announced with no deadline, as for single resolutions. Each
    /// learner's failure or panic becomes an error element; the sequence
    /// continues. The course's derived data cache is invalidated once, when
    /// the sequence is exhausted or dropped.
    pub fn iter<I>(
        &self,
        learners: I,
        inputs: CourseInputs,
        strategy: ResolutionStrategy,
    ) -> Result<GradeResults<'_, I::IntoIter>, GradeError>
    where
        I: IntoIterator<Item = Learner>,
    {
        let context = self.context(None, inputs)?;
        context.structure()?;
        if let Err(e) = context.course() {
            warn!(
                course_key = %context.course_key(),
                error = %e,
                "Course descriptor unavailable"
            );
        }

        let transaction = self.cache.begin(context.course_key().clone());
        Ok(GradeResults {
            engine: self,
            learners: learners.into_iter(),
            context,
            strategy,
            transaction,
        })
    }

    /// Resolve one learner within an already built context
    pub fn resolve(
        &self,
        learner: &Learner,
        context: &CourseContext,
        strategy: ResolutionStrategy,
    ) -> Result<ResolvedGrade, GradeError> {
        match strategy {
            ResolutionStrategy::CreateIfStale => self.create_in_context(learner, context),
            ResolutionStrategy::ForceUpdate => self.recompute(learner, context, false, None),
        }
    }

    fn create_in_context(
        &self,
        learner: &Learner,
        context: &CourseContext,
    ) -> Result<ResolvedGrade, GradeError> {
        let (read_only, previous) = match self.read_stored(learner, context) {
            Ok((grade, stored)) => {
                if &stored.grading_policy_hash == context.grading_policy_hash()? {
                    return Ok(grade);
                }
                // Policy changed since this grade was computed; overwrite it.
                (false, Some(stored))
            }
            Err(GradeError::NotFound { .. }) => {
                if self.flags.assume_zero_if_absent(context.course_key()) {
                    return Ok(self.create_zero(learner, context));
                }
                // TODO: persist first computations once existing grades are backfilled
                (true, None)
            }
            Err(e) => return Err(e),
        };

        self.recompute(learner, context, read_only, previous)
    }

    fn create_zero(&self, learner: &Learner, context: &CourseContext) -> ResolvedGrade {
        info!("Grades: CreateZero, {}, User: {}", context, learner.id);
        ResolvedGrade::zero(learner.id, context.course_key().clone())
    }

    /// Stored grade and the row it came from; `NotFound` when the course does
    /// not persist grades or nothing is stored.
    fn read_stored(
        &self,
        learner: &Learner,
        context: &CourseContext,
    ) -> Result<(ResolvedGrade, StoredGrade), GradeError> {
        if !self.flags.should_persist_grades(context.course_key()) {
            return Err(GradeError::NotFound {
                learner: learner.id,
                course_key: context.course_key().clone(),
            });
        }

        let stored = self.store.read(learner.id, context.course_key())?;
        let grade = ResolvedGrade::from_stored(&stored);
        info!("Grades: Read, {}, User: {}, {}", context, learner.id, stored);
        Ok((grade, stored))
    }

    fn recompute(
        &self,
        learner: &Learner,
        context: &CourseContext,
        read_only: bool,
        previous: Option<StoredGrade>,
    ) -> Result<ResolvedGrade, GradeError> {
        let breakdown = self.calculator.compute(learner.id, context)?;

        let course_key = context.course_key();
        let should_persist = !read_only
            && self.flags.should_persist_grades(course_key)
            && (!self.flags.write_only_if_engaged() || breakdown.attempted);

        if should_persist {
            let previous = match previous {
                Some(p) => Some(p),
                None => self.store.get(learner.id, course_key)?,
            };
            let row = StoredGrade::record(context, learner.id, &breakdown, previous.as_ref(), Utc::now())?;
            self.store.upsert(&row)?;
        }

        let grade = ResolvedGrade::from_breakdown(learner.id, course_key.clone(), breakdown, should_persist);

        let deadline = context.deadline().unwrap_or_else(|e| {
            warn!(course_key = %course_key, error = %e, "Course descriptor unavailable");
            None
        });
        self.signals.send_grade_changed(&GradeChanged {
            learner: learner.clone(),
            grade: grade.clone(),
            course_key: course_key.clone(),
            deadline,
        });
        if grade.passed {
            self.signals.send_grade_now_passed(&GradeNowPassed {
                learner: learner.clone(),
                course_key: course_key.clone(),
            });
        }

        info!(
            "Grades: Update, {}, User: {}, {}, persisted: {}",
            context.full_string(),
            learner.id,
            grade,
            should_persist
        );

        Ok(grade)
    }
}

/// Lazy, single-pass sequence of batch results in learner input order
pub struct GradeResults<'a, I> {
    engine: &'a GradeEngine,
    learners: I,
    context: CourseContext,
    strategy: ResolutionStrategy,
    transaction: CourseTransaction<'a>,
}

impl<I> GradeResults<'_, I> {
    pub fn context(&self) -> &CourseContext {
        &self.context
    }
}

impl<I> Iterator for GradeResults<'_, I>
where
    I: Iterator<Item = Learner>,
{
    type Item = GradeResult;

    fn next(&mut self) -> Option<GradeResult> {
        let Some(learner) = self.learners.next() else {
            self.transaction.release();
            return None;
        };

        let started = Instant::now();
        let context = self.context.for_learner(learner.id);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.engine.resolve(&learner, &context, self.strategy)
        }))
        .unwrap_or_else(|payload| {
            Err(GradeError::Calculator(format!(
                "grading panicked: {}",
                panic_message(payload.as_ref())
            )))
        });
        if let Err(e) = &outcome {
            error!(
                learner = %learner.id,
                course_key = %self.context.course_key(),
                error = %e,
                "Cannot grade learner {} in course {}",
                learner.id,
                self.context.course_key()
            );
        }
        debug!(
            learner = %learner.id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Batch grade resolved"
        );

        Some(GradeResult { learner, outcome })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.learners.size_hint()
    }
}

impl<I> FusedIterator for GradeResults<'_, I> where I: FusedIterator<Item = Learner> {}
