//! Engine harness: in-memory collaborators and test doubles

use chrono::{TimeZone, Utc};
use coursegrade::cache::DerivedDataCache;
use coursegrade::course::{
    AssignmentType, CourseContext, CourseDefinition, GradedBlock, GradingPolicy,
    InMemoryContentLoader,
};
use coursegrade::flags::GradesConfig;
use coursegrade::grade::{GradeBreakdown, GradeCalculator};
use coursegrade::signals::{
    GradeChanged, GradeListener, GradeNowPassed, GradeSignals, ListenerError,
};
use coursegrade::store::{GradeStore, InMemoryGradeStore, StoredGrade};
use coursegrade::types::{CourseKey, Learner, LearnerId, PolicyHash};
use coursegrade::{GradeEngine, GradeError};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const COURSE: &str = "course-v1:Org+Num+Run";

pub fn course_key() -> CourseKey {
    CourseKey::new(COURSE)
}

pub fn learner(id: u64) -> Learner {
    Learner::new(id, format!("learner-{}", id))
}

pub fn policy() -> GradingPolicy {
    GradingPolicy {
        graders: vec![
            AssignmentType {
                kind: "Homework".to_string(),
                short_label: "HW".to_string(),
                weight: 0.5,
                min_count: 2,
                drop_count: 0,
            },
            AssignmentType {
                kind: "Exam".to_string(),
                short_label: "EX".to_string(),
                weight: 0.5,
                min_count: 1,
                drop_count: 0,
            },
        ],
        cutoffs: BTreeMap::from([("A".to_string(), 0.9), ("Pass".to_string(), 0.5)]),
    }
}

fn block(id: &str, format: &str) -> GradedBlock {
    GradedBlock {
        id: id.to_string(),
        display_name: id.to_string(),
        format: Some(format.to_string()),
        graded: true,
    }
}

pub fn definition() -> CourseDefinition {
    CourseDefinition {
        key: course_key(),
        display_name: "Intro to Grading".to_string(),
        end: Some(Utc.with_ymd_and_hms(2026, 12, 15, 0, 0, 0).unwrap()),
        version: Some("v1".to_string()),
        edited_on: Some(Utc.with_ymd_and_hms(2026, 9, 1, 12, 0, 0).unwrap()),
        grading_policy: policy(),
        blocks: vec![block("hw1", "Homework"), block("hw2", "Homework"), block("final", "Exam")],
    }
}

pub fn current_hash() -> PolicyHash {
    policy().hash()
}

pub fn breakdown(percent: f64, passed: bool, attempted: bool) -> GradeBreakdown {
    GradeBreakdown {
        percent,
        letter_grade: passed.then(|| "Pass".to_string()),
        passed,
        attempted,
        sections: vec![],
    }
}

/// Returns a fixed breakdown; can be told to fail or panic for specific learners
pub struct FixedCalculator {
    breakdown: Mutex<GradeBreakdown>,
    failing: Mutex<HashSet<LearnerId>>,
    panicking: Mutex<HashSet<LearnerId>>,
    calls: AtomicUsize,
}

impl FixedCalculator {
    pub fn new(breakdown: GradeBreakdown) -> Self {
        Self {
            breakdown: Mutex::new(breakdown),
            failing: Mutex::new(HashSet::new()),
            panicking: Mutex::new(HashSet::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_breakdown(&self, breakdown: GradeBreakdown) {
        *self.breakdown.lock() = breakdown;
    }

    pub fn fail_for(&self, learner: LearnerId) {
        self.failing.lock().insert(learner);
    }

    pub fn panic_for(&self, learner: LearnerId) {
        self.panicking.lock().insert(learner);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl GradeCalculator for FixedCalculator {
    fn compute(
        &self,
        learner: LearnerId,
        context: &CourseContext,
    ) -> Result<GradeBreakdown, GradeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        // Resolve the structure like a real calculator would
        context.structure()?;
        if self.panicking.lock().contains(&learner) {
            panic!("calculator bug for learner {}", learner);
        }
        if self.failing.lock().contains(&learner) {
            return Err(GradeError::Calculator(format!(
                "cannot grade learner {}",
                learner
            )));
        }
        Ok(self.breakdown.lock().clone())
    }
}

#[derive(Default)]
pub struct RecordingListener {
    pub changed: Mutex<Vec<GradeChanged>>,
    pub passed: Mutex<Vec<GradeNowPassed>>,
}

impl RecordingListener {
    pub fn changed_count(&self) -> usize {
        self.changed.lock().len()
    }

    pub fn passed_count(&self) -> usize {
        self.passed.lock().len()
    }
}

impl GradeListener for RecordingListener {
    fn name(&self) -> &str {
        "recording"
    }

    fn on_grade_changed(&self, event: &GradeChanged) -> Result<(), ListenerError> {
        self.changed.lock().push(event.clone());
        Ok(())
    }

    fn on_grade_now_passed(&self, event: &GradeNowPassed) -> Result<(), ListenerError> {
        self.passed.lock().push(event.clone());
        Ok(())
    }
}

pub struct FailingListener;

impl GradeListener for FailingListener {
    fn name(&self) -> &str {
        "failing"
    }

    fn on_grade_changed(&self, _event: &GradeChanged) -> Result<(), ListenerError> {
        Err("grade changed handler failed".into())
    }

    fn on_grade_now_passed(&self, _event: &GradeNowPassed) -> Result<(), ListenerError> {
        Err("now passed handler failed".into())
    }
}

pub struct PanickingListener;

impl GradeListener for PanickingListener {
    fn name(&self) -> &str {
        "panicking"
    }

    fn on_grade_changed(&self, _event: &GradeChanged) -> Result<(), ListenerError> {
        panic!("grade changed handler panicked");
    }

    fn on_grade_now_passed(&self, _event: &GradeNowPassed) -> Result<(), ListenerError> {
        panic!("now passed handler panicked");
    }
}

pub struct Harness {
    pub engine: GradeEngine,
    pub store: Arc<InMemoryGradeStore>,
    pub calculator: Arc<FixedCalculator>,
    pub loader: Arc<InMemoryContentLoader>,
    pub listener: Arc<RecordingListener>,
}

impl Harness {
    pub fn new(flags: GradesConfig) -> Self {
        Self::with_listeners(flags, vec![])
    }

    /// Extra listeners are subscribed before the recording one
    pub fn with_listeners(flags: GradesConfig, extra: Vec<Arc<dyn GradeListener>>) -> Self {
        let store = Arc::new(InMemoryGradeStore::new());
        let calculator = Arc::new(FixedCalculator::new(breakdown(0.75, true, true)));
        let loader = Arc::new(InMemoryContentLoader::new());
        loader.insert(definition());
        let listener = Arc::new(RecordingListener::default());

        let mut signals = GradeSignals::new();
        for l in extra {
            signals.subscribe(l);
        }
        signals.subscribe(listener.clone());

        let engine = GradeEngine::new(
            store.clone(),
            calculator.clone(),
            loader.clone(),
            Arc::new(flags),
            DerivedDataCache::shared(),
        )
        .with_signals(signals);

        Self {
            engine,
            store,
            calculator,
            loader,
            listener,
        }
    }

    /// Seed a stored row computed under `hash`
    pub fn seed(&self, learner: u64, percent: f64, passed: bool, hash: PolicyHash) -> StoredGrade {
        let now = Utc::now();
        let row = StoredGrade {
            learner_id: LearnerId(learner),
            course_key: course_key(),
            content_version: Some("v0".to_string()),
            content_edited_at: None,
            grading_policy_hash: hash,
            percent,
            letter_grade: if passed { "Pass".to_string() } else { String::new() },
            passed_at: passed.then_some(now),
            attempted: true,
            created_at: now,
            modified_at: now,
        };
        self.store.upsert(&row).unwrap();
        row
    }

    pub fn stored(&self, learner: u64) -> Option<StoredGrade> {
        self.store.get(LearnerId(learner), &course_key()).unwrap()
    }
}

pub fn stale_hash() -> PolicyHash {
    PolicyHash::from_hash(&[0xee; 32])
}
