//! End-to-end grading over sled-backed stores and course files on disk

use chrono::Utc;
use coursegrade::cache::DerivedDataCache;
use coursegrade::course::{CourseInputs, FileContentLoader};
use coursegrade::flags::GradesConfig;
use coursegrade::grade::{GradeSource, PassStatus, WeightedGradeCalculator};
use coursegrade::store::persistence::SledGradeStore;
use coursegrade::store::scores::{Score, SledScoreStore};
use coursegrade::store::GradeStore;
use coursegrade::types::{CourseKey, Learner, LearnerId};
use coursegrade::{GradeEngine, ResolutionStrategy};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

const COURSE: &str = "course-v1:Org+Calc+2026";

fn course_file(pass_cutoff: f64) -> String {
    format!(
        r#"
key = "{COURSE}"
display_name = "Calculus"
end = "2026-12-15T00:00:00Z"
version = "v3"

[grading_policy.cutoffs]
A = 0.9
Pass = {pass_cutoff}

[[grading_policy.graders]]
type = "Homework"
short_label = "HW"
weight = 0.5
min_count = 2

[[grading_policy.graders]]
type = "Exam"
short_label = "EX"
weight = 0.5
min_count = 1

[[blocks]]
id = "hw1"
format = "Homework"
graded = true

[[blocks]]
id = "hw2"
format = "Homework"
graded = true

[[blocks]]
id = "final"
format = "Exam"
graded = true

[[blocks]]
id = "intro"
graded = false
"#
    )
}

struct Setup {
    _temp_dir: TempDir,
    courses_dir: std::path::PathBuf,
    engine: GradeEngine,
    grades: Arc<SledGradeStore>,
    scores: SledScoreStore,
}

impl Setup {
    fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let courses_dir = temp_dir.path().join("courses");
        std::fs::create_dir_all(&courses_dir).unwrap();
        write_course(&courses_dir, 0.5);

        let db = sled::open(temp_dir.path().join("store")).unwrap();
        let grades = Arc::new(SledGradeStore::from_db(db.clone()).unwrap());
        let scores = SledScoreStore::new(db).unwrap();
        let loader = Arc::new(FileContentLoader::open(&courses_dir).unwrap());
        let cache = DerivedDataCache::shared();
        let calculator = Arc::new(WeightedGradeCalculator::new(
            Arc::new(scores.clone()),
            cache.clone(),
        ));

        let engine = GradeEngine::new(
            grades.clone(),
            calculator,
            loader,
            Arc::new(GradesConfig::default()),
            cache,
        );

        Self {
            _temp_dir: temp_dir,
            courses_dir,
            engine,
            grades,
            scores,
        }
    }

    fn score(&self, learner: u64, block: &str, earned: f64, possible: f64) {
        let score = Score {
            earned,
            possible,
            attempted: true,
            recorded_at: Utc::now(),
        };
        self.scores
            .record(LearnerId(learner), &course_key(), block, &score)
            .unwrap();
    }
}

fn write_course(dir: &Path, pass_cutoff: f64) {
    std::fs::write(dir.join("calculus.toml"), course_file(pass_cutoff)).unwrap();
}

fn course_key() -> CourseKey {
    CourseKey::new(COURSE)
}

fn learner(id: u64) -> Learner {
    Learner::new(id, format!("student{}", id))
}

#[test]
fn test_weighted_grade_is_computed_and_stored() {
    let setup = Setup::new();
    setup.score(1, "hw1", 1.0, 1.0);
    setup.score(1, "hw2", 4.0, 4.0);
    setup.score(1, "final", 5.0, 10.0);

    let grade = setup
        .engine
        .update(&learner(1), CourseInputs::for_key(COURSE))
        .unwrap();

    assert_eq!(grade.percent, 0.75);
    assert_eq!(grade.letter_grade.as_deref(), Some("Pass"));
    assert_eq!(grade.pass_status(), PassStatus::Passed);
    assert_eq!(grade.sections.len(), 2);
    assert_eq!(grade.sections[0].kind, "Homework");
    assert_eq!(grade.sections[0].average, 1.0);
    assert_eq!(grade.sections[1].average, 0.5);

    let stored = setup.grades.get(learner(1).id, &course_key()).unwrap().unwrap();
    assert_eq!(stored.percent, 0.75);
    assert_eq!(stored.content_version.as_deref(), Some("v3"));
    assert!(stored.attempted);
}

#[test]
fn test_unattempted_learner_gets_zero_breakdown() {
    let setup = Setup::new();

    let grade = setup
        .engine
        .update(&learner(2), CourseInputs::for_key(COURSE))
        .unwrap();

    assert_eq!(grade.percent, 0.0);
    assert!(!grade.attempted);
    assert_eq!(grade.pass_status(), PassStatus::NotAttempted);
}

#[test]
fn test_policy_change_triggers_recompute() {
    let setup = Setup::new();
    setup.score(3, "hw1", 1.0, 1.0);
    setup.score(3, "hw2", 1.0, 1.0);
    setup.score(3, "final", 1.0, 2.0);

    setup
        .engine
        .update(&learner(3), CourseInputs::for_key(COURSE))
        .unwrap();
    let cached = setup
        .engine
        .create(&learner(3), CourseInputs::for_key(COURSE))
        .unwrap();
    assert_eq!(cached.source, GradeSource::Stored);
    assert!(cached.passed);

    // Raising the pass cutoff changes the policy fingerprint
    write_course(&setup.courses_dir, 0.8);

    let regraded = setup
        .engine
        .create(&learner(3), CourseInputs::for_key(COURSE))
        .unwrap();
    assert_eq!(regraded.source, GradeSource::Computed { persisted: true });
    assert_eq!(regraded.percent, 0.75);
    assert!(!regraded.passed);
    assert_eq!(regraded.letter_grade, None);

    let stored = setup.grades.get(learner(3).id, &course_key()).unwrap().unwrap();
    assert!(stored.passed_at.is_none());
    assert_eq!(stored.letter_grade, "");
}

#[test]
fn test_batch_over_sled_store() {
    let setup = Setup::new();
    setup.score(10, "hw1", 1.0, 1.0);
    setup.score(11, "final", 1.0, 1.0);

    let results: Vec<_> = setup
        .engine
        .iter(
            vec![learner(10), learner(11), learner(12)],
            CourseInputs::for_key(COURSE),
            ResolutionStrategy::ForceUpdate,
        )
        .unwrap()
        .collect();

    let percents: Vec<f64> = results.iter().map(|r| r.grade().unwrap().percent).collect();
    assert_eq!(percents, vec![0.25, 0.5, 0.0]);
    for (id, expected) in [(10, 0.25), (11, 0.5), (12, 0.0)] {
        let row = setup
            .grades
            .get(LearnerId(id), &course_key())
            .unwrap()
            .unwrap();
        assert_eq!(row.percent, expected);
    }
    assert!(!setup.engine.cache().contains(&course_key()));
}

#[test]
fn test_engine_sees_calculator_cache_entries() {
    let setup = Setup::new();
    setup.score(1, "hw1", 1.0, 1.0);

    setup
        .engine
        .update(&learner(1), CourseInputs::for_key(COURSE))
        .unwrap();
    assert!(setup.engine.cache().contains(&course_key()));
}

#[test]
fn test_unknown_course_is_content_error() {
    let setup = Setup::new();
    let result = setup
        .engine
        .update(&learner(1), CourseInputs::for_key("course-v1:Missing+X+Y"));
    assert!(matches!(result, Err(coursegrade::GradeError::Content(_))));
}
