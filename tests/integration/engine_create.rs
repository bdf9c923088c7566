//! Integration tests for cache-validated grade creation

use crate::integration::support::{
    breakdown, course_key, current_hash, learner, stale_hash, FailingListener, Harness,
    PanickingListener,
};
use coursegrade::course::CourseInputs;
use coursegrade::flags::GradesConfig;
use coursegrade::grade::{GradeSource, PassStatus};
use coursegrade::signals::GradeListener;
use coursegrade::GradeError;
use std::sync::Arc;

fn assume_zero() -> GradesConfig {
    GradesConfig {
        assume_zero_if_absent: true,
        ..GradesConfig::default()
    }
}

#[test]
fn test_matching_hash_returns_stored_grade() {
    let h = Harness::new(GradesConfig::default());
    h.seed(1, 0.62, true, current_hash());
    let writes_before = h.store.writes();

    let grade = h.engine.create(&learner(1), CourseInputs::for_key(course_key())).unwrap();

    assert_eq!(grade.source, GradeSource::Stored);
    assert_eq!(grade.percent, 0.62);
    assert!(grade.passed);
    assert_eq!(grade.letter_grade.as_deref(), Some("Pass"));
    assert_eq!(h.calculator.calls(), 0);
    assert_eq!(h.store.writes(), writes_before);
    assert_eq!(h.listener.changed_count(), 0);
    assert_eq!(h.listener.passed_count(), 0);
}

#[test]
fn test_absent_with_assume_zero_returns_zero_grade() {
    let h = Harness::new(assume_zero());

    let grade = h.engine.create(&learner(2), CourseInputs::for_key(course_key())).unwrap();

    assert!(grade.is_zero());
    assert_eq!(grade.percent, 0.0);
    assert!(!grade.passed);
    assert!(!grade.attempted);
    assert_eq!(grade.pass_status(), PassStatus::NotAttempted);
    assert_eq!(h.calculator.calls(), 0);
    assert_eq!(h.store.writes(), 0);
    assert_eq!(h.listener.changed_count(), 0);
}

#[test]
fn test_stale_hash_recomputes_and_persists_current_hash() {
    let h = Harness::new(GradesConfig::default());
    let previous = h.seed(3, 0.2, false, stale_hash());

    let grade = h.engine.create(&learner(3), CourseInputs::for_key(course_key())).unwrap();

    assert_eq!(grade.source, GradeSource::Computed { persisted: true });
    assert_eq!(grade.percent, 0.75);
    assert_eq!(h.calculator.calls(), 1);

    let stored = h.stored(3).unwrap();
    assert_eq!(stored.grading_policy_hash, current_hash());
    assert_eq!(stored.percent, 0.75);
    assert_eq!(stored.content_version.as_deref(), Some("v1"));
    assert_eq!(stored.created_at, previous.created_at);
    assert!(stored.passed_at.is_some());
}

#[test]
fn test_absent_without_assume_zero_computes_without_persisting() {
    let h = Harness::new(GradesConfig::default());

    let grade = h.engine.create(&learner(4), CourseInputs::for_key(course_key())).unwrap();

    assert_eq!(grade.source, GradeSource::Computed { persisted: false });
    assert_eq!(h.calculator.calls(), 1);
    assert_eq!(h.store.writes(), 0);
    assert!(h.stored(4).is_none());

    // Notifications go out even though nothing was written
    assert_eq!(h.listener.changed_count(), 1);
    assert_eq!(h.listener.passed_count(), 1);
    let changed = &h.listener.changed.lock()[0];
    assert_eq!(changed.learner.id, learner(4).id);
    assert_eq!(changed.course_key, course_key());
    assert!(changed.deadline.is_some());
}

#[test]
fn test_failing_grade_skips_now_passed() {
    let h = Harness::new(GradesConfig::default());
    h.calculator.set_breakdown(breakdown(0.3, false, true));

    h.engine.create(&learner(5), CourseInputs::for_key(course_key())).unwrap();

    assert_eq!(h.listener.changed_count(), 1);
    assert_eq!(h.listener.passed_count(), 0);
}

#[test]
fn test_second_create_hits_fast_path() {
    let h = Harness::new(GradesConfig::default());
    h.seed(6, 0.1, false, stale_hash());

    let first = h.engine.create(&learner(6), CourseInputs::for_key(course_key())).unwrap();
    let second = h.engine.create(&learner(6), CourseInputs::for_key(course_key())).unwrap();

    assert_eq!(h.calculator.calls(), 1);
    assert_eq!(second.source, GradeSource::Stored);
    assert_eq!(second.percent, first.percent);
    assert_eq!(second.passed, first.passed);
    assert_eq!(h.listener.changed_count(), 1);
}

#[test]
fn test_engagement_gate_blocks_unattempted_write() {
    let h = Harness::new(GradesConfig {
        write_only_if_engaged: true,
        ..GradesConfig::default()
    });
    h.seed(7, 0.4, false, stale_hash());
    h.calculator.set_breakdown(breakdown(0.0, false, false));

    let grade = h.engine.create(&learner(7), CourseInputs::for_key(course_key())).unwrap();

    assert_eq!(grade.source, GradeSource::Computed { persisted: false });
    assert_eq!(h.stored(7).unwrap().grading_policy_hash, stale_hash());
    assert_eq!(h.listener.changed_count(), 1);
}

#[test]
fn test_engagement_gate_allows_attempted_write() {
    let h = Harness::new(GradesConfig {
        write_only_if_engaged: true,
        ..GradesConfig::default()
    });
    h.seed(8, 0.4, false, stale_hash());

    let grade = h.engine.create(&learner(8), CourseInputs::for_key(course_key())).unwrap();

    assert_eq!(grade.source, GradeSource::Computed { persisted: true });
    assert_eq!(h.stored(8).unwrap().grading_policy_hash, current_hash());
}

#[test]
fn test_persistence_disabled_ignores_stored_rows() {
    let h = Harness::new(GradesConfig {
        persistent_grades_enabled: false,
        ..GradesConfig::default()
    });
    h.seed(9, 0.99, true, current_hash());
    let writes_before = h.store.writes();

    let grade = h.engine.create(&learner(9), CourseInputs::for_key(course_key())).unwrap();

    assert_eq!(grade.source, GradeSource::Computed { persisted: false });
    assert_eq!(grade.percent, 0.75);
    assert_eq!(h.store.writes(), writes_before);
}

#[test]
fn test_listener_failure_does_not_affect_grade() {
    let failing: Arc<dyn GradeListener> = Arc::new(FailingListener);
    let h = Harness::with_listeners(GradesConfig::default(), vec![failing]);
    h.seed(10, 0.1, false, stale_hash());

    let grade = h.engine.create(&learner(10), CourseInputs::for_key(course_key())).unwrap();

    assert_eq!(grade.percent, 0.75);
    assert_eq!(h.listener.changed_count(), 1);
    assert_eq!(h.listener.passed_count(), 1);
    assert_eq!(h.stored(10).unwrap().percent, 0.75);
}

#[test]
fn test_listener_panic_does_not_abort_resolution() {
    let panicking: Arc<dyn GradeListener> = Arc::new(PanickingListener);
    let h = Harness::with_listeners(GradesConfig::default(), vec![panicking]);
    h.seed(14, 0.1, false, stale_hash());

    let grade = h.engine.create(&learner(14), CourseInputs::for_key(course_key())).unwrap();

    assert_eq!(grade.source, GradeSource::Computed { persisted: true });
    assert_eq!(h.listener.changed_count(), 1);
    assert_eq!(h.listener.passed_count(), 1);
    assert_eq!(h.stored(14).unwrap().grading_policy_hash, current_hash());

    let updated = h.engine.update(&learner(14), CourseInputs::for_key(course_key())).unwrap();
    assert_eq!(updated.percent, 0.75);
    assert_eq!(h.listener.changed_count(), 2);
}

#[test]
fn test_missing_inputs_is_configuration_error() {
    let h = Harness::new(GradesConfig::default());
    let result = h.engine.create(&learner(11), CourseInputs::default());
    assert!(matches!(result, Err(GradeError::Configuration(_))));
    assert_eq!(h.calculator.calls(), 0);
}

#[test]
fn test_calculator_failure_propagates() {
    let h = Harness::new(GradesConfig::default());
    h.seed(12, 0.1, false, stale_hash());
    h.calculator.fail_for(learner(12).id);

    let result = h.engine.create(&learner(12), CourseInputs::for_key(course_key()));

    assert!(matches!(result, Err(GradeError::Calculator(_))));
    assert_eq!(h.listener.changed_count(), 0);
    assert_eq!(h.stored(12).unwrap().grading_policy_hash, stale_hash());
}

#[test]
fn test_prefetched_structure_avoids_loader() {
    let h = Harness::new(GradesConfig::default());
    h.seed(13, 0.5, true, current_hash());
    let definition = crate::integration::support::definition();

    let inputs = CourseInputs::for_structure(definition.structure());
    let grade = h.engine.create(&learner(13), inputs).unwrap();

    assert_eq!(grade.source, GradeSource::Stored);
    assert_eq!(h.loader.structure_loads(), 0);
}
