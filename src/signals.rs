//! Grade change notifications
//!
//! [`GradeSignals`] fans each event out to every subscribed [`GradeListener`].
//! A listener that fails or panics is logged and skipped; the remaining
//! listeners still receive the event and the caller's grade is unaffected.

use crate::grade::ResolvedGrade;
use crate::types::{CourseKey, Learner};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{info, warn};

pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// Emitted after every recomputation
#[derive(Debug, Clone, Serialize)]
pub struct GradeChanged {
    pub learner: Learner,
    pub grade: ResolvedGrade,
    pub course_key: CourseKey,
    pub deadline: Option<DateTime<Utc>>,
}

/// Emitted after a recomputation that yields a passing grade
#[derive(Debug, Clone, Serialize)]
pub struct GradeNowPassed {
    pub learner: Learner,
    pub course_key: CourseKey,
}

pub trait GradeListener: Send + Sync {
    fn name(&self) -> &str;

    fn on_grade_changed(&self, _event: &GradeChanged) -> Result<(), ListenerError> {
        Ok(())
    }

    fn on_grade_now_passed(&self, _event: &GradeNowPassed) -> Result<(), ListenerError> {
        Ok(())
    }
}

/// Outcome of one fan-out
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    /// (listener name, error message)
    pub failed: Vec<(String, String)>,
}

impl DispatchReport {
    pub fn all_delivered(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Default, Clone)]
pub struct GradeSignals {
    listeners: Vec<Arc<dyn GradeListener>>,
}

impl GradeSignals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: Arc<dyn GradeListener>) {
        self.listeners.push(listener);
    }

    pub fn with_listener(mut self, listener: Arc<dyn GradeListener>) -> Self {
        self.subscribe(listener);
        self
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn send_grade_changed(&self, event: &GradeChanged) -> DispatchReport {
        self.dispatch("grade_changed", |listener| listener.on_grade_changed(event))
    }

    pub fn send_grade_now_passed(&self, event: &GradeNowPassed) -> DispatchReport {
        self.dispatch("grade_now_passed", |listener| {
            listener.on_grade_now_passed(event)
        })
    }

    fn dispatch(
        &self,
        signal: &str,
        send: impl Fn(&dyn GradeListener) -> Result<(), ListenerError>,
    ) -> DispatchReport {
        let mut report = DispatchReport::default();
        for listener in &self.listeners {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| send(listener.as_ref())))
                .unwrap_or_else(|payload| {
                    Err(format!("listener panicked: {}", panic_message(payload.as_ref())).into())
                });
            match outcome {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!(
                        signal,
                        listener = listener.name(),
                        error = %e,
                        "Grade listener failed"
                    );
                    report
                        .failed
                        .push((listener.name().to_string(), e.to_string()));
                }
            }
        }
        report
    }
}

/// Text of a caught panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Logs every event at info level
pub struct TracingListener;

impl GradeListener for TracingListener {
    fn name(&self) -> &str {
        "tracing"
    }

    fn on_grade_changed(&self, event: &GradeChanged) -> Result<(), ListenerError> {
        info!(
            learner = %event.learner.id,
            course_key = %event.course_key,
            percent = event.grade.percent,
            passed = event.grade.passed,
            deadline = ?event.deadline,
            "Course grade changed"
        );
        Ok(())
    }

    fn on_grade_now_passed(&self, event: &GradeNowPassed) -> Result<(), ListenerError> {
        info!(
            learner = %event.learner.id,
            course_key = %event.course_key,
            "Course grade now passed"
        );
        Ok(())
    }
}
