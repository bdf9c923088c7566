//! CLI route: single route table and run context. Dispatches to the grade engine.

use crate::cache::DerivedDataCache;
use crate::cli::parse::{Commands, GradeTarget, ScoreCommands};
use crate::cli::presentation::{format_batch, format_grade, format_optional_grade};
use crate::config::{AppConfig, ConfigLoader};
use crate::course::{CourseInputs, FileContentLoader};
use crate::engine::{GradeEngine, GradeResult, ResolutionStrategy};
use crate::error::GradeError;
use crate::grade::WeightedGradeCalculator;
use crate::signals::{GradeSignals, TracingListener};
use crate::store::{Score, SledGradeStore, SledScoreStore};
use crate::types::{CourseKey, Learner, LearnerId};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Runtime context for CLI execution: workspace, storage, and the engine.
pub struct RunContext {
    engine: GradeEngine,
    loader: Arc<FileContentLoader>,
    grades: SledGradeStore,
    scores: SledScoreStore,
    workspace_root: PathBuf,
}

impl RunContext {
    /// Create run context from workspace root and optional config path.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, GradeError> {
        let config = match config_path {
            Some(ref path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load(&workspace_root)?,
        };
        Self::from_config(workspace_root, config)
    }

    pub fn from_config(workspace_root: PathBuf, config: AppConfig) -> Result<Self, GradeError> {
        let store_path = config.storage.resolve_store_path(&workspace_root);
        let courses_path = config.storage.resolve_courses_path(&workspace_root);

        let db = sled::open(&store_path).map_err(|e| {
            GradeError::Settings(format!(
                "Failed to open store at {}: {}",
                store_path.display(),
                e
            ))
        })?;
        let grades = SledGradeStore::from_db(db.clone())?;
        let scores = SledScoreStore::new(db)?;
        let loader = Arc::new(FileContentLoader::open(&courses_path)?);

        let cache = DerivedDataCache::shared();
        let calculator = WeightedGradeCalculator::new(Arc::new(scores.clone()), Arc::clone(&cache));
        let signals = GradeSignals::new().with_listener(Arc::new(TracingListener));
        let engine = GradeEngine::new(
            Arc::new(grades.clone()),
            Arc::new(calculator),
            loader.clone(),
            Arc::new(config.grades.clone()),
            cache,
        )
        .with_signals(signals);

        info!(
            store = %store_path.display(),
            courses = %courses_path.display(),
            "Run context ready"
        );

        Ok(Self {
            engine,
            loader,
            grades,
            scores,
            workspace_root,
        })
    }

    pub fn engine(&self) -> &GradeEngine {
        &self.engine
    }

    pub fn workspace_root(&self) -> &PathBuf {
        &self.workspace_root
    }

    /// Execute a command and return its rendered output
    pub fn execute(&self, command: &Commands) -> Result<String, GradeError> {
        let output = match command {
            Commands::Create(target) => {
                let grade = self.engine.create(&learner(target), inputs(&target.course))?;
                format_grade(&grade, target.format)
            }
            Commands::Read(target) => {
                let grade = self.engine.read(&learner(target), inputs(&target.course))?;
                format_optional_grade(grade.as_ref(), target.format)
            }
            Commands::Update(target) => {
                let grade = self.engine.update(&learner(target), inputs(&target.course))?;
                format_grade(&grade, target.format)
            }
            Commands::Iter {
                course,
                learners,
                force_update,
                format,
            } => {
                let learners = learners
                    .iter()
                    .map(|id| Learner::new(*id, format!("learner-{}", id)));
                let results: Vec<GradeResult> = self
                    .engine
                    .iter(
                        learners,
                        inputs(course),
                        ResolutionStrategy::from_force_update(*force_update),
                    )?
                    .collect();
                format_batch(&results, *format)
            }
            Commands::Courses => {
                let keys = self.loader.course_keys();
                if keys.is_empty() {
                    Ok(format!(
                        "No course definitions under {}",
                        self.loader.root().display()
                    ))
                } else {
                    Ok(keys
                        .iter()
                        .map(|k| k.to_string())
                        .collect::<Vec<_>>()
                        .join("\n"))
                }
            }
            Commands::Score { command } => self.execute_score(command),
        }?;

        self.grades.flush()?;
        Ok(output)
    }

    fn execute_score(&self, command: &ScoreCommands) -> Result<String, GradeError> {
        match command {
            ScoreCommands::Record {
                learner,
                course,
                block,
                earned,
                possible,
                not_attempted,
            } => {
                if *possible < 0.0 || *earned < 0.0 {
                    return Err(GradeError::Settings(
                        "Scores cannot be negative".to_string(),
                    ));
                }
                let score = Score {
                    earned: *earned,
                    possible: *possible,
                    attempted: !*not_attempted,
                    recorded_at: Utc::now(),
                };
                self.scores
                    .record(LearnerId(*learner), &CourseKey::new(course.as_str()), block, &score)?;
                Ok(format!(
                    "Recorded {}/{} for learner {} on {}",
                    earned, possible, learner, block
                ))
            }
        }
    }
}

fn learner(target: &GradeTarget) -> Learner {
    let username = target
        .username
        .clone()
        .unwrap_or_else(|| format!("learner-{}", target.learner));
    Learner::new(target.learner, username)
}

fn inputs(course: &str) -> CourseInputs {
    CourseInputs::for_key(course)
}
