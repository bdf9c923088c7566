//! Course content loading
//!
//! The engine never reads course content directly; it asks a [`ContentLoader`]
//! for the course descriptor or its collected structure when the caller did
//! not supply them.

use crate::course::policy::GradingPolicy;
use crate::course::structure::{ContentStructure, Course, GradedBlock};
use crate::error::GradeError;
use crate::types::CourseKey;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;
use walkdir::WalkDir;

/// Source of course descriptors and content structures
pub trait ContentLoader: Send + Sync {
    fn load_course(&self, course_key: &CourseKey) -> Result<Course, GradeError>;
    fn load_structure(&self, course_key: &CourseKey) -> Result<ContentStructure, GradeError>;
}

/// On-disk course definition (one TOML file per course)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseDefinition {
    pub key: CourseKey,

    #[serde(default)]
    pub display_name: String,

    #[serde(default)]
    pub end: Option<DateTime<Utc>>,

    #[serde(default)]
    pub version: Option<String>,

    #[serde(default)]
    pub edited_on: Option<DateTime<Utc>>,

    #[serde(default)]
    pub grading_policy: GradingPolicy,

    #[serde(default)]
    pub blocks: Vec<GradedBlock>,
}

impl CourseDefinition {
    pub fn course(&self) -> Course {
        Course {
            key: self.key.clone(),
            display_name: self.display_name.clone(),
            end: self.end,
            version: self.version.clone(),
            edited_on: self.edited_on,
            grading_policy: self.grading_policy.clone(),
        }
    }

    pub fn structure(&self) -> ContentStructure {
        ContentStructure {
            course_key: self.key.clone(),
            version: self.version.clone(),
            edited_on: self.edited_on,
            grading_policy: self.grading_policy.clone(),
            blocks: self.blocks.clone(),
        }
    }
}

/// Loads course definitions from a directory of `*.toml` files
pub struct FileContentLoader {
    root: PathBuf,
    index: HashMap<CourseKey, PathBuf>,
}

impl FileContentLoader {
    /// Scan `root` recursively and index every course definition by key
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, GradeError> {
        let root = root.as_ref().to_path_buf();
        let mut index = HashMap::new();

        if root.exists() {
            for entry in WalkDir::new(&root).follow_links(false) {
                let entry = entry.map_err(|e| {
                    GradeError::Content(format!("Failed to scan {}: {}", root.display(), e))
                })?;
                let path = entry.path();
                if !entry.file_type().is_file()
                    || path.extension().and_then(|e| e.to_str()) != Some("toml")
                {
                    continue;
                }
                let definition = read_definition(path)?;
                debug!(course_key = %definition.key, path = %path.display(), "Indexed course definition");
                index.insert(definition.key, path.to_path_buf());
            }
        }

        Ok(Self { root, index })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn course_keys(&self) -> Vec<CourseKey> {
        let mut keys: Vec<CourseKey> = self.index.keys().cloned().collect();
        keys.sort();
        keys
    }

    fn definition(&self, course_key: &CourseKey) -> Result<CourseDefinition, GradeError> {
        let path = self.index.get(course_key).ok_or_else(|| {
            GradeError::Content(format!(
                "Course {} not found under {}",
                course_key,
                self.root.display()
            ))
        })?;
        read_definition(path)
    }
}

impl ContentLoader for FileContentLoader {
    fn load_course(&self, course_key: &CourseKey) -> Result<Course, GradeError> {
        Ok(self.definition(course_key)?.course())
    }

    fn load_structure(&self, course_key: &CourseKey) -> Result<ContentStructure, GradeError> {
        Ok(self.definition(course_key)?.structure())
    }
}

fn read_definition(path: &Path) -> Result<CourseDefinition, GradeError> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        GradeError::Content(format!("Failed to read {}: {}", path.display(), e))
    })?;
    let definition: CourseDefinition = toml::from_str(&raw).map_err(|e| {
        GradeError::Content(format!("Invalid course file {}: {}", path.display(), e))
    })?;
    definition.grading_policy.validate().map_err(|e| {
        GradeError::Content(format!("Invalid grading policy in {}: {}", path.display(), e))
    })?;
    Ok(definition)
}

/// Loader over definitions held in memory; counts structure fetches
#[derive(Default)]
pub struct InMemoryContentLoader {
    definitions: RwLock<HashMap<CourseKey, CourseDefinition>>,
    structure_loads: AtomicUsize,
    course_loads: AtomicUsize,
}

impl InMemoryContentLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, definition: CourseDefinition) {
        self.definitions
            .write()
            .insert(definition.key.clone(), definition);
    }

    pub fn structure_loads(&self) -> usize {
        self.structure_loads.load(Ordering::SeqCst)
    }

    pub fn course_loads(&self) -> usize {
        self.course_loads.load(Ordering::SeqCst)
    }

    fn with_definition<T>(
        &self,
        course_key: &CourseKey,
        f: impl FnOnce(&CourseDefinition) -> T,
    ) -> Result<T, GradeError> {
        self.definitions
            .read()
            .get(course_key)
            .map(f)
            .ok_or_else(|| GradeError::Content(format!("Course {} not found", course_key)))
    }
}

impl ContentLoader for InMemoryContentLoader {
    fn load_course(&self, course_key: &CourseKey) -> Result<Course, GradeError> {
        self.course_loads.fetch_add(1, Ordering::SeqCst);
        self.with_definition(course_key, CourseDefinition::course)
    }

    fn load_structure(&self, course_key: &CourseKey) -> Result<ContentStructure, GradeError> {
        self.structure_loads.fetch_add(1, Ordering::SeqCst);
        self.with_definition(course_key, CourseDefinition::structure)
    }
}
