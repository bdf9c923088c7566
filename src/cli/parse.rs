//! CLI parse: clap types for coursegrade. No behavior; definitions only.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Coursegrade CLI - resolve and persist learner course grades
#[derive(Parser)]
#[command(name = "coursegrade")]
#[command(about = "Resolve, persist, and inspect learner course grades")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,
}

/// Learner and course selection shared by single-grade commands
#[derive(Args, Debug, Clone)]
pub struct GradeTarget {
    /// Learner id
    #[arg(long)]
    pub learner: u64,

    /// Learner username (defaults to learner-<id>)
    #[arg(long)]
    pub username: Option<String>,

    /// Course key
    #[arg(long)]
    pub course: String,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve a grade, recomputing only when missing or stale
    Create(GradeTarget),
    /// Show the stored grade without checking policy freshness
    Read(GradeTarget),
    /// Recompute and persist a grade
    Update(GradeTarget),
    /// Grade many learners in one course
    Iter {
        /// Course key
        #[arg(long)]
        course: String,
        /// Comma-separated learner ids
        #[arg(long, value_delimiter = ',', required = true)]
        learners: Vec<u64>,
        /// Recompute every grade even when the stored one is current
        #[arg(long)]
        force_update: bool,
        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// List indexed course definitions
    Courses,
    /// Learner score commands
    Score {
        #[command(subcommand)]
        command: ScoreCommands,
    },
}

#[derive(Subcommand)]
pub enum ScoreCommands {
    /// Record a learner's score on a block
    Record {
        #[arg(long)]
        learner: u64,
        #[arg(long)]
        course: String,
        #[arg(long)]
        block: String,
        #[arg(long)]
        earned: f64,
        #[arg(long)]
        possible: f64,
        /// Record the score as not attempted
        #[arg(long)]
        not_attempted: bool,
    },
}
