//! CLI domain: parse, route, and presentation only.
//! No grading logic; the route table dispatches to the engine.

mod parse;
mod presentation;
mod route;

pub use parse::{Cli, Commands, GradeTarget, OutputFormat, ScoreCommands};
pub use presentation::{format_batch, format_grade, format_optional_grade};
pub use route::RunContext;
