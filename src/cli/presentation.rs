//! Presentation: grade and batch result formatters.

use crate::cli::parse::OutputFormat;
use crate::engine::GradeResult;
use crate::error::GradeError;
use crate::grade::{GradeSource, ResolvedGrade};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use serde_json::json;

fn to_json(value: &serde_json::Value) -> Result<String, GradeError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| GradeError::Settings(format!("Failed to render JSON: {}", e)))
}

fn source_label(source: &GradeSource) -> &'static str {
    match source {
        GradeSource::Stored => "stored",
        GradeSource::Zero => "zero",
        GradeSource::Computed { persisted: true } => "computed (persisted)",
        GradeSource::Computed { persisted: false } => "computed",
    }
}

pub fn format_grade(grade: &ResolvedGrade, format: OutputFormat) -> Result<String, GradeError> {
    if format == OutputFormat::Json {
        return to_json(&json!(grade));
    }
    let mut out = format!(
        "Learner {} in {}\n  Percent: {:.2}\n  Letter: {}\n  Status: {}\n  Source: {}",
        grade.learner,
        grade.course_key,
        grade.percent,
        grade.letter_grade.as_deref().unwrap_or("-"),
        grade.pass_status(),
        source_label(&grade.source)
    );
    if !grade.sections.is_empty() {
        let mut table = Table::new();
        table.load_preset(UTF8_BORDERS_ONLY);
        table.set_header(vec!["Type", "Weight", "Average", "Counted", "Dropped"]);
        for section in &grade.sections {
            table.add_row(vec![
                section.kind.clone(),
                format!("{:.2}", section.weight),
                format!("{:.2}", section.average),
                section.counted.to_string(),
                section.dropped.to_string(),
            ]);
        }
        out.push_str(&format!("\n\n{}", table));
    }
    Ok(out)
}

pub fn format_optional_grade(
    grade: Option<&ResolvedGrade>,
    format: OutputFormat,
) -> Result<String, GradeError> {
    match (grade, format) {
        (Some(grade), _) => format_grade(grade, format),
        (None, OutputFormat::Json) => to_json(&json!({ "grade": null })),
        (None, OutputFormat::Text) => Ok("No grade on record.".to_string()),
    }
}

pub fn format_batch(results: &[GradeResult], format: OutputFormat) -> Result<String, GradeError> {
    if format == OutputFormat::Json {
        let rows: Vec<serde_json::Value> = results
            .iter()
            .map(|r| match &r.outcome {
                Ok(grade) => json!({ "learner": r.learner, "grade": grade, "error": null }),
                Err(e) => json!({ "learner": r.learner, "grade": null, "error": e.to_string() }),
            })
            .collect();
        return to_json(&json!(rows));
    }

    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Learner", "Percent", "Letter", "Status", "Source"]);
    for result in results {
        match &result.outcome {
            Ok(grade) => table.add_row(vec![
                result.learner.id.to_string(),
                format!("{:.2}", grade.percent),
                grade.letter_grade.clone().unwrap_or_else(|| "-".to_string()),
                grade.pass_status().to_string(),
                source_label(&grade.source).to_string(),
            ]),
            Err(e) => table.add_row(vec![
                result.learner.id.to_string(),
                "-".to_string(),
                "-".to_string(),
                format!("error: {}", e),
                "-".to_string(),
            ]),
        };
    }
    let failed = results.iter().filter(|r| !r.is_ok()).count();
    Ok(format!(
        "{}\n\n{} graded, {} failed",
        table,
        results.len() - failed,
        failed
    ))
}
