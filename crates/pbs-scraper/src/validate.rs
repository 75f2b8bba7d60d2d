//! Data-quality gate run on every normalized record before persistence.
//!
//! Three layers, in order, stopping at the first rejection:
//!
//! 1. structural: a description of at least 50 characters;
//! 2. pattern: no leaked markup in the description, garbage pros/cons or
//!    equipment nulled, and at least one of those two left;
//! 3. semantic (optional): an LLM plausibility verdict, fail-open.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use pbs_core::BuildRecord;
use pbs_db::UpsertOutcome;
use serde::{Deserialize, Serialize};

use crate::garbage::{clean_optional, is_garbage};
use crate::html::truncate_chars;
use crate::llm::TextGenerator;

const MIN_DESCRIPTION_CHARS: usize = 50;
const SEMANTIC_FIELD_CHARS: usize = 1500;

/// Why a record was not persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    DescriptionTooShort,
    GarbageDescription,
    MissingRequiredField,
    Implausible { issues: Vec<String> },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DescriptionTooShort => f.write_str("description too short"),
            Self::GarbageDescription => f.write_str("garbage description"),
            Self::MissingRequiredField => f.write_str("missing required field"),
            Self::Implausible { issues } if issues.is_empty() => {
                f.write_str("semantic check failed")
            }
            Self::Implausible { issues } => {
                write!(f, "semantic check failed: {}", issues.join("; "))
            }
        }
    }
}

/// Run counters reported at the end of an ingestion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub saved: usize,
    pub skipped_structural: usize,
    pub skipped_garbage: usize,
    pub skipped_semantic: usize,
    pub skipped_store: usize,
}

impl ValidationReport {
    #[must_use]
    pub fn rejected(&self) -> usize {
        self.skipped_structural + self.skipped_garbage + self.skipped_semantic
    }
}

/// A record refused by the semantic layer, kept in memory for review only.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedDraft {
    pub record: BuildRecord,
    pub issues: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Verdict {
    valid: bool,
    #[serde(default)]
    issues: Vec<String>,
}

/// Description must be present and at least 50 characters.
///
/// # Errors
///
/// Returns [`Rejection::DescriptionTooShort`] otherwise.
pub fn check_structure(record: &BuildRecord) -> Result<(), Rejection> {
    let len = record
        .description_en
        .as_deref()
        .map_or(0, |d| d.trim().chars().count());
    if len < MIN_DESCRIPTION_CHARS {
        return Err(Rejection::DescriptionTooShort);
    }
    Ok(())
}

/// Reject a garbage description, null garbage pros/cons and equipment, and
/// require that at least one of those two survives.
///
/// # Errors
///
/// Returns [`Rejection::GarbageDescription`] or [`Rejection::MissingRequiredField`].
pub fn sanitize(record: &mut BuildRecord) -> Result<(), Rejection> {
    if record.description_en.as_deref().is_none_or(is_garbage) {
        return Err(Rejection::GarbageDescription);
    }
    record.pros_cons_en = clean_optional(record.pros_cons_en.take());
    record.core_equipment_en = clean_optional(record.core_equipment_en.take());

    if record.pros_cons_en.is_none() && record.core_equipment_en.is_none() {
        return Err(Rejection::MissingRequiredField);
    }
    Ok(())
}

/// LLM plausibility check over a record's prose fields.
#[derive(Clone)]
pub struct SemanticCheck {
    generator: Arc<dyn TextGenerator>,
    timeout: Duration,
}

impl SemanticCheck {
    pub fn new(generator: Arc<dyn TextGenerator>, timeout: Duration) -> Self {
        Self { generator, timeout }
    }

    /// Issues reported by an explicit invalid verdict, or `None` when the
    /// record is plausible or no usable verdict was obtained.
    pub async fn issues(&self, record: &BuildRecord) -> Option<Vec<String>> {
        let prompt = semantic_prompt(record);
        let output = match self.generator.generate(&prompt, self.timeout).await {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!(
                    source = %record.source,
                    source_id = %record.source_id,
                    error = %e,
                    "semantic check unavailable; accepting record"
                );
                return None;
            }
        };

        let Some(verdict) = parse_verdict(&output) else {
            tracing::warn!(
                source = %record.source,
                source_id = %record.source_id,
                "semantic verdict unparsable; accepting record"
            );
            return None;
        };
        if verdict.valid {
            None
        } else {
            Some(verdict.issues)
        }
    }
}

fn semantic_prompt(record: &BuildRecord) -> String {
    let field = |value: Option<&str>| {
        truncate_chars(value.unwrap_or("(none)"), SEMANTIC_FIELD_CHARS).to_string()
    };
    format!(
        "You are reviewing a Path of Exile 1 build guide record scraped from the web.\n\
         Decide whether it describes a real, coherent build. Flag leaked page chrome,\n\
         JSON or markup, text about a different game, and pros/cons or equipment\n\
         that contradict the description.\n\
         \n\
         Answer with JSON only, in this exact shape:\n\
         {{\"valid\": true, \"issues\": []}}\n\
         \n\
         NAME: {name}\n\
         DESCRIPTION: {description}\n\
         PROS_CONS: {pros_cons}\n\
         CORE_EQUIPMENT: {equipment}",
        name = record.name_en,
        description = field(record.description_en.as_deref()),
        pros_cons = field(record.pros_cons_en.as_deref()),
        equipment = field(record.core_equipment_en.as_deref()),
    )
}

/// The outermost JSON object in `output`, read as a verdict.
fn parse_verdict(output: &str) -> Option<Verdict> {
    let start = output.find('{')?;
    let end = output.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&output[start..=end]).ok()
}

/// Per-run validator holding counters and the rejected-draft cache.
pub struct ValidationPipeline {
    semantic: Option<SemanticCheck>,
    report: ValidationReport,
    rejected: Vec<RejectedDraft>,
}

impl ValidationPipeline {
    /// `semantic = None` disables the third layer.
    #[must_use]
    pub fn new(semantic: Option<SemanticCheck>) -> Self {
        Self {
            semantic,
            report: ValidationReport::default(),
            rejected: Vec::new(),
        }
    }

    /// Validate one record, returning it (possibly sanitized) when accepted.
    pub async fn validate(&mut self, mut record: BuildRecord) -> Option<BuildRecord> {
        if let Err(rejection) = check_structure(&record) {
            self.report.skipped_structural += 1;
            log_rejection(&record, &rejection);
            return None;
        }
        if let Err(rejection) = sanitize(&mut record) {
            self.report.skipped_garbage += 1;
            log_rejection(&record, &rejection);
            return None;
        }

        if let Some(check) = &self.semantic {
            if let Some(issues) = check.issues(&record).await {
                self.report.skipped_semantic += 1;
                log_rejection(&record, &Rejection::Implausible { issues: issues.clone() });
                self.rejected.push(RejectedDraft { record, issues });
                return None;
            }
        }
        Some(record)
    }

    /// Validate a batch in order, keeping accepted records.
    pub async fn validate_all(&mut self, records: Vec<BuildRecord>) -> Vec<BuildRecord> {
        let mut accepted = Vec::with_capacity(records.len());
        for record in records {
            if let Some(record) = self.validate(record).await {
                accepted.push(record);
            }
        }
        tracing::info!(
            accepted = accepted.len(),
            rejected = self.report.rejected(),
            "validation finished"
        );
        accepted
    }

    /// Fold the sink's outcome into the run counters.
    pub fn record_store_outcome(&mut self, outcome: UpsertOutcome) {
        self.report.saved += outcome.saved;
        self.report.skipped_store += outcome.skipped;
    }

    #[must_use]
    pub fn report(&self) -> ValidationReport {
        self.report
    }

    #[must_use]
    pub fn rejected_drafts(&self) -> &[RejectedDraft] {
        &self.rejected
    }
}

fn log_rejection(record: &BuildRecord, rejection: &Rejection) {
    tracing::info!(
        source = %record.source,
        source_id = %record.source_id,
        reason = %rejection,
        "record rejected"
    );
}

#[cfg(test)]
#[path = "validate_test.rs"]
mod tests;
