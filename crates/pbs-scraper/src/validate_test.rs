use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use pbs_core::Source;

use super::*;
use crate::llm::GenerateError;

struct VerdictStub {
    reply: Option<&'static str>,
    calls: AtomicU32,
}

impl VerdictStub {
    fn new(reply: Option<&'static str>) -> Arc<Self> {
        Arc::new(Self {
            reply,
            calls: AtomicU32::new(0),
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for VerdictStub {
    async fn generate(&self, _prompt: &str, _timeout: Duration) -> Result<String, GenerateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply
            .map(str::to_string)
            .ok_or(GenerateError::EmptyOutput)
    }
}

const DESCRIPTION: &str =
    "Righteous Fire Juggernaut burns nearby enemies while regenerating a huge life pool.";

fn record() -> BuildRecord {
    let mut record = BuildRecord::new(
        Source::Maxroll,
        "rf-jugg",
        "https://maxroll.gg/poe/build-guides/rf-jugg",
        "RF Juggernaut",
    );
    record.description_en = Some(DESCRIPTION.to_string());
    record.pros_cons_en = Some("Pros:\n- Tanky\n\nCons:\n- Slow".to_string());
    record.core_equipment_en = Some("Kaom's Heart, Rise of the Phoenix".to_string());
    record
}

fn pipeline_with(stub: &Arc<VerdictStub>) -> ValidationPipeline {
    let generator: Arc<dyn TextGenerator> = Arc::clone(stub) as Arc<dyn TextGenerator>;
    ValidationPipeline::new(Some(SemanticCheck::new(generator, Duration::from_secs(1))))
}

#[tokio::test]
async fn short_description_never_reaches_semantic_layer() {
    let stub = VerdictStub::new(Some(r#"{"valid": true, "issues": []}"#));
    let mut pipeline = pipeline_with(&stub);

    let mut short = record();
    short.description_en = Some("Too short.".to_string());
    assert!(pipeline.validate(short).await.is_none());

    assert_eq!(stub.calls(), 0);
    assert_eq!(pipeline.report().skipped_structural, 1);
}

#[tokio::test]
async fn garbage_description_is_rejected() {
    let mut pipeline = ValidationPipeline::new(None);
    let mut leaked = record();
    leaked.description_en = Some(format!("{DESCRIPTION} {{\"__typename\":\"Build\"}}"));
    assert!(pipeline.validate(leaked).await.is_none());
    assert_eq!(pipeline.report().skipped_garbage, 1);
}

#[tokio::test]
async fn garbage_pros_cons_is_nulled_not_rejected() {
    let mut pipeline = ValidationPipeline::new(None);
    let mut dirty = record();
    dirty.pros_cons_en = Some("window.__remixContext loaderData".to_string());

    let accepted = pipeline.validate(dirty).await.unwrap();
    assert!(accepted.pros_cons_en.is_none());
    assert_eq!(
        accepted.core_equipment_en.as_deref(),
        Some("Kaom's Heart, Rise of the Phoenix")
    );
}

#[tokio::test]
async fn both_optional_fields_empty_is_missing_required_field() {
    let mut pipeline = ValidationPipeline::new(None);
    let mut bare = record();
    bare.pros_cons_en = Some("{\"edges\": []}".to_string());
    bare.core_equipment_en = None;

    assert!(pipeline.validate(bare.clone()).await.is_none());
    assert_eq!(pipeline.report().skipped_garbage, 1);
    assert_eq!(sanitize(&mut bare), Err(Rejection::MissingRequiredField));
}

#[tokio::test]
async fn explicit_invalid_verdict_rejects_and_caches_draft() {
    let stub = VerdictStub::new(Some(
        "Here is my verdict:\n```json\n{\"valid\": false, \"issues\": [\"describes a PoE2 build\"]}\n```",
    ));
    let mut pipeline = pipeline_with(&stub);

    assert!(pipeline.validate(record()).await.is_none());
    assert_eq!(stub.calls(), 1);
    assert_eq!(pipeline.report().skipped_semantic, 1);
    let drafts = pipeline.rejected_drafts();
    assert_eq!(drafts.len(), 1);
    assert_eq!(drafts[0].issues, vec!["describes a PoE2 build"]);
    assert_eq!(drafts[0].record.source_id, "rf-jugg");
}

#[tokio::test]
async fn generator_failure_fails_open() {
    let stub = VerdictStub::new(None);
    let mut pipeline = pipeline_with(&stub);
    assert!(pipeline.validate(record()).await.is_some());
    assert_eq!(stub.calls(), 1);
    assert_eq!(pipeline.report().skipped_semantic, 0);
}

#[tokio::test]
async fn unparsable_verdict_fails_open() {
    let stub = VerdictStub::new(Some("looks fine to me"));
    let mut pipeline = pipeline_with(&stub);
    assert!(pipeline.validate(record()).await.is_some());
}

#[tokio::test]
async fn batch_counts_and_store_outcome() {
    let mut pipeline = ValidationPipeline::new(None);
    let mut short = record();
    short.description_en = None;
    let accepted = pipeline.validate_all(vec![record(), short, record()]).await;
    assert_eq!(accepted.len(), 2);

    pipeline.record_store_outcome(UpsertOutcome {
        saved: 2,
        skipped: 0,
    });
    let report = pipeline.report();
    assert_eq!(report.saved, 2);
    assert_eq!(report.skipped_structural, 1);
    assert_eq!(report.rejected(), 1);
}

#[test]
fn rejection_reasons_read_plainly() {
    assert_eq!(Rejection::DescriptionTooShort.to_string(), "description too short");
    assert_eq!(Rejection::MissingRequiredField.to_string(), "missing required field");
    assert_eq!(
        Rejection::Implausible {
            issues: vec!["a".to_string(), "b".to_string()]
        }
        .to_string(),
        "semantic check failed: a; b"
    );
}

#[test]
fn prompt_carries_fields() {
    let prompt = semantic_prompt(&record());
    assert!(prompt.contains("NAME: RF Juggernaut"));
    assert!(prompt.contains("CORE_EQUIPMENT: Kaom's Heart"));
    assert!(prompt.contains(r#"{"valid": true, "issues": []}"#));
}
