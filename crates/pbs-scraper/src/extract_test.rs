use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;

use super::*;
use crate::llm::GenerateError;

struct StubGenerator {
    reply: Result<String, ()>,
    calls: AtomicU32,
}

impl StubGenerator {
    fn replying(text: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(text.to_string()),
            calls: AtomicU32::new(0),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            reply: Err(()),
            calls: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl TextGenerator for StubGenerator {
    async fn generate(&self, _prompt: &str, timeout: Duration) -> Result<String, GenerateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply.clone().map_err(|()| GenerateError::Timeout(timeout))
    }
}

const FULL_OUTPUT: &str = "\
DESCRIPTION:
Righteous Fire Juggernaut burns enemies with a fire degen aura while regenerating life.

PROS:
- Very tanky
- Cheap to start

CONS:
- Slow boss damage

CORE_EQUIPMENT:
- Kaom's Heart
* Rise of the Phoenix
• x
- Dream Fragments

CLASS: Marauder
ASCENDANCY: Juggernaut
";

const PAGE: &str = "Righteous Fire guide. This page explains the whole build in depth, \
                    from leveling to endgame, with gear and passive trees.";

fn extractor(generator: Arc<StubGenerator>) -> FieldExtractor {
    FieldExtractor::new(generator, Duration::from_secs(1))
}

#[test]
fn parses_every_section() {
    let draft = parse_output(FULL_OUTPUT);
    assert_eq!(
        draft.description.as_deref(),
        Some("Righteous Fire Juggernaut burns enemies with a fire degen aura while regenerating life.")
    );
    assert_eq!(
        draft.pros_cons.as_deref(),
        Some("Pros:\n- Very tanky\n- Cheap to start\n\nCons:\n- Slow boss damage")
    );
    assert_eq!(
        draft.core_equipment.as_deref(),
        Some("Kaom's Heart, Rise of the Phoenix, Dream Fragments")
    );
    assert_eq!(draft.class.as_deref(), Some("Marauder"));
    assert_eq!(draft.ascendancy.as_deref(), Some("Juggernaut"));
    assert_eq!(draft.filled(), 5);
}

#[test]
fn missing_sections_are_none() {
    let draft = parse_output("DESCRIPTION:\nA short but valid description of a build.\n");
    assert!(draft.description.is_some());
    assert!(draft.pros_cons.is_none());
    assert!(draft.core_equipment.is_none());
    assert!(draft.class.is_none());
}

#[test]
fn cons_only_still_produces_pros_cons() {
    let draft = parse_output("CONS:\n- Squishy\n");
    assert_eq!(draft.pros_cons.as_deref(), Some("Cons:\n- Squishy"));
}

#[test]
fn garbage_description_is_dropped() {
    let draft = parse_output("DESCRIPTION:\n{\"__typename\":\"Build\"}\nCLASS: Witch\n");
    assert!(draft.description.is_none());
    assert_eq!(draft.class.as_deref(), Some("Witch"));
}

#[test]
fn overlong_class_is_rejected() {
    let long = "x".repeat(60);
    let draft = parse_output(&format!("CLASS: {long}\nASCENDANCY: \n"));
    assert!(draft.class.is_none());
    assert!(draft.ascendancy.is_none());
}

#[test]
fn unstructured_output_yields_empty_draft() {
    assert!(parse_output("I could not find a build guide in this text.").is_empty());
}

#[tokio::test]
async fn short_input_skips_generator() {
    let stub = StubGenerator::replying(FULL_OUTPUT);
    let draft = extractor(Arc::clone(&stub)).extract("   tiny   ", "tiny").await;
    assert!(draft.is_empty());
    assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn generator_failure_yields_empty_draft() {
    let stub = StubGenerator::failing();
    let draft = extractor(Arc::clone(&stub)).extract(PAGE, "rf").await;
    assert!(draft.is_empty());
    assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn successful_extraction_parses_reply() {
    let stub = StubGenerator::replying(FULL_OUTPUT);
    let draft = extractor(Arc::clone(&stub)).extract(PAGE, "rf").await;
    assert_eq!(draft.class.as_deref(), Some("Marauder"));
    assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn transcript_mode_calls_generator() {
    let stub = StubGenerator::replying(FULL_OUTPUT);
    let draft = extractor(Arc::clone(&stub))
        .extract_transcript(PAGE, "video")
        .await;
    assert_eq!(draft.ascendancy.as_deref(), Some("Juggernaut"));
    assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn prompt_contains_grammar_and_text() {
    let prompt = build_prompt("PAGE BODY");
    for label in ["DESCRIPTION:", "PROS:", "CONS:", "CORE_EQUIPMENT:", "CLASS:", "ASCENDANCY:"] {
        assert!(prompt.contains(label), "missing {label}");
    }
    assert!(prompt.ends_with("PAGE BODY"));
}
