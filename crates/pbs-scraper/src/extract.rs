//! LLM-backed extraction of guide fields from page text or transcripts.
//!
//! The generator is asked to answer in a fixed labeled grammar:
//!
//! ```text
//! DESCRIPTION:
//! ...
//! PROS:
//! - ...
//! CONS:
//! - ...
//! CORE_EQUIPMENT:
//! - ...
//! CLASS: ...
//! ASCENDANCY: ...
//! ```
//!
//! Every failure path yields an empty [`DraftFields`]; extraction is never fatal.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;

use crate::garbage::is_garbage;
use crate::html::truncate_chars;
use crate::llm::TextGenerator;

const MIN_INPUT_CHARS: usize = 50;
const MAX_PROMPT_TEXT_CHARS: usize = 8000;
const MAX_LABEL_VALUE_CHARS: usize = 50;

static LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*(DESCRIPTION|PROS|CONS|CORE_EQUIPMENT|CLASS|ASCENDANCY)[ \t]*:")
        .expect("valid label regex")
});
static BULLET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-*•]\s*").expect("valid bullet regex"));

/// Fields recovered from one guide. Any slot may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DraftFields {
    pub description: Option<String>,
    pub pros_cons: Option<String>,
    pub core_equipment: Option<String>,
    pub class: Option<String>,
    pub ascendancy: Option<String>,
}

impl DraftFields {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filled() == 0
    }

    #[must_use]
    pub fn filled(&self) -> usize {
        [
            &self.description,
            &self.pros_cons,
            &self.core_equipment,
            &self.class,
            &self.ascendancy,
        ]
        .iter()
        .filter(|slot| slot.is_some())
        .count()
    }
}

/// Field extractor bound to a generator and per-call timeout.
#[derive(Clone)]
pub struct FieldExtractor {
    generator: Arc<dyn TextGenerator>,
    timeout: Duration,
}

impl FieldExtractor {
    pub fn new(generator: Arc<dyn TextGenerator>, timeout: Duration) -> Self {
        Self { generator, timeout }
    }

    /// Extract fields from a guide page's readable text.
    ///
    /// Input shorter than 50 characters (after trimming) returns an empty
    /// draft without calling the generator.
    pub async fn extract(&self, page_text: &str, item_name: &str) -> DraftFields {
        if page_text.trim().chars().count() < MIN_INPUT_CHARS {
            tracing::debug!(item = item_name, "page text too short for extraction");
            return DraftFields::default();
        }

        let prompt = build_prompt(truncate_chars(page_text, MAX_PROMPT_TEXT_CHARS));
        match self.generator.generate(&prompt, self.timeout).await {
            Ok(output) => {
                let draft = parse_output(&output);
                tracing::info!(
                    item = item_name,
                    filled = draft.filled(),
                    output_chars = output.len(),
                    "extracted guide fields"
                );
                draft
            }
            Err(e) => {
                tracing::warn!(item = item_name, error = %e, "field extraction failed");
                DraftFields::default()
            }
        }
    }

    /// Extract fields from a video transcript.
    ///
    /// The text is prefixed with instructions to skip spoken filler and to
    /// describe only the main build when several are shown.
    pub async fn extract_transcript(&self, transcript: &str, item_name: &str) -> DraftFields {
        if transcript.trim().chars().count() < MIN_INPUT_CHARS {
            return DraftFields::default();
        }
        let text = format!(
            "The following text is an automatic transcript of a video.\n\
             Ignore filler words (uh, um, like) and extract only build information.\n\
             If several builds are presented, extract the main build.\n\n{transcript}"
        );
        self.extract(&text, item_name).await
    }
}

fn build_prompt(text: &str) -> String {
    format!(
        "The text below was taken from a Path of Exile 1 build guide page.\n\
         Extract the build guide information from it.\n\
         \n\
         Important:\n\
         - Ignore site navigation, footers, privacy policies, JavaScript code,\n\
           cookie banners, ads and UI instructions (drag, space bar, etc).\n\
         - Use only the body of the build guide.\n\
         - Do not list currency items (Divine Orb, Chaos Orb, Exalted Orb, etc) as equipment.\n\
         \n\
         Answer in English using exactly this format:\n\
         \n\
         DESCRIPTION:\n\
         [2-3 sentences: main skill, combat style (melee/ranged/caster/summoner), key synergies]\n\
         \n\
         PROS:\n\
         - [strength]\n\
         (3-5 items)\n\
         \n\
         CONS:\n\
         - [weakness]\n\
         (3-5 items)\n\
         \n\
         CORE_EQUIPMENT:\n\
         - [core unique, item or jewel]\n\
         (3-8 items, no currency)\n\
         \n\
         CLASS: [class name]\n\
         ASCENDANCY: [ascendancy name]\n\
         \n\
         Page text:\n\
         {text}"
    )
}

/// Slice the labeled sections out of generator output.
///
/// A section runs from its label to the next recognized label or the end of
/// the text. Only the first occurrence of each label counts.
fn sections(output: &str) -> Vec<(&str, &str)> {
    let labels: Vec<_> = LABEL_RE
        .captures_iter(output)
        .filter_map(|cap| Some((cap.get(0)?, cap.get(1)?.as_str())))
        .collect();

    let mut out: Vec<(&str, &str)> = Vec::new();
    for (i, (whole, label)) in labels.iter().enumerate() {
        let end = labels
            .get(i + 1)
            .map_or(output.len(), |(next, _)| next.start());
        if out.iter().any(|(seen, _)| seen == label) {
            continue;
        }
        out.push((label, output[whole.end()..end].trim()));
    }
    out
}

/// Parse generator output into a draft, dropping garbage and implausible values.
#[must_use]
pub fn parse_output(output: &str) -> DraftFields {
    let parts = sections(output);
    let section = |name: &str| -> Option<&str> {
        parts
            .iter()
            .find(|(label, _)| *label == name)
            .map(|(_, body)| *body)
            .filter(|body| !body.is_empty())
    };

    let description = section("DESCRIPTION")
        .filter(|d| !is_garbage(d))
        .map(str::to_string);

    let pros = section("PROS").unwrap_or_default();
    let cons = section("CONS").unwrap_or_default();
    let pros_cons = if pros.is_empty() && cons.is_empty() {
        None
    } else {
        let mut blocks = Vec::new();
        if !pros.is_empty() {
            blocks.push(format!("Pros:\n{pros}"));
        }
        if !cons.is_empty() {
            blocks.push(format!("Cons:\n{cons}"));
        }
        Some(blocks.join("\n\n")).filter(|combined| !is_garbage(combined))
    };

    let core_equipment = section("CORE_EQUIPMENT").and_then(|raw| {
        let items: Vec<String> = raw
            .lines()
            .map(|line| BULLET_RE.replace(line.trim(), "").trim().to_string())
            .filter(|line| line.chars().count() > 1)
            .collect();
        if items.is_empty() {
            return None;
        }
        Some(items.join(", ")).filter(|joined| !is_garbage(joined))
    });

    DraftFields {
        description,
        pros_cons,
        core_equipment,
        class: short_label(section("CLASS")),
        ascendancy: short_label(section("ASCENDANCY")),
    }
}

fn short_label(body: Option<&str>) -> Option<String> {
    let first_line = body?.lines().next()?.trim();
    if first_line.is_empty() || first_line.chars().count() >= MAX_LABEL_VALUE_CHARS {
        return None;
    }
    Some(first_line.to_string())
}

#[cfg(test)]
#[path = "extract_test.rs"]
mod tests;
