//! Detection of structured-data leaks in scraped text.
//!
//! Guide pages embed framework state (Remix loader data, Apollo caches,
//! JSON-LD) that sometimes bleeds into extracted prose. Any text this module
//! flags must never be stored as a description, pros/cons or equipment field.

/// Tokens that only appear when serialized framework state leaked into text.
const SIGNATURES: &[&str] = &[
    "__typename",
    "__APOLLO_STATE__",
    "apolloState",
    "__NEXT_DATA__",
    "__remixContext",
    "loaderData",
    "\"@type\"",
    "\"$type\"",
    "\"edges\":",
    "\"node\":",
    "\"cursor\":",
    "\"pageInfo\"",
];

/// Share of structural characters above which text is treated as serialized data.
const STRUCTURAL_RATIO_LIMIT: f64 = 0.05;

/// Returns `true` when `text` is empty or looks like leaked structured data.
///
/// Text is garbage if it is blank, contains a known framework signature, or
/// if braces plus `":` pairs make up more than 5% of its characters.
#[must_use]
pub fn is_garbage(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return true;
    }

    if SIGNATURES.iter().any(|sig| trimmed.contains(sig)) {
        return true;
    }

    structural_ratio(trimmed) > STRUCTURAL_RATIO_LIMIT
}

/// `None` when the value is absent or garbage, else the value unchanged.
#[must_use]
pub fn clean_optional(value: Option<String>) -> Option<String> {
    value.filter(|v| !is_garbage(v))
}

#[allow(clippy::cast_precision_loss)]
fn structural_ratio(text: &str) -> f64 {
    let chars = text.chars().count();
    if chars == 0 {
        return 0.0;
    }
    let braces = text.chars().filter(|c| matches!(c, '{' | '}')).count();
    let pairs = text.matches("\":").count();
    (braces + pairs) as f64 / chars as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_text_is_garbage() {
        assert!(is_garbage(""));
        assert!(is_garbage("   \n\t"));
    }

    #[test]
    fn every_signature_flags_otherwise_clean_text() {
        let filler = "This is a perfectly ordinary sentence about a build guide. ".repeat(10);
        for sig in SIGNATURES {
            let text = format!("{filler}{sig}{filler}");
            assert!(is_garbage(&text), "signature {sig} not detected");
        }
    }

    #[test]
    fn prose_is_not_garbage() {
        let text = "Righteous Fire Juggernaut is a tanky league starter that burns \
                    packs while you walk through maps. It scales well into uber bosses.";
        assert!(!is_garbage(text));
    }

    #[test]
    fn dense_json_is_garbage() {
        let text = r#"{"id":1,"name":"RF","class":"Marauder","tags":{"a":1,"b":2}}"#;
        assert!(is_garbage(text));
    }

    #[test]
    fn occasional_braces_in_long_prose_are_tolerated() {
        let prose = "Use the {Cyclone} setup from the video and swap to the boss setup later. ".repeat(3);
        assert!(!is_garbage(&prose));
    }

    #[test]
    fn clean_optional_drops_garbage_only() {
        assert_eq!(clean_optional(None), None);
        assert_eq!(clean_optional(Some("{\"a\":1}".into())), None);
        assert_eq!(
            clean_optional(Some("Strong clear speed".into())).as_deref(),
            Some("Strong clear speed")
        );
    }
}
