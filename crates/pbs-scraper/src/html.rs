//! Regex-based HTML helpers for guide pages.
//!
//! These are deliberately forgiving: malformed markup yields empty strings or
//! `None` rather than errors.

use std::sync::LazyLock;

use regex::Regex;

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]+>").expect("valid tag regex"));
static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid ws regex"));
static INLINE_WS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t\u{a0}]+").expect("valid inline ws regex"));
static NOISE_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style|noscript|svg|nav|header|footer|template)\b[^>]*>.*?</(script|style|noscript|svg|nav|header|footer|template)>")
        .expect("valid noise block regex")
});
static COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid comment regex"));
static BLOCK_BREAK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<(br|/p|/div|/li|/h[1-6]|/tr|/section|/article|/ul|/ol)\b[^>]*>")
        .expect("valid block break regex")
});
static H1_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<h1[^>]*>(.*?)</h1>").expect("valid h1 regex"));
static PARAGRAPH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<p\b[^>]*>(.*?)</p>").expect("valid paragraph regex"));
static ARTICLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<article[^>]*>(.*?)</article>").expect("valid article regex")
});
static BODY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<body[^>]*>(.*)</body>").expect("valid body regex"));
static NEXT_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\b[^>]*rel\s*=\s*["']next["'][^>]*>|<a\b[^>]*>\s*(?:<[^>]+>\s*)*Next\b"#)
        .expect("valid next link regex")
});
static ANCHOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\b[^>]*href\s*=\s*["']([^"']+)["'][^>]*>(.*?)</a>"#)
        .expect("valid anchor regex")
});

/// Strip tags, decode common entities and collapse whitespace to single spaces.
#[must_use]
pub fn clean_text(input: &str) -> String {
    let without_tags = TAG_RE.replace_all(input, " ");
    let decoded = decode_entities(&without_tags);
    WS_RE.replace_all(&decoded, " ").trim().to_string()
}

/// Text of the first `<h1>`, cleaned; empty when absent.
#[must_use]
pub fn extract_h1(html: &str) -> String {
    H1_RE
        .captures(html)
        .and_then(|cap| cap.get(1).map(|m| clean_text(m.as_str())))
        .unwrap_or_default()
}

/// First non-empty paragraph, preferring paragraphs inside `<article>`.
#[must_use]
pub fn extract_first_paragraph(html: &str) -> String {
    let scope = ARTICLE_RE
        .captures(html)
        .and_then(|cap| cap.get(1))
        .map_or(html, |m| m.as_str());

    PARAGRAPH_RE
        .captures_iter(scope)
        .filter_map(|cap| cap.get(1).map(|m| clean_text(m.as_str())))
        .find(|text| !text.is_empty())
        .unwrap_or_default()
}

/// Readable body text: noise blocks removed, one line per block element,
/// blank lines dropped.
#[must_use]
pub fn page_text(html: &str) -> String {
    let body = BODY_RE
        .captures(html)
        .and_then(|cap| cap.get(1))
        .map_or(html, |m| m.as_str());
    let stripped = COMMENT_RE.replace_all(body, " ");
    let stripped = NOISE_BLOCK_RE.replace_all(&stripped, " ");
    let broken = BLOCK_BREAK_RE.replace_all(&stripped, "\n");
    let without_tags = TAG_RE.replace_all(&broken, " ");
    let decoded = decode_entities(&without_tags);

    decoded
        .lines()
        .map(|line| INLINE_WS_RE.replace_all(line, " ").trim().to_string())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Whether the page links to a following listing page.
#[must_use]
pub fn has_next_link(html: &str) -> bool {
    NEXT_LINK_RE.is_match(html)
}

/// Cleaned inner text of every element whose `class` attribute contains `class_name`.
#[must_use]
pub fn texts_by_class(html: &str, class_name: &str) -> Vec<String> {
    let pattern = format!(
        r#"(?is)<([a-z][a-z0-9-]*)\b[^>]*class\s*=\s*["'][^"']*\b{}\b[^"']*["'][^>]*>(.*?)</[a-z][a-z0-9-]*>"#,
        regex::escape(class_name)
    );
    let Ok(re) = Regex::new(&pattern) else {
        return Vec::new();
    };
    re.captures_iter(html)
        .filter_map(|cap| cap.get(2).map(|m| clean_text(m.as_str())))
        .filter(|text| !text.is_empty())
        .collect()
}

/// Cleaned text of anchors whose `href` contains any of `href_fragments`.
#[must_use]
pub fn anchor_texts_matching(html: &str, href_fragments: &[&str]) -> Vec<String> {
    ANCHOR_RE
        .captures_iter(html)
        .filter(|cap| {
            cap.get(1)
                .is_some_and(|href| href_fragments.iter().any(|f| href.as_str().contains(f)))
        })
        .filter_map(|cap| cap.get(2).map(|m| clean_text(m.as_str())))
        .filter(|text| !text.is_empty())
        .collect()
}

/// Body of the first `<script>` whose attributes contain `id="{id}"`.
#[must_use]
pub fn script_by_id<'a>(html: &'a str, id: &str) -> Option<&'a str> {
    let pattern = format!(
        r#"(?is)<script[^>]*\bid\s*=\s*["']{}["'][^>]*>(.*?)</script>"#,
        regex::escape(id)
    );
    let re = Regex::new(&pattern).ok()?;
    re.captures(html)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
}

/// The JSON object literal assigned to `marker` in an inline script, e.g.
/// `window.__remixContext = {...};`.
///
/// The object is delimited by brace matching that skips over string literals,
/// so braces inside strings do not end it early.
#[must_use]
pub fn assigned_json_object<'a>(html: &'a str, marker: &str) -> Option<&'a str> {
    let after_marker = html.find(marker)? + marker.len();
    let rest = &html[after_marker..];
    let start = after_marker + rest.find('{')?;
    let between = &html[after_marker..start];
    if !between.trim().trim_start_matches('=').trim().is_empty() {
        return None;
    }

    let bytes = html.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, &b) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&html[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Truncate to at most `max_chars` characters on a char boundary.
#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn decode_entities(input: &str) -> String {
    input
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&rsquo;", "'")
        .replace("&lsquo;", "'")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_text_strips_tags_and_entities() {
        assert_eq!(
            clean_text("<b>Kaom&#39;s</b>\n  <i>Heart</i> &amp; more"),
            "Kaom's Heart & more"
        );
    }

    #[test]
    fn h1_and_first_paragraph() {
        let html = "<html><body><h1> RF <em>Juggernaut</em></h1>\
                    <p></p><article><p>  </p><p>Burns <b>everything</b> nearby</p></article></body></html>";
        assert_eq!(extract_h1(html), "RF Juggernaut");
        assert_eq!(extract_first_paragraph(html), "Burns everything nearby");
    }

    #[test]
    fn page_text_drops_scripts_and_keeps_lines() {
        let html = "<body><nav>Home | Builds</nav><script>var x = {\"a\":1};</script>\
                    <h2>Pros</h2><ul><li>Tanky</li><li>Cheap</li></ul><footer>Cookies</footer></body>";
        let text = page_text(html);
        assert_eq!(text, "Pros\nTanky\nCheap");
    }

    #[test]
    fn next_link_detection() {
        assert!(has_next_link(r#"<a href="/page/2" rel="next">2</a>"#));
        assert!(has_next_link(r#"<a href="/page/2"><span>Next</span></a>"#));
        assert!(!has_next_link(r#"<a href="/page/1">Previous</a>"#));
    }

    #[test]
    fn texts_by_class_collects_matches() {
        let html = r#"<span class="poe-item gem">Cyclone</span><span class="other">x</span>
                      <a class="poe-item" href="/i">Kaom's Heart</a>"#;
        assert_eq!(texts_by_class(html, "poe-item"), vec!["Cyclone", "Kaom's Heart"]);
    }

    #[test]
    fn anchors_filtered_by_href() {
        let html = r#"<a href="/poe/items/kaoms-heart">Kaom's Heart</a><a href="/about">About</a>"#;
        assert_eq!(anchor_texts_matching(html, &["/poe/items/"]), vec!["Kaom's Heart"]);
    }

    #[test]
    fn assigned_json_object_handles_braces_in_strings() {
        let html = r#"<script>window.__remixContext = {"a":"}{","b":{"c":1}};</script>"#;
        let json = assigned_json_object(html, "window.__remixContext").unwrap();
        assert_eq!(json, r#"{"a":"}{","b":{"c":1}}"#);
        let value: serde_json::Value = serde_json::from_str(json).unwrap();
        assert_eq!(value["b"]["c"], 1);
    }

    #[test]
    fn assigned_json_object_missing_marker() {
        assert!(assigned_json_object("<p>nothing</p>", "window.__remixContext").is_none());
    }

    #[test]
    fn script_by_id_reads_next_data() {
        let html = r#"<script id="__NEXT_DATA__" type="application/json">{"props":{}}</script>"#;
        assert_eq!(script_by_id(html, "__NEXT_DATA__"), Some(r#"{"props":{}}"#));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("日本語テキスト", 3), "日本語");
        assert_eq!(truncate_chars("short", 10), "short");
    }
}
