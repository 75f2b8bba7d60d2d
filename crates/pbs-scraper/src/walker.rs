//! Bounded-depth traversal of nested JSON payloads.
//!
//! Used when a page's embedded state does not follow a known schema path.
//! Depth is capped so hostile or cyclic-looking payloads cannot blow the stack.

use serde_json::{Map, Value};

pub const MAX_DEPTH: usize = 32;

/// Collect every object (at any depth up to [`MAX_DEPTH`]) for which
/// `predicate` returns `true`. Matching objects are not descended into.
pub fn collect_objects<'a, P>(root: &'a Value, predicate: P) -> Vec<&'a Map<String, Value>>
where
    P: Fn(&Map<String, Value>) -> bool,
{
    let mut out = Vec::new();
    walk(root, 0, &predicate, &mut out);
    out
}

fn walk<'a, P>(value: &'a Value, depth: usize, predicate: &P, out: &mut Vec<&'a Map<String, Value>>)
where
    P: Fn(&Map<String, Value>) -> bool,
{
    if depth > MAX_DEPTH {
        return;
    }
    match value {
        Value::Object(map) => {
            if predicate(map) {
                out.push(map);
                return;
            }
            for child in map.values() {
                walk(child, depth + 1, predicate, out);
            }
        }
        Value::Array(items) => {
            for child in items {
                walk(child, depth + 1, predicate, out);
            }
        }
        _ => {}
    }
}

/// Follow `path` through nested objects, returning the value at its end.
#[must_use]
pub fn at_path<'a>(root: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(root, |node, key| node.get(key))
}

/// First string value among `keys` on `map`, trimmed and non-empty.
#[must_use]
pub fn first_str<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|key| map.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
}

/// First value among `keys` on `map` that is not null.
#[must_use]
pub fn first_value<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| map.get(*key))
        .find(|v| !v.is_null())
}

/// Names from a list that may hold plain strings or objects with a `name`
/// (falling back to `id`) field.
#[must_use]
pub fn names_in_list(value: Option<&Value>) -> Vec<String> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Object(obj) => first_str(obj, &["name", "id"]).map(str::to_string),
            _ => None,
        })
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn collects_matching_objects_at_any_depth() {
        let value = json!({
            "a": {"b": [{"name": "RF", "className": "Marauder"}, {"name": "no class"}]},
            "c": {"name": "Cyclone", "ascendancyName": "Slayer"}
        });
        let found = collect_objects(&value, |m| m.contains_key("name") && (m.contains_key("className") || m.contains_key("ascendancyName")));
        let mut names: Vec<_> = found
            .iter()
            .filter_map(|m| m.get("name").and_then(Value::as_str))
            .collect();
        names.sort_unstable();
        assert_eq!(names, vec!["Cyclone", "RF"]);
    }

    #[test]
    fn depth_is_bounded() {
        let mut value = json!({"name": "deep", "class": "Witch"});
        for _ in 0..(MAX_DEPTH + 5) {
            value = json!({ "next": value });
        }
        let found = collect_objects(&value, |m| m.contains_key("class"));
        assert!(found.is_empty());
    }

    #[test]
    fn path_lookup() {
        let value = json!({"state": {"loaderData": {"route": 1}}});
        assert_eq!(at_path(&value, &["state", "loaderData", "route"]), Some(&json!(1)));
        assert!(at_path(&value, &["state", "missing"]).is_none());
    }

    #[test]
    fn names_from_mixed_list() {
        let value = json!(["Cyclone", {"name": "Fortify"}, {"id": "poe-tanky"}, 3, ""]);
        assert_eq!(
            names_in_list(Some(&value)),
            vec!["Cyclone", "Fortify", "poe-tanky"]
        );
    }

    #[test]
    fn first_str_skips_blank() {
        let value = json!({"title": "  ", "name": "Boneshatter"});
        let map = value.as_object().unwrap();
        assert_eq!(first_str(map, &["title", "name"]), Some("Boneshatter"));
    }
}
