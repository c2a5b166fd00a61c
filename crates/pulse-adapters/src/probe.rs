//! Defensive extraction from inconsistent upstream JSON.
//!
//! The platform profile APIs are undocumented and drift across
//! versions and mirrors: the top-level wrapper key varies, and each
//! logical field may appear under several names. Extraction is an
//! ordered probe over candidate keys, stopping at the first hit, so
//! the priority order stays explicit and testable.

use serde_json::Value as JsonValue;

/// Wrapper keys tried, in order, before falling back to the bare object.
pub const WRAPPER_KEYS: &[&str] = &["profile", "info", "data"];

/// Unwrap the payload object from its (optional) top-level wrapper.
pub fn unwrap_payload(value: &JsonValue) -> &JsonValue {
    for key in WRAPPER_KEYS {
        if let Some(inner) = value.get(key) {
            if inner.is_object() {
                return inner;
            }
        }
    }
    value
}

/// First candidate key holding a non-empty string.
pub fn first_str<'a>(value: &'a JsonValue, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|key| {
        value
            .get(*key)
            .and_then(JsonValue::as_str)
            .filter(|s| !s.trim().is_empty())
    })
}

/// First candidate key holding something integer-like. Upstreams
/// disagree on whether counters are numbers or numeric strings.
pub fn first_u64(value: &JsonValue, keys: &[&str]) -> Option<u64> {
    keys.iter().find_map(|key| value.get(*key).and_then(as_u64_like))
}

/// Coerce a scalar into a non-negative integer when plausible.
pub fn as_u64_like(value: &JsonValue) -> Option<u64> {
    if let Some(n) = value.as_u64() {
        return Some(n);
    }
    if let Some(f) = value.as_f64() {
        if f.is_finite() && f >= 0.0 {
            return Some(f.round() as u64);
        }
    }
    value.as_str().and_then(|s| s.trim().parse().ok())
}

/// First candidate key holding an array; each element contributes its
/// string form, or the first present of the given name keys when the
/// element is an object.
pub fn first_str_array(value: &JsonValue, keys: &[&str], name_keys: &[&str]) -> Option<Vec<String>> {
    let array = keys.iter().find_map(|key| value.get(*key).and_then(JsonValue::as_array))?;
    let names: Vec<String> = array
        .iter()
        .filter_map(|entry| {
            entry
                .as_str()
                .map(str::to_string)
                .or_else(|| first_str(entry, name_keys).map(str::to_string))
        })
        .collect();
    Some(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unwraps_wrapper_keys_in_priority_order() {
        let wrapped = json!({ "data": { "rank": 3 }, "profile": { "rank": 1 } });
        assert_eq!(unwrap_payload(&wrapped)["rank"], 1);

        let bare = json!({ "rank": 7 });
        assert_eq!(unwrap_payload(&bare)["rank"], 7);
    }

    #[test]
    fn non_object_wrapper_is_ignored() {
        let value = json!({ "info": "not an object", "rank": 9 });
        assert_eq!(unwrap_payload(&value)["rank"], 9);
    }

    #[test]
    fn first_u64_coalesces_in_declared_order() {
        let value = json!({ "rank": 450, "ranking": 120 });
        assert_eq!(first_u64(&value, &["ranking", "rank", "global_ranking"]), Some(120));
        assert_eq!(first_u64(&value, &["global_ranking", "rank"]), Some(450));
    }

    #[test]
    fn integer_like_strings_and_floats_coerce() {
        let value = json!({ "points": "1337", "rating": 912.4 });
        assert_eq!(first_u64(&value, &["points"]), Some(1337));
        assert_eq!(first_u64(&value, &["rating"]), Some(912));
    }

    #[test]
    fn non_numeric_candidates_are_passed_over() {
        // "rank" carries the rank *name* on some mirrors; the numeric
        // probe must skip it rather than fail.
        let value = json!({ "rank": "Pro Hacker", "ranking": 88 });
        assert_eq!(first_u64(&value, &["rank", "ranking"]), Some(88));
    }

    #[test]
    fn empty_strings_do_not_count_as_present() {
        let value = json!({ "name": "", "username": "takeshi" });
        assert_eq!(first_str(&value, &["name", "username"]), Some("takeshi"));
    }

    #[test]
    fn empty_candidate_falls_through_to_later_keys() {
        // Mirrors carrying the key with a blank value must not mask a
        // populated fallback further down the priority list.
        let value = json!({ "rank_name": "", "rank_text": "Pro Hacker" });
        assert_eq!(
            first_str(&value, &["rank_name", "rank_text", "rank"]),
            Some("Pro Hacker")
        );
        assert_eq!(first_str(&value, &["rank_name"]), None);
    }

    #[test]
    fn badge_arrays_accept_strings_and_objects() {
        let value = json!({ "badges": [ "First Blood", { "name": "Webbed" }, { "title": "cat linux.txt" } ] });
        assert_eq!(
            first_str_array(&value, &["badges"], &["name", "title"]),
            Some(vec![
                "First Blood".to_string(),
                "Webbed".to_string(),
                "cat linux.txt".to_string()
            ])
        );
    }
}
