//! Common API utilities and shared types
//!
//! Query-string and body helpers shared by the filter endpoints.

use serde::{Deserialize, Deserializer};

/// Decode a raw query string into key/value pairs, keeping repeated keys.
///
/// `+` is read as a space; pairs that fail to decode are skipped.
pub fn query_pairs(raw: Option<&str>) -> Vec<(String, String)> {
    let Some(raw) = raw else {
        return Vec::new();
    };

    raw.split('&')
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let key = urlencoding::decode(&key.replace('+', " ")).ok()?.into_owned();
            let value = urlencoding::decode(&value.replace('+', " ")).ok()?.into_owned();
            Some((key, value))
        })
        .collect()
}

/// Every non-empty value given for `key`, in order
pub fn query_values(pairs: &[(String, String)], key: &str) -> Vec<String> {
    pairs
        .iter()
        .filter(|(k, _)| k == key)
        .map(|(_, v)| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

/// Last value given for `key`
pub fn query_value<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .rev()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// `true`, `1`, `yes` and `on` (any case) are true; anything else is false
pub fn parse_flag(value: Option<&str>) -> bool {
    matches!(
        value.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("true" | "1" | "yes" | "on")
    )
}

/// Deserialize a present field, `null` included, as `Some(..)`.
///
/// Paired with `#[serde(default)]` an absent field stays `None`, so an update
/// body can tell "leave unchanged" from "clear".
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "double_option")]
        parent: Option<Option<String>>,
    }

    #[test]
    fn test_query_pairs_keeps_repeats_and_decodes() {
        let pairs = query_pairs(Some("filters=defi&filters=layer%202&page=2&filters=&flag"));

        assert_eq!(query_values(&pairs, "filters"), vec!["defi", "layer 2"]);
        assert_eq!(query_value(&pairs, "page"), Some("2"));
        assert_eq!(query_value(&pairs, "flag"), Some(""));
        assert_eq!(query_value(&pairs, "limit"), None);
        assert!(query_pairs(None).is_empty());
    }

    #[test]
    fn test_plus_is_space() {
        let pairs = query_pairs(Some("q=a+b"));
        assert_eq!(query_value(&pairs, "q"), Some("a b"));
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag(Some("true")));
        assert!(parse_flag(Some("TRUE")));
        assert!(parse_flag(Some("1")));
        assert!(!parse_flag(Some("false")));
        assert!(!parse_flag(Some("")));
        assert!(!parse_flag(None));
    }

    #[test]
    fn test_double_option() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        let null: Patch = serde_json::from_str(r#"{"parent": null}"#).unwrap();
        let set: Patch = serde_json::from_str(r#"{"parent": "x"}"#).unwrap();

        assert_eq!(absent.parent, None);
        assert_eq!(null.parent, Some(None));
        assert_eq!(set.parent, Some(Some("x".to_string())));
    }
}
