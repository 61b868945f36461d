//! Query string parsing with bracket-notation folding.
//!
//! Flat `name=value` pairs can encode nested structure through bracket syntax:
//! `zz[q1]=a` nests under `zz`, `arr[]=1&arr[]=2` appends under sequential
//! integer keys. The same algorithm backs both URL query strings and
//! `application/x-www-form-urlencoded` request bodies.

use serde_json::{Map, Value};

use super::body::is_truthy;

/// Parses a query string into a JSON object.
///
/// Tokens are split on `&`, then on the first `=`. Names are percent-decoded.
/// Values consisting only of ASCII digits become integers, everything else is
/// percent-decoded text; a token without `=` maps to `null`.
pub(crate) fn parse(query: &str) -> Map<String, Value> {
    let mut result = Map::new();
    if query.is_empty() {
        return result;
    }

    for token in query.split('&') {
        let (name, value) = match token.split_once('=') {
            Some((name, rest)) => (percent_decode(name), decode_value(rest)),
            None => (percent_decode(token), Value::Null),
        };
        fold_pair(&mut result, name, value);
    }

    collapse_array_like(&mut result);
    result
}

fn decode_value(raw: &str) -> Value {
    if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
        // Digit-only values that overflow i64 stay textual.
        return raw.parse::<i64>().map(Value::from).unwrap_or_else(|_| Value::String(raw.to_string()));
    }
    Value::String(percent_decode(raw))
}

/// Merges one `(name, value)` pair into `result`.
///
/// A name of the form `base[key]` folds into a nested object under `base`;
/// anything else assigns directly, overwriting earlier values. An empty
/// bracket key becomes the current entry count of the nested object, which is
/// what makes `arr[]=..&arr[]=..` accumulate sequential indexes.
pub(crate) fn fold_pair(result: &mut Map<String, Value>, name: String, value: Value) {
    let Some((base, key)) = split_bracket(&name) else {
        result.insert(name, value);
        return;
    };

    let base = base.to_string();
    let key = strip_quotes(key);

    match result.get(&base) {
        Some(Value::Object(_)) => {}
        // A truthy scalar already stored under the base name wins; a falsy one
        // is replaced by a fresh object.
        Some(existing) if is_truthy(existing) => return,
        _ => {
            result.insert(base.clone(), Value::Object(Map::new()));
        }
    }

    if let Some(Value::Object(entries)) = result.get_mut(&base) {
        let key = if key.is_empty() { entries.len().to_string() } else { key };
        entries.insert(key, value);
    }
}

/// Rewrites nested objects whose keys are exactly `"0".."n-1"` into arrays.
pub(crate) fn collapse_array_like(result: &mut Map<String, Value>) {
    for value in result.values_mut() {
        if let Value::Object(entries) = value {
            let sequential =
                !entries.is_empty() && entries.keys().enumerate().all(|(index, key)| *key == index.to_string());
            if sequential {
                let entries = std::mem::take(entries);
                *value = Value::Array(entries.into_iter().map(|(_, item)| item).collect());
            }
        }
    }
}

/// Splits `base[key]` on its last `[`..`]` pair. The base must be non-empty;
/// text after the closing bracket is ignored.
fn split_bracket(name: &str) -> Option<(&str, &str)> {
    let close = name.rfind(']')?;
    let open = name[..close].rfind('[')?;
    if open == 0 {
        return None;
    }
    Some((&name[..open], &name[open + 1..close]))
}

/// Strips one matching leading and one trailing quote (`'` or `"`) from a
/// bracket key, so `b['three']` and `b[three]` address the same property.
fn strip_quotes(key: &str) -> String {
    let mut key = key;
    if !key.is_empty() && (key.starts_with('\'') || key.starts_with('"')) {
        key = &key[1..];
    }
    if !key.is_empty() && (key.ends_with('\'') || key.ends_with('"')) {
        key = &key[..key.len() - 1];
    }
    key.to_string()
}

/// Decodes `%XX` escapes. Lenient: malformed escapes pass through untouched,
/// a decode problem never aborts query parsing.
pub(crate) fn percent_decode(input: &str) -> String {
    if !input.contains('%') {
        return input.to_string();
    }

    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(high), Some(low)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                out.push(high << 4 | low);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_query() {
        assert!(parse("").is_empty());
    }

    #[test]
    fn scalars_and_integers() {
        let parsed = parse("a=1&c=string&null_property&empty_string=");
        assert_eq!(Value::Object(parsed), json!({"a": 1, "c": "string", "null_property": null, "empty_string": ""}));
    }

    #[test]
    fn percent_decoding() {
        let parsed = parse("greeting=hello%20world&na%20me=1");
        assert_eq!(Value::Object(parsed), json!({"greeting": "hello world", "na me": 1}));
    }

    #[test]
    fn malformed_escape_passes_through() {
        assert_eq!(percent_decode("100%"), "100%");
        assert_eq!(percent_decode("a%2"), "a%2");
        assert_eq!(percent_decode("a%zzb"), "a%zzb");
    }

    #[test]
    fn bracket_folding() {
        let parsed = parse("a=1&b[]=2&b['three']=3&b[]=4&c=string");
        assert_eq!(
            Value::Object(parsed),
            json!({"a": 1, "b": {"0": 2, "three": 3, "2": 4}, "c": "string"})
        );
    }

    #[test]
    fn sequential_indexes_collapse_to_array() {
        let parsed = parse("arr[]=2&arr[]=3&arr[]=4");
        assert_eq!(Value::Object(parsed), json!({"arr": [2, 3, 4]}));
    }

    #[test]
    fn quoted_keys() {
        let parsed = parse(r#"b["three"]=3&b['four']=4"#);
        assert_eq!(Value::Object(parsed), json!({"b": {"three": 3, "four": 4}}));
    }

    #[test]
    fn later_literal_name_overwrites() {
        let parsed = parse("a=1&a=2");
        assert_eq!(Value::Object(parsed), json!({"a": 2}));
    }

    #[test]
    fn repeated_explicit_key_overwrites() {
        let parsed = parse("b[x]=1&b[x]=2");
        assert_eq!(Value::Object(parsed), json!({"b": {"x": 2}}));
    }

    #[test]
    fn truthy_scalar_blocks_folding() {
        let parsed = parse("a=1&a[b]=2");
        assert_eq!(Value::Object(parsed), json!({"a": 1}));
    }

    #[test]
    fn falsy_scalar_is_replaced_by_object() {
        let parsed = parse("a&a[b]=2");
        assert_eq!(Value::Object(parsed), json!({"a": {"b": 2}}));
    }

    #[test]
    fn value_keeps_extra_equals_signs() {
        let parsed = parse("token=a=b=c");
        assert_eq!(Value::Object(parsed), json!({"token": "a=b=c"}));
    }
}
