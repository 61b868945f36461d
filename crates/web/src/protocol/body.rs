//! Decoded request body representation.

use serde_json::Value;

/// A request body after content-type-driven decoding.
///
/// Call sites match exhaustively instead of probing a dynamically typed value:
/// an empty body, an undecodable raw text, or a structured JSON value are
/// distinct states.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedBody {
    /// The request carried no body.
    Empty,
    /// The body could not be decoded into a structured value; the raw text is
    /// passed through as-is.
    Raw(String),
    /// A structured value: decoded JSON, url-encoded fields or multipart fields.
    Json(Value),
}

impl ParsedBody {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Returns the structured value, if this body decoded into one.
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the raw text for undecoded bodies; an empty body reads as `""`.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Empty => Some(""),
            Self::Raw(text) => Some(text),
            Self::Json(_) => None,
        }
    }
}

/// JSON truthiness: `null`, `false`, `0` and `""` are falsy, everything else
/// (including empty arrays and objects) is truthy.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn truthiness_matches_javascript() {
        assert!(!is_truthy(&Value::Null));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("")));
        assert!(is_truthy(&json!(1)));
        assert!(is_truthy(&json!("x")));
        assert!(is_truthy(&json!([])));
        assert!(is_truthy(&json!({})));
    }

    #[test]
    fn text_views() {
        assert_eq!(ParsedBody::Empty.as_text(), Some(""));
        assert_eq!(ParsedBody::Raw("plain".to_string()).as_text(), Some("plain"));
        assert_eq!(ParsedBody::Json(json!({})).as_text(), None);
    }
}
