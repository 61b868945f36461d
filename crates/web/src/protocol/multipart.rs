//! `multipart/form-data` field extraction.
//!
//! Covers the informal RFC 2388 convention browsers emit: boundary-delimited
//! fragments, each with a `content-disposition` header carrying `name="..."`.
//! Per-part content types and transfer encodings are ignored. Nested
//! multipart, binary payloads and file uploads are out of scope.

/// Splits a multipart body into `(name, value)` fields.
///
/// The body is split on the boundary text; the preamble and epilogue
/// fragments are dropped. A malformed fragment is dropped with a warning,
/// never an error. Fragments without a recognizable field name are dropped
/// silently.
pub(crate) fn parse_fields(body: &str, boundary: &str) -> (Vec<(String, String)>, Vec<String>) {
    let mut fields = Vec::new();
    let mut warnings = Vec::new();

    let fragments: Vec<&str> = body.split(boundary).collect();
    if fragments.len() < 3 {
        return (fields, warnings);
    }

    for fragment in &fragments[1..fragments.len() - 1] {
        // Line endings are normalized for scanning but the original style is
        // restored when the value lines are rejoined.
        let has_cr = fragment.contains('\r');
        let cleaned = if has_cr { fragment.replace('\r', "") } else { (*fragment).to_string() };

        let lines: Vec<&str> = cleaned.split('\n').collect();
        if lines.len() < 2 {
            warnings.push(format!("dropped malformed multipart fragment: {fragment:?}"));
            continue;
        }
        // First and last lines are boundary artifacts.
        let inner = &lines[1..lines.len() - 1];

        let mut name = None;
        let mut index = 0;
        while index < inner.len() {
            let line = inner[index];
            index += 1;
            if line.is_empty() {
                break;
            }
            if line.get(..19).is_some_and(|prefix| prefix.eq_ignore_ascii_case("content-disposition")) {
                name = extract_name(line);
            }
        }

        let Some(name) = name else { continue };
        let value = inner[index..].join(if has_cr { "\r\n" } else { "\n" });
        fields.push((name, value));
    }

    (fields, warnings)
}

/// Pulls the first non-empty `name="..."` attribute out of a header line.
fn extract_name(line: &str) -> Option<String> {
    let start = line.find("name=\"")? + 6;
    let rest = &line[start..];
    let end = rest.find('"')?;
    if end == 0 {
        return None;
    }
    Some(rest[..end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lf_fragments() {
        let body = "--B\nContent-Disposition: form-data; name=\"a\"\n\nvalue a\n--B\nContent-Disposition: form-data; name=\"b\"\n\nline one\nline two\n--B--";
        let (fields, warnings) = parse_fields(body, "--B");
        assert!(warnings.is_empty());
        assert_eq!(
            fields,
            vec![("a".to_string(), "value a".to_string()), ("b".to_string(), "line one\nline two".to_string())]
        );
    }

    #[test]
    fn crlf_style_is_preserved_in_values() {
        let body = "--B\r\nContent-Disposition: form-data; name=\"a\"\r\n\r\nline one\r\nline two\r\n--B--";
        let (fields, warnings) = parse_fields(body, "--B");
        assert!(warnings.is_empty());
        assert_eq!(fields, vec![("a".to_string(), "line one\r\nline two".to_string())]);
    }

    #[test]
    fn extra_part_headers_are_skipped() {
        let body = "--B\ncontent-disposition: form-data; name=\"a\"\ncontent-type: text/plain;charset=windows-1251\ncontent-transfer-encoding: 8BIT\n\nvalue\n--B--";
        let (fields, _) = parse_fields(body, "--B");
        assert_eq!(fields, vec![("a".to_string(), "value".to_string())]);
    }

    #[test]
    fn nameless_fragment_is_dropped_silently() {
        let body = "--B\nContent-Type: text/plain\n\nvalue\n--B--";
        let (fields, warnings) = parse_fields(body, "--B");
        assert!(fields.is_empty());
        assert!(warnings.is_empty());
    }

    #[test]
    fn no_complete_fragment() {
        let (fields, warnings) = parse_fields("preamble only", "--B");
        assert!(fields.is_empty());
        assert!(warnings.is_empty());
    }
}
