/// Output encoding for values interpolated into generated markup
use serde_json::Value;

/// Escape sequence for a character, or `None` if it passes through unchanged
fn escape(c: char) -> Option<&'static str> {
    match c {
        '&' => Some("&amp;"),
        '<' => Some("&lt;"),
        '>' => Some("&gt;"),
        '"' => Some("&quot;"),
        '\'' => Some("&#x27;"),
        '/' => Some("&#x2F;"),
        '`' => Some("&#x60;"),
        '=' => Some("&#x3D;"),
        _ => None,
    }
}

/// Encode `& < > " ' / ` =` to their entity forms in a single pass.
///
/// Output is never re-scanned, so encoding is not idempotent: encoding an
/// already-encoded string escapes the `&` of every entity again. Encode
/// exactly once, at the sanitize boundary.
///
/// # Examples
///
/// ```
/// use narrative_guard::common::security::encode;
///
/// assert_eq!(encode("<b>"), "&lt;b&gt;");
/// assert_eq!(encode("a=b"), "a&#x3D;b");
/// ```
pub fn encode(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match escape(c) {
            Some(entity) => out.push_str(entity),
            None => out.push(c),
        }
    }
    out
}

/// Encode a loosely-typed value; anything that is not a string yields `""`
pub fn encode_value(value: &Value) -> String {
    value.as_str().map(encode).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode_each_character() {
        assert_eq!(encode("&"), "&amp;");
        assert_eq!(encode("<"), "&lt;");
        assert_eq!(encode(">"), "&gt;");
        assert_eq!(encode("\""), "&quot;");
        assert_eq!(encode("'"), "&#x27;");
        assert_eq!(encode("/"), "&#x2F;");
        assert_eq!(encode("`"), "&#x60;");
        assert_eq!(encode("="), "&#x3D;");
    }

    #[test]
    fn test_encode_script_tag() {
        assert_eq!(
            encode("<script>alert('x')</script>"),
            "&lt;script&gt;alert(&#x27;x&#x27;)&lt;&#x2F;script&gt;"
        );
    }

    #[test]
    fn test_encode_plain_text_unchanged() {
        assert_eq!(encode("I love your product"), "I love your product");
        assert_eq!(encode(""), "");
        assert_eq!(encode("café ☕"), "café ☕");
    }

    #[test]
    fn test_double_encoding_is_detectable() {
        let once = encode("Tom & Jerry");
        let twice = encode(&once);
        assert_eq!(once, "Tom &amp; Jerry");
        assert_eq!(twice, "Tom &amp;amp; Jerry");
        assert_ne!(once, twice);
    }

    #[test]
    fn test_encode_value_non_string() {
        assert_eq!(encode_value(&json!(42)), "");
        assert_eq!(encode_value(&json!(null)), "");
        assert_eq!(encode_value(&json!(["<"])), "");
        assert_eq!(encode_value(&json!("<")), "&lt;");
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    /// Strip every escape sequence `encode` can emit
    fn strip_entities(s: &str) -> String {
        [
            "&amp;", "&lt;", "&gt;", "&quot;", "&#x27;", "&#x2F;", "&#x60;", "&#x3D;",
        ]
        .iter()
        .fold(s.to_string(), |acc, entity| acc.replace(entity, ""))
    }

    proptest! {
        /// Encoded output contains no raw special characters outside an entity
        #[test]
        fn prop_encoded_output_has_no_raw_specials(input in ".{0,200}") {
            let encoded = encode(&input);
            let stripped = strip_entities(&encoded);
            for c in ['<', '>', '"', '\'', '`', '=', '&', '/'] {
                prop_assert!(!stripped.contains(c),
                    "raw {:?} survived encoding of {:?}: {:?}", c, input, encoded);
            }
        }

        /// Re-encoding changes the output whenever a special character was present
        #[test]
        fn prop_double_encoding_differs(
            prefix in "[a-z ]{0,10}",
            special in "[&<>\"'/`=]",
            suffix in "[a-z ]{0,10}"
        ) {
            let input = format!("{}{}{}", prefix, special, suffix);
            let once = encode(&input);
            prop_assert_ne!(encode(&once), once);
        }

        /// Text without special characters passes through untouched
        #[test]
        fn prop_plain_text_passthrough(input in "[a-zA-Z0-9 .,!?-]{0,100}") {
            prop_assert_eq!(encode(&input), input);
        }
    }
}
