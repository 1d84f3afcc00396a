//! Relaxed JSON pre-pass.
//!
//! Hand-edited settings files routinely carry comments and trailing commas.
//! [`relax`] blanks both out (outside string literals) so the strict parser
//! can take over. Newlines are kept so parser positions still match the file.

use crate::errors::{Result, SettingsError};

/// Remove `//` and `/* */` comments and trailing commas before `}` or `]`.
pub fn relax(text: &str) -> Result<String> {
    let without_comments = strip_comments(text.as_bytes())?;
    let relaxed = strip_trailing_commas(without_comments);
    String::from_utf8(relaxed).map_err(|_| SettingsError::format("document is not valid UTF-8"))
}

fn strip_comments(input: &[u8]) -> Result<Vec<u8>> {
    let mut output = Vec::with_capacity(input.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut i = 0;

    while i < input.len() {
        let byte = input[i];

        if in_string {
            output.push(byte);
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            i += 1;
            continue;
        }

        match (byte, input.get(i + 1)) {
            (b'"', _) => {
                in_string = true;
                output.push(byte);
                i += 1;
            }
            (b'/', Some(b'/')) => {
                while i < input.len() && input[i] != b'\n' {
                    i += 1;
                }
            }
            (b'/', Some(b'*')) => {
                i += 2;
                loop {
                    match (input.get(i), input.get(i + 1)) {
                        (Some(b'*'), Some(b'/')) => {
                            i += 2;
                            break;
                        }
                        (Some(b'\n'), _) => {
                            output.push(b'\n');
                            i += 1;
                        }
                        (Some(_), _) => i += 1,
                        (None, _) => return Err(SettingsError::format("unterminated block comment")),
                    }
                }
            }
            _ => {
                output.push(byte);
                i += 1;
            }
        }
    }

    Ok(output)
}

fn strip_trailing_commas(mut input: Vec<u8>) -> Vec<u8> {
    let mut in_string = false;
    let mut escaped = false;

    for i in 0..input.len() {
        let byte = input[i];

        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }

        match byte {
            b'"' => in_string = true,
            b',' => {
                let next = input[i + 1..].iter().find(|b| !b.is_ascii_whitespace());
                if matches!(next, Some(b'}') | Some(b']')) {
                    input[i] = b' ';
                }
            }
            _ => {}
        }
    }

    input
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_commas_removed() {
        let relaxed = relax("{\n  \"Name\": \"Old Name\",\n  \"Age\": 25,\n}").unwrap();
        let value: serde_json::Value = serde_json::from_str(&relaxed).unwrap();
        assert_eq!(value["Age"], serde_json::json!(25));
    }

    #[test]
    fn test_nested_trailing_commas_removed() {
        let relaxed = relax(r#"{"Child": {"Name": "x",}, "Letters": ["A", "B",],}"#).unwrap();
        assert!(serde_json::from_str::<serde_json::Value>(&relaxed).is_ok());
    }

    #[test]
    fn test_comments_removed() {
        let text = "{\n  // line comment\n  \"A\": 1, /* block\n comment */ \"B\": 2\n}";
        let relaxed = relax(text).unwrap();
        let value: serde_json::Value = serde_json::from_str(&relaxed).unwrap();
        assert_eq!(value["B"], serde_json::json!(2));
        assert_eq!(relaxed.lines().count(), text.lines().count());
    }

    #[test]
    fn test_string_contents_untouched() {
        let text = r#"{"Url": "http://example.com/a,]", "Escaped": "quote \" // not a comment,}"}"#;
        let relaxed = relax(text).unwrap();
        assert_eq!(relaxed, text);
    }

    #[test]
    fn test_unterminated_block_comment() {
        assert!(relax("{ /* never closed ").is_err());
    }
}
