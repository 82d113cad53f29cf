// ABOUTME: Splits raw template text into literal runs and ${...} expression spans
// ABOUTME: Balanced-brace scanning that skips quoted strings and nested template literals

use super::error::{Result, TemplateError};

#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Literal(String),
    Expression { source: String, offset: usize },
}

/// Scan a template left to right into segments.
///
/// Expression bodies are trimmed. `offset` is the byte position of the
/// opening `${` in the template.
pub fn scan(template: &str) -> Result<Vec<Segment>> {
    let bytes = template.as_bytes();
    let mut segments = Vec::new();
    let mut literal_start = 0;
    let mut pos = 0;

    while pos < bytes.len() {
        if bytes[pos] == b'$' && bytes.get(pos + 1) == Some(&b'{') {
            if pos > literal_start {
                segments.push(Segment::Literal(template[literal_start..pos].to_string()));
            }

            let body_start = pos + 2;
            let end = find_expression_end(bytes, body_start)
                .ok_or(TemplateError::UnterminatedExpression { offset: pos })?;
            let source = template[body_start..end].trim();
            if source.is_empty() {
                return Err(TemplateError::EmptyExpression { offset: pos });
            }

            segments.push(Segment::Expression {
                source: source.to_string(),
                offset: pos,
            });
            pos = end + 1;
            literal_start = pos;
        } else {
            pos += 1;
        }
    }

    if literal_start < bytes.len() {
        segments.push(Segment::Literal(template[literal_start..].to_string()));
    }

    Ok(segments)
}

/// Whether the scanned template contains any expression span
pub fn has_expressions(segments: &[Segment]) -> bool {
    segments
        .iter()
        .any(|s| matches!(s, Segment::Expression { .. }))
}

/// Find the `}` closing an expression whose body begins at `start`.
///
/// All delimiters are ASCII, so byte positions returned here are always
/// valid char boundaries of the source string.
pub(crate) fn find_expression_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut pos = start;

    while pos < bytes.len() {
        match bytes[pos] {
            b'\'' | b'"' => pos = skip_quoted(bytes, pos)?,
            b'`' => pos = skip_template_literal(bytes, pos)?,
            b'{' => {
                depth += 1;
                pos += 1;
            }
            b'}' => {
                if depth == 0 {
                    return Some(pos);
                }
                depth -= 1;
                pos += 1;
            }
            _ => pos += 1,
        }
    }

    None
}

/// Returns the position just past the closing quote
fn skip_quoted(bytes: &[u8], open: usize) -> Option<usize> {
    let quote = bytes[open];
    let mut pos = open + 1;

    while pos < bytes.len() {
        match bytes[pos] {
            b'\\' => pos += 2,
            b if b == quote => return Some(pos + 1),
            _ => pos += 1,
        }
    }

    None
}

/// Returns the position just past the closing backtick. Nested `${...}`
/// spans track their own brace depth.
pub(crate) fn skip_template_literal(bytes: &[u8], open: usize) -> Option<usize> {
    let mut pos = open + 1;

    while pos < bytes.len() {
        match bytes[pos] {
            b'\\' => pos += 2,
            b'`' => return Some(pos + 1),
            b'$' if bytes.get(pos + 1) == Some(&b'{') => {
                let end = find_expression_end(bytes, pos + 2)?;
                pos = end + 1;
            }
            _ => pos += 1,
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expressions(template: &str) -> Vec<String> {
        scan(template)
            .unwrap()
            .into_iter()
            .filter_map(|s| match s {
                Segment::Expression { source, .. } => Some(source),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_plain_text_is_single_literal() {
        let segments = scan("echo hello").unwrap();
        assert_eq!(segments, vec![Segment::Literal("echo hello".to_string())]);
        assert!(!has_expressions(&segments));
        assert!(scan("").unwrap().is_empty());
    }

    #[test]
    fn test_literals_and_expressions_interleave() {
        let segments = scan("Hello ${user}! ${ a.b }").unwrap();
        assert_eq!(
            segments,
            vec![
                Segment::Literal("Hello ".to_string()),
                Segment::Expression {
                    source: "user".to_string(),
                    offset: 6
                },
                Segment::Literal("! ".to_string()),
                Segment::Expression {
                    source: "a.b".to_string(),
                    offset: 15
                },
            ]
        );
    }

    #[test]
    fn test_braces_inside_strings_do_not_close() {
        assert_eq!(expressions(r#"${ "}" + '}' }"#), vec![r#""}" + '}'"#]);
        assert_eq!(expressions(r#"${ "a\"}" }"#), vec![r#""a\"}""#]);
    }

    #[test]
    fn test_object_literal_braces_balance() {
        assert_eq!(
            expressions("${partial('footer', {text: 'hi'})} tail"),
            vec!["partial('footer', {text: 'hi'})"]
        );
    }

    #[test]
    fn test_nested_template_literal_tracks_depth() {
        let template = "${ `x ${ {a: 1}.a } }` } done";
        assert_eq!(expressions(template), vec!["`x ${ {a: 1}.a } }`"]);
        assert_eq!(expressions("${`a${`b${c}`}`}"), vec!["`a${`b${c}`}`"]);
    }

    #[test]
    fn test_unterminated_and_empty_spans() {
        assert_eq!(
            scan("echo ${oops").unwrap_err(),
            TemplateError::UnterminatedExpression { offset: 5 }
        );
        assert_eq!(
            scan("x ${ `open }").unwrap_err(),
            TemplateError::UnterminatedExpression { offset: 2 }
        );
        assert_eq!(
            scan("${  }").unwrap_err(),
            TemplateError::EmptyExpression { offset: 0 }
        );
    }

    #[test]
    fn test_dollar_without_brace_is_literal() {
        assert_eq!(scan("cost $5 {x}").unwrap().len(), 1);
    }
}
