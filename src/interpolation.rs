//! Interpolation scanning and binding-expression generation.
//!
//! `{{ ... }}` regions are located by plain substring search: the first `}}`
//! after an opening `{{` closes the region even when the expression itself
//! contains braces.

use crate::ir::InterpolationPart;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Quote a string as a JavaScript string literal.
pub fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("\"{}\"", value.escape_default()))
}

fn push_text(parts: &mut Vec<InterpolationPart>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(InterpolationPart::Text(prev)) = parts.last_mut() {
        prev.push_str(text);
    } else {
        parts.push(InterpolationPart::Text(text.to_string()));
    }
}

/// Split `input` into literal and expression parts. Never returns an empty list.
pub fn parse_interpolation(input: &str) -> Vec<InterpolationPart> {
    let mut parts = Vec::new();
    let mut rest = input;

    while let Some(open) = rest.find(OPEN) {
        let after_open = &rest[open + OPEN.len()..];
        match after_open.find(CLOSE) {
            Some(close) => {
                push_text(&mut parts, &rest[..open]);
                parts.push(InterpolationPart::Expr(after_open[..close].trim().to_string()));
                rest = &after_open[close + CLOSE.len()..];
            }
            None => {
                // unterminated: the marker and everything after it is literal
                break;
            }
        }
    }
    push_text(&mut parts, rest);

    if parts.is_empty() {
        parts.push(InterpolationPart::Text(String::new()));
    }
    parts
}

/// True when the value contains no expression part.
pub fn is_literal(parts: &[InterpolationPart]) -> bool {
    parts.iter().all(InterpolationPart::is_text)
}

/// Call of the host `evaluate` primitive for one expression source.
pub fn evaluate_call(source: &str, scope: &str, wxs: &str) -> String {
    format!("evaluate({}, {}, {})", js_string(source), scope, wxs)
}

fn part_expression(part: &InterpolationPart, scope: &str, wxs: &str) -> String {
    match part {
        InterpolationPart::Text(value) => js_string(value),
        InterpolationPart::Expr(source) => evaluate_call(source, scope, wxs),
    }
}

/// Build one JavaScript expression producing the interpolated value.
pub fn build_expression(parts: &[InterpolationPart], scope: &str, wxs: &str) -> String {
    match parts {
        [] => js_string(""),
        [single] => part_expression(single, scope, wxs),
        _ => format!(
            "({})",
            parts
                .iter()
                .map(|part| part_expression(part, scope, wxs))
                .collect::<Vec<_>>()
                .join(" + ")
        ),
    }
}

/// Expression for a dynamic template's `data=` attribute. A bare object body
/// such as `{{ a: 1, b }}` or `{{ ...item }}` is wrapped in braces first.
pub fn build_template_data_expression(value: &str, scope: &str, wxs: &str) -> String {
    let parts = parse_interpolation(value);
    if let [InterpolationPart::Expr(source)] = parts.as_slice() {
        if has_top_level_colon(source) || source.starts_with("...") {
            return evaluate_call(&format!("{{{}}}", source), scope, wxs);
        }
    }
    build_expression(&parts, scope, wxs)
}

// ═══════════════════════════════════════════════════════════════════════════════
// TOP-LEVEL COLON SCAN
// ═══════════════════════════════════════════════════════════════════════════════

/// Find a `:` outside any quotes and brackets. A `?` at the same level seen
/// first means the colon belongs to a conditional expression.
pub fn has_top_level_colon(expr: &str) -> bool {
    let mut depth: usize = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut seen_question = false;

    for c in expr.chars() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '\'' | '"' | '`' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            '?' if depth == 0 => seen_question = true,
            ':' if depth == 0 => return !seen_question,
            _ => {}
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::InterpolationPart::{Expr, Text};

    #[test]
    fn test_plain_text() {
        assert_eq!(parse_interpolation("hello"), vec![Text("hello".into())]);
        assert_eq!(parse_interpolation(""), vec![Text(String::new())]);
    }

    #[test]
    fn test_mixed_parts() {
        assert_eq!(
            parse_interpolation("a {{ b }} c{{d}}"),
            vec![
                Text("a ".into()),
                Expr("b".into()),
                Text(" c".into()),
                Expr("d".into())
            ]
        );
    }

    #[test]
    fn test_first_close_wins() {
        // not brace-depth aware
        assert_eq!(
            parse_interpolation("{{ {a: {b: 1}} }}"),
            vec![Expr("{a: {b: 1".into()), Text(" }}".into())]
        );
    }

    #[test]
    fn test_unterminated_is_literal() {
        assert_eq!(
            parse_interpolation("x {{y} z"),
            vec![Text("x {{y} z".into())]
        );
        assert_eq!(
            parse_interpolation("{{a}} and {{b"),
            vec![Expr("a".into()), Text(" and {{b".into())]
        );
    }

    #[test]
    fn test_build_expression_shapes() {
        assert_eq!(build_expression(&[], "scope", "__wxs"), "\"\"");
        assert_eq!(
            build_expression(&[Text("hi".into())], "scope", "__wxs"),
            "\"hi\""
        );
        assert_eq!(
            build_expression(&[Expr("a + b".into())], "scope", "__wxs"),
            "evaluate(\"a + b\", scope, __wxs)"
        );
        assert_eq!(
            build_expression(&[Text("n: ".into()), Expr("n".into())], "s1", "__wxs"),
            "(\"n: \" + evaluate(\"n\", s1, __wxs))"
        );
    }

    #[test]
    fn test_top_level_colon() {
        assert!(has_top_level_colon("a: 1, b: 2"));
        assert!(!has_top_level_colon("cond ? a : b"));
        assert!(!has_top_level_colon("fn({a: 1})"));
        assert!(!has_top_level_colon("'a:b'"));
        assert!(!has_top_level_colon(r#""say \" : here""#));
        assert!(has_top_level_colon("key: x ? 1 : 2"));
        assert!(!has_top_level_colon("list[0]"));
    }

    #[test]
    fn test_template_data_expression() {
        assert_eq!(
            build_template_data_expression("{{a: 1, b}}", "scope", "__wxs"),
            "evaluate(\"{a: 1, b}\", scope, __wxs)"
        );
        assert_eq!(
            build_template_data_expression("{{...item}}", "scope", "__wxs"),
            "evaluate(\"{...item}\", scope, __wxs)"
        );
        assert_eq!(
            build_template_data_expression("{{ok ? a : b}}", "scope", "__wxs"),
            "evaluate(\"ok ? a : b\", scope, __wxs)"
        );
        assert_eq!(
            build_template_data_expression("static", "scope", "__wxs"),
            "\"static\""
        );
    }
}
