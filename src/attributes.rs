//! Attribute and event binding compilation.
//!
//! Every attribute of a rendered element becomes one of three bindings inside
//! the element's markup: a plain attribute (`name="..."` or `name=${...}`), a
//! DOM property (`.name=${...}`) or an event listener (`@event=${...}`).

use lazy_static::lazy_static;
use std::collections::{HashMap, HashSet};

use crate::interpolation::{build_expression, is_literal, parse_interpolation};

// ═══════════════════════════════════════════════════════════════════════════════
// TABLES
// ═══════════════════════════════════════════════════════════════════════════════

/// Event prefixes, longest first so `capture-bind` is never read as `capture`.
const EVENT_PREFIXES: &[&str] = &["capture-catch", "capture-bind", "mut-bind", "catch", "bind"];

lazy_static! {
    /// Mini-program gesture names mapped onto DOM event names.
    static ref EVENT_ALIASES: HashMap<&'static str, &'static str> = {
        let mut m = HashMap::new();
        m.insert("tap", "click");
        m.insert("longtap", "contextmenu");
        m.insert("longpress", "contextmenu");
        m
    };

    /// Attributes that stay attributes even on property-bound components.
    static ref PROPERTY_EXCLUDED: HashSet<&'static str> = {
        let mut s = HashSet::new();
        s.insert("class");
        s.insert("style");
        s.insert("id");
        s.insert("slot");
        s
    };
}

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT ATTRIBUTES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventBinding {
    /// Host event name after lower-casing and aliasing.
    pub event: String,
    pub catch: bool,
    pub capture: bool,
}

fn is_event_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

/// Recognize `bindtap`, `bind:tap`, `catch:touchstart`, `capture-bind:tap`...
pub fn parse_event_attribute(name: &str) -> Option<EventBinding> {
    let prefix = EVENT_PREFIXES.iter().find(|p| name.starts_with(**p))?;
    let rest = &name[prefix.len()..];
    let event = rest.strip_prefix(':').unwrap_or(rest);

    if event.is_empty() || !event.chars().all(is_event_name_char) {
        return None;
    }

    Some(EventBinding {
        event: normalize_event_name(event),
        catch: prefix.contains("catch"),
        capture: prefix.contains("capture"),
    })
}

pub fn normalize_event_name(event: &str) -> String {
    let lower = event.to_ascii_lowercase();
    EVENT_ALIASES
        .get(lower.as_str())
        .map(|alias| alias.to_string())
        .unwrap_or(lower)
}

// ═══════════════════════════════════════════════════════════════════════════════
// NAME NORMALIZATION
// ═══════════════════════════════════════════════════════════════════════════════

pub fn to_camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for c in name.chars() {
        if c == '-' || c == '_' {
            upper_next = !out.is_empty();
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

pub fn normalize_attribute_name(name: &str) -> String {
    match name {
        "hover-class" => "data-hover-class".to_string(),
        _ => name.to_string(),
    }
}

/// Whether `name` binds as a DOM property when the tag requests property binding.
pub fn binds_as_property(name: &str, use_properties: bool) -> bool {
    use_properties
        && !PROPERTY_EXCLUDED.contains(name)
        && !name.starts_with("data-")
        && !name.starts_with("aria-")
}

// ═══════════════════════════════════════════════════════════════════════════════
// ESCAPING
// ═══════════════════════════════════════════════════════════════════════════════

/// Escape literal text for placement inside a JavaScript template literal.
pub fn escape_template_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push_str("\\\\"),
            '`' => out.push_str("\\`"),
            '$' if chars.peek() == Some(&'{') => out.push_str("\\$"),
            _ => out.push(c),
        }
    }
    out
}

pub fn escape_markup_text(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub fn escape_markup_attribute(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPILATION
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy)]
pub struct AttributeOptions<'a> {
    /// The current tag is a custom or aliased component.
    pub use_properties: bool,
    pub scope: &'a str,
    pub wxs: &'a str,
}

/// Compile one attribute into its markup binding, including the leading space.
pub fn compile_attribute(name: &str, value: &str, options: &AttributeOptions) -> String {
    let parts = parse_interpolation(value);

    if let Some(binding) = parse_event_attribute(name) {
        let handler = build_expression(&parts, options.scope, options.wxs);
        return format!(
            " @{}=${{bindEvent(ctx, {}, {{ event: \"{}\", catch: {}, capture: {} }})}}",
            binding.event, handler, binding.event, binding.catch, binding.capture
        );
    }

    if binds_as_property(name, options.use_properties) {
        let expr = build_expression(&parts, options.scope, options.wxs);
        return format!(" .{}=${{{}}}", to_camel_case(name), expr);
    }

    let attr_name = normalize_attribute_name(name);
    if is_literal(&parts) {
        format!(
            " {}=\"{}\"",
            attr_name,
            escape_template_literal(&escape_markup_attribute(value))
        )
    } else {
        format!(
            " {}=${{{}}}",
            attr_name,
            build_expression(&parts, options.scope, options.wxs)
        )
    }
}

/// Compile every attribute in source order.
pub fn compile_attributes<'a>(
    attribs: impl IntoIterator<Item = (&'a String, &'a String)>,
    options: &AttributeOptions,
) -> String {
    attribs
        .into_iter()
        .map(|(name, value)| compile_attribute(name, value, options))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(use_properties: bool) -> AttributeOptions<'static> {
        AttributeOptions {
            use_properties,
            scope: "scope",
            wxs: "__wxs",
        }
    }

    #[test]
    fn test_event_forms() {
        let legacy = parse_event_attribute("bindtap").unwrap();
        assert_eq!(legacy.event, "click");
        assert!(!legacy.catch && !legacy.capture);

        let colon = parse_event_attribute("catch:TouchStart").unwrap();
        assert_eq!(colon.event, "touchstart");
        assert!(colon.catch && !colon.capture);

        let capture = parse_event_attribute("capture-catch:tap").unwrap();
        assert!(capture.catch && capture.capture);

        let capture_bind = parse_event_attribute("capture-bindlongpress").unwrap();
        assert_eq!(capture_bind.event, "contextmenu");
        assert!(!capture_bind.catch && capture_bind.capture);

        let mutable = parse_event_attribute("mut-bind:input").unwrap();
        assert_eq!(mutable.event, "input");
    }

    #[test]
    fn test_non_events() {
        assert!(parse_event_attribute("class").is_none());
        assert!(parse_event_attribute("bind").is_none());
        assert!(parse_event_attribute("bind:").is_none());
        assert!(parse_event_attribute("wx:if").is_none());
        assert!(parse_event_attribute("data-bind").is_none());
    }

    #[test]
    fn test_static_attribute() {
        assert_eq!(
            compile_attribute("class", "a b", &opts(false)),
            " class=\"a b\""
        );
        assert_eq!(
            compile_attribute("hover-class", "pressed", &opts(false)),
            " data-hover-class=\"pressed\""
        );
    }

    #[test]
    fn test_dynamic_attribute() {
        assert_eq!(
            compile_attribute("class", "item {{cls}}", &opts(false)),
            " class=${(\"item \" + evaluate(\"cls\", scope, __wxs))}"
        );
    }

    #[test]
    fn test_property_binding() {
        assert_eq!(
            compile_attribute("user-name", "{{name}}", &opts(true)),
            " .userName=${evaluate(\"name\", scope, __wxs)}"
        );
        // excluded names stay attributes
        assert_eq!(compile_attribute("class", "x", &opts(true)), " class=\"x\"");
        assert_eq!(
            compile_attribute("data-id", "1", &opts(true)),
            " data-id=\"1\""
        );
        assert_eq!(
            compile_attribute("aria-label", "x", &opts(true)),
            " aria-label=\"x\""
        );
    }

    #[test]
    fn test_event_binding_output() {
        assert_eq!(
            compile_attribute("bindtap", "onTap", &opts(false)),
            " @click=${bindEvent(ctx, \"onTap\", { event: \"click\", catch: false, capture: false })}"
        );
    }

    #[test]
    fn test_camel_case() {
        assert_eq!(to_camel_case("foo-bar-baz"), "fooBarBaz");
        assert_eq!(to_camel_case("plain"), "plain");
        assert_eq!(to_camel_case("snake_case"), "snakeCase");
    }

    #[test]
    fn test_escaping() {
        assert_eq!(escape_template_literal("a`b${c}\\"), "a\\`b\\${c}\\\\");
        assert_eq!(escape_markup_text("<a & b>"), "&lt;a &amp; b&gt;");
        assert_eq!(escape_markup_attribute("say \"hi\""), "say &quot;hi&quot;");
    }
}
