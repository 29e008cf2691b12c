//! Parse Module for the WXML Compiler
//!
//! Turns markup text into an ordered `RenderNode` tree. Comments, processing
//! instructions, declarations and whitespace-only text never reach the tree.
//! Malformed markup is recovered from rather than rejected: unmatched closing
//! tags are ignored, unclosed elements are closed at end of input and a
//! tokenizer error ends the document with whatever was built so far.
//!
//! Before tokenizing, the source is prepared so that script-like content
//! survives the XML reader: `<wxs>` bodies, `{{ }}` expressions and stray
//! `<`/`&` characters in text are entity-escaped and decoded back by the
//! reader.

use log::{debug, trace};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::ir::{Attributes, ElementNode, RenderNode};

/// Elements whose body is script source, kept verbatim as a single text child.
const RAW_TEXT_ELEMENTS: &[&str] = &["wxs"];

/// Entities the reader decodes; any other `&` is literal text.
const KNOWN_ENTITIES: &[&str] = &["lt;", "gt;", "amp;", "apos;", "quot;"];

/// A parsed document plus the recoveries made while parsing it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedDocument {
    pub nodes: Vec<RenderNode>,
    /// Messages without a document id; the caller attaches it.
    pub warnings: Vec<String>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// SOURCE PREPARATION
// ═══════════════════════════════════════════════════════════════════════════════

fn is_entity(rest: &str) -> bool {
    if KNOWN_ENTITIES.iter().any(|entity| rest.starts_with(entity)) {
        return true;
    }
    let Some(numeric) = rest.strip_prefix('#') else {
        return false;
    };
    let (digits, radix) = match numeric.strip_prefix(['x', 'X']) {
        Some(hex) => (hex, 16),
        None => (numeric, 10),
    };
    let len = digits.chars().take_while(|c| c.is_digit(radix)).count();
    len > 0 && digits[len..].starts_with(';')
}

/// `rest` starts with `&`.
fn push_ampersand(rest: &str, out: &mut String) {
    if is_entity(&rest[1..]) {
        out.push('&');
    } else {
        out.push_str("&amp;");
    }
}

fn push_escaped_interpolation(region: &str, out: &mut String) {
    for (i, ch) in region.char_indices() {
        match ch {
            '<' => out.push_str("&lt;"),
            '&' => push_ampersand(&region[i..], out),
            c => out.push(c),
        }
    }
}

fn push_escaped_raw(body: &str, out: &mut String) {
    for ch in body.chars() {
        match ch {
            '<' => out.push_str("&lt;"),
            '&' => out.push_str("&amp;"),
            c => out.push(c),
        }
    }
}

fn starts_tag(rest: &str) -> bool {
    rest.as_bytes()
        .get(1)
        .is_some_and(|b| b.is_ascii_alphabetic() || matches!(b, b'/' | b'!' | b'?'))
}

/// Length of the tag at the start of `rest`, quoted `>` excluded.
fn tag_len(rest: &str) -> usize {
    let mut quote = None;
    for (i, b) in rest.bytes().enumerate().skip(1) {
        match (quote, b) {
            (Some(q), _) if b == q => quote = None,
            (Some(_), _) => {}
            (None, b'"' | b'\'') => quote = Some(b),
            (None, b'>') => return i + 1,
            _ => {}
        }
    }
    rest.len()
}

/// Name of the raw-text element opened by `tag`, if any.
fn raw_text_start(tag: &str) -> Option<&'static str> {
    if !tag.ends_with('>') || tag.ends_with("/>") {
        return None;
    }
    let name: String = tag[1..]
        .chars()
        .take_while(|c| !c.is_whitespace() && *c != '/' && *c != '>')
        .collect();
    RAW_TEXT_ELEMENTS
        .iter()
        .find(|raw| **raw == name)
        .copied()
}

fn copy_until(rest: &str, terminator: &str, out: &mut String) -> usize {
    let len = rest
        .find(terminator)
        .map(|i| i + terminator.len())
        .unwrap_or(rest.len());
    out.push_str(&rest[..len]);
    len
}

/// Rewrite `source` so the XML reader sees script content as text.
fn prepare_markup(source: &str, warnings: &mut Vec<String>) -> String {
    let mut out = String::with_capacity(source.len() + source.len() / 8);
    let mut pos = 0;

    while pos < source.len() {
        let rest = &source[pos..];

        if rest.starts_with("{{") {
            if let Some(end) = rest[2..].find("}}") {
                let len = end + 4;
                push_escaped_interpolation(&rest[..len], &mut out);
                pos += len;
                continue;
            }
        }

        if rest.starts_with("<!--") {
            pos += copy_until(rest, "-->", &mut out);
            continue;
        }
        if rest.starts_with("<![CDATA[") {
            pos += copy_until(rest, "]]>", &mut out);
            continue;
        }
        if rest.starts_with('<') && starts_tag(rest) {
            let len = tag_len(rest);
            let tag = &rest[..len];
            out.push_str(tag);
            pos += len;

            if let Some(name) = raw_text_start(tag) {
                let body = &source[pos..];
                let close = format!("</{}", name);
                match body.find(&close) {
                    Some(end) => {
                        push_escaped_raw(&body[..end], &mut out);
                        pos += end;
                    }
                    None => {
                        warnings.push(format!("unterminated <{}> runs to end of input", name));
                        push_escaped_raw(body, &mut out);
                        pos = source.len();
                    }
                }
            }
            continue;
        }

        let Some(ch) = rest.chars().next() else { break };
        match ch {
            '<' => out.push_str("&lt;"),
            '&' => push_ampersand(rest, &mut out),
            c => out.push(c),
        }
        pos += ch.len_utf8();
    }

    out
}

// ═══════════════════════════════════════════════════════════════════════════════
// TREE BUILDER
// ═══════════════════════════════════════════════════════════════════════════════

struct TreeBuilder {
    roots: Vec<RenderNode>,
    open: Vec<ElementNode>,
}

impl TreeBuilder {
    fn new() -> Self {
        Self {
            roots: Vec::new(),
            open: Vec::new(),
        }
    }

    fn append(&mut self, node: RenderNode) {
        match self.open.last_mut() {
            Some(parent) => parent.children.push(node),
            None => self.roots.push(node),
        }
    }

    fn open(&mut self, element: ElementNode) {
        self.open.push(element);
    }

    fn close(&mut self) {
        if let Some(element) = self.open.pop() {
            self.append(RenderNode::Element(element));
        }
    }

    fn finish(mut self) -> Vec<RenderNode> {
        while !self.open.is_empty() {
            self.close();
        }
        self.roots
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// NODE PARSING
// ═══════════════════════════════════════════════════════════════════════════════

fn is_insignificant(text: &str) -> bool {
    text.chars().all(char::is_whitespace)
}

fn element_from_start(start: &BytesStart) -> ElementNode {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut attribs = Attributes::new();

    // html_attributes accepts bare (`wx:else`) and unquoted attributes
    for attr in start.html_attributes().flatten() {
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = match attr.unescape_value() {
            Ok(v) => v.into_owned(),
            Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
        };
        attribs.entry(key).or_insert(value);
    }

    ElementNode {
        name,
        attribs,
        children: Vec::new(),
    }
}

/// Parse a markup document, reporting recoveries that lost content.
pub fn parse_document(source: &str) -> ParsedDocument {
    let mut warnings = Vec::new();
    let prepared = prepare_markup(source, &mut warnings);

    let mut reader = Reader::from_str(&prepared);
    {
        let config = reader.config_mut();
        config.trim_text(false);
        config.check_end_names = false;
        config.allow_unmatched_ends = true;
    }

    let mut builder = TreeBuilder::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => builder.open(element_from_start(&start)),
            Ok(Event::Empty(start)) => {
                builder.append(RenderNode::Element(element_from_start(&start)));
            }
            Ok(Event::End(_)) => builder.close(),
            Ok(Event::Text(text)) => {
                let data = match text.unescape() {
                    Ok(v) => v.into_owned(),
                    Err(_) => String::from_utf8_lossy(&text).into_owned(),
                };
                if !is_insignificant(&data) {
                    builder.append(RenderNode::text(data));
                }
            }
            Ok(Event::CData(cdata)) => {
                let data = String::from_utf8_lossy(&cdata).into_owned();
                if !is_insignificant(&data) {
                    builder.append(RenderNode::text(data));
                }
            }
            Ok(Event::Comment(_))
            | Ok(Event::PI(_))
            | Ok(Event::Decl(_))
            | Ok(Event::DocType(_)) => {}
            Ok(Event::Eof) => break,
            Err(e) => {
                warnings.push(format!(
                    "markup error at byte {}, rest of input dropped: {}",
                    reader.buffer_position(),
                    e
                ));
                break;
            }
        }
    }

    let nodes = builder.finish();
    for warning in &warnings {
        debug!("[wxml] parse recovery: {}", warning);
    }
    trace!("[wxml] parsed {} root nodes", nodes.len());
    ParsedDocument { nodes, warnings }
}

/// Parse a markup document into its render tree.
pub fn parse_wxml(source: &str) -> Vec<RenderNode> {
    parse_document(source).nodes
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn element(node: &RenderNode) -> &ElementNode {
        node.as_element().expect("expected element")
    }

    #[test]
    fn test_parse_nested_elements() {
        let nodes = parse_wxml(r#"<view class="a"><text>hi</text></view>"#);
        assert_eq!(nodes.len(), 1);
        let view = element(&nodes[0]);
        assert_eq!(view.name, "view");
        assert_eq!(view.attr("class"), Some("a"));
        let text = element(&view.children[0]);
        assert_eq!(text.name, "text");
        assert_eq!(text.children, vec![RenderNode::text("hi")]);
    }

    #[test]
    fn test_multiple_roots_and_self_closing() {
        let nodes = parse_wxml(r#"<import src="./a.wxml"/><view/><view></view>"#);
        assert_eq!(nodes.len(), 3);
        assert_eq!(element(&nodes[0]).attr("src"), Some("./a.wxml"));
        assert!(element(&nodes[1]).children.is_empty());
    }

    #[test]
    fn test_drops_comments_and_whitespace() {
        let nodes = parse_wxml("<!-- note -->\n  <view>\n    <!-- inner -->\n  </view>\n");
        assert_eq!(nodes.len(), 1);
        assert!(element(&nodes[0]).children.is_empty());
    }

    #[test]
    fn test_bare_and_prefixed_attributes() {
        let nodes = parse_wxml(r#"<view wx:if="{{a}}" bind:tap="onTap"/><view wx:else/>"#);
        let first = element(&nodes[0]);
        assert_eq!(first.attr("wx:if"), Some("{{a}}"));
        assert_eq!(first.attr("bind:tap"), Some("onTap"));
        let second = element(&nodes[1]);
        assert_eq!(second.attr("wx:else"), Some(""));
    }

    #[test]
    fn test_attribute_order_preserved() {
        let nodes = parse_wxml(r#"<view id="x" class="y" style="z"/>"#);
        let keys: Vec<&str> = element(&nodes[0]).attribs.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["id", "class", "style"]);
    }

    #[test]
    fn test_wxs_body_is_raw() {
        let nodes = parse_wxml(
            "<wxs module=\"m\">var f = function(a) { return a && a.b; };\nmodule.exports.f = f;</wxs>",
        );
        let wxs = element(&nodes[0]);
        assert_eq!(wxs.attr("module"), Some("m"));
        assert!(wxs.text_content().contains("a && a.b"));
    }

    #[test]
    fn test_unclosed_elements_recover() {
        let nodes = parse_wxml("<view><text>hi");
        assert_eq!(nodes.len(), 1);
        let view = element(&nodes[0]);
        assert_eq!(element(&view.children[0]).children, vec![RenderNode::text("hi")]);
    }

    #[test]
    fn test_empty_source() {
        assert!(parse_wxml("").is_empty());
        assert!(parse_wxml("   \n ").is_empty());
    }

    #[test]
    fn test_text_entities_decoded() {
        let nodes = parse_wxml("<text>a &amp; b</text>");
        assert_eq!(element(&nodes[0]).children, vec![RenderNode::text("a & b")]);
    }

    #[test]
    fn test_wxs_body_with_less_than_keeps_following_nodes() {
        let doc = parse_document(
            "<wxs module=\"m\">module.exports.small = function(n) { return n < 10 && n > 0; };</wxs><view>after</view>",
        );
        assert!(doc.warnings.is_empty());
        assert_eq!(doc.nodes.len(), 2);
        assert_eq!(
            element(&doc.nodes[0]).text_content(),
            "module.exports.small = function(n) { return n < 10 && n > 0; };"
        );
        let view = element(&doc.nodes[1]);
        assert_eq!(view.name, "view");
        assert_eq!(view.children, vec![RenderNode::text("after")]);
    }

    #[test]
    fn test_wxs_body_keeps_entities_and_markup_verbatim() {
        let nodes = parse_wxml("<wxs module=\"m\">var s = '&amp;<b>';</wxs>");
        assert_eq!(element(&nodes[0]).text_content(), "var s = '&amp;<b>';");
    }

    #[test]
    fn test_self_closing_wxs_is_not_raw() {
        let nodes = parse_wxml(r#"<wxs module="m" src="./m.wxs"/><view/>"#);
        assert_eq!(nodes.len(), 2);
        assert!(element(&nodes[0]).children.is_empty());
    }

    #[test]
    fn test_unterminated_wxs_is_reported() {
        let doc = parse_document("<view/><wxs module=\"m\">var a = b < c;");
        assert_eq!(doc.nodes.len(), 2);
        assert_eq!(element(&doc.nodes[1]).text_content(), "var a = b < c;");
        assert_eq!(doc.warnings.len(), 1);
        assert!(doc.warnings[0].contains("unterminated <wxs>"));
    }

    #[test]
    fn test_less_than_inside_text_interpolation() {
        let nodes = parse_wxml("<view>{{n < 10 ? 'small' : 'big'}}</view><text>next</text>");
        assert_eq!(nodes.len(), 2);
        assert_eq!(
            element(&nodes[0]).children,
            vec![RenderNode::text("{{n < 10 ? 'small' : 'big'}}")]
        );
        assert_eq!(element(&nodes[1]).name, "text");
    }

    #[test]
    fn test_logical_and_inside_text_interpolation() {
        let nodes = parse_wxml("<view>{{a && b}} &amp; {{c<d}}</view>");
        assert_eq!(
            element(&nodes[0]).children,
            vec![RenderNode::text("{{a && b}} & {{c<d}}")]
        );
    }

    #[test]
    fn test_stray_less_than_and_ampersand_are_text() {
        let nodes = parse_wxml("<text>1 < 2 & 3</text>");
        assert_eq!(element(&nodes[0]).children, vec![RenderNode::text("1 < 2 & 3")]);
    }

    #[test]
    fn test_less_than_inside_attribute_interpolation() {
        let nodes = parse_wxml(r#"<view hidden="{{n < 10}}">x</view>"#);
        assert_eq!(element(&nodes[0]).attr("hidden"), Some("{{n < 10}}"));
        assert_eq!(element(&nodes[0]).children, vec![RenderNode::text("x")]);
    }

    #[test]
    fn test_tokenizer_error_is_reported() {
        let doc = parse_document("<view>ok</view><view class=\"a");
        assert_eq!(doc.nodes.len(), 1);
        assert_eq!(doc.warnings.len(), 1);
        assert!(doc.warnings[0].contains("markup error"));
    }
}
