//! Page-level navigation bar extraction.
//!
//! `<page-meta>` elements are configuration, not content. They are removed
//! from the render tree and the first `<navigation-bar>` found inside any of
//! them is merged over the page config defaults into a synthetic
//! `<wx-navigation-bar>` element placed before everything else.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::context::WxmlDependencyContext;
use crate::ir::{Attributes, ElementNode, RenderNode};

pub const PAGE_META_TAG: &str = "page-meta";
pub const NAVIGATION_BAR_TAG: &str = "navigation-bar";
pub const NAVIGATION_ELEMENT: &str = "wx-navigation-bar";

/// Page config keys feeding the default navigation attributes.
const CONFIG_DEFAULTS: &[(&str, &str)] = &[
    ("title", "navigationBarTitleText"),
    ("background-color", "navigationBarBackgroundColor"),
    ("text-style", "navigationBarTextStyle"),
    ("front-color", "navigationBarFrontColor"),
    ("loading", "navigationBarLoading"),
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationBarOptions {
    /// Page JSON config (`navigationBarTitleText`, `navigationStyle`, ...).
    #[serde(default)]
    pub config: Map<String, Value>,
}

impl NavigationBarOptions {
    pub fn new(config: Map<String, Value>) -> Self {
        Self { config }
    }

    pub fn is_custom(&self) -> bool {
        self.config.get("navigationStyle").and_then(Value::as_str) == Some("custom")
    }

    /// Default attributes from page config. Non-scalar values are dropped.
    pub fn default_attributes(&self) -> Attributes {
        let mut attribs = Attributes::new();
        for (attr, key) in CONFIG_DEFAULTS {
            if let Some(value) = self.config.get(*key).and_then(scalar_to_string) {
                attribs.insert(attr.to_string(), value);
            }
        }
        if !attribs.contains_key("front-color") {
            let derived = match attribs.get("text-style").map(String::as_str) {
                Some("white") => Some("#ffffff"),
                Some("black") => Some("#000000"),
                _ => None,
            };
            if let Some(color) = derived {
                attribs.insert("front-color".to_string(), color.to_string());
            }
        }
        attribs
    }
}

/// Stringify a string/number/boolean; anything else is rejected.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[derive(Default)]
struct PageMetaScan {
    count: usize,
    first_at_root: Option<usize>,
    navigation_bar: Option<Attributes>,
}

impl PageMetaScan {
    fn strip(&mut self, nodes: Vec<RenderNode>, depth: usize) -> Vec<RenderNode> {
        let mut kept = Vec::with_capacity(nodes.len());
        for (index, node) in nodes.into_iter().enumerate() {
            match node {
                RenderNode::Element(el) if el.name == PAGE_META_TAG => {
                    if self.count == 0 {
                        self.first_at_root = (depth == 0).then_some(index);
                    }
                    self.count += 1;
                    if self.navigation_bar.is_none() {
                        self.navigation_bar = el
                            .children
                            .iter()
                            .filter_map(RenderNode::as_element)
                            .find(|child| child.name == NAVIGATION_BAR_TAG)
                            .map(|child| child.attribs.clone());
                    }
                }
                RenderNode::Element(mut el) => {
                    el.children = self.strip(std::mem::take(&mut el.children), depth + 1);
                    kept.push(RenderNode::Element(el));
                }
                text => kept.push(text),
            }
        }
        kept
    }
}

/// Remove every page-meta element and prepend the synthesized navigation element.
pub fn apply_navigation_bar(
    nodes: Vec<RenderNode>,
    options: &NavigationBarOptions,
    id: &str,
    context: &mut WxmlDependencyContext,
) -> Vec<RenderNode> {
    let mut scan = PageMetaScan::default();
    let mut nodes = scan.strip(nodes, 0);

    if scan.count > 1 {
        context.warn(format!(
            "[wxml] multiple <{}> elements in {}, only the first <{}> is used",
            PAGE_META_TAG, id, NAVIGATION_BAR_TAG
        ));
    }
    if scan.count > 0 && scan.first_at_root != Some(0) {
        context.warn(format!(
            "[wxml] <{}> should be the first node in {}",
            PAGE_META_TAG, id
        ));
    }

    if options.is_custom() {
        return nodes;
    }

    let mut element = ElementNode::new(NAVIGATION_ELEMENT);
    element.attribs = options.default_attributes();
    if let Some(overrides) = scan.navigation_bar {
        for (name, value) in overrides {
            element.attribs.insert(name, value);
        }
    }

    nodes.insert(0, element.into());
    nodes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_wxml;
    use serde_json::json;

    fn options(value: Value) -> NavigationBarOptions {
        match value {
            Value::Object(map) => NavigationBarOptions::new(map),
            _ => NavigationBarOptions::default(),
        }
    }

    fn first_element(nodes: &[RenderNode]) -> &ElementNode {
        nodes[0].as_element().unwrap()
    }

    #[test]
    fn test_navigation_bar_overrides_defaults() {
        let mut ctx = WxmlDependencyContext::new();
        let nodes = parse_wxml(
            r#"<page-meta><navigation-bar title="T"/></page-meta><view>body</view>"#,
        );
        let opts = options(json!({
            "navigationBarTitleText": "Default",
            "navigationBarBackgroundColor": "#000000",
            "navigationBarTextStyle": "white"
        }));
        let out = apply_navigation_bar(nodes, &opts, "/page.wxml", &mut ctx);

        assert_eq!(out.len(), 2);
        let nav = first_element(&out);
        assert_eq!(nav.name, NAVIGATION_ELEMENT);
        assert_eq!(nav.attr("title"), Some("T"));
        assert_eq!(nav.attr("background-color"), Some("#000000"));
        assert_eq!(nav.attr("front-color"), Some("#ffffff"));
        assert!(ctx.warnings().is_empty());
    }

    #[test]
    fn test_custom_style_strips_without_element() {
        let mut ctx = WxmlDependencyContext::new();
        let nodes = parse_wxml(r#"<page-meta><navigation-bar title="T"/></page-meta><view/>"#);
        let opts = options(json!({ "navigationStyle": "custom" }));
        let out = apply_navigation_bar(nodes, &opts, "/page.wxml", &mut ctx);
        assert_eq!(out.len(), 1);
        assert_eq!(first_element(&out).name, "view");
    }

    #[test]
    fn test_first_navigation_bar_across_page_metas() {
        let mut ctx = WxmlDependencyContext::new();
        let nodes = parse_wxml(
            r#"<page-meta/><view><page-meta><navigation-bar title="second"/></page-meta></view>"#,
        );
        let out = apply_navigation_bar(nodes, &NavigationBarOptions::default(), "/p.wxml", &mut ctx);
        assert_eq!(first_element(&out).attr("title"), Some("second"));
        // nested page-meta is stripped too
        assert!(out[1].as_element().unwrap().children.is_empty());
        assert_eq!(ctx.warnings().len(), 1);
        assert!(ctx.warnings()[0].contains("multiple"));
    }

    #[test]
    fn test_page_meta_not_first_warns() {
        let mut ctx = WxmlDependencyContext::new();
        let nodes = parse_wxml(r#"<view/><page-meta/>"#);
        apply_navigation_bar(nodes, &NavigationBarOptions::default(), "/p.wxml", &mut ctx);
        assert_eq!(ctx.warnings().len(), 1);
        assert!(ctx.warnings()[0].contains("first node in /p.wxml"));
    }

    #[test]
    fn test_scalar_config_values_only() {
        let opts = options(json!({
            "navigationBarTitleText": ["not", "scalar"],
            "navigationBarLoading": true,
            "navigationBarBackgroundColor": 255
        }));
        let attribs = opts.default_attributes();
        assert!(!attribs.contains_key("title"));
        assert_eq!(attribs.get("loading").map(String::as_str), Some("true"));
        assert_eq!(
            attribs.get("background-color").map(String::as_str),
            Some("255")
        );
    }
}
