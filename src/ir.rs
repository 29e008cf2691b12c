use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════════════════════
// RENDER TREE
// ═══════════════════════════════════════════════════════════════════════════════

/// Attribute map of an element. Insertion order is the source order and keys
/// are unique.
pub type Attributes = IndexMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RenderNode {
    Text(TextNode),
    Element(ElementNode),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextNode {
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementNode {
    pub name: String,
    pub attribs: Attributes,
    #[serde(default)]
    pub children: Vec<RenderNode>,
}

impl RenderNode {
    pub fn text(data: impl Into<String>) -> Self {
        RenderNode::Text(TextNode { data: data.into() })
    }

    pub fn as_element(&self) -> Option<&ElementNode> {
        match self {
            RenderNode::Element(el) => Some(el),
            RenderNode::Text(_) => None,
        }
    }
}

impl ElementNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attribs: Attributes::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attribs.insert(name.into(), value.into());
        self
    }

    pub fn with_children(mut self, children: Vec<RenderNode>) -> Self {
        self.children = children;
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attribs.get(name).map(String::as_str)
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attribs.contains_key(name)
    }

    /// Concatenated text of the direct text children.
    pub fn text_content(&self) -> String {
        self.children
            .iter()
            .filter_map(|child| match child {
                RenderNode::Text(t) => Some(t.data.as_str()),
                RenderNode::Element(_) => None,
            })
            .collect()
    }
}

impl From<ElementNode> for RenderNode {
    fn from(el: ElementNode) -> Self {
        RenderNode::Element(el)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SPECIAL NODE ENTRIES
// ═══════════════════════════════════════════════════════════════════════════════

/// A named `<template name="...">` fragment lifted out of the render tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateDefinition {
    pub name: String,
    pub nodes: Vec<RenderNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportEntry {
    pub resolved_id: String,
    pub binding: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncludeEntry {
    pub resolved_id: String,
    pub binding: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WxsKind {
    Src,
    Inline,
}

/// A `require()` inside an inline script module, resolved to an imported binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WxsRequire {
    pub specifier: String,
    pub resolved_id: String,
    pub binding: String,
}

/// Script module declaration. For `Src` modules `value` is the resolved id and
/// `binding` the imported name; for `Inline` modules `value` is the code and
/// `binding` names the constant holding it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WxsEntry {
    pub module_name: String,
    pub kind: WxsKind,
    pub binding: String,
    pub value: String,
    #[serde(default)]
    pub requires: Vec<WxsRequire>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// INTERPOLATION
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum InterpolationPart {
    Text(String),
    Expr(String),
}

impl InterpolationPart {
    pub fn is_text(&self) -> bool {
        matches!(self, InterpolationPart::Text(_))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DEPENDENCIES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyKind {
    /// Markup document pulled in by `<import>` or `<include>`.
    Template,
    /// Script module pulled in by `<wxs src>` or `require()`.
    Script,
}

/// A dependency discovered while compiling a single document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectDependency {
    pub id: String,
    pub kind: DependencyKind,
}

impl DirectDependency {
    pub fn template(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: DependencyKind::Template,
        }
    }

    pub fn script(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: DependencyKind::Script,
        }
    }
}
