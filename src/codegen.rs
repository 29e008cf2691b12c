//! Codegen module for the WXML compiler
//!
//! Turns the renderable tree left by the collector into tagged-template markup
//! and emits the final JavaScript module around it.
//!
//! Every node compiles to a template-literal *body*: markup text with `${...}`
//! holes. A body becomes a standalone value by wrapping it in `` html`...` ``.

use indexmap::IndexMap;
use lazy_static::lazy_static;
use log::debug;
use std::collections::{HashMap, HashSet};

use crate::attributes::{
    compile_attributes, escape_markup_text, escape_template_literal, AttributeOptions,
};
use crate::collect::Collected;
use crate::context::WxmlDependencyContext;
use crate::interpolation::{
    build_expression, build_template_data_expression, is_literal, js_string, parse_interpolation,
};
use crate::ir::{ElementNode, RenderNode, TemplateDefinition, WxsEntry, WxsKind};
use crate::paths::{relative_specifier, wxs_specifier};

pub const DEFAULT_RUNTIME_MODULE: &str = "@wxml/runtime";

const RUNTIME_IMPORTS: &[&str] = &[
    "html",
    "evaluate",
    "toIterable",
    "repeat",
    "mergeScope",
    "invokeTemplate",
    "createWxsModule",
    "bindEvent",
];

const WXS_VAR: &str = "__wxs";
const TEMPLATES_VAR: &str = "__tpls";
const ROOT_SCOPE: &str = "scope";

const IF_ATTR: &str = "wx:if";
const ELIF_ATTR: &str = "wx:elif";
const ELSE_ATTR: &str = "wx:else";
const FOR_ATTR: &str = "wx:for";
const FOR_ITEMS_ATTR: &str = "wx:for-items";
const FOR_ITEM_ATTR: &str = "wx:for-item";
const FOR_INDEX_ATTR: &str = "wx:for-index";
const KEY_ATTR: &str = "wx:key";

const FRAGMENT_TAG: &str = "block";
const DEFAULT_TAG: &str = "div";

// ═══════════════════════════════════════════════════════════════════════════════
// TAG TABLES
// ═══════════════════════════════════════════════════════════════════════════════

lazy_static! {
    static ref BUILTIN_TAGS: HashMap<&'static str, &'static str> = {
        let mut m = HashMap::new();
        for tag in [
            "view",
            "cover-view",
            "scroll-view",
            "swiper",
            "swiper-item",
            "movable-area",
            "movable-view",
            "page-container",
            "root-portal",
        ] {
            m.insert(tag, "div");
        }
        m.insert("text", "span");
        m.insert("label", "span");
        m.insert("image", "img");
        m.insert("cover-image", "img");
        m.insert("navigator", "a");
        m.insert("icon", "i");
        for tag in ["button", "input", "textarea", "form", "progress", "video", "audio", "canvas"] {
            m.insert(tag, tag);
        }
        m
    };

    static ref SELF_CLOSING_TAGS: HashSet<&'static str> = {
        let mut s = HashSet::new();
        for tag in [
            "img", "input", "br", "hr", "meta", "link", "area", "base", "col", "embed", "source",
            "track", "wbr",
        ] {
            s.insert(tag);
        }
        s
    };

    static ref CONTROL_ATTRIBUTES: HashSet<&'static str> = {
        let mut s = HashSet::new();
        for attr in [
            IF_ATTR,
            ELIF_ATTR,
            ELSE_ATTR,
            FOR_ATTR,
            FOR_ITEMS_ATTR,
            FOR_ITEM_ATTR,
            FOR_INDEX_ATTR,
            KEY_ATTR,
        ] {
            s.insert(attr);
        }
        s
    };
}

/// Output tag for a source tag: custom table, then built-ins, then the name itself.
pub fn resolve_tag<'a>(name: &'a str, component_tags: &'a IndexMap<String, String>) -> &'a str {
    if let Some(alias) = component_tags.get(name) {
        return alias;
    }
    if let Some(builtin) = BUILTIN_TAGS.get(name) {
        return *builtin;
    }
    if name.is_empty() {
        DEFAULT_TAG
    } else {
        name
    }
}

pub fn is_self_closing(tag: &str) -> bool {
    SELF_CLOSING_TAGS.contains(tag)
}

// ═══════════════════════════════════════════════════════════════════════════════
// COLLISION RULES
// ═══════════════════════════════════════════════════════════════════════════════

/// Local template registry. A later definition of a name overwrites the earlier
/// one and keeps its first position.
pub fn local_templates(definitions: &[TemplateDefinition]) -> IndexMap<&str, &TemplateDefinition> {
    let mut registry = IndexMap::new();
    for definition in definitions {
        registry.insert(definition.name.as_str(), definition);
    }
    registry
}

/// Script module seen by expressions for each name: the last registration wins.
pub fn resolve_wxs_modules(entries: &[WxsEntry]) -> IndexMap<&str, &WxsEntry> {
    let mut modules = IndexMap::new();
    for entry in entries {
        modules.insert(entry.module_name.as_str(), entry);
    }
    modules
}

// ═══════════════════════════════════════════════════════════════════════════════
// NODE RENDERER
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
struct Frame {
    scope: String,
    depth: usize,
}

impl Frame {
    fn root() -> Self {
        Frame {
            scope: ROOT_SCOPE.to_string(),
            depth: 0,
        }
    }

    fn child(&self) -> Self {
        let depth = self.depth + 1;
        Frame {
            scope: format!("__scope{}", depth),
            depth,
        }
    }
}

struct Renderer<'a> {
    id: &'a str,
    component_tags: &'a IndexMap<String, String>,
    context: &'a mut WxmlDependencyContext,
}

impl<'a> Renderer<'a> {
    fn expression(&self, value: &str, frame: &Frame) -> String {
        build_expression(&parse_interpolation(value), &frame.scope, WXS_VAR)
    }

    fn nodes(&mut self, nodes: &[RenderNode], frame: &Frame) -> String {
        let mut out = String::new();
        let mut i = 0;
        while i < nodes.len() {
            match &nodes[i] {
                RenderNode::Text(text) => {
                    out.push_str(&self.text(&text.data, frame));
                    i += 1;
                }
                RenderNode::Element(el) if is_loop(el) => {
                    out.push_str(&self.repeat(el, frame));
                    i += 1;
                }
                RenderNode::Element(el) if el.has_attr(IF_ATTR) => {
                    let (code, consumed) = self.conditional_chain(&nodes[i..], frame);
                    out.push_str(&code);
                    i += consumed;
                }
                RenderNode::Element(el) => {
                    if el.has_attr(ELIF_ATTR) || el.has_attr(ELSE_ATTR) {
                        self.context.warn(format!(
                            "[wxml] <{}> with wx:elif/wx:else has no preceding wx:if in {}",
                            el.name, self.id
                        ));
                    }
                    out.push_str(&self.element(el, frame));
                    i += 1;
                }
            }
        }
        out
    }

    fn text(&self, data: &str, frame: &Frame) -> String {
        let parts = parse_interpolation(data);
        if is_literal(&parts) {
            escape_template_literal(&escape_markup_text(data))
        } else {
            format!("${{{}}}", build_expression(&parts, &frame.scope, WXS_VAR))
        }
    }

    /// Compile an if/elif/else run starting at `nodes[0]`. Returns the code and
    /// how many siblings it consumed.
    fn conditional_chain(&mut self, nodes: &[RenderNode], frame: &Frame) -> (String, usize) {
        let mut branches: Vec<(&ElementNode, &str)> = Vec::new();
        let mut fallback: Option<&ElementNode> = None;

        if let Some(RenderNode::Element(first)) = nodes.first() {
            branches.push((first, first.attr(IF_ATTR).unwrap_or_default()));
        }

        let mut consumed = 1;
        for node in &nodes[1..] {
            let RenderNode::Element(el) = node else {
                break;
            };
            if el.has_attr(IF_ATTR) {
                break;
            }
            if let Some(condition) = el.attr(ELIF_ATTR) {
                branches.push((el, condition));
                consumed += 1;
            } else if el.has_attr(ELSE_ATTR) {
                fallback = Some(el);
                consumed += 1;
                break;
            } else {
                break;
            }
        }

        let mut acc = match fallback {
            Some(el) => format!("html`{}`", self.branch(el, frame)),
            None => js_string(""),
        };
        for (el, condition) in branches.into_iter().rev() {
            let test = self.expression(condition, frame);
            acc = format!("({} ? html`{}` : {})", test, self.branch(el, frame), acc);
        }

        (format!("${{{}}}", acc), consumed)
    }

    fn branch(&mut self, el: &ElementNode, frame: &Frame) -> String {
        if is_loop(el) {
            self.repeat(el, frame)
        } else {
            self.element(el, frame)
        }
    }

    fn repeat(&mut self, el: &ElementNode, frame: &Frame) -> String {
        let list_source = el
            .attr(FOR_ATTR)
            .or_else(|| el.attr(FOR_ITEMS_ATTR))
            .unwrap_or_default();
        let list = self.expression(list_source, frame);

        let (item_name, index_name) = loop_names(el);
        let inner = frame.child();
        let scope_decl = format!(
            "const {} = {{ __proto__: {}, {}: __item, {}: __index }};",
            inner.scope,
            frame.scope,
            js_string(&item_name),
            js_string(&index_name)
        );

        let key_fn = match el.attr(KEY_ATTR).map(str::trim).filter(|k| !k.is_empty()) {
            None => format!("() => {}", js_string("")),
            Some("*this") => "(__item) => __item".to_string(),
            Some(key) => {
                let parts = parse_interpolation(key);
                if is_literal(&parts) {
                    format!("(__item) => __item?.[{}]", js_string(key))
                } else {
                    format!(
                        "(__item, __index) => {{ {} return {}; }}",
                        scope_decl,
                        build_expression(&parts, &inner.scope, WXS_VAR)
                    )
                }
            }
        };

        let body = match el.attr(IF_ATTR) {
            Some(condition) => {
                let test = self.expression(condition, &inner);
                format!(
                    "${{({} ? html`{}` : {})}}",
                    test,
                    self.element(el, &inner),
                    js_string("")
                )
            }
            None => self.element(el, &inner),
        };

        format!(
            "${{repeat(toIterable({}), {}, (__item, __index) => {{ {} return html`{}`; }})}}",
            list, key_fn, scope_decl, body
        )
    }

    fn element(&mut self, el: &ElementNode, frame: &Frame) -> String {
        if el.name == FRAGMENT_TAG {
            return self.nodes(&el.children, frame);
        }
        if el.name == "template" {
            return match el.attr("is") {
                Some(is) => self.invoke_template(el, is, frame),
                None => self.nodes(&el.children, frame),
            };
        }

        let tag = resolve_tag(&el.name, self.component_tags);
        let options = AttributeOptions {
            use_properties: self.component_tags.contains_key(&el.name),
            scope: &frame.scope,
            wxs: WXS_VAR,
        };
        let attrs = compile_attributes(
            el.attribs
                .iter()
                .filter(|(name, _)| !CONTROL_ATTRIBUTES.contains(name.as_str())),
            &options,
        );

        if is_self_closing(tag) {
            format!("<{}{} />", tag, attrs)
        } else {
            let children = self.nodes(&el.children, frame);
            format!("<{}{}>{}</{}>", tag, attrs, children, tag)
        }
    }

    fn invoke_template(&mut self, el: &ElementNode, is: &str, frame: &Frame) -> String {
        let name = self.expression(is, frame);
        let scope = match el.attr("data") {
            Some(data) => format!(
                "mergeScope({}, {})",
                frame.scope,
                build_template_data_expression(data, &frame.scope, WXS_VAR)
            ),
            None => frame.scope.clone(),
        };
        format!(
            "${{invokeTemplate({}, {}, {}, ctx)}}",
            TEMPLATES_VAR, name, scope
        )
    }
}

fn is_loop(el: &ElementNode) -> bool {
    el.has_attr(FOR_ATTR) || el.has_attr(FOR_ITEMS_ATTR)
}

/// Item and index names of a loop. A colliding index name gets an `Index` suffix.
pub fn loop_names(el: &ElementNode) -> (String, String) {
    let pick = |attr: &str, default: &str| {
        el.attr(attr)
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(default)
            .to_string()
    };
    let item = pick(FOR_ITEM_ATTR, "item");
    let mut index = pick(FOR_INDEX_ATTR, "index");
    if index == item {
        index.push_str("Index");
    }
    (item, index)
}

/// Compile a node list into template-literal body text.
pub fn render_body(
    nodes: &[RenderNode],
    id: &str,
    component_tags: &IndexMap<String, String>,
    context: &mut WxmlDependencyContext,
) -> String {
    let mut renderer = Renderer {
        id,
        component_tags,
        context,
    };
    renderer.nodes(nodes, &Frame::root())
}

// ═══════════════════════════════════════════════════════════════════════════════
// MODULE EMISSION
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy)]
pub struct CodegenOptions<'a> {
    pub id: &'a str,
    pub runtime_module: &'a str,
    pub component_tags: &'a IndexMap<String, String>,
}

fn wxs_prelude(has_wxs: bool) -> &'static str {
    if has_wxs {
        "const __wxs = __getWxs();"
    } else {
        "const __wxs = {};"
    }
}

fn emit_imports(out: &mut String, collected: &Collected, options: &CodegenOptions) {
    out.push_str(&format!(
        "import {{ {} }} from {};\n",
        RUNTIME_IMPORTS.join(", "),
        js_string(options.runtime_module)
    ));
    for import in &collected.imports {
        out.push_str(&format!(
            "import * as {} from {};\n",
            import.binding,
            js_string(&relative_specifier(options.id, &import.resolved_id))
        ));
    }
    for include in &collected.includes {
        out.push_str(&format!(
            "import {{ render as {} }} from {};\n",
            include.binding,
            js_string(&relative_specifier(options.id, &include.resolved_id))
        ));
    }
    for entry in &collected.wxs {
        match entry.kind {
            WxsKind::Src => out.push_str(&format!(
                "import {} from {};\n",
                entry.binding,
                js_string(&wxs_specifier(options.id, &entry.value))
            )),
            WxsKind::Inline => {
                for require in &entry.requires {
                    out.push_str(&format!(
                        "import {} from {};\n",
                        require.binding,
                        js_string(&wxs_specifier(options.id, &require.resolved_id))
                    ));
                }
            }
        }
    }
    for entry in collected.wxs.iter().filter(|e| e.kind == WxsKind::Inline) {
        out.push_str(&format!(
            "const {} = {};\n",
            entry.binding,
            js_string(&entry.value)
        ));
    }
}

fn emit_wxs(out: &mut String, entries: &[WxsEntry]) {
    out.push_str("const __wxsCache = new Map();\n");
    out.push_str("function __inlineWxs(name, code, requireMap) {\n");
    out.push_str("  if (!__wxsCache.has(name)) {\n");
    out.push_str("    __wxsCache.set(name, createWxsModule(code, name, requireMap));\n");
    out.push_str("  }\n");
    out.push_str("  return __wxsCache.get(name);\n");
    out.push_str("}\n\n");

    out.push_str("function __getWxs() {\n  const __modules = {};\n");
    for entry in entries {
        let value = match entry.kind {
            WxsKind::Src => entry.binding.clone(),
            WxsKind::Inline => {
                let requires: Vec<String> = entry
                    .requires
                    .iter()
                    .map(|r| format!("{}: {}", js_string(&r.specifier), r.binding))
                    .collect();
                let require_map = if requires.is_empty() {
                    "{}".to_string()
                } else {
                    format!("{{ {} }}", requires.join(", "))
                };
                format!(
                    "__inlineWxs({}, {}, {})",
                    js_string(&entry.module_name),
                    entry.binding,
                    require_map
                )
            }
        };
        out.push_str(&format!(
            "  __modules[{}] = {};\n",
            js_string(&entry.module_name),
            value
        ));
    }
    out.push_str("  return __modules;\n}\n\n");
}

/// Emit the complete JavaScript module for one collected document.
pub fn generate_module(
    collected: &Collected,
    options: &CodegenOptions,
    context: &mut WxmlDependencyContext,
) -> String {
    let has_wxs = !collected.wxs.is_empty();
    let mut out = String::new();

    emit_imports(&mut out, collected, options);
    out.push('\n');

    // Named templates
    let registry = local_templates(&collected.templates);
    out.push_str("const __templates = {\n");
    for (name, definition) in &registry {
        let body = render_body(&definition.nodes, options.id, options.component_tags, context);
        out.push_str(&format!(
            "  {}: (scope, ctx) => {{\n    {}\n    const {} = __getTemplates();\n    return html`{}`;\n  }},\n",
            js_string(name),
            wxs_prelude(has_wxs),
            TEMPLATES_VAR,
            body
        ));
    }
    out.push_str("};\n\n");

    if has_wxs {
        let winners = resolve_wxs_modules(&collected.wxs);
        debug!(
            "[wxml] {}: wxs modules {:?}",
            options.id,
            winners
                .iter()
                .map(|(name, entry)| format!("{}={}", name, entry.binding))
                .collect::<Vec<_>>()
        );
        emit_wxs(&mut out, &collected.wxs);
    }

    // Registry: import bags first so local names shadow imported ones
    let mut spreads: Vec<String> = collected
        .imports
        .iter()
        .map(|import| format!("...{}.templates", import.binding))
        .collect();
    spreads.push("...__templates".to_string());
    out.push_str(&format!(
        "function __getTemplates() {{\n  return {{ {} }};\n}}\n\n",
        spreads.join(", ")
    ));

    // Includes render as a prefix in encounter order
    let mut body: String = collected
        .includes
        .iter()
        .map(|include| format!("${{{}(scope, ctx)}}", include.binding))
        .collect();
    body.push_str(&render_body(
        &collected.nodes,
        options.id,
        options.component_tags,
        context,
    ));

    out.push_str(&format!(
        "export function render(scope, ctx) {{\n  {}\n  const {} = __getTemplates();\n  return html`{}`;\n}}\n\n",
        wxs_prelude(has_wxs),
        TEMPLATES_VAR,
        body
    ));
    out.push_str("export const templates = __templates;\n");
    out.push_str("export default render;\n");
    out
}
