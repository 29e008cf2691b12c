//! Special-node collection.
//!
//! Walks the parsed tree and lifts out everything that is not rendered in
//! place: named templates, imports, includes and script modules. What remains
//! is the renderable tree.

use log::debug;
use std::collections::HashSet;

use crate::compile::Resolver;
use crate::context::WxmlDependencyContext;
use crate::ir::{
    DirectDependency, ElementNode, ImportEntry, IncludeEntry, RenderNode, TemplateDefinition,
    WxsEntry, WxsKind, WxsRequire,
};
use crate::wxs::find_requires;

const IMPORT_TAGS: &[&str] = &["import", "wx-import"];
const INCLUDE_TAGS: &[&str] = &["include", "wx-include"];
const TEMPLATE_TAG: &str = "template";
const WXS_TAG: &str = "wxs";

/// Output of [`collect_special_nodes`].
#[derive(Debug, Default)]
pub struct Collected {
    pub nodes: Vec<RenderNode>,
    pub templates: Vec<TemplateDefinition>,
    pub imports: Vec<ImportEntry>,
    pub includes: Vec<IncludeEntry>,
    pub wxs: Vec<WxsEntry>,
    /// Resolved dependencies in encounter order.
    pub dependencies: Vec<DirectDependency>,
}

struct Collector<'a> {
    importer: &'a str,
    resolver: &'a dyn Resolver,
    context: &'a mut WxmlDependencyContext,
    out: Collected,
    wxs_names: HashSet<String>,
    wxs_src_count: usize,
    wxs_inline_count: usize,
    require_count: usize,
}

impl<'a> Collector<'a> {
    fn walk(&mut self, nodes: Vec<RenderNode>) -> Vec<RenderNode> {
        let mut kept = Vec::with_capacity(nodes.len());
        for node in nodes {
            match node {
                RenderNode::Text(_) => kept.push(node),
                RenderNode::Element(el) => {
                    if let Some(el) = self.visit_element(el) {
                        kept.push(RenderNode::Element(el));
                    }
                }
            }
        }
        kept
    }

    fn visit_element(&mut self, mut el: ElementNode) -> Option<ElementNode> {
        let tag = el.name.as_str();

        if tag == TEMPLATE_TAG {
            if let Some(name) = el.attr("name").filter(|n| !n.is_empty()) {
                let name = name.to_string();
                let nodes = self.walk(std::mem::take(&mut el.children));
                self.out.templates.push(TemplateDefinition { name, nodes });
                return None;
            }
        }

        if IMPORT_TAGS.contains(&tag) {
            if let Some(src) = el.attr("src") {
                self.import(src);
            }
            return None;
        }

        if INCLUDE_TAGS.contains(&tag) {
            if let Some(src) = el.attr("src") {
                self.include(src);
            }
            return None;
        }

        if tag == WXS_TAG {
            self.wxs(&el);
            return None;
        }

        el.children = self.walk(std::mem::take(&mut el.children));
        Some(el)
    }

    fn import(&mut self, raw: &str) {
        match self.resolver.resolve_template_path(raw, self.importer) {
            Some(resolved_id) => {
                let binding = format!("__wxml_import_{}", self.out.imports.len());
                self.out
                    .dependencies
                    .push(DirectDependency::template(resolved_id.clone()));
                self.out.imports.push(ImportEntry {
                    resolved_id,
                    binding,
                });
            }
            None => self.context.warn(format!(
                "[wxml] cannot resolve import \"{}\" from {}",
                raw, self.importer
            )),
        }
    }

    fn include(&mut self, raw: &str) {
        match self.resolver.resolve_template_path(raw, self.importer) {
            Some(resolved_id) => {
                let binding = format!("__wxml_include_{}", self.out.includes.len());
                self.out
                    .dependencies
                    .push(DirectDependency::template(resolved_id.clone()));
                self.out.includes.push(IncludeEntry {
                    resolved_id,
                    binding,
                });
            }
            None => self.context.warn(format!(
                "[wxml] cannot resolve include \"{}\" from {}",
                raw, self.importer
            )),
        }
    }

    fn wxs(&mut self, el: &ElementNode) {
        let module_name = el.attr("module").map(str::trim).unwrap_or_default();
        if module_name.is_empty() {
            return;
        }
        let module_name = module_name.to_string();

        if let Some(src) = el.attr("src") {
            match self.resolver.resolve_wxs_path(src, self.importer) {
                Some(resolved_id) => {
                    let binding = format!("__wxs_{}", self.wxs_src_count);
                    self.wxs_src_count += 1;
                    self.out
                        .dependencies
                        .push(DirectDependency::script(resolved_id.clone()));
                    self.register_wxs(WxsEntry {
                        module_name,
                        kind: WxsKind::Src,
                        binding,
                        value: resolved_id,
                        requires: Vec::new(),
                    });
                }
                None => self.context.warn(format!(
                    "[wxml] cannot resolve wxs \"{}\" from {}",
                    src, self.importer
                )),
            }
            return;
        }

        let code = el.text_content();
        let requires = self.inline_requires(&code);
        let binding = format!("__wxs_inline_{}", self.wxs_inline_count);
        self.wxs_inline_count += 1;
        self.register_wxs(WxsEntry {
            module_name,
            kind: WxsKind::Inline,
            binding,
            value: code,
            requires,
        });
    }

    /// Only registered modules count towards the duplicate check.
    fn register_wxs(&mut self, entry: WxsEntry) {
        if !self.wxs_names.insert(entry.module_name.clone()) {
            self.context.warn(format!(
                "[wxml] duplicate wxs module \"{}\" in {}",
                entry.module_name, self.importer
            ));
        }
        self.out.wxs.push(entry);
    }

    fn inline_requires(&mut self, code: &str) -> Vec<WxsRequire> {
        let mut requires = Vec::new();
        for specifier in find_requires(code) {
            match self.resolver.resolve_wxs_path(&specifier, self.importer) {
                Some(resolved_id) => {
                    let binding = format!("__wxs_require_{}", self.require_count);
                    self.require_count += 1;
                    self.out
                        .dependencies
                        .push(DirectDependency::script(resolved_id.clone()));
                    requires.push(WxsRequire {
                        specifier,
                        resolved_id,
                        binding,
                    });
                }
                None => self.context.warn(format!(
                    "[wxml] cannot resolve wxs require \"{}\" from {}",
                    specifier, self.importer
                )),
            }
        }
        requires
    }
}

/// Split `nodes` into the renderable tree and the special declarations it holds.
pub fn collect_special_nodes(
    nodes: Vec<RenderNode>,
    importer: &str,
    resolver: &dyn Resolver,
    context: &mut WxmlDependencyContext,
) -> Collected {
    let mut collector = Collector {
        importer,
        resolver,
        context,
        out: Collected::default(),
        wxs_names: HashSet::new(),
        wxs_src_count: 0,
        wxs_inline_count: 0,
        require_count: 0,
    };

    let kept = collector.walk(nodes);
    let mut out = collector.out;
    out.nodes = kept;

    debug!(
        "[wxml] {}: {} templates, {} imports, {} includes, {} wxs modules",
        importer,
        out.templates.len(),
        out.imports.len(),
        out.includes.len(),
        out.wxs.len()
    );
    out
}
