//! Compile orchestration.
//!
//! `compile` runs one document through parse, navigation extraction,
//! collection and codegen, then optionally walks its dependency graph. The
//! walk is a DFS driven from the root: every newly reached markup dependency is
//! compiled again (sharing the root's context, without its own expansion) only
//! to learn its direct dependencies, and script dependencies are scanned for
//! `require()` calls.

use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;

use crate::codegen::{generate_module, CodegenOptions, DEFAULT_RUNTIME_MODULE};
use crate::collect::collect_special_nodes;
use crate::context::WxmlDependencyContext;
use crate::error::ReadError;
use crate::ir::{DependencyKind, DirectDependency};
use crate::navigation::{apply_navigation_bar, NavigationBarOptions};
use crate::parse::parse_document;
use crate::wxs::collect_script_dependencies;

// ═══════════════════════════════════════════════════════════════════════════════
// INJECTED SERVICES
// ═══════════════════════════════════════════════════════════════════════════════

/// Path resolution supplied by the host build tool. `None` means unresolvable.
pub trait Resolver {
    fn resolve_template_path(&self, raw: &str, importer: &str) -> Option<String>;
    fn resolve_wxs_path(&self, raw: &str, importer: &str) -> Option<String>;
}

/// Adapts two closures into a [`Resolver`].
pub struct FnResolver<T, W> {
    template: T,
    wxs: W,
}

impl<T, W> FnResolver<T, W>
where
    T: Fn(&str, &str) -> Option<String>,
    W: Fn(&str, &str) -> Option<String>,
{
    pub fn new(template: T, wxs: W) -> Self {
        Self { template, wxs }
    }
}

impl<T, W> Resolver for FnResolver<T, W>
where
    T: Fn(&str, &str) -> Option<String>,
    W: Fn(&str, &str) -> Option<String>,
{
    fn resolve_template_path(&self, raw: &str, importer: &str) -> Option<String> {
        (self.template)(raw, importer)
    }

    fn resolve_wxs_path(&self, raw: &str, importer: &str) -> Option<String> {
        (self.wxs)(raw, importer)
    }
}

/// Source loading for dependency expansion.
pub trait SourceReader {
    fn read_source(&self, id: &str) -> Result<String, ReadError>;
}

/// Reads ids as filesystem paths.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsReader;

static FS_READER: FsReader = FsReader;

impl SourceReader for FsReader {
    fn read_source(&self, id: &str) -> Result<String, ReadError> {
        fs::read_to_string(id).map_err(|source| ReadError::Io {
            id: id.to_string(),
            source,
        })
    }
}

/// In-memory sources keyed by id.
#[derive(Debug, Clone, Default)]
pub struct MemoryReader {
    sources: HashMap<String, String>,
}

impl MemoryReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, id: impl Into<String>, source: impl Into<String>) -> Self {
        self.insert(id, source);
        self
    }

    pub fn insert(&mut self, id: impl Into<String>, source: impl Into<String>) {
        self.sources.insert(id.into(), source.into());
    }
}

impl SourceReader for MemoryReader {
    fn read_source(&self, id: &str) -> Result<String, ReadError> {
        self.sources
            .get(id)
            .cloned()
            .ok_or_else(|| ReadError::Missing(id.to_string()))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// OPTIONS / RESULT
// ═══════════════════════════════════════════════════════════════════════════════

pub struct CompileOptions<'a> {
    /// Absolute id of the document. Used for relative specifiers and as the
    /// traversal key.
    pub id: String,
    pub source: String,
    pub resolver: &'a dyn Resolver,
    pub reader: &'a dyn SourceReader,
    pub navigation_bar: Option<NavigationBarOptions>,
    /// Source tag -> output tag. Listed tags also bind attributes as properties.
    pub component_tags: IndexMap<String, String>,
    /// Context of an enclosing compile. When present, expansion defaults to off.
    pub dependency_context: Option<&'a mut WxmlDependencyContext>,
    pub expand_dependencies: Option<bool>,
    pub runtime_module: String,
}

impl<'a> CompileOptions<'a> {
    pub fn new(id: impl Into<String>, source: impl Into<String>, resolver: &'a dyn Resolver) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            resolver,
            reader: &FS_READER,
            navigation_bar: None,
            component_tags: IndexMap::new(),
            dependency_context: None,
            expand_dependencies: None,
            runtime_module: DEFAULT_RUNTIME_MODULE.to_string(),
        }
    }

    pub fn with_reader(mut self, reader: &'a dyn SourceReader) -> Self {
        self.reader = reader;
        self
    }

    pub fn with_navigation_bar(mut self, navigation_bar: NavigationBarOptions) -> Self {
        self.navigation_bar = Some(navigation_bar);
        self
    }

    pub fn with_component_tags(mut self, component_tags: IndexMap<String, String>) -> Self {
        self.component_tags = component_tags;
        self
    }

    pub fn with_dependency_context(mut self, context: &'a mut WxmlDependencyContext) -> Self {
        self.dependency_context = Some(context);
        self
    }

    pub fn with_expand_dependencies(mut self, expand: bool) -> Self {
        self.expand_dependencies = Some(expand);
        self
    }

    pub fn with_runtime_module(mut self, runtime_module: impl Into<String>) -> Self {
        self.runtime_module = runtime_module.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileResult {
    pub code: String,
    /// Every dependency known to the context, first-encounter order.
    pub dependencies: Vec<String>,
    /// Warnings raised by this call.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// One compiled document and the dependencies it references directly.
#[derive(Debug, Clone)]
pub struct CompiledDocument {
    pub code: String,
    pub direct_dependencies: Vec<DirectDependency>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPILE
// ═══════════════════════════════════════════════════════════════════════════════

pub fn compile(mut options: CompileOptions) -> CompileResult {
    match options.dependency_context.take() {
        Some(context) => {
            let expand = options.expand_dependencies.unwrap_or(false);
            run(&options, context, expand)
        }
        None => {
            let mut context = WxmlDependencyContext::new();
            let expand = options.expand_dependencies.unwrap_or(true);
            run(&options, &mut context, expand)
        }
    }
}

fn run(options: &CompileOptions, context: &mut WxmlDependencyContext, expand: bool) -> CompileResult {
    let warnings_start = context.warnings().len();

    let document = compile_document(
        &options.id,
        &options.source,
        options,
        options.navigation_bar.as_ref(),
        context,
    );

    if expand {
        expand_dependencies(&options.id, &document.direct_dependencies, options, context);
    }

    CompileResult {
        code: document.code,
        dependencies: context.dependencies().to_vec(),
        warnings: context.warnings()[warnings_start..].to_vec(),
    }
}

/// Compile a single document without expansion, registering its direct
/// dependencies with `context`.
pub fn compile_document(
    id: &str,
    source: &str,
    options: &CompileOptions,
    navigation_bar: Option<&NavigationBarOptions>,
    context: &mut WxmlDependencyContext,
) -> CompiledDocument {
    let parsed = parse_document(source);
    for warning in parsed.warnings {
        context.warn(format!("[wxml] {} in {}", warning, id));
    }
    let mut nodes = parsed.nodes;
    if let Some(navigation_bar) = navigation_bar {
        nodes = apply_navigation_bar(nodes, navigation_bar, id, context);
    }

    let collected = collect_special_nodes(nodes, id, options.resolver, context);
    for dependency in &collected.dependencies {
        context.add_dependency(&dependency.id);
    }

    let code = generate_module(
        &collected,
        &CodegenOptions {
            id,
            runtime_module: &options.runtime_module,
            component_tags: &options.component_tags,
        },
        context,
    );

    debug!(
        "[wxml] compiled {} ({} root nodes, {} direct dependencies)",
        id,
        collected.nodes.len(),
        collected.dependencies.len()
    );

    CompiledDocument {
        code,
        direct_dependencies: collected.dependencies,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DEPENDENCY EXPANSION
// ═══════════════════════════════════════════════════════════════════════════════

fn expand_dependencies(
    root: &str,
    dependencies: &[DirectDependency],
    options: &CompileOptions,
    context: &mut WxmlDependencyContext,
) {
    let entered = context.enter(root);
    for dependency in dependencies {
        visit(root, dependency, options, context);
    }
    if entered {
        context.leave(root);
    }
    debug!(
        "[wxml] expanded {}: {} dependencies",
        root,
        context.dependencies().len()
    );
}

fn visit(
    from: &str,
    dependency: &DirectDependency,
    options: &CompileOptions,
    context: &mut WxmlDependencyContext,
) {
    let id = dependency.id.as_str();
    context.add_dependency(id);

    if context.is_active(id) {
        context.warn_circular(from, id);
        return;
    }
    if !context.enter(id) {
        return;
    }

    match options.reader.read_source(id) {
        Ok(source) => {
            let children = match dependency.kind {
                DependencyKind::Template => {
                    compile_document(id, &source, options, None, context).direct_dependencies
                }
                DependencyKind::Script => {
                    collect_script_dependencies(id, &source, options.resolver, context)
                }
            };
            for child in &children {
                visit(id, child, options, context);
            }
        }
        Err(err) => context.warn(format!(
            "[wxml] cannot read dependency {} of {}: {}",
            id, from, err
        )),
    }

    context.leave(id);
}
