//! # WXML Compiler
//!
//! Compiles mini-program markup (`.wxml`) into JavaScript modules exporting
//! `render(scope, ctx)` for a tagged-template host runtime.
//!
//! ## Pipeline
//!
//! 1. **Parse**: markup text → `RenderNode` tree (`parse`).
//! 2. **Navigation**: optional `<page-meta>` extraction (`navigation`).
//! 3. **Collect**: named templates, imports, includes and `<wxs>` modules are
//!    lifted out of the tree (`collect`).
//! 4. **Codegen**: the remaining tree becomes tagged-template markup and the
//!    module around it is emitted (`codegen`).
//! 5. **Expand**: a root compile walks its dependency graph once, sharing one
//!    `WxmlDependencyContext` (`compile`).
//!
//! Resolution of raw references and reading of dependency sources are injected
//! through the `Resolver` and `SourceReader` traits.

mod attributes;
mod batch;
mod cache;
mod codegen;
mod collect;
mod compile;
mod config;
mod context;
mod discovery;
mod error;
mod interpolation;
mod ir;
mod navigation;
mod parse;
mod paths;
mod wxs;

#[cfg(feature = "napi")]
mod native;


pub use attributes::{parse_event_attribute, EventBinding};
pub use batch::{compile_batch, BatchJob, BatchSettings};
pub use cache::{CacheEntry, IncrementalCache};
pub use codegen::{generate_module, local_templates, resolve_wxs_modules, CodegenOptions, DEFAULT_RUNTIME_MODULE};
pub use collect::{collect_special_nodes, Collected};
pub use compile::{
    compile, compile_document, CompileOptions, CompileResult, CompiledDocument, FnResolver,
    FsReader, MemoryReader, Resolver, SourceReader,
};
pub use config::{load_page_config, CompilerConfig, CONFIG_FILE_NAME};
pub use context::WxmlDependencyContext;
pub use discovery::{collect_inputs, find_wxml_files};
pub use error::{CacheError, CliError, ConfigError, ReadError};
pub use interpolation::{build_expression, build_template_data_expression, parse_interpolation};
pub use ir::*;
pub use navigation::{apply_navigation_bar, NavigationBarOptions};
pub use parse::{parse_document, parse_wxml, ParsedDocument};
pub use paths::{normalize_path, relative_specifier, FsResolver};

#[cfg(feature = "napi")]
pub use native::{compile_wxml, parse_wxml_native, NativeCompileOptions, NativeCompileResult};
