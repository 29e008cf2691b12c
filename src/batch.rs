//! Parallel compilation of independent documents.
//!
//! Each job is a separate root compile with its own dependency context, so
//! jobs never observe each other's traversal state.

use indexmap::IndexMap;
use log::debug;
use rayon::prelude::*;

use crate::compile::{compile, CompileOptions, CompileResult, Resolver, SourceReader};
use crate::navigation::NavigationBarOptions;

#[derive(Debug, Clone)]
pub struct BatchJob {
    pub id: String,
    pub source: String,
    pub navigation_bar: Option<NavigationBarOptions>,
}

impl BatchJob {
    pub fn new(id: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            navigation_bar: None,
        }
    }
}

/// Settings shared by every job of a batch.
pub struct BatchSettings<'a> {
    pub resolver: &'a (dyn Resolver + Sync),
    pub reader: &'a (dyn SourceReader + Sync),
    pub component_tags: &'a IndexMap<String, String>,
    pub runtime_module: &'a str,
    pub expand_dependencies: bool,
}

/// Compile every job in parallel. Results are in job order.
pub fn compile_batch(jobs: &[BatchJob], settings: &BatchSettings) -> Vec<CompileResult> {
    debug!("[wxml] compiling batch of {} documents", jobs.len());
    jobs.par_iter()
        .map(|job| {
            let mut options = CompileOptions::new(job.id.clone(), job.source.clone(), settings.resolver)
                .with_reader(settings.reader)
                .with_component_tags(settings.component_tags.clone())
                .with_runtime_module(settings.runtime_module)
                .with_expand_dependencies(settings.expand_dependencies);
            options.navigation_bar = job.navigation_bar.clone();
            compile(options)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::{FnResolver, MemoryReader};

    fn resolve(raw: &str, _importer: &str) -> Option<String> {
        Some(format!("/src/{}", raw.trim_start_matches("./")))
    }

    #[test]
    fn test_batch_keeps_order_and_isolates_contexts() {
        let resolver = FnResolver::new(resolve, resolve);
        let reader = MemoryReader::new().with_source("/src/shared.wxml", "<view/>");
        let tags = IndexMap::new();
        let settings = BatchSettings {
            resolver: &resolver,
            reader: &reader,
            component_tags: &tags,
            runtime_module: "@wxml/runtime",
            expand_dependencies: true,
        };

        let jobs: Vec<BatchJob> = (0..16)
            .map(|i| {
                BatchJob::new(
                    format!("/src/page{}.wxml", i),
                    format!(r#"<include src="./shared.wxml"/><text>{}</text>"#, i),
                )
            })
            .collect();

        let results = compile_batch(&jobs, &settings);
        assert_eq!(results.len(), 16);
        for (i, result) in results.iter().enumerate() {
            assert!(result.code.contains(&format!("<span>{}</span>", i)));
            assert_eq!(result.dependencies, vec!["/src/shared.wxml"]);
            assert!(result.warnings.is_empty());
        }
    }
}
