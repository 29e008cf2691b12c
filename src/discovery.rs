//! Discovery Module for the WXML Compiler
//!
//! Expands command-line inputs into the list of documents to compile.

use log::debug;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

const TEMPLATE_EXTENSION: &str = "wxml";
const SKIPPED_DIRS: &[&str] = &["node_modules"];

fn is_skipped_dir(entry: &DirEntry) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || SKIPPED_DIRS.contains(&name.as_ref())
}

fn is_template(path: &Path) -> bool {
    path.extension().map(|ext| ext == TEMPLATE_EXTENSION).unwrap_or(false)
}

/// Recursively find all .wxml files under `dir`, sorted by path.
pub fn find_wxml_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_entry(|entry| !is_skipped_dir(entry))
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file() && is_template(entry.path()))
        .map(|entry| entry.into_path())
        .collect();
    files.sort();
    debug!("[wxml] found {} templates under {}", files.len(), dir.display());
    files
}

/// Expand inputs: files are kept as given, directories are searched.
/// Duplicates are dropped, first occurrence wins.
pub fn collect_inputs(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut out: Vec<PathBuf> = Vec::new();
    for input in inputs {
        let found = if input.is_dir() {
            find_wxml_files(input)
        } else {
            vec![input.clone()]
        };
        for path in found {
            if !out.contains(&path) {
                out.push(path);
            }
        }
    }
    out
}
