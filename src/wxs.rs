//! Script module helpers: `require()` discovery for inline and external
//! script modules.

use lazy_static::lazy_static;
use regex::Regex;

use crate::compile::Resolver;
use crate::context::WxmlDependencyContext;
use crate::ir::DirectDependency;

lazy_static! {
    static ref REQUIRE_RE: Regex =
        Regex::new(r#"\brequire\(\s*(?:"([^"]*)"|'([^']*)')\s*\)"#).unwrap();
}

/// Specifiers of every `require("...")` call, in source order, deduplicated.
pub fn find_requires(source: &str) -> Vec<String> {
    let mut specifiers: Vec<String> = Vec::new();
    for caps in REQUIRE_RE.captures_iter(source) {
        let specifier = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();
        if !specifier.is_empty() && !specifiers.contains(&specifier) {
            specifiers.push(specifier);
        }
    }
    specifiers
}

/// Resolve the requires of an external script module for dependency expansion.
pub fn collect_script_dependencies(
    id: &str,
    source: &str,
    resolver: &dyn Resolver,
    context: &mut WxmlDependencyContext,
) -> Vec<DirectDependency> {
    let mut dependencies = Vec::new();
    for specifier in find_requires(source) {
        match resolver.resolve_wxs_path(&specifier, id) {
            Some(resolved) => dependencies.push(DirectDependency::script(resolved)),
            None => context.warn(format!(
                "[wxml] cannot resolve wxs require \"{}\" from {}",
                specifier, id
            )),
        }
    }
    dependencies
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_requires() {
        let src = r#"
            var a = require("./a.wxs");
            var b = require( './b.wxs' );
            var again = require("./a.wxs");
            var notACall = requireX("./c.wxs");
        "#;
        assert_eq!(find_requires(src), vec!["./a.wxs", "./b.wxs"]);
    }

    #[test]
    fn test_no_requires() {
        assert!(find_requires("module.exports = { f: function() {} };").is_empty());
    }
}
