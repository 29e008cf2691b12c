//! Id and path helpers: relative import specifiers for generated code and the
//! filesystem resolver used by the command-line front end.

use std::path::{Component, Path, PathBuf};

use crate::compile::Resolver;

const RAW_SCRIPT_EXTENSIONS: &[&str] = &["js", "mjs", "cjs", "ts"];
const TEMPLATE_EXTENSION: &str = "wxml";
const WXS_EXTENSION: &str = "wxs";

/// Lexically normalize `path`: drop `.` segments and fold `..` into the parent.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let can_pop = matches!(
                    out.components().next_back(),
                    Some(Component::Normal(_))
                );
                if can_pop {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn segments(id: &str) -> Vec<&str> {
    id.split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect()
}

/// Import specifier reaching `to_id` from the document `from_id`, always
/// starting with `./` or `../` and using `/` separators.
pub fn relative_specifier(from_id: &str, to_id: &str) -> String {
    let from_norm = from_id.replace('\\', "/");
    let to_norm = to_id.replace('\\', "/");
    let mut from_dir = segments(&from_norm);
    from_dir.pop();
    let to = segments(&to_norm);

    let common = from_dir
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let ups = from_dir.len() - common;
    let rest = to[common..].join("/");

    if ups == 0 {
        format!("./{}", rest)
    } else {
        format!("{}{}", "../".repeat(ups), rest)
    }
}

fn extension_of(id: &str) -> Option<&str> {
    let path = id.split(['?', '#']).next().unwrap_or(id);
    let file = path.rsplit('/').next().unwrap_or(path);
    file.rsplit_once('.').map(|(_, ext)| ext)
}

/// Whether the id already names a plain script the bundler handles natively.
pub fn is_raw_script(id: &str) -> bool {
    extension_of(id)
        .map(|ext| RAW_SCRIPT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Import specifier for an external script module, marked with `?wxs` unless
/// it already is a raw script.
pub fn wxs_specifier(from_id: &str, to_id: &str) -> String {
    let specifier = relative_specifier(from_id, to_id);
    if is_raw_script(to_id) {
        specifier
    } else if specifier.contains('?') {
        format!("{}&wxs", specifier)
    } else {
        format!("{}?wxs", specifier)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FILESYSTEM RESOLVER
// ═══════════════════════════════════════════════════════════════════════════════

/// Resolves references against the filesystem. `/x` is taken relative to
/// `root`, anything else relative to the importer's directory.
#[derive(Debug, Clone)]
pub struct FsResolver {
    root: PathBuf,
}

impl FsResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, raw: &str, importer: &str, extension: &str) -> Option<String> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        let base = match raw.strip_prefix('/') {
            Some(rooted) => self.root.join(rooted),
            None => Path::new(importer)
                .parent()
                .unwrap_or_else(|| Path::new(""))
                .join(raw),
        };
        let base = normalize_path(&base);

        let with_extension = {
            let mut candidate = base.clone().into_os_string();
            candidate.push(".");
            candidate.push(extension);
            PathBuf::from(candidate)
        };

        [base, with_extension]
            .into_iter()
            .find(|candidate| candidate.is_file())
            .map(|found| found.to_string_lossy().replace('\\', "/"))
    }
}

impl Resolver for FsResolver {
    fn resolve_template_path(&self, raw: &str, importer: &str) -> Option<String> {
        self.resolve(raw, importer, TEMPLATE_EXTENSION)
    }

    fn resolve_wxs_path(&self, raw: &str, importer: &str) -> Option<String> {
        self.resolve(raw, importer, WXS_EXTENSION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_relative_specifier() {
        assert_eq!(relative_specifier("/src/page.wxml", "/src/a.wxml"), "./a.wxml");
        assert_eq!(
            relative_specifier("/src/pages/index.wxml", "/src/common/head.wxml"),
            "../common/head.wxml"
        );
        assert_eq!(
            relative_specifier("/src/page.wxml", "/src/lib/util/x.wxs"),
            "./lib/util/x.wxs"
        );
        assert_eq!(relative_specifier("/a/b/c/d.wxml", "/x.wxml"), "../../../x.wxml");
    }

    #[test]
    fn test_raw_script_detection() {
        assert!(is_raw_script("/src/util.js"));
        assert!(is_raw_script("/src/util.TS"));
        assert!(is_raw_script("/src/util.mjs?v=1"));
        assert!(!is_raw_script("/src/util.wxs"));
        assert!(!is_raw_script("/src.js/util"));
    }

    #[test]
    fn test_wxs_specifier() {
        assert_eq!(wxs_specifier("/src/p.wxml", "/src/f.wxs"), "./f.wxs?wxs");
        assert_eq!(wxs_specifier("/src/p.wxml", "/src/f.js"), "./f.js");
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path(Path::new("/a/./b/../c")),
            PathBuf::from("/a/c")
        );
        assert_eq!(normalize_path(Path::new("../x")), PathBuf::from("../x"));
    }

    #[test]
    fn test_fs_resolver() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("pages")).unwrap();
        fs::create_dir_all(root.join("common")).unwrap();
        fs::write(root.join("pages/index.wxml"), "<view/>").unwrap();
        fs::write(root.join("common/head.wxml"), "<view/>").unwrap();
        fs::write(root.join("common/fmt.wxs"), "module.exports = {};").unwrap();

        let resolver = FsResolver::new(root);
        let importer = root.join("pages/index.wxml").to_string_lossy().to_string();

        let head = resolver
            .resolve_template_path("../common/head", &importer)
            .unwrap();
        assert!(head.ends_with("common/head.wxml"));

        let rooted = resolver
            .resolve_template_path("/common/head.wxml", &importer)
            .unwrap();
        assert_eq!(rooted, head);

        let fmt = resolver.resolve_wxs_path("../common/fmt", &importer).unwrap();
        assert!(fmt.ends_with("common/fmt.wxs"));

        assert!(resolver.resolve_template_path("./missing.wxml", &importer).is_none());
        assert!(resolver.resolve_template_path("", &importer).is_none());
    }
}
