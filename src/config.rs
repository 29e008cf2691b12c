//! `wxmlc.config.json` and per-page JSON config loading.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

use crate::codegen::DEFAULT_RUNTIME_MODULE;
use crate::error::ConfigError;
use crate::navigation::NavigationBarOptions;

pub const CONFIG_FILE_NAME: &str = "wxmlc.config.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompilerConfig {
    /// Project root for `/`-prefixed references. Defaults to the working directory.
    pub root: Option<PathBuf>,
    pub runtime_module: Option<String>,
    pub component_tags: IndexMap<String, String>,
    /// Navigation defaults applied to every page, below the page's own JSON.
    pub navigation_bar: Option<Map<String, Value>>,
    pub out_dir: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
    pub expand_dependencies: Option<bool>,
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, ConfigError> {
    let data = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&data).map_err(|source| ConfigError::Json {
        path: path.to_path_buf(),
        source,
    })
}

impl CompilerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        read_json(path)
    }

    /// Load `wxmlc.config.json` from `dir` when present.
    pub fn discover(dir: &Path) -> Result<Option<Self>, ConfigError> {
        let path = dir.join(CONFIG_FILE_NAME);
        if path.is_file() {
            Self::load(&path).map(Some)
        } else {
            Ok(None)
        }
    }

    pub fn runtime_module(&self) -> &str {
        self.runtime_module
            .as_deref()
            .unwrap_or(DEFAULT_RUNTIME_MODULE)
    }

    /// Navigation options for a page: the page JSON keys override the
    /// configured defaults. `None` when neither exists.
    pub fn page_navigation(&self, page: Option<Map<String, Value>>) -> Option<NavigationBarOptions> {
        match (&self.navigation_bar, page) {
            (None, None) => None,
            (defaults, page) => {
                let mut config = defaults.clone().unwrap_or_default();
                for (key, value) in page.unwrap_or_default() {
                    config.insert(key, value);
                }
                Some(NavigationBarOptions::new(config))
            }
        }
    }
}

/// Page config sitting next to a template (`index.wxml` -> `index.json`).
/// Anything other than a JSON object is ignored.
pub fn load_page_config(template: &Path) -> Result<Option<Map<String, Value>>, ConfigError> {
    let path = template.with_extension("json");
    if !path.is_file() {
        return Ok(None);
    }
    match read_json::<Value>(&path)? {
        Value::Object(map) => Ok(Some(map)),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_load_camel_case_config() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"{
                "runtimeModule": "my-runtime",
                "componentTags": { "user-card": "x-user-card" },
                "navigationBar": { "navigationBarTitleText": "App" },
                "expandDependencies": false
            }"#,
        )
        .unwrap();

        let config = CompilerConfig::discover(dir.path()).unwrap().unwrap();
        assert_eq!(config.runtime_module(), "my-runtime");
        assert_eq!(
            config.component_tags.get("user-card").map(String::as_str),
            Some("x-user-card")
        );
        assert_eq!(config.expand_dependencies, Some(false));
        assert!(config.out_dir.is_none());
    }

    #[test]
    fn test_missing_config_and_defaults() {
        let dir = TempDir::new().unwrap();
        assert!(CompilerConfig::discover(dir.path()).unwrap().is_none());
        assert_eq!(CompilerConfig::default().runtime_module(), DEFAULT_RUNTIME_MODULE);
    }

    #[test]
    fn test_invalid_config_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "{").unwrap();
        assert!(matches!(
            CompilerConfig::load(&path),
            Err(ConfigError::Json { .. })
        ));
    }

    #[test]
    fn test_page_navigation_merge() {
        let config = CompilerConfig {
            navigation_bar: match json!({ "navigationBarTitleText": "App", "navigationBarTextStyle": "black" }) {
                Value::Object(map) => Some(map),
                _ => None,
            },
            ..CompilerConfig::default()
        };
        let page = match json!({ "navigationBarTitleText": "Page" }) {
            Value::Object(map) => Some(map),
            _ => None,
        };
        let nav = config.page_navigation(page).unwrap();
        let attribs = nav.default_attributes();
        assert_eq!(attribs.get("title").map(String::as_str), Some("Page"));
        assert_eq!(attribs.get("text-style").map(String::as_str), Some("black"));

        assert!(CompilerConfig::default().page_navigation(None).is_none());
    }

    #[test]
    fn test_load_page_config() {
        let dir = TempDir::new().unwrap();
        let template = dir.path().join("index.wxml");
        assert!(load_page_config(&template).unwrap().is_none());
        fs::write(dir.path().join("index.json"), r#"{ "navigationStyle": "custom" }"#).unwrap();
        let page = load_page_config(&template).unwrap().unwrap();
        assert_eq!(page.get("navigationStyle"), Some(&json!("custom")));
    }
}
