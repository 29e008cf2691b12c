//! Node binding.
//!
//! `compileWxml(options, resolveTemplatePath, resolveWxsPath)` mirrors the
//! library `compile` with the two resolvers supplied as JavaScript functions.
//! A resolver returning anything but a string counts as unresolved.

use indexmap::IndexMap;
use log::warn;
use napi::{Env, JsFunction, JsUnknown, ValueType};
use napi_derive::napi;
use serde::{Deserialize, Serialize};

use crate::compile::{compile, CompileOptions, Resolver};
use crate::navigation::NavigationBarOptions;
use crate::parse::parse_wxml;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[napi(object)]
#[serde(rename_all = "camelCase")]
pub struct NativeCompileOptions {
    pub id: String,
    pub source: String,
    /// Page config object; enables navigation extraction when present.
    pub navigation_bar: Option<serde_json::Value>,
    pub component_tags: Option<serde_json::Value>,
    pub expand_dependencies: Option<bool>,
    pub runtime_module: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[napi(object)]
#[serde(rename_all = "camelCase")]
pub struct NativeCompileResult {
    pub code: String,
    pub dependencies: Vec<String>,
    pub warnings: Vec<String>,
}

struct JsResolver<'e> {
    env: &'e Env,
    template: JsFunction,
    wxs: JsFunction,
}

impl<'e> JsResolver<'e> {
    fn call(&self, function: &JsFunction, raw: &str, importer: &str) -> napi::Result<Option<String>> {
        let args = [self.env.create_string(raw)?, self.env.create_string(importer)?];
        let value: JsUnknown = function.call(None, &args)?;
        if value.get_type()? != ValueType::String {
            return Ok(None);
        }
        let resolved = value.coerce_to_string()?.into_utf8()?.into_owned()?;
        Ok(Some(resolved))
    }

    fn resolve(&self, function: &JsFunction, raw: &str, importer: &str) -> Option<String> {
        match self.call(function, raw, importer) {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!("[wxml] resolver threw for \"{}\" from {}: {}", raw, importer, e);
                None
            }
        }
    }
}

impl<'e> Resolver for JsResolver<'e> {
    fn resolve_template_path(&self, raw: &str, importer: &str) -> Option<String> {
        self.resolve(&self.template, raw, importer)
    }

    fn resolve_wxs_path(&self, raw: &str, importer: &str) -> Option<String> {
        self.resolve(&self.wxs, raw, importer)
    }
}

#[napi]
pub fn compile_wxml(
    env: Env,
    options: NativeCompileOptions,
    resolve_template_path: JsFunction,
    resolve_wxs_path: JsFunction,
) -> napi::Result<NativeCompileResult> {
    let component_tags: IndexMap<String, String> = match options.component_tags {
        Some(value) => serde_json::from_value(value)
            .map_err(|e| napi::Error::from_reason(format!("Invalid componentTags: {}", e)))?,
        None => IndexMap::new(),
    };
    let navigation_bar = match options.navigation_bar {
        Some(serde_json::Value::Object(config)) => Some(NavigationBarOptions::new(config)),
        Some(serde_json::Value::Null) | None => None,
        Some(_) => {
            return Err(napi::Error::from_reason(
                "Invalid navigationBar: expected an object".to_string(),
            ))
        }
    };

    let resolver = JsResolver {
        env: &env,
        template: resolve_template_path,
        wxs: resolve_wxs_path,
    };

    let mut compile_options = CompileOptions::new(options.id, options.source, &resolver)
        .with_component_tags(component_tags);
    compile_options.navigation_bar = navigation_bar;
    compile_options.expand_dependencies = options.expand_dependencies;
    if let Some(runtime_module) = options.runtime_module {
        compile_options.runtime_module = runtime_module;
    }

    let result = compile(compile_options);
    Ok(NativeCompileResult {
        code: result.code,
        dependencies: result.dependencies,
        warnings: result.warnings,
    })
}

/// Parsed render tree as JSON, for tooling and debugging.
#[napi]
pub fn parse_wxml_native(source: String) -> napi::Result<serde_json::Value> {
    serde_json::to_value(parse_wxml(&source))
        .map_err(|e| napi::Error::from_reason(format!("Serialization error: {}", e)))
}
