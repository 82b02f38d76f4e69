//! Core style-normalization loader
//!
//! The last stage of every pipeline. It always runs, delegates the actual
//! CSS processing to an injected opaque [`StyleProcessor`] (identity by
//! default), and owns everything around that call: project config
//! discovery, CSS modules gating, JS module codegen (default export, named
//! exports, inject runtime) and the extraction payload.

use crate::config::{
    ConfigDiscovery, InjectMode, ModulesMode, NamedExportsMode, OptionValue, ScopedNameFn,
};
use crate::error::Error;
use crate::extract::ExtractedStyle;
use crate::loader::{Loader, LoaderContext, LoaderResult, MatchRule};
use crate::sourcemap::SourceMap;
use crate::utils::{humanize_path, normalize_path};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// File name searched for during config discovery
pub const CONFIG_FILE_NAME: &str = "style.config.json";
/// Extensions the loader claims by default
pub const DEFAULT_EXTENSIONS: &[&str] = &[".css", ".sss", ".pcss"];
/// Scoped-name template used when none is configured
pub const DEFAULT_SCOPED_NAME_TEMPLATE: &str = "[name]_[local]";

/// What the loader asks the processor to do with one file
pub struct ProcessorRequest<'a> {
    pub from: &'a str,
    /// Target filename hint, for processors that rely on it
    pub to: &'a str,
    pub source_map: bool,
    pub prev_map: Option<&'a SourceMap>,
    /// Present when CSS-modules scoping applies to this file
    pub modules: Option<ModulesRequest>,
    /// Present when the processor should minify inline output
    pub minify: Option<&'a Value>,
    /// Discovered project configuration (empty object when none found)
    pub config: &'a Value,
}

pub struct ModulesRequest {
    pub scoped_name_template: String,
    pub naming: Option<ScopedNameFn>,
}

pub struct ProcessorOutput {
    pub css: String,
    pub map: Option<SourceMap>,
    /// Local class name -> scoped class name, when scoping applied
    pub exports: BTreeMap<String, String>,
    pub dependencies: Vec<String>,
    pub warnings: Vec<String>,
}

/// The opaque normalization engine
#[async_trait]
pub trait StyleProcessor: Send + Sync {
    async fn process(
        &self,
        text: &str,
        request: ProcessorRequest<'_>,
    ) -> Result<ProcessorOutput, Error>;
}

/// Default processor: passes CSS through untouched
pub struct IdentityProcessor;

#[async_trait]
impl StyleProcessor for IdentityProcessor {
    async fn process(
        &self,
        text: &str,
        _request: ProcessorRequest<'_>,
    ) -> Result<ProcessorOutput, Error> {
        Ok(ProcessorOutput {
            css: text.to_string(),
            map: None,
            exports: BTreeMap::new(),
            dependencies: Vec::new(),
            warnings: Vec::new(),
        })
    }
}

pub struct CssLoaderOptions {
    pub config: ConfigDiscovery,
    /// Route output to the extraction collector instead of inlining it
    pub extract: bool,
    pub inject: InjectMode,
    /// Inline minification; bundle-level minification happens after
    /// extraction instead
    pub minify: OptionValue<Value>,
    pub modules: ModulesMode,
    pub auto_modules: bool,
    pub named_exports: NamedExportsMode,
    pub to: Option<String>,
}

pub struct CssLoader {
    options: CssLoaderOptions,
    processor: Arc<dyn StyleProcessor>,
    rule: MatchRule,
}

impl CssLoader {
    pub fn new(
        extensions: Vec<String>,
        processor: Arc<dyn StyleProcessor>,
        options: CssLoaderOptions,
    ) -> Self {
        CssLoader {
            options,
            processor,
            rule: MatchRule::Extensions(extensions),
        }
    }

    /// CSS-modules gate. Forced scoping scopes everything; otherwise
    /// `*.module.*` detection decides, unless auto-detection is off (then
    /// an options bag alone forces scoping, matching upstream semantics).
    fn modules_request(&self, id: &str) -> Option<ModulesRequest> {
        let default_request = || ModulesRequest {
            scoped_name_template: DEFAULT_SCOPED_NAME_TEMPLATE.to_string(),
            naming: None,
        };
        match &self.options.modules {
            ModulesMode::Always => Some(default_request()),
            ModulesMode::Options(options) => {
                let applies = !self.options.auto_modules || is_module_file(id);
                applies.then(|| ModulesRequest {
                    scoped_name_template: options
                        .scoped_name_template
                        .clone()
                        .unwrap_or_else(|| DEFAULT_SCOPED_NAME_TEMPLATE.to_string()),
                    naming: options.naming.clone(),
                })
            }
            ModulesMode::Off => {
                (self.options.auto_modules && is_module_file(id)).then(default_request)
            }
        }
    }
}

#[async_trait]
impl Loader for CssLoader {
    fn name(&self) -> &str {
        "css"
    }

    fn always_process(&self) -> bool {
        true
    }

    fn match_rule(&self) -> Option<&MatchRule> {
        Some(&self.rule)
    }

    async fn process(
        &self,
        input: LoaderResult,
        ctx: &mut LoaderContext<'_>,
    ) -> Result<LoaderResult, Error> {
        let config = load_config(&ctx.id, &self.options.config).await?;

        let modules = self.modules_request(&ctx.id);
        let scoped = modules.is_some();
        let minify_options;
        let minify = if !self.options.extract && self.options.minify.is_enabled() {
            minify_options = self
                .options
                .minify
                .as_custom()
                .cloned()
                .unwrap_or_else(|| Value::Object(Map::new()));
            Some(&minify_options)
        } else {
            None
        };

        let to = self.options.to.clone().unwrap_or_else(|| ctx.id.clone());
        let output = self
            .processor
            .process(
                &input.text,
                ProcessorRequest {
                    from: &ctx.id,
                    to: &to,
                    source_map: ctx.source_map.is_enabled(),
                    prev_map: input.map.as_ref(),
                    modules,
                    minify,
                    config: &config,
                },
            )
            .await?;

        for dependency in &output.dependencies {
            ctx.dependencies.insert(normalize_path(dependency));
        }
        for warning in &output.warnings {
            ctx.warn(warning);
        }

        let map = output.map.map(|mut map| {
            map.sources = map.sources.iter().map(|s| normalize_path(s)).collect();
            map
        });

        let mut exports = output.exports.clone();
        let mut code = String::new();
        match &self.options.named_exports {
            NamedExportsMode::Off => {}
            NamedExportsMode::Sanitized => {
                for (name, value) in &output.exports {
                    let export_name = sanitized_identifier(name);
                    if export_name != *name {
                        ctx.warn(&format!(
                            "Exported \"{}\" as \"{}\" in {}",
                            name,
                            export_name,
                            humanize_path(&ctx.id)
                        ));
                    }
                    if !exports.contains_key(&export_name) {
                        exports.insert(export_name.clone(), value.clone());
                    }
                    code.push_str(&format!(
                        "export var {} = {};\n",
                        export_name,
                        js_string(value)?
                    ));
                }
            }
            NamedExportsMode::Custom(naming) => {
                for (name, value) in &output.exports {
                    let export_name = naming(name);
                    if !exports.contains_key(&export_name) {
                        exports.insert(export_name.clone(), value.clone());
                    }
                    code.push_str(&format!(
                        "export var {} = {};\n",
                        export_name,
                        js_string(value)?
                    ));
                }
            }
        }

        if self.options.extract {
            code.push_str(&format!("export default {};", js_exports(&exports)?));
            let extracted = ExtractedStyle {
                id: ctx.id.clone(),
                text: output.css,
                map: map.clone(),
            };
            return Ok(LoaderResult {
                text: code,
                map,
                extracted: Some(extracted),
            });
        }

        let css_literal = js_string(&output.css)?;
        let default_export = if scoped {
            js_exports(&exports)?
        } else {
            "css".to_string()
        };
        code.push_str(&format!(
            "var css = {};\nexport default {};\nexport var stylesheet = {};",
            css_literal, default_export, css_literal
        ));

        match &self.options.inject {
            InjectMode::Off => {}
            InjectMode::Defaults => {
                code.push_str(
                    "\nimport styleInject from 'style-inject';\nstyleInject(css);",
                );
            }
            InjectMode::Options(options) => {
                code.push_str(&format!(
                    "\nimport styleInject from 'style-inject';\nstyleInject(css,{});",
                    serde_json::to_string(options).map_err(|e| Error::loader("css", e))?
                ));
            }
            InjectMode::Custom(generator) => {
                code.push_str(&generator("css", &ctx.id));
            }
        }

        Ok(LoaderResult {
            text: code,
            map,
            extracted: input.extracted,
        })
    }
}

static MODULE_FILE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.module\.[a-z]{2,6}$").expect("static pattern"));
static DASH_RUN: Lazy<Regex> = Lazy::new(|| Regex::new("-+").expect("static pattern"));
static INVALID_IDENTIFIER_CHAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_$]").expect("static pattern"));

/// `*.module.*` naming convention for auto-scoped files
pub fn is_module_file(id: &str) -> bool {
    MODULE_FILE.is_match(id)
}

/// Turn a class name into a valid JS identifier: dash runs become `$_$`
/// style markers, remaining invalid characters become underscores
pub fn sanitized_identifier(name: &str) -> String {
    let escaped = DASH_RUN.replace_all(name, |caps: &regex::Captures<'_>| {
        format!("${}$", caps[0].replace('-', "_"))
    });
    let cleaned = INVALID_IDENTIFIER_CHAR.replace_all(&escaped, "_");
    match cleaned.chars().next() {
        Some(first) if first.is_ascii_digit() => format!("_{}", cleaned),
        _ => cleaned.into_owned(),
    }
}

fn js_string(value: &str) -> Result<String, Error> {
    serde_json::to_string(value).map_err(|e| Error::loader("css", e))
}

fn js_exports(exports: &BTreeMap<String, String>) -> Result<String, Error> {
    serde_json::to_string(exports).map_err(|e| Error::loader("css", e))
}

/// Load the project-level normalizer configuration.
///
/// An absent file is the one recoverable case: it resolves to an empty
/// configuration. Unreadable or invalid files propagate as config errors.
pub async fn load_config(id: &str, discovery: &ConfigDiscovery) -> Result<Value, Error> {
    let empty = || Value::Object(Map::new());
    match discovery {
        ConfigDiscovery::Disabled => Ok(empty()),
        ConfigDiscovery::Path(path) => read_config(Path::new(path)).await,
        ConfigDiscovery::Auto => {
            let mut dir = Path::new(id).parent();
            while let Some(current) = dir {
                let candidate: PathBuf = current.join(CONFIG_FILE_NAME);
                match tokio::fs::read_to_string(&candidate).await {
                    Ok(text) => return parse_config(&candidate, &text),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => {
                        return Err(Error::Config(format!(
                            "failed to read {}: {}",
                            candidate.display(),
                            e
                        )))
                    }
                }
                dir = current.parent();
            }
            Ok(empty())
        }
    }
}

async fn read_config(path: &Path) -> Result<Value, Error> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => parse_config(path, &text),
        // Missing config is not an error, even at an explicit path
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Value::Object(Map::new())),
        Err(e) => Err(Error::Config(format!(
            "failed to read {}: {}",
            path.display(),
            e
        ))),
    }
}

fn parse_config(path: &Path, text: &str) -> Result<Value, Error> {
    serde_json::from_str(text)
        .map_err(|e| Error::Config(format!("invalid config file {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ModulesOptions, SourceMapMode};
    use crate::host::{BuildHost, EmittedAsset, ModuleInfo};
    use std::sync::Mutex;

    struct RecordingHost {
        warnings: Mutex<Vec<String>>,
    }

    impl RecordingHost {
        fn new() -> Self {
            RecordingHost {
                warnings: Mutex::new(Vec::new()),
            }
        }
    }

    impl BuildHost for RecordingHost {
        fn module_info(&self, _id: &str) -> Option<ModuleInfo> {
            None
        }
        fn add_watch_file(&self, _id: &str) {}
        fn emit_asset(&self, _asset: EmittedAsset) {}
        fn warn(&self, message: &str) {
            self.warnings.lock().unwrap().push(message.to_string());
        }
    }

    /// Exports one scoped class when scoping applies
    struct ScopingProcessor;

    #[async_trait]
    impl StyleProcessor for ScopingProcessor {
        async fn process(
            &self,
            text: &str,
            request: ProcessorRequest<'_>,
        ) -> Result<ProcessorOutput, Error> {
            let mut exports = BTreeMap::new();
            if request.modules.is_some() {
                exports.insert("foo-bar".to_string(), "a_foo-bar".to_string());
            }
            Ok(ProcessorOutput {
                css: text.to_string(),
                map: None,
                exports,
                dependencies: vec!["/src/theme.css".to_string()],
                warnings: vec!["deprecated syntax".to_string()],
            })
        }
    }

    fn loader(options: CssLoaderOptions) -> CssLoader {
        CssLoader::new(
            DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            Arc::new(ScopingProcessor),
            options,
        )
    }

    fn base_options() -> CssLoaderOptions {
        CssLoaderOptions {
            config: ConfigDiscovery::Disabled,
            extract: false,
            inject: InjectMode::Defaults,
            minify: OptionValue::Disabled,
            modules: ModulesMode::Off,
            auto_modules: true,
            named_exports: NamedExportsMode::Off,
            to: None,
        }
    }

    #[tokio::test]
    async fn inline_output_embeds_css_and_inject_call() {
        let loader = loader(base_options());
        let host = RecordingHost::new();
        let mut ctx = LoaderContext::new("/src/a.css", SourceMapMode::Off, &host);
        let result = loader
            .process(LoaderResult::from_text(".a{color:red}"), &mut ctx)
            .await
            .unwrap();

        assert!(result.text.contains("var css = \".a{color:red}\";"));
        assert!(result.text.contains("export default css;"));
        assert!(result.text.contains("styleInject(css);"));
        assert!(result.extracted.is_none());
    }

    #[tokio::test]
    async fn extract_routes_css_out_of_the_module() {
        let mut options = base_options();
        options.extract = true;
        let loader = loader(options);
        let host = RecordingHost::new();
        let mut ctx = LoaderContext::new("/src/a.css", SourceMapMode::Off, &host);
        let result = loader
            .process(LoaderResult::from_text(".a{color:red}"), &mut ctx)
            .await
            .unwrap();

        let extracted = result.extracted.unwrap();
        assert_eq!(extracted.id, "/src/a.css");
        assert_eq!(extracted.text, ".a{color:red}");
        // The module output must not inline the stylesheet text
        assert!(!result.text.contains("color:red"));
        assert!(result.text.contains("export default {}"));
    }

    #[tokio::test]
    async fn module_files_are_scoped_automatically() {
        let loader = loader(base_options());
        let host = RecordingHost::new();
        let mut ctx = LoaderContext::new("/src/a.module.css", SourceMapMode::Off, &host);
        let result = loader
            .process(LoaderResult::from_text(".foo-bar{}"), &mut ctx)
            .await
            .unwrap();

        assert!(result.text.contains("export default {\"foo-bar\":\"a_foo-bar\"}"));
    }

    #[tokio::test]
    async fn modules_options_stay_gated_on_detection() {
        let mut options = base_options();
        options.modules = ModulesMode::Options(ModulesOptions {
            scoped_name_template: Some("[hash]_[local]".to_string()),
            naming: None,
        });
        let loader = loader(options);
        let host = RecordingHost::new();

        // An options bag alone does not force scoping of plain files
        let mut ctx = LoaderContext::new("/src/a.css", SourceMapMode::Off, &host);
        let result = loader
            .process(LoaderResult::from_text(".foo-bar{}"), &mut ctx)
            .await
            .unwrap();
        assert!(result.text.contains("export default css;"));

        let mut ctx = LoaderContext::new("/src/a.module.css", SourceMapMode::Off, &host);
        let result = loader
            .process(LoaderResult::from_text(".foo-bar{}"), &mut ctx)
            .await
            .unwrap();
        assert!(result.text.contains("export default {\"foo-bar\":\"a_foo-bar\"}"));
    }

    #[tokio::test]
    async fn named_exports_sanitize_and_warn() {
        let mut options = base_options();
        options.modules = ModulesMode::Always;
        options.named_exports = NamedExportsMode::Sanitized;
        let loader = loader(options);
        let host = RecordingHost::new();
        let mut ctx = LoaderContext::new("/src/a.css", SourceMapMode::Off, &host);
        let result = loader
            .process(LoaderResult::from_text(".foo-bar{}"), &mut ctx)
            .await
            .unwrap();

        assert!(result.text.contains("export var foo$_$bar = \"a_foo-bar\";"));
        let warnings = host.warnings.lock().unwrap();
        assert!(warnings
            .iter()
            .any(|w| w.contains("Exported \"foo-bar\" as \"foo$_$bar\"")));
    }

    #[tokio::test]
    async fn processor_warnings_and_dependencies_flow_through() {
        let loader = loader(base_options());
        let host = RecordingHost::new();
        let mut ctx = LoaderContext::new("/src/a.css", SourceMapMode::Off, &host);
        loader
            .process(LoaderResult::from_text(".a{}"), &mut ctx)
            .await
            .unwrap();

        assert!(ctx.dependencies.contains("/src/theme.css"));
        assert!(host
            .warnings
            .lock()
            .unwrap()
            .contains(&"deprecated syntax".to_string()));
    }

    #[tokio::test]
    async fn custom_inject_generator_is_used() {
        let mut options = base_options();
        options.inject =
            InjectMode::Custom(Arc::new(|var: &str, id: &str| {
                format!("\ncustomInject({}, \"{}\");", var, id)
            }));
        let loader = loader(options);
        let host = RecordingHost::new();
        let mut ctx = LoaderContext::new("/src/a.css", SourceMapMode::Off, &host);
        let result = loader
            .process(LoaderResult::from_text(".a{}"), &mut ctx)
            .await
            .unwrap();
        assert!(result.text.contains("customInject(css, \"/src/a.css\");"));
        assert!(!result.text.contains("style-inject"));
    }

    #[test]
    fn module_file_detection() {
        assert!(is_module_file("/src/a.module.css"));
        assert!(is_module_file("/src/a.module.scss"));
        assert!(!is_module_file("/src/a.css"));
        assert!(!is_module_file("/src/module.css"));
    }

    #[test]
    fn identifier_sanitization() {
        assert_eq!(sanitized_identifier("foo-bar"), "foo$_$bar");
        assert_eq!(sanitized_identifier("foo--bar"), "foo$__$bar");
        assert_eq!(sanitized_identifier("simple"), "simple");
        assert_eq!(sanitized_identifier("1leading"), "_1leading");
        assert_eq!(sanitized_identifier("has.dot"), "has_dot");
    }

    #[tokio::test]
    async fn config_discovery_walks_up_and_recovers_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("src").join("components");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"{ "plugins": ["autoprefix"] }"#,
        )
        .unwrap();

        let id = nested.join("a.css");
        let config = load_config(&id.to_string_lossy(), &ConfigDiscovery::Auto)
            .await
            .unwrap();
        assert_eq!(config["plugins"][0], "autoprefix");

        let elsewhere = tempfile::tempdir().unwrap();
        let id = elsewhere.path().join("a.css");
        let config = load_config(&id.to_string_lossy(), &ConfigDiscovery::Auto)
            .await
            .unwrap();
        assert_eq!(config, Value::Object(Map::new()));
    }

    #[tokio::test]
    async fn invalid_config_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "not json").unwrap();

        let result = load_config(
            "/irrelevant/a.css",
            &ConfigDiscovery::Path(path.to_string_lossy().into_owned()),
        )
        .await;
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
