//! Plugin configuration surface
//!
//! Options that upstream plugins accept as `boolean | object | function`
//! become tagged enums here, resolved once at configuration time. The
//! builder mirrors the layering style of the toolchain's other config
//! loaders: start from defaults, chain `with_*` calls, hand the result to
//! [`StylePlugin::new`](crate::plugin::StylePlugin::new).

use crate::extract::{AssembledArtifact, Minifier};
use crate::loader::Loader;
use crate::loaders::css::StyleProcessor;
use crate::pipeline::UseDirective;
use serde_json::Value;
use std::sync::Arc;

/// Observer invoked for every file the pipeline accepts
pub type ImportObserver = Arc<dyn Fn(&str) + Send + Sync>;
/// Veto hook over the assembled extraction artifact; `false` skips emission
pub type ExtractHook = Arc<dyn Fn(&AssembledArtifact) -> bool + Send + Sync>;
/// Custom generator for the inline-injection JS snippet
pub type InjectGenerator = Arc<dyn Fn(&str, &str) -> String + Send + Sync>;
/// Custom scoped-class naming function `(local_name, file) -> scoped_name`
pub type ScopedNameFn = Arc<dyn Fn(&str, &str) -> String + Send + Sync>;
/// Custom named-export naming function
pub type ExportNameFn = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// An option that is either off, on with defaults, or on with a custom value
#[derive(Debug, Clone, Default, PartialEq)]
pub enum OptionValue<T> {
    #[default]
    Disabled,
    Defaults,
    Custom(T),
}

impl<T> OptionValue<T> {
    /// The `boolean | object` inference upstream configs use
    pub fn from_bool(enabled: bool) -> Self {
        if enabled {
            OptionValue::Defaults
        } else {
            OptionValue::Disabled
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, OptionValue::Disabled)
    }

    pub fn as_custom(&self) -> Option<&T> {
        match self {
            OptionValue::Custom(value) => Some(value),
            _ => None,
        }
    }
}

/// Source map emission mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SourceMapMode {
    #[default]
    Off,
    /// External `.map` file next to the stylesheet
    File,
    /// Base64 data-URI comment appended to the output
    Inline,
}

impl SourceMapMode {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, SourceMapMode::Off)
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, SourceMapMode::Inline)
    }
}

/// Whether transformed CSS is routed to the bundle-level artifact
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ExtractMode {
    #[default]
    Off,
    /// Destination derived from the entry file name
    Defaults,
    /// Explicit destination path (absolute or relative to the output dir)
    Path(String),
}

impl ExtractMode {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, ExtractMode::Off)
    }
}

/// How inline (non-extracted) CSS reaches the page
#[derive(Clone, Default)]
pub enum InjectMode {
    Off,
    /// Inject-runtime call with an options bag
    #[default]
    Defaults,
    Options(Value),
    /// User-supplied snippet generator `(css_variable, file) -> JS`
    Custom(InjectGenerator),
}

/// CSS modules behavior.
///
/// Independently of this option, `auto_modules` scopes `*.module.*` files.
#[derive(Clone, Default)]
pub enum ModulesMode {
    /// No forced scoping; auto-detection may still apply
    #[default]
    Off,
    /// Scope every file the core loader handles
    Always,
    /// Options for scoped files; scoping itself stays gated on
    /// auto-detection unless `auto_modules` is off
    Options(ModulesOptions),
}

/// Options forwarded to the processor when scoping applies
#[derive(Clone, Default)]
pub struct ModulesOptions {
    /// Template for generated class names, e.g. `[name]_[local]`
    pub scoped_name_template: Option<String>,
    /// Custom naming function overriding the template
    pub naming: Option<ScopedNameFn>,
}

/// Named JS exports for scoped class names
#[derive(Clone, Default)]
pub enum NamedExportsMode {
    #[default]
    Off,
    /// Export every class under a sanitized identifier
    Sanitized,
    Custom(ExportNameFn),
}

/// Project-level normalizer config discovery
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConfigDiscovery {
    /// Search upward from the file's directory
    #[default]
    Auto,
    /// Load from an explicit path (absent file still recovers to empty)
    Path(String),
    Disabled,
}

/// Everything the plugin can be configured with.
///
/// `Default` is a working configuration: no filters, default use order
/// (dialects before the core loader), injection on, extraction off.
#[derive(Default)]
pub struct PluginOptions {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    /// Explicit engine ordering; the core loader directive is appended last
    /// automatically. `None` means the default dialect order.
    pub use_directives: Option<Vec<UseDirective>>,
    /// Extensions the core loader claims
    pub extensions: Option<Vec<String>>,
    pub extract: ExtractMode,
    pub inject: InjectMode,
    pub minify: OptionValue<Value>,
    pub modules: ModulesMode,
    /// `false` disables `*.module.*` auto-detection
    pub auto_modules: bool,
    pub named_exports: NamedExportsMode,
    pub source_map: SourceMapMode,
    pub config: ConfigDiscovery,
    /// Target filename hint forwarded to the processor
    pub to: Option<String>,
    pub on_import: Option<ImportObserver>,
    pub on_extract: Option<ExtractHook>,
    /// The opaque style-normalization engine; identity when absent
    pub processor: Option<Arc<dyn StyleProcessor>>,
    /// Post-processor for the assembled artifact; required when `minify` is on
    pub minifier: Option<Arc<dyn Minifier>>,
    /// Additional loaders registered after the built-in ones
    pub loaders: Vec<Box<dyn Loader>>,
}

impl PluginOptions {
    pub fn new() -> Self {
        PluginOptions {
            auto_modules: true,
            ..Default::default()
        }
    }

    pub fn with_include(mut self, pattern: impl Into<String>) -> Self {
        self.include.push(pattern.into());
        self
    }

    pub fn with_exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclude.push(pattern.into());
        self
    }

    pub fn with_use(mut self, directives: Vec<UseDirective>) -> Self {
        self.use_directives = Some(directives);
        self
    }

    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = Some(extensions);
        self
    }

    pub fn with_extract(mut self, extract: ExtractMode) -> Self {
        self.extract = extract;
        self
    }

    pub fn with_inject(mut self, inject: InjectMode) -> Self {
        self.inject = inject;
        self
    }

    pub fn with_minify(mut self, minify: OptionValue<Value>) -> Self {
        self.minify = minify;
        self
    }

    pub fn with_modules(mut self, modules: ModulesMode) -> Self {
        self.modules = modules;
        self
    }

    pub fn with_auto_modules(mut self, enabled: bool) -> Self {
        self.auto_modules = enabled;
        self
    }

    pub fn with_named_exports(mut self, named_exports: NamedExportsMode) -> Self {
        self.named_exports = named_exports;
        self
    }

    pub fn with_source_map(mut self, mode: SourceMapMode) -> Self {
        self.source_map = mode;
        self
    }

    pub fn with_config(mut self, discovery: ConfigDiscovery) -> Self {
        self.config = discovery;
        self
    }

    pub fn with_to(mut self, to: impl Into<String>) -> Self {
        self.to = Some(to.into());
        self
    }

    pub fn with_on_import(mut self, observer: ImportObserver) -> Self {
        self.on_import = Some(observer);
        self
    }

    pub fn with_on_extract(mut self, hook: ExtractHook) -> Self {
        self.on_extract = Some(hook);
        self
    }

    pub fn with_processor(mut self, processor: Arc<dyn StyleProcessor>) -> Self {
        self.processor = Some(processor);
        self
    }

    pub fn with_minifier(mut self, minifier: Arc<dyn Minifier>) -> Self {
        self.minifier = Some(minifier);
        self
    }

    pub fn with_loader(mut self, loader: Box<dyn Loader>) -> Self {
        self.loaders.push(loader);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_bool_mirrors_option_inference() {
        assert_eq!(OptionValue::<Value>::from_bool(false), OptionValue::Disabled);
        assert_eq!(OptionValue::<Value>::from_bool(true), OptionValue::Defaults);
        assert!(!OptionValue::<Value>::Disabled.is_enabled());
        assert!(OptionValue::Custom(Value::Null).is_enabled());
    }

    #[test]
    fn defaults_match_upstream_behavior() {
        let options = PluginOptions::new();
        assert!(options.auto_modules);
        assert!(matches!(options.inject, InjectMode::Defaults));
        assert!(matches!(options.extract, ExtractMode::Off));
        assert_eq!(options.source_map, SourceMapMode::Off);
        assert!(matches!(options.config, ConfigDiscovery::Auto));
    }

    #[test]
    fn builder_chains() {
        let options = PluginOptions::new()
            .with_include(r"\.css$")
            .with_extract(ExtractMode::Defaults)
            .with_source_map(SourceMapMode::Inline);
        assert_eq!(options.include, vec![r"\.css$".to_string()]);
        assert!(options.extract.is_enabled());
        assert!(options.source_map.is_inline());
    }
}
