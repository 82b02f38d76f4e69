//! Loader trait and per-invocation context
//!
//! A loader is a named transformation engine with a match rule and an async
//! processor. The pipeline threads a [`LoaderResult`] through the loaders
//! that apply to a file; loaders that do not match pass the value through
//! untouched (the composer handles that, see `pipeline.rs`).

use crate::config::SourceMapMode;
use crate::error::Error;
use crate::extract::ExtractedStyle;
use crate::host::BuildHost;
use crate::sourcemap::SourceMap;
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// How a loader decides whether a file is its business
#[derive(Clone)]
pub enum MatchRule {
    /// Regular expression over the normalized path
    Pattern(Regex),
    /// Exact match on the file extension (leading dot included)
    Extensions(Vec<String>),
    /// Arbitrary predicate over the normalized path
    Predicate(Arc<dyn Fn(&str) -> bool + Send + Sync>),
}

impl MatchRule {
    pub fn pattern(pattern: &str) -> Result<Self, Error> {
        Regex::new(pattern)
            .map(MatchRule::Pattern)
            .map_err(|e| Error::Config(format!("invalid match pattern '{}': {}", pattern, e)))
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            MatchRule::Pattern(regex) => regex.is_match(path),
            MatchRule::Extensions(extensions) => {
                let extension = Path::new(path)
                    .extension()
                    .map(|ext| format!(".{}", ext.to_string_lossy()))
                    .unwrap_or_default();
                extensions.iter().any(|candidate| *candidate == extension)
            }
            MatchRule::Predicate(predicate) => predicate(path),
        }
    }
}

impl fmt::Debug for MatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchRule::Pattern(regex) => f.debug_tuple("Pattern").field(&regex.as_str()).finish(),
            MatchRule::Extensions(extensions) => {
                f.debug_tuple("Extensions").field(extensions).finish()
            }
            MatchRule::Predicate(_) => f.debug_tuple("Predicate").field(&"<fn>").finish(),
        }
    }
}

/// The value threaded through a file's pipeline.
///
/// Every stage receives the previous stage's output verbatim. The optional
/// extraction payload rides along so identity stages after the core loader
/// do not drop it.
#[derive(Debug, Clone, Default)]
pub struct LoaderResult {
    pub text: String,
    pub map: Option<SourceMap>,
    pub extracted: Option<ExtractedStyle>,
}

impl LoaderResult {
    pub fn from_text(text: impl Into<String>) -> Self {
        LoaderResult {
            text: text.into(),
            map: None,
            extracted: None,
        }
    }
}

/// Per-invocation state handed to every stage of one file's pipeline
pub struct LoaderContext<'a> {
    /// Normalized absolute path of the file being transformed
    pub id: String,
    pub source_map: SourceMapMode,
    /// Files that should invalidate this transform when they change;
    /// flushed to the host's watch API after the pipeline completes
    pub dependencies: BTreeSet<String>,
    /// Options from the use directive currently being executed
    pub options: Value,
    pub host: &'a dyn BuildHost,
}

impl<'a> LoaderContext<'a> {
    pub fn new(id: impl Into<String>, source_map: SourceMapMode, host: &'a dyn BuildHost) -> Self {
        LoaderContext {
            id: crate::utils::normalize_path(&id.into()),
            source_map,
            dependencies: BTreeSet::new(),
            options: Value::Null,
            host,
        }
    }

    pub fn warn(&self, message: &str) {
        self.host.warn(message);
    }
}

/// A named transformation engine
#[async_trait]
pub trait Loader: Send + Sync {
    fn name(&self) -> &str;

    /// Run for every file regardless of the match rule
    fn always_process(&self) -> bool {
        false
    }

    /// Match rule for dispatch and `supports` queries. A loader without a
    /// rule never matches through this check and only runs when marked
    /// always-process.
    fn match_rule(&self) -> Option<&MatchRule> {
        None
    }

    async fn process(
        &self,
        input: LoaderResult,
        ctx: &mut LoaderContext<'_>,
    ) -> Result<LoaderResult, Error>;
}

/// Whether `loader`'s match rule accepts `path`
pub fn matches_file(loader: &dyn Loader, path: &str) -> bool {
    loader.match_rule().is_some_and(|rule| rule.matches(path))
}
