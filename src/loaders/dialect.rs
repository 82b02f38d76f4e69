//! Dialect loaders: thin adapters over opaque rendering backends
//!
//! The pipeline does not compile Sass, Less or Stylus itself; it wraps an
//! injected [`StyleRenderer`] with a match rule, dependency bookkeeping and
//! (for backends with a limited native thread pool) the shared render pool.
//! A dialect configured without a backend fails with an error naming the
//! package to install, and only when a matching file actually reaches it.

use crate::error::Error;
use crate::loader::{Loader, LoaderContext, LoaderResult, MatchRule};
use crate::loaders::render_pool::{RenderPool, NATIVE_RENDER_POOL};
use crate::sourcemap::SourceMap;
use crate::utils::normalize_path;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// One render request against an opaque backend
pub struct RenderRequest<'a> {
    /// Source text, with any `data` prelude from the use directive prepended
    pub text: &'a str,
    /// The file being rendered
    pub file: &'a str,
    pub source_map: bool,
    /// Options from the use directive, forwarded untouched
    pub options: &'a Value,
}

pub struct RenderOutput {
    pub css: String,
    pub map: Option<SourceMap>,
    /// Files the render read; they become watch dependencies
    pub included_files: Vec<String>,
}

/// An opaque dialect compiler
#[async_trait]
pub trait StyleRenderer: Send + Sync {
    async fn render(&self, request: RenderRequest<'_>) -> Result<RenderOutput, Error>;
}

/// Adapter registering an opaque backend as a pipeline loader
pub struct DialectLoader {
    name: String,
    package: String,
    rule: MatchRule,
    backend: Option<Arc<dyn StyleRenderer>>,
    pool: Option<Arc<RenderPool>>,
}

impl DialectLoader {
    pub fn new(
        name: impl Into<String>,
        package: impl Into<String>,
        rule: MatchRule,
        backend: Option<Arc<dyn StyleRenderer>>,
    ) -> Self {
        DialectLoader {
            name: name.into(),
            package: package.into(),
            rule,
            backend,
            pool: None,
        }
    }

    /// Route renders through a bounded pool
    pub fn with_pool(mut self, pool: Arc<RenderPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Sass adapter: `.sass`/`.scss`, renders through the shared native pool
    pub fn sass(backend: Option<Arc<dyn StyleRenderer>>) -> Self {
        DialectLoader::new(
            "sass",
            "grass",
            MatchRule::pattern(r"\.(sass|scss)$").expect("static pattern"),
            backend,
        )
        .with_pool(NATIVE_RENDER_POOL.clone())
    }

    /// Less adapter: `.less`
    pub fn less(backend: Option<Arc<dyn StyleRenderer>>) -> Self {
        DialectLoader::new(
            "less",
            "less",
            MatchRule::pattern(r"\.less$").expect("static pattern"),
            backend,
        )
    }

    /// Stylus adapter: `.styl`/`.stylus`
    pub fn stylus(backend: Option<Arc<dyn StyleRenderer>>) -> Self {
        DialectLoader::new(
            "stylus",
            "stylus",
            MatchRule::pattern(r"\.(styl|stylus)$").expect("static pattern"),
            backend,
        )
    }
}

#[async_trait]
impl Loader for DialectLoader {
    fn name(&self) -> &str {
        &self.name
    }

    fn match_rule(&self) -> Option<&MatchRule> {
        Some(&self.rule)
    }

    async fn process(
        &self,
        input: LoaderResult,
        ctx: &mut LoaderContext<'_>,
    ) -> Result<LoaderResult, Error> {
        let backend = self
            .backend
            .as_ref()
            .ok_or_else(|| Error::MissingBackend {
                loader: self.name.clone(),
                package: self.package.clone(),
            })?
            .clone();

        let text = match ctx.options.get("data").and_then(Value::as_str) {
            Some(prelude) => format!("{}{}", prelude, input.text),
            None => input.text.clone(),
        };

        let _permit = match &self.pool {
            Some(pool) => Some(pool.acquire().await),
            None => None,
        };
        let output = backend
            .render(RenderRequest {
                text: &text,
                file: &ctx.id,
                source_map: ctx.source_map.is_enabled(),
                options: &ctx.options,
            })
            .await?;

        for file in &output.included_files {
            ctx.dependencies.insert(normalize_path(file));
        }

        Ok(LoaderResult {
            text: output.css,
            map: output.map,
            extracted: input.extracted,
        })
    }
}
