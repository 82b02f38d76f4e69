//! Per-file pipeline composition
//!
//! A [`Pipeline`] is an ordered list of use directives. Running it threads a
//! [`LoaderResult`] through the named loaders strictly sequentially, in the
//! declared order: a stage only starts once the previous stage's future has
//! resolved, and it receives exactly that stage's output. Ordering matters
//! because the core normalizer expects dialect compilation to have happened
//! already, so the default directive list places dialects first.

use crate::error::Error;
use crate::loader::{matches_file, LoaderContext, LoaderResult};
use crate::registry::LoaderRegistry;
use serde_json::Value;

/// One `(loader name, options)` entry of the use list
#[derive(Debug, Clone, PartialEq)]
pub struct UseDirective {
    pub name: String,
    pub options: Value,
}

impl UseDirective {
    pub fn new(name: impl Into<String>) -> Self {
        UseDirective {
            name: name.into(),
            options: Value::Null,
        }
    }

    pub fn with_options(name: impl Into<String>, options: Value) -> Self {
        UseDirective {
            name: name.into(),
            options,
        }
    }
}

/// The composed, ordered sequence of loader invocations for one file
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    directives: Vec<UseDirective>,
}

impl Pipeline {
    pub fn new(directives: Vec<UseDirective>) -> Self {
        Pipeline { directives }
    }

    pub fn directives(&self) -> &[UseDirective] {
        &self.directives
    }

    /// Run the pipeline over `input`.
    ///
    /// Directives naming an unregistered loader are identity pass-through,
    /// as are loaders whose match rule rejects the file (unless marked
    /// always-process). The first stage error aborts the run; later stages
    /// do not execute and no partial output is returned.
    pub async fn process(
        &self,
        registry: &LoaderRegistry,
        input: LoaderResult,
        ctx: &mut LoaderContext<'_>,
    ) -> Result<LoaderResult, Error> {
        let mut value = input;
        for directive in &self.directives {
            let loader = match registry.get(&directive.name) {
                Some(loader) => loader,
                None => continue,
            };
            if !loader.always_process() && !matches_file(loader, &ctx.id) {
                continue;
            }
            ctx.options = directive.options.clone();
            value = loader.process(value, ctx).await?;
        }
        Ok(value)
    }
}
