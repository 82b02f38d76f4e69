//! Loader registry for engine discovery and dispatch
//!
//! Holds the ordered collection of named loaders. Registration order is
//! preserved but carries no execution meaning; execution order comes from
//! the use-directive list (see `pipeline.rs`).

use crate::loader::{matches_file, Loader};

/// Registry of transformation loaders.
///
/// Loaders are keyed by name; registering a name that already exists
/// replaces the previous loader, so the registry never holds two loaders
/// with the same name.
#[derive(Default)]
pub struct LoaderRegistry {
    loaders: Vec<Box<dyn Loader>>,
}

impl LoaderRegistry {
    pub fn new() -> Self {
        LoaderRegistry {
            loaders: Vec::new(),
        }
    }

    /// Register a loader, replacing any existing loader with the same name
    pub fn register(&mut self, loader: Box<dyn Loader>) -> &mut Self {
        self.remove(loader.name());
        self.loaders.push(loader);
        self
    }

    /// Remove a loader by name; removing an absent name is a no-op
    pub fn remove(&mut self, name: &str) -> &mut Self {
        self.loaders.retain(|loader| loader.name() != name);
        self
    }

    /// True iff at least one registered loader's match rule accepts `path`.
    ///
    /// Always-process loaders without a match rule do not make a file
    /// supported on their own.
    pub fn supports(&self, path: &str) -> bool {
        self.loaders
            .iter()
            .any(|loader| matches_file(loader.as_ref(), path))
    }

    pub fn get(&self, name: &str) -> Option<&dyn Loader> {
        self.loaders
            .iter()
            .find(|loader| loader.name() == name)
            .map(|loader| loader.as_ref())
    }

    /// Registered names, in registration order
    pub fn names(&self) -> Vec<&str> {
        self.loaders.iter().map(|loader| loader.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.loaders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaders.is_empty()
    }
}
