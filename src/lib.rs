//! Stylesheet transformation pipeline for bundler integration
//!
//!     This crate turns stylesheet imports (CSS and its dialects) into JS
//!     modules for a host bundler, with optional extraction of all CSS into
//!     a single bundle-level artifact.
//!
//! Architecture
//!
//!     - Loader trait: uniform interface for transformation engines (match
//!       rule + async process), see [./loader.rs]
//!     - LoaderRegistry: centralized registration and lookup by name
//!     - Pipeline: the ordered use-directive list; threads one file through
//!       the loaders that apply, strictly sequentially
//!     - StylePlugin: the facade a bundler integration holds; its methods
//!       mirror the host's hook surface (transform, generate_bundle,
//!       augment_chunk_hash)
//!
//!     This is a pure lib: it never touches the host's module graph or
//!     output directory directly. Everything the host owns (module info,
//!     watch files, asset emission, warnings) comes in through the
//!     BuildHost trait, and the actual CSS engines (normalizer, dialect
//!     compilers, minifier) are injected as trait objects. The crate ships
//!     working defaults: an identity normalizer and dialect adapters that
//!     fail with an install hint until given a backend.
//!
//!     The file structure :
//!     .
//!     ├── error.rs
//!     ├── loader.rs               # Loader trait, match rules, per-file context
//!     ├── registry.rs             # LoaderRegistry for registration and lookup
//!     ├── pipeline.rs             # Use directives and sequential composition
//!     ├── config.rs               # PluginOptions and the option enums
//!     ├── filter.rs               # include/exclude file filtering
//!     ├── host.rs                 # BuildHost boundary and bundle descriptors
//!     ├── plugin.rs               # StylePlugin orchestration
//!     ├── extract.rs              # Extraction collector, ordering, assembly
//!     ├── concat.rs               # Fragment concatenation with map merging
//!     ├── sourcemap.rs            # Source map model and VLQ mappings codec
//!     ├── utils.rs
//!     ├── loaders
//!     │   ├── css.rs              # Core normalizer loader (always last)
//!     │   ├── dialect.rs          # Sass/Less/Stylus adapters
//!     │   └── render_pool.rs      # Bounded pool for native backends
//!     ├── lib.rs
//!
//! Pipeline ordering
//!
//!     Directives run in declared order, and the core "css" normalizer is
//!     appended last automatically, so dialect compilation always happens
//!     before normalization. A directive naming an unregistered loader, or
//!     a loader whose match rule rejects the file, is identity
//!     pass-through. Extraction records collected during the (concurrent)
//!     transform phase are re-ordered at bundle time from the entry
//!     module's recursive static-import order, so the artifact is stable
//!     regardless of which file finished first.

pub mod concat;
pub mod config;
pub mod error;
pub mod extract;
pub mod filter;
pub mod host;
pub mod loader;
pub mod loaders;
pub mod pipeline;
pub mod plugin;
pub mod registry;
pub mod sourcemap;
pub mod utils;

pub use config::{
    ConfigDiscovery, ExtractMode, InjectMode, ModulesMode, ModulesOptions, NamedExportsMode,
    OptionValue, PluginOptions, SourceMapMode,
};
pub use error::Error;
pub use extract::{AssembledArtifact, ExtractedStyle, ExtractionCollector, Minifier};
pub use host::{Bundle, BuildHost, BundleChunk, EmittedAsset, ModuleInfo, OutputLayout};
pub use loader::{Loader, LoaderContext, LoaderResult, MatchRule};
pub use loaders::{
    CssLoader, DialectLoader, IdentityProcessor, RenderOutput, RenderRequest, StyleProcessor,
    StyleRenderer,
};
pub use pipeline::{Pipeline, UseDirective};
pub use plugin::{StylePlugin, TransformedModule};
pub use registry::LoaderRegistry;
pub use sourcemap::SourceMap;
