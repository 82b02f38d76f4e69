//! The plugin facade: transform orchestration and bundle-level emission
//!
//! [`StylePlugin`] is what a host bundler integration holds. Its three entry
//! points mirror the host's hook surface: [`transform`](StylePlugin::transform)
//! runs one file through the loader pipeline, [`generate_bundle`]
//! (StylePlugin::generate_bundle) assembles and emits the extraction
//! artifact, and [`augment_chunk_hash`](StylePlugin::augment_chunk_hash)
//! folds the extraction state into the host's chunk hashing.

use crate::config::{
    ExtractHook, ExtractMode, ImportObserver, OptionValue, PluginOptions, SourceMapMode,
};
use crate::error::Error;
use crate::extract::{
    assemble, destination_file_name, recursive_import_order, sort_by_import_order,
    ExtractionCollector, Minifier, MinifyRequest,
};
use crate::filter::FileFilter;
use crate::host::{Bundle, BuildHost, EmittedAsset, OutputLayout};
use crate::loader::{LoaderContext, LoaderResult};
use crate::loaders::css::{CssLoader, CssLoaderOptions, IdentityProcessor, DEFAULT_EXTENSIONS};
use crate::loaders::dialect::DialectLoader;
use crate::pipeline::{Pipeline, UseDirective};
use crate::registry::LoaderRegistry;
use crate::sourcemap::SourceMap;
use crate::utils::{normalize_path, relative_path};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;

/// Output of a successful transform
#[derive(Debug, Clone)]
pub struct TransformedModule {
    /// JS module replacing the stylesheet import
    pub code: String,
    /// `None` tells the host to treat the module as having no mappings
    pub map: Option<SourceMap>,
}

pub struct StylePlugin {
    filter: FileFilter,
    registry: LoaderRegistry,
    pipeline: Pipeline,
    collector: ExtractionCollector,
    extract: ExtractMode,
    source_map: SourceMapMode,
    minify: OptionValue<Value>,
    minifier: Option<Arc<dyn Minifier>>,
    on_import: Option<ImportObserver>,
    on_extract: Option<ExtractHook>,
}

impl StylePlugin {
    pub fn new(options: PluginOptions) -> Result<Self, Error> {
        let filter = FileFilter::new(&options.include, &options.exclude)?;

        let extensions = options
            .extensions
            .unwrap_or_else(|| DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect());
        let processor = options
            .processor
            .unwrap_or_else(|| Arc::new(IdentityProcessor));
        let css_loader = CssLoader::new(
            extensions,
            processor,
            CssLoaderOptions {
                config: options.config,
                extract: options.extract.is_enabled(),
                inject: options.inject,
                minify: options.minify.clone(),
                modules: options.modules,
                auto_modules: options.auto_modules,
                named_exports: options.named_exports,
                to: options.to,
            },
        );

        let mut registry = LoaderRegistry::new();
        registry
            .register(Box::new(DialectLoader::sass(None)))
            .register(Box::new(DialectLoader::stylus(None)))
            .register(Box::new(DialectLoader::less(None)))
            .register(Box::new(css_loader));
        // User loaders last: same-name registration replaces the built-in
        for loader in options.loaders {
            registry.register(loader);
        }

        let mut directives = options.use_directives.unwrap_or_else(|| {
            vec![
                UseDirective::new("sass"),
                UseDirective::new("stylus"),
                UseDirective::new("less"),
            ]
        });
        // The core normalizer always runs last
        if !directives.iter().any(|d| d.name == "css") {
            directives.push(UseDirective::new("css"));
        }

        Ok(StylePlugin {
            filter,
            registry,
            pipeline: Pipeline::new(directives),
            collector: ExtractionCollector::new(),
            extract: options.extract,
            source_map: options.source_map,
            minify: options.minify,
            minifier: options.minifier,
            on_import: options.on_import,
            on_extract: options.on_extract,
        })
    }

    pub fn registry(&self) -> &LoaderRegistry {
        &self.registry
    }

    pub fn collector(&self) -> &ExtractionCollector {
        &self.collector
    }

    /// Run one file through the pipeline.
    ///
    /// `Ok(None)` means the file is not this plugin's business (filtered
    /// out, or no registered loader claims it) and the host should fall
    /// through to other handlers.
    pub async fn transform(
        &self,
        host: &dyn BuildHost,
        text: &str,
        id: &str,
    ) -> Result<Option<TransformedModule>, Error> {
        let id = normalize_path(id);
        if !self.filter.included(&id) || !self.registry.supports(&id) {
            return Ok(None);
        }

        if let Some(observer) = &self.on_import {
            observer(&id);
        }

        let mut ctx = LoaderContext::new(&id, self.source_map, host);
        let result = self
            .pipeline
            .process(&self.registry, LoaderResult::from_text(text), &mut ctx)
            .await?;

        for dependency in &ctx.dependencies {
            host.add_watch_file(dependency);
        }

        if self.extract.is_enabled() {
            if let Some(extracted) = result.extracted {
                self.collector.insert(extracted);
            }
            return Ok(Some(TransformedModule {
                code: result.text,
                map: None,
            }));
        }

        Ok(Some(TransformedModule {
            code: result.text,
            map: result.map,
        }))
    }

    /// Assemble the extraction artifact and hand it to the host.
    ///
    /// A no-op when extraction is off, nothing was collected, or the output
    /// layout names no directory to resolve against.
    pub async fn generate_bundle(
        &self,
        host: &dyn BuildHost,
        output: &OutputLayout,
        bundle: &Bundle,
    ) -> Result<(), Error> {
        if !self.extract.is_enabled() || self.collector.is_empty() {
            return Ok(());
        }

        let dir = match (&output.dir, &output.file) {
            (Some(dir), _) => normalize_path(dir),
            (None, Some(file)) => match Path::new(file).parent() {
                Some(parent) => normalize_path(&parent.to_string_lossy()),
                None => return Ok(()),
            },
            (None, None) => return Ok(()),
        };
        let entry_file = match (&output.file, bundle.entry_chunk()) {
            (Some(file), _) => normalize_path(file),
            (None, Some(chunk)) => format!("{}/{}", dir, chunk.file_name),
            (None, None) => return Ok(()),
        };

        let file_name = destination_file_name(&self.extract, &dir, &entry_file);

        let chunk = bundle
            .chunk_by_file_name(&relative_path(&dir, &entry_file))
            .or_else(|| bundle.entry_chunk());
        let order = match chunk {
            // Only chunks exposing a module list support import-order sorting
            Some(chunk) if chunk.module_ids.is_some() => chunk
                .facade_module_id
                .as_deref()
                .map(|facade| recursive_import_order(host, facade))
                .unwrap_or_default(),
            _ => Vec::new(),
        };

        let mut records = self.collector.snapshot();
        sort_by_import_order(&mut records, &order);

        let mut artifact = assemble(&records, &dir, &file_name, self.source_map)?;

        if let Some(hook) = &self.on_extract {
            if !hook(&artifact) {
                return Ok(());
            }
        }

        if self.minify.is_enabled() {
            let minifier = self.minifier.as_ref().ok_or_else(|| Error::MissingBackend {
                loader: "minify".to_string(),
                package: "lightningcss".to_string(),
            })?;
            let options = self
                .minify
                .as_custom()
                .cloned()
                .unwrap_or_else(|| Value::Object(Map::new()));
            // External-map mode tells the minifier the destination name so
            // its map references line up with the emitted file
            let to = match self.source_map {
                SourceMapMode::File => Some(artifact.file_name.as_str()),
                _ => None,
            };
            let output = minifier
                .minify(
                    &artifact.text,
                    MinifyRequest {
                        from: &artifact.file_name,
                        to,
                        prev_map: artifact.map.as_ref(),
                        inline_map: self.source_map.is_inline(),
                        options: &options,
                    },
                )
                .await?;
            artifact.text = output.text;
            if output.map.is_some() {
                artifact.map = output.map;
            }
        }

        host.emit_asset(EmittedAsset {
            file_name: artifact.file_name.clone(),
            source: artifact.text.clone(),
        });
        if let Some(map) = &artifact.map {
            host.emit_asset(EmittedAsset {
                file_name: artifact.map_file_name.clone(),
                source: map.to_json()?,
            });
        }

        Ok(())
    }

    /// Deterministic hash contribution from the extraction state, so chunk
    /// hashes change when any extracted stylesheet changes
    pub fn augment_chunk_hash(&self) -> Result<Option<String>, Error> {
        if !self.extract.is_enabled() {
            return Ok(None);
        }
        self.collector.hash_snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{BundleChunk, ModuleInfo};
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryHost {
        imports: HashMap<String, Vec<String>>,
        watched: Mutex<Vec<String>>,
        assets: Mutex<Vec<EmittedAsset>>,
    }

    impl BuildHost for MemoryHost {
        fn module_info(&self, id: &str) -> Option<ModuleInfo> {
            self.imports.get(id).map(|imported_ids| ModuleInfo {
                imported_ids: imported_ids.clone(),
            })
        }
        fn add_watch_file(&self, id: &str) {
            self.watched.lock().unwrap().push(id.to_string());
        }
        fn emit_asset(&self, asset: EmittedAsset) {
            self.assets.lock().unwrap().push(asset);
        }
        fn warn(&self, _message: &str) {}
    }

    fn extracting_plugin() -> StylePlugin {
        StylePlugin::new(
            PluginOptions::new()
                .with_extract(ExtractMode::Defaults)
                .with_config(crate::config::ConfigDiscovery::Disabled),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn unhandled_files_fall_through() {
        let plugin = StylePlugin::new(PluginOptions::new()).unwrap();
        let host = MemoryHost::default();
        let result = plugin.transform(&host, "fn main() {}", "/src/main.rs").await;
        assert!(result.unwrap().is_none());
    }

    #[tokio::test]
    async fn excluded_files_fall_through() {
        let plugin = StylePlugin::new(
            PluginOptions::new()
                .with_exclude("vendor")
                .with_config(crate::config::ConfigDiscovery::Disabled),
        )
        .unwrap();
        let host = MemoryHost::default();
        let result = plugin
            .transform(&host, ".a{}", "/src/vendor/a.css")
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn inline_transform_produces_js_module() {
        let plugin = StylePlugin::new(
            PluginOptions::new().with_config(crate::config::ConfigDiscovery::Disabled),
        )
        .unwrap();
        let host = MemoryHost::default();
        let module = plugin
            .transform(&host, ".a{color:red}", "/src/a.css")
            .await
            .unwrap()
            .unwrap();
        assert!(module.code.contains("var css = \".a{color:red}\";"));
        assert!(module.code.contains("styleInject(css);"));
        assert!(!plugin.collector().contains("/src/a.css"));
    }

    #[tokio::test]
    async fn extraction_collects_instead_of_inlining() {
        let plugin = extracting_plugin();
        let host = MemoryHost::default();
        let module = plugin
            .transform(&host, ".a{color:red}", "/src/a.css")
            .await
            .unwrap()
            .unwrap();
        assert!(!module.code.contains("color:red"));
        assert!(module.map.is_none());
        assert!(plugin.collector().contains("/src/a.css"));
    }

    #[tokio::test]
    async fn on_import_observes_accepted_files_only() {
        let seen = Arc::new(Mutex::new(Vec::<String>::new()));
        let observed = seen.clone();
        let plugin = StylePlugin::new(
            PluginOptions::new()
                .with_config(crate::config::ConfigDiscovery::Disabled)
                .with_on_import(Arc::new(move |id| {
                    observed.lock().unwrap().push(id.to_string());
                })),
        )
        .unwrap();
        let host = MemoryHost::default();
        plugin.transform(&host, ".a{}", "/src/a.css").await.unwrap();
        plugin
            .transform(&host, "export {}", "/src/a.js")
            .await
            .unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["/src/a.css".to_string()]);
    }

    #[tokio::test]
    async fn generate_bundle_emits_ordered_artifact() {
        let mut host = MemoryHost::default();
        host.imports.insert(
            "/src/index.js".to_string(),
            vec!["/src/a.css".to_string(), "/src/b.css".to_string()],
        );
        let plugin = extracting_plugin();

        // Arrival order is b then a; import order must win
        plugin
            .transform(&host, ".b{color:blue}", "/src/b.css")
            .await
            .unwrap();
        plugin
            .transform(&host, ".a{color:red}", "/src/a.css")
            .await
            .unwrap();

        let output = OutputLayout {
            dir: Some("/dist".to_string()),
            file: None,
        };
        let bundle = Bundle {
            chunks: vec![BundleChunk {
                file_name: "bundle.js".to_string(),
                is_entry: true,
                facade_module_id: Some("/src/index.js".to_string()),
                module_ids: Some(vec![
                    "/src/index.js".to_string(),
                    "/src/a.css".to_string(),
                    "/src/b.css".to_string(),
                ]),
            }],
        };
        plugin.generate_bundle(&host, &output, &bundle).await.unwrap();

        let assets = host.assets.lock().unwrap();
        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].file_name, "bundle.css");
        assert_eq!(assets[0].source, ".a{color:red}\n.b{color:blue}");
    }

    #[tokio::test]
    async fn generate_bundle_without_extraction_is_a_no_op() {
        let plugin = StylePlugin::new(
            PluginOptions::new().with_config(crate::config::ConfigDiscovery::Disabled),
        )
        .unwrap();
        let host = MemoryHost::default();
        plugin.transform(&host, ".a{}", "/src/a.css").await.unwrap();
        plugin
            .generate_bundle(
                &host,
                &OutputLayout {
                    dir: Some("/dist".to_string()),
                    file: None,
                },
                &Bundle::default(),
            )
            .await
            .unwrap();
        assert!(host.assets.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn extract_hook_can_veto_emission() {
        let plugin = StylePlugin::new(
            PluginOptions::new()
                .with_extract(ExtractMode::Defaults)
                .with_config(crate::config::ConfigDiscovery::Disabled)
                .with_on_extract(Arc::new(|_artifact| false)),
        )
        .unwrap();
        let host = MemoryHost::default();
        plugin.transform(&host, ".a{}", "/src/a.css").await.unwrap();
        plugin
            .generate_bundle(
                &host,
                &OutputLayout {
                    dir: Some("/dist".to_string()),
                    file: None,
                },
                &Bundle {
                    chunks: vec![BundleChunk {
                        file_name: "bundle.js".to_string(),
                        is_entry: true,
                        facade_module_id: None,
                        module_ids: None,
                    }],
                },
            )
            .await
            .unwrap();
        assert!(host.assets.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn minify_without_minifier_names_the_package() {
        let plugin = StylePlugin::new(
            PluginOptions::new()
                .with_extract(ExtractMode::Defaults)
                .with_minify(OptionValue::Defaults)
                .with_config(crate::config::ConfigDiscovery::Disabled),
        )
        .unwrap();
        let host = MemoryHost::default();
        plugin.transform(&host, ".a{}", "/src/a.css").await.unwrap();
        let result = plugin
            .generate_bundle(
                &host,
                &OutputLayout {
                    dir: Some("/dist".to_string()),
                    file: None,
                },
                &Bundle {
                    chunks: vec![BundleChunk {
                        file_name: "bundle.js".to_string(),
                        is_entry: true,
                        facade_module_id: None,
                        module_ids: None,
                    }],
                },
            )
            .await;
        assert!(matches!(
            result,
            Err(Error::MissingBackend { ref loader, .. }) if loader == "minify"
        ));
    }

    #[tokio::test]
    async fn minifier_receives_destination_in_external_map_mode() {
        use crate::extract::{MinifyOutput, MinifyRequest};

        #[derive(Default)]
        struct RecordingMinifier {
            to: Mutex<Option<Option<String>>>,
        }

        #[async_trait::async_trait]
        impl crate::extract::Minifier for RecordingMinifier {
            async fn minify(
                &self,
                text: &str,
                request: MinifyRequest<'_>,
            ) -> Result<MinifyOutput, Error> {
                *self.to.lock().unwrap() = Some(request.to.map(|s| s.to_string()));
                Ok(MinifyOutput {
                    text: text.replace('\n', ""),
                    map: None,
                })
            }
        }

        let minifier = Arc::new(RecordingMinifier::default());
        let host = MemoryHost::default();
        let run = |mode| {
            let minifier = minifier.clone();
            StylePlugin::new(
                PluginOptions::new()
                    .with_extract(ExtractMode::Defaults)
                    .with_minify(OptionValue::Defaults)
                    .with_source_map(mode)
                    .with_config(crate::config::ConfigDiscovery::Disabled)
                    .with_minifier(minifier),
            )
            .unwrap()
        };
        let bundle = Bundle {
            chunks: vec![BundleChunk {
                file_name: "bundle.js".to_string(),
                is_entry: true,
                facade_module_id: None,
                module_ids: None,
            }],
        };
        let output = OutputLayout {
            dir: Some("/dist".to_string()),
            file: None,
        };

        let plugin = run(crate::config::SourceMapMode::File);
        plugin.transform(&host, ".a{}", "/src/a.css").await.unwrap();
        plugin.generate_bundle(&host, &output, &bundle).await.unwrap();
        assert_eq!(
            *minifier.to.lock().unwrap(),
            Some(Some("bundle.css".to_string()))
        );

        let plugin = run(crate::config::SourceMapMode::Off);
        plugin.transform(&host, ".a{}", "/src/a.css").await.unwrap();
        plugin.generate_bundle(&host, &output, &bundle).await.unwrap();
        assert_eq!(*minifier.to.lock().unwrap(), Some(None));
    }

    #[tokio::test]
    async fn chunk_hash_reflects_extraction_state() {
        let plugin = extracting_plugin();
        let host = MemoryHost::default();
        assert_eq!(plugin.augment_chunk_hash().unwrap(), None);

        plugin
            .transform(&host, ".a{color:red}", "/src/a.css")
            .await
            .unwrap();
        let first = plugin.augment_chunk_hash().unwrap();
        assert!(first.is_some());

        plugin
            .transform(&host, ".a{color:blue}", "/src/a.css")
            .await
            .unwrap();
        let second = plugin.augment_chunk_hash().unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn chunk_hash_absent_when_extraction_disabled() {
        let plugin = StylePlugin::new(
            PluginOptions::new().with_config(crate::config::ConfigDiscovery::Disabled),
        )
        .unwrap();
        let host = MemoryHost::default();
        plugin.transform(&host, ".a{}", "/src/a.css").await.unwrap();
        assert_eq!(plugin.augment_chunk_hash().unwrap(), None);
    }
}
