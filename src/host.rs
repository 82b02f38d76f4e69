//! Boundary to the host build system
//!
//! The bundler owns module resolution, file watching and artifact writing.
//! The pipeline consumes those capabilities through [`BuildHost`], injected
//! into every hook call, and receives the bundle layout through plain
//! descriptor structs. Nothing here touches the filesystem.

/// Capabilities the host bundler exposes to the pipeline
pub trait BuildHost: Send + Sync {
    /// Static import information for a module, if the host knows it
    fn module_info(&self, id: &str) -> Option<ModuleInfo>;

    /// Register a file as a build input to watch
    fn add_watch_file(&self, id: &str);

    /// Emit a named output artifact
    fn emit_asset(&self, asset: EmittedAsset);

    /// Forward a non-fatal diagnostic to the host's warning channel
    fn warn(&self, message: &str);
}

/// Static import list of one module
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModuleInfo {
    pub imported_ids: Vec<String>,
}

/// A build artifact handed to the host
#[derive(Debug, Clone, PartialEq)]
pub struct EmittedAsset {
    pub file_name: String,
    pub source: String,
}

/// Where the host writes this build's output
#[derive(Debug, Clone, Default)]
pub struct OutputLayout {
    /// Output directory (`dir` style builds)
    pub dir: Option<String>,
    /// Explicit output file (`file` style builds)
    pub file: Option<String>,
}

/// One generated chunk as described by the host
#[derive(Debug, Clone)]
pub struct BundleChunk {
    pub file_name: String,
    pub is_entry: bool,
    /// Designated entry point of the chunk, root of import-order traversal
    pub facade_module_id: Option<String>,
    /// Module ids included in the chunk. `None` when the host does not
    /// expose a module list, which disables import-order sorting.
    pub module_ids: Option<Vec<String>>,
}

/// The set of chunks produced for one output target
#[derive(Debug, Clone, Default)]
pub struct Bundle {
    pub chunks: Vec<BundleChunk>,
}

impl Bundle {
    pub fn entry_chunk(&self) -> Option<&BundleChunk> {
        self.chunks.iter().find(|chunk| chunk.is_entry)
    }

    pub fn chunk_by_file_name(&self, file_name: &str) -> Option<&BundleChunk> {
        self.chunks
            .iter()
            .find(|chunk| chunk.file_name == file_name)
    }
}
