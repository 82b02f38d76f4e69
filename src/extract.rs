//! Cross-file extraction state and bundle-level assembly
//!
//! During a build, every file processed with extraction enabled deposits one
//! [`ExtractedStyle`] record into the [`ExtractionCollector`]. Transform
//! calls race, so arrival order means nothing; at bundle time the records
//! are re-ordered from the entry module's recursive static-import order and
//! merged into a single artifact. The collector is owned by the plugin
//! instance, shared by reference with the hooks, and never cleared: watch
//! mode overwrites records per file id as files are re-processed.

use crate::config::SourceMapMode;
use crate::error::Error;
use crate::host::BuildHost;
use crate::sourcemap::SourceMap;
use crate::utils::{normalize_path, relative_path};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;

/// One file's extracted output, keyed by the file's identity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractedStyle {
    pub id: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map: Option<SourceMap>,
}

/// Process-wide mapping from file identity to extraction record.
///
/// Mutation is single-key insert/overwrite only; each file writes its own
/// key, so concurrent transforms never race on a record. Readers take a
/// snapshot, so writes landing after the snapshot belong to the next
/// build pass.
#[derive(Default)]
pub struct ExtractionCollector {
    records: Mutex<HashMap<String, ExtractedStyle>>,
}

impl ExtractionCollector {
    pub fn new() -> Self {
        ExtractionCollector {
            records: Mutex::new(HashMap::new()),
        }
    }

    pub fn insert(&self, record: ExtractedStyle) {
        self.records
            .lock()
            .expect("extraction collector lock")
            .insert(record.id.clone(), record);
    }

    pub fn is_empty(&self) -> bool {
        self.records
            .lock()
            .expect("extraction collector lock")
            .is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records
            .lock()
            .expect("extraction collector lock")
            .contains_key(id)
    }

    /// Read-only snapshot of the current records
    pub fn snapshot(&self) -> Vec<ExtractedStyle> {
        self.records
            .lock()
            .expect("extraction collector lock")
            .values()
            .cloned()
            .collect()
    }

    /// Deterministic serialized form of the current records, for chunk-hash
    /// contribution. `None` when no records exist. Keys are sorted, so the
    /// result is independent of insertion order.
    pub fn hash_snapshot(&self) -> Result<Option<String>, Error> {
        let records = self.records.lock().expect("extraction collector lock");
        if records.is_empty() {
            return Ok(None);
        }
        let sorted: BTreeMap<&String, &ExtractedStyle> = records.iter().collect();
        serde_json::to_string(&sorted)
            .map(Some)
            .map_err(|e| Error::Config(format!("failed to serialize extraction state: {}", e)))
    }
}

/// Recursive static-import order starting at `entry`: pre-order DFS over
/// the host's import graph, visiting each module once (cycles are broken
/// by the seen-set)
pub fn recursive_import_order(host: &dyn BuildHost, entry: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut order = Vec::new();
    visit(host, entry, &mut seen, &mut order);
    order
}

fn visit(host: &dyn BuildHost, id: &str, seen: &mut HashSet<String>, order: &mut Vec<String>) {
    if !seen.insert(id.to_string()) {
        return;
    }
    order.push(id.to_string());
    if let Some(info) = host.module_info(id) {
        for import in &info.imported_ids {
            visit(host, import, seen, order);
        }
    }
}

/// Sort records by their position in the import order.
///
/// Records whose id does not appear in the order sort before all ordered
/// records, among themselves by id. That is the documented tie-break for
/// the "not found" case: deterministic, independent of arrival order.
pub fn sort_by_import_order(records: &mut [ExtractedStyle], order: &[String]) {
    let positions: HashMap<&str, usize> = order
        .iter()
        .enumerate()
        .map(|(index, id)| (id.as_str(), index))
        .collect();
    records.sort_by(|a, b| {
        let key = |record: &ExtractedStyle| {
            (
                positions
                    .get(record.id.as_str())
                    .map(|p| *p as i64)
                    .unwrap_or(-1),
                record.id.clone(),
            )
        };
        key(a).cmp(&key(b))
    });
}

/// The merged bundle-level stylesheet, pre-emission
#[derive(Debug, Clone)]
pub struct AssembledArtifact {
    pub file_name: String,
    pub map_file_name: String,
    pub text: String,
    /// Present only in external-file source map mode
    pub map: Option<SourceMap>,
}

/// Compute the destination stylesheet name for one bundle output
pub fn destination_file_name(
    extract: &crate::config::ExtractMode,
    dir: &str,
    entry_file: &str,
) -> String {
    match extract {
        crate::config::ExtractMode::Path(path) => {
            if Path::new(path).is_absolute() {
                relative_path(dir, path)
            } else {
                normalize_path(path)
            }
        }
        _ => format!(
            "{}.css",
            crate::utils::base_name_without_extension(entry_file)
        ),
    }
}

/// Concatenate sorted records into the final artifact.
///
/// Each record is annotated with its path relative to the output dir; its
/// map (when present) gets its `file` field rewritten to the destination
/// name and absolute source paths rewritten relative to the output dir.
pub fn assemble(
    records: &[ExtractedStyle],
    dir: &str,
    file_name: &str,
    source_map: SourceMapMode,
) -> Result<AssembledArtifact, Error> {
    let mut concat = crate::concat::Concatenator::new();
    for record in records {
        let annotation = relative_path(dir, &record.id);
        let rewritten = record.map.as_ref().map(|map| {
            let mut map = map.clone();
            map.file = Some(file_name.to_string());
            map.sources = map
                .sources
                .iter()
                .map(|source| {
                    if Path::new(source).is_absolute() {
                        relative_path(dir, source)
                    } else {
                        normalize_path(source)
                    }
                })
                .collect();
            map
        });
        concat.add(&annotation, &record.text, rewritten.as_ref())?;
    }

    let map_file_name = format!("{}.map", file_name);
    let merged = concat.source_map(file_name);
    let mut text = concat.into_content();
    let mut map = None;

    match source_map {
        SourceMapMode::Inline => {
            text.push_str(&format!(
                "\n/*# sourceMappingURL={}*/",
                merged.to_data_uri()?
            ));
        }
        SourceMapMode::File => {
            let base = Path::new(file_name)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| file_name.to_string());
            text.push_str(&format!("\n/*# sourceMappingURL={}.map */", base));
            map = Some(merged);
        }
        SourceMapMode::Off => {}
    }

    Ok(AssembledArtifact {
        file_name: file_name.to_string(),
        map_file_name,
        text,
        map,
    })
}

/// Post-processing pass over the assembled artifact (external collaborator)
#[async_trait]
pub trait Minifier: Send + Sync {
    async fn minify(&self, text: &str, request: MinifyRequest<'_>)
        -> Result<MinifyOutput, Error>;
}

pub struct MinifyRequest<'a> {
    /// Destination file name, for context
    pub from: &'a str,
    pub to: Option<&'a str>,
    /// Merged map of the artifact, in external-file mode
    pub prev_map: Option<&'a SourceMap>,
    /// The artifact carries an inline map comment
    pub inline_map: bool,
    pub options: &'a Value,
}

pub struct MinifyOutput {
    pub text: String,
    pub map: Option<SourceMap>,
}
