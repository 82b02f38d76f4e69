//! Source-map-aware concatenation
//!
//! [`Concatenator`] appends text fragments separated by newlines while
//! building one merged source map: fragment maps are shifted by the generated
//! line offset and their source/name indices are rebased into the combined
//! tables. Fragments without a map contribute identity line mappings so the
//! merged map still covers them.

use crate::error::Error;
use crate::sourcemap::{decode_mappings, encode_mappings, Segment, SourceMap, SourcePosition};

pub struct Concatenator {
    content: String,
    fragments: usize,
    /// Generated line the next fragment will start on
    next_line: usize,
    lines: Vec<Vec<Segment>>,
    sources: Vec<String>,
    sources_content: Vec<Option<String>>,
    names: Vec<String>,
}

impl Concatenator {
    pub fn new() -> Self {
        Concatenator {
            content: String::new(),
            fragments: 0,
            next_line: 0,
            lines: Vec::new(),
            sources: Vec::new(),
            sources_content: Vec::new(),
            names: Vec::new(),
        }
    }

    /// Append one fragment.
    ///
    /// `source_name` annotates the fragment in the merged map when the
    /// fragment has no map of its own; fragments with a map keep the sources
    /// that map declares.
    pub fn add(
        &mut self,
        source_name: &str,
        text: &str,
        map: Option<&SourceMap>,
    ) -> Result<(), Error> {
        // Every fragment after the first gets a separator, even when an
        // earlier fragment's text was empty
        let start_line = if self.fragments == 0 {
            0
        } else {
            self.content.push('\n');
            self.next_line
        };
        self.fragments += 1;

        self.content.push_str(text);
        let fragment_lines = text.split('\n').count();

        match map {
            Some(map) => self.merge_fragment_map(map, start_line, fragment_lines)?,
            None => self.add_identity_mappings(source_name, text, start_line, fragment_lines),
        }

        self.next_line = start_line + fragment_lines;
        Ok(())
    }

    fn merge_fragment_map(
        &mut self,
        map: &SourceMap,
        start_line: usize,
        fragment_lines: usize,
    ) -> Result<(), Error> {
        let source_offset = self.sources.len() as i64;
        let name_offset = self.names.len() as i64;

        self.sources.extend(map.sources.iter().cloned());
        match &map.sources_content {
            Some(content) => {
                self.sources_content.extend(content.iter().cloned());
                // Pad when the map declares fewer contents than sources
                while self.sources_content.len() < self.sources.len() {
                    self.sources_content.push(None);
                }
            }
            None => self
                .sources_content
                .extend(map.sources.iter().map(|_| None)),
        }
        self.names.extend(map.names.iter().cloned());

        let decoded = decode_mappings(&map.mappings)?;
        self.ensure_lines(start_line + fragment_lines);
        for (line_index, segments) in decoded.into_iter().enumerate() {
            if line_index >= fragment_lines {
                break;
            }
            let rebased = segments.into_iter().map(|segment| Segment {
                generated_column: segment.generated_column,
                source: segment.source.map(|position| SourcePosition {
                    source: position.source + source_offset,
                    line: position.line,
                    column: position.column,
                    name: position.name.map(|n| n + name_offset),
                }),
            });
            self.lines[start_line + line_index].extend(rebased);
        }
        Ok(())
    }

    fn add_identity_mappings(
        &mut self,
        source_name: &str,
        text: &str,
        start_line: usize,
        fragment_lines: usize,
    ) {
        let source_index = self.sources.len() as i64;
        self.sources.push(source_name.to_string());
        self.sources_content.push(Some(text.to_string()));

        self.ensure_lines(start_line + fragment_lines);
        for line in 0..fragment_lines {
            self.lines[start_line + line].push(Segment {
                generated_column: 0,
                source: Some(SourcePosition {
                    source: source_index,
                    line: line as i64,
                    column: 0,
                    name: None,
                }),
            });
        }
    }

    fn ensure_lines(&mut self, count: usize) {
        while self.lines.len() < count {
            self.lines.push(Vec::new());
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn into_content(self) -> String {
        self.content
    }

    /// The merged source map, with its `file` field set to `file_name`
    pub fn source_map(&self, file_name: &str) -> SourceMap {
        SourceMap {
            version: 3,
            file: Some(file_name.to_string()),
            sources: self.sources.clone(),
            sources_content: Some(self.sources_content.clone()),
            names: self.names.clone(),
            mappings: encode_mappings(&self.lines),
        }
    }
}

impl Default for Concatenator {
    fn default() -> Self {
        Self::new()
    }
}
