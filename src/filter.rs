//! Include/exclude filtering over file paths

use crate::error::Error;
use crate::utils::normalize_path;
use regex::Regex;

/// Allow/deny filter applied before any loader runs.
///
/// Patterns are regular expressions tested against the normalized path.
/// An empty include list admits every path; exclusion wins over inclusion.
#[derive(Debug, Clone, Default)]
pub struct FileFilter {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl FileFilter {
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self, Error> {
        Ok(FileFilter {
            include: compile(include)?,
            exclude: compile(exclude)?,
        })
    }

    pub fn included(&self, path: &str) -> bool {
        let path = normalize_path(path);
        if self.exclude.iter().any(|re| re.is_match(&path)) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(|re| re.is_match(&path))
    }
}

fn compile(patterns: &[String]) -> Result<Vec<Regex>, Error> {
    patterns
        .iter()
        .map(|pattern| {
            Regex::new(pattern)
                .map_err(|e| Error::Config(format!("invalid filter pattern '{}': {}", pattern, e)))
        })
        .collect()
}
