//! Glob-based entry filters for tree copies.

use glob::Pattern;
use std::path::Path;

use crate::copy::EntryInfo;
use crate::error::FilterError;

/// Name-based inclusion test.
///
/// Exclude patterns reject any entry whose name matches. Include patterns,
/// when present, only admit regular files matching at least one of them;
/// directories are always descended unless excluded.
#[derive(Debug, Clone, Default)]
pub struct PatternFilter {
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
    skip_hidden: bool,
}

impl PatternFilter {
    pub fn new(
        include: &[String],
        exclude: &[String],
        skip_hidden: bool,
    ) -> Result<Self, FilterError> {
        Ok(PatternFilter {
            include: compile(include)?,
            exclude: compile(exclude)?,
            skip_hidden,
        })
    }

    /// True if neither patterns nor hidden-entry skipping are configured.
    pub fn is_noop(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty() && !self.skip_hidden
    }

    pub fn matches(&self, _dir: &Path, entry: &EntryInfo) -> bool {
        let name = entry.name().to_string_lossy();

        if self.skip_hidden && name.starts_with('.') {
            return false;
        }
        if self.exclude.iter().any(|p| p.matches(&name)) {
            return false;
        }
        if entry.is_file() && !self.include.is_empty() {
            return self.include.iter().any(|p| p.matches(&name));
        }
        true
    }
}

fn compile(patterns: &[String]) -> Result<Vec<Pattern>, FilterError> {
    patterns
        .iter()
        .map(|pattern| {
            Pattern::new(pattern).map_err(|source| FilterError::Pattern {
                pattern: pattern.clone(),
                source,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::copy::{copy_recursive, CopyOptions};
    use crate::ui;
    use std::fs;
    use tempfile::TempDir;

    fn entry(dir: &Path, name: &str) -> EntryInfo {
        let meta = fs::symlink_metadata(dir.join(name)).unwrap();
        EntryInfo::from_metadata(name.into(), &meta)
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_exclude_patterns() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("notes.tmp"), "").unwrap();
        fs::write(temp.path().join("notes.txt"), "").unwrap();
        let filter = PatternFilter::new(&[], &strings(&["*.tmp"]), false).unwrap();

        assert!(!filter.matches(temp.path(), &entry(temp.path(), "notes.tmp")));
        assert!(filter.matches(temp.path(), &entry(temp.path(), "notes.txt")));
    }

    #[test]
    fn test_include_patterns_only_constrain_files() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("src")).unwrap();
        fs::write(temp.path().join("main.rs"), "").unwrap();
        fs::write(temp.path().join("Makefile"), "").unwrap();
        let filter = PatternFilter::new(&strings(&["*.rs"]), &[], false).unwrap();

        assert!(filter.matches(temp.path(), &entry(temp.path(), "src")));
        assert!(filter.matches(temp.path(), &entry(temp.path(), "main.rs")));
        assert!(!filter.matches(temp.path(), &entry(temp.path(), "Makefile")));
    }

    #[test]
    fn test_skip_hidden() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join(".git")).unwrap();
        let filter = PatternFilter::new(&[], &[], true).unwrap();

        assert!(!filter.matches(temp.path(), &entry(temp.path(), ".git")));
    }

    #[test]
    fn test_invalid_pattern() {
        let err = PatternFilter::new(&[], &strings(&["[unclosed"]), false).unwrap_err();
        assert!(err.to_string().contains("[unclosed"));
    }

    #[test]
    fn test_filter_drives_tree_copy() {
        ui::set_quiet(true);
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        let dst = temp.path().join("dst");
        fs::create_dir_all(src.join(".cache")).unwrap();
        fs::create_dir_all(src.join("assets")).unwrap();
        fs::write(src.join(".cache/blob"), "x").unwrap();
        fs::write(src.join("assets/app.css"), "body {}").unwrap();
        fs::write(src.join("assets/app.css.bak"), "old").unwrap();
        fs::create_dir(&dst).unwrap();

        let filter = PatternFilter::new(&[], &strings(&["*.bak"]), true).unwrap();
        let predicate = |dir: &Path, e: &EntryInfo| filter.matches(dir, e);
        copy_recursive(&dst, &src, &CopyOptions::default(), Some(&predicate)).unwrap();

        assert!(dst.join("assets/app.css").exists());
        assert!(!dst.join("assets/app.css.bak").exists());
        assert!(!dst.join(".cache").exists());
    }
}
