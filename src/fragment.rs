// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Fragment tree traversal.
//!
//! The reverse proxy configuration lives in a directory tree of text
//! __fragments__. Only files whose name matches the fragment pattern (by
//! default `*.conf`) are considered fragments. Everything else in the tree,
//! e.g., timestamped `.bak` copies, is left alone by the substitution engine
//! and the pruner.

use ignore::WalkBuilder;
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
};
use tracing::warn;

/// Default glob pattern matching fragment file names.
pub const DEFAULT_FRAGMENT_PATTERN: &str = "*.conf";

/// Match file names against fragment pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentFilter {
    pattern: glob::Pattern,
}

impl FragmentFilter {
    /// Construct new fragment filter from glob pattern.
    ///
    /// # Errors
    ///
    /// - Return [`FragmentError::Pattern`] if glob pattern is invalid.
    pub fn new(pattern: impl AsRef<str>) -> Result<Self> {
        let pattern = glob::Pattern::new(pattern.as_ref()).map_err(|err| FragmentError::Pattern {
            source: err,
            pattern: pattern.as_ref().into(),
        })?;

        Ok(Self { pattern })
    }

    /// Check if file name is a fragment name.
    pub fn matches(&self, file_name: impl AsRef<str>) -> bool {
        self.pattern.matches(file_name.as_ref())
    }

    /// Check if path points to a fragment by its file name.
    pub fn matches_path(&self, path: impl AsRef<Path>) -> bool {
        path.as_ref()
            .file_name()
            .map(|name| self.matches(name.to_string_lossy()))
            .unwrap_or(false)
    }
}

/// Directory tree of fragments.
#[derive(Debug, Clone)]
pub struct FragmentTree {
    root: PathBuf,
    filter: FragmentFilter,
}

impl FragmentTree {
    /// Open fragment tree at target root directory.
    ///
    /// # Errors
    ///
    /// - Return [`FragmentError::MissingRoot`] if root is not an existing
    ///   directory.
    pub fn open(root: impl Into<PathBuf>, filter: FragmentFilter) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(FragmentError::MissingRoot { root });
        }

        Ok(Self { root, filter })
    }

    /// Root directory of fragment tree.
    pub fn root(&self) -> &Path {
        self.root.as_path()
    }

    /// Fragment filter of tree.
    pub fn filter(&self) -> &FragmentFilter {
        &self.filter
    }

    /// Collect every fragment under root recursively.
    ///
    /// Entries are visited in file name order per directory. Entries that
    /// cannot be visited are recorded as failures instead of aborting the
    /// traversal.
    pub fn walk(&self) -> FragmentWalk {
        let mut walk = FragmentWalk::default();
        let walker = WalkBuilder::new(&self.root)
            .standard_filters(false)
            .follow_links(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .build();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("cannot visit entry under {:?}: {err}", self.root.display());
                    walk.failures.push(FileFailure::new(self.root.as_path(), err));
                    continue;
                }
            };

            // INVARIANT: Only regular files (or links to them) can be fragments.
            let is_dir = entry.file_type().map(|kind| kind.is_dir()).unwrap_or(true);
            if is_dir || !entry.path().is_file() {
                continue;
            }

            if self.filter.matches_path(entry.path()) {
                walk.fragments.push(entry.into_path());
            }
        }

        walk
    }
}

/// Result of walking a fragment tree.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FragmentWalk {
    /// Fragment paths in traversal order.
    pub fragments: Vec<PathBuf>,

    /// Entries that could not be visited.
    pub failures: Vec<FileFailure>,
}

/// File that was skipped because of an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub path: PathBuf,
    pub reason: String,
}

impl FileFailure {
    pub fn new(path: impl Into<PathBuf>, reason: impl Display) -> Self {
        Self {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

impl Display for FileFailure {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(fmt, "{}: {}", self.path.display(), self.reason)
    }
}

/// Fragment traversal error types.
#[derive(Debug, thiserror::Error)]
pub enum FragmentError {
    /// Root directory of fragment tree does not exist.
    #[error("fragment directory {:?} not found", root.display())]
    MissingRoot { root: PathBuf },

    /// Fragment pattern cannot be compiled.
    #[error("invalid fragment pattern {pattern:?}")]
    Pattern {
        #[source]
        source: glob::PatternError,
        pattern: String,
    },
}

/// Friendly result alias :3
pub type Result<T, E = FragmentError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;
    use std::fs::{create_dir_all, write};

    #[test]
    fn filter_matches_suffix_only() -> anyhow::Result<()> {
        let filter = FragmentFilter::new(DEFAULT_FRAGMENT_PATTERN)?;
        assert!(filter.matches("base.conf"));
        assert!(!filter.matches("20250101-120000_base.conf.bak"));
        assert!(!filter.matches("base.conf.swp"));

        let filter = FragmentFilter::new("*.tmpl")?;
        assert!(filter.matches("http.tmpl"));
        assert!(!filter.matches("http.conf"));

        Ok(())
    }

    #[test]
    fn reject_invalid_pattern() {
        assert!(matches!(
            FragmentFilter::new("[*.conf"),
            Err(FragmentError::Pattern { .. })
        ));
    }

    #[sealed_test]
    fn open_missing_root() -> anyhow::Result<()> {
        let filter = FragmentFilter::new(DEFAULT_FRAGMENT_PATTERN)?;
        assert!(matches!(
            FragmentTree::open("conf.d", filter),
            Err(FragmentError::MissingRoot { .. })
        ));

        Ok(())
    }

    #[sealed_test]
    fn walk_collects_nested_fragments() -> anyhow::Result<()> {
        create_dir_all("conf.d/servers")?;
        create_dir_all("conf.d/stream")?;
        write("conf.d/http.conf", "http {}")?;
        write("conf.d/servers/base.conf", "server {}")?;
        write("conf.d/servers/notes.txt", "not a fragment")?;
        write("conf.d/stream/.hidden.conf", "still a fragment")?;
        write("conf.d/20250101-120000_http.conf.bak", "backup")?;

        let filter = FragmentFilter::new(DEFAULT_FRAGMENT_PATTERN)?;
        let tree = FragmentTree::open("conf.d", filter)?;
        let walk = tree.walk();
        let expect = vec![
            PathBuf::from("conf.d/http.conf"),
            PathBuf::from("conf.d/servers/base.conf"),
            PathBuf::from("conf.d/stream/.hidden.conf"),
        ];
        assert_eq!(walk.fragments, expect);
        assert!(walk.failures.is_empty());

        Ok(())
    }
}
