// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Selection-driven pruner.
//!
//! Deployments ship with fragments for every application in the catalog. The
//! pruner removes the fragments of applications the operator did not select,
//! so the reverse proxy never tries to front a service that is not running.
//! Fragments named in the essential set survive any selection.

use crate::{
    catalog::{AllowedFragments, Catalog, Selection},
    fragment::{FileFailure, FragmentFilter, FragmentTree},
};

use std::{
    fs::remove_file,
    path::{Path, PathBuf},
};
use tracing::{info, instrument, warn};

/// Remove fragments not allowed by a selection.
#[derive(Debug, Clone)]
pub struct Pruner {
    tree: FragmentTree,
    catalog: Catalog,
}

impl Pruner {
    /// Construct new pruner over target fragment root.
    ///
    /// # Errors
    ///
    /// - Return [`PruneError::Fragment`] if root directory does not exist.
    pub fn open(root: impl Into<PathBuf>, filter: FragmentFilter, catalog: Catalog) -> Result<Self> {
        Ok(Self {
            tree: FragmentTree::open(root, filter)?,
            catalog,
        })
    }

    /// Root directory of pruner.
    pub fn root(&self) -> &Path {
        self.tree.root()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Determine what pruning would do without touching anything.
    ///
    /// Fragments listed as removed are only candidates for removal.
    #[instrument(skip(self), level = "debug")]
    pub fn plan(&self, selection: &Selection) -> PruneReport {
        let allowed = self.catalog.allowed_fragments(selection);
        let walk = self.tree.walk();
        let mut report = PruneReport {
            failures: walk.failures,
            ..Default::default()
        };

        for path in walk.fragments {
            match classify(&allowed, &path) {
                Verdict::Essential => report.kept_essential.push(path),
                Verdict::Selected => report.kept_selected.push(path),
                Verdict::Remove => report.removed.push(path),
            }
        }

        report
    }

    /// Delete every fragment whose file name is not allowed by selection.
    ///
    /// Fragment listing is collected before the first deletion. A failed
    /// deletion is recorded in the report and pruning continues.
    #[instrument(skip(self), level = "debug")]
    pub fn prune(&self, selection: &Selection) -> PruneReport {
        let mut plan = self.plan(selection);
        let candidates = std::mem::take(&mut plan.removed);

        for path in candidates {
            match remove_file(&path) {
                Ok(()) => {
                    info!("removed {:?}", path.display());
                    plan.removed.push(path);
                }
                Err(err) => {
                    let failure = FileFailure::new(path, format!("failed to remove: {err}"));
                    warn!("{failure}");
                    plan.failures.push(failure);
                }
            }
        }

        plan
    }
}

enum Verdict {
    Essential,
    Selected,
    Remove,
}

fn classify(allowed: &AllowedFragments, path: &Path) -> Verdict {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    // INVARIANT: Essential check comes first, so essentials are never removed.
    if allowed.is_essential(&name) {
        Verdict::Essential
    } else if allowed.contains(&name) {
        Verdict::Selected
    } else {
        Verdict::Remove
    }
}

/// Outcome of a pruning pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PruneReport {
    /// Fragments removed (or to be removed for a plan).
    pub removed: Vec<PathBuf>,

    /// Fragments kept because they are essential.
    pub kept_essential: Vec<PathBuf>,

    /// Fragments kept because a selected application owns them.
    pub kept_selected: Vec<PathBuf>,

    /// Fragments that could not be removed.
    pub failures: Vec<FileFailure>,
}

/// Pruner error types.
#[derive(Debug, thiserror::Error)]
pub enum PruneError {
    /// Fragment tree cannot be opened.
    #[error(transparent)]
    Fragment(#[from] crate::fragment::FragmentError),
}

/// Friendly result alias :3
pub type Result<T, E = PruneError> = std::result::Result<T, E>;
