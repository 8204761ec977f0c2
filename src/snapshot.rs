// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Whole-deployment snapshot and restore.
//!
//! Before risky edits the operator can snapshot the live deployment, i.e.,
//! the fragment directory, the certificate directory, and the compose file.
//! Every live item is copied next to itself with a `.bak` suffix, replacing
//! the previous snapshot. Restoring copies the saved items back over the live
//! ones.
//!
//! Every source is verified before anything is touched. A missing source
//! aborts the whole operation with no side effects. There is no rollback once
//! copying has started.

use ignore::WalkBuilder;
use std::{
    fs::{copy, remove_dir_all, remove_file, symlink_metadata},
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{info, instrument};

/// Kind of snapshot item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Dir,
    File,
}

/// One live item of the deployment and its saved copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotItem {
    pub live: PathBuf,
    pub saved: PathBuf,
    pub kind: ItemKind,
}

impl SnapshotItem {
    /// Construct new item saved next to live path with `.bak` suffix.
    pub fn new(live: impl Into<PathBuf>, kind: ItemKind) -> Self {
        let live = live.into();
        let mut saved = live.clone().into_os_string();
        saved.push(".bak");

        Self {
            live,
            saved: saved.into(),
            kind,
        }
    }
}

/// Snapshot of deployment items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    items: Vec<SnapshotItem>,
}

impl Snapshot {
    pub fn new(items: impl IntoIterator<Item = SnapshotItem>) -> Self {
        Self {
            items: items.into_iter().collect(),
        }
    }

    /// Standard snapshot of fragment directory, certs directory, and compose file.
    pub fn standard(
        conf_dir: impl Into<PathBuf>,
        certs_dir: impl Into<PathBuf>,
        compose_file: impl Into<PathBuf>,
    ) -> Self {
        Self::new([
            SnapshotItem::new(conf_dir, ItemKind::Dir),
            SnapshotItem::new(certs_dir, ItemKind::Dir),
            SnapshotItem::new(compose_file, ItemKind::File),
        ])
    }

    pub fn items(&self) -> &[SnapshotItem] {
        self.items.as_slice()
    }

    /// Save every live item, replacing previous saved copies.
    ///
    /// # Errors
    ///
    /// - Return [`SnapshotError::MissingSource`] if a live item is missing.
    /// - Return [`SnapshotError::Remove`], [`SnapshotError::Copy`], or
    ///   [`SnapshotError::Walk`] if copying fails.
    #[instrument(skip(self), level = "debug")]
    pub fn backup(&self) -> Result<Vec<PathBuf>> {
        self.transfer(|item| (item.live.as_path(), item.saved.as_path(), item.kind))
    }

    /// Restore every saved item, replacing live items.
    ///
    /// # Errors
    ///
    /// - Return [`SnapshotError::MissingSource`] if a saved item is missing.
    /// - Return [`SnapshotError::Remove`], [`SnapshotError::Copy`], or
    ///   [`SnapshotError::Walk`] if copying fails.
    #[instrument(skip(self), level = "debug")]
    pub fn restore(&self) -> Result<Vec<PathBuf>> {
        self.transfer(|item| (item.saved.as_path(), item.live.as_path(), item.kind))
    }

    fn transfer<F>(&self, direction: F) -> Result<Vec<PathBuf>>
    where
        F: Fn(&SnapshotItem) -> (&Path, &Path, ItemKind),
    {
        // INVARIANT: Verify every source before the first mutation.
        for item in &self.items {
            let (from, _, kind) = direction(item);
            let present = match kind {
                ItemKind::Dir => from.is_dir(),
                ItemKind::File => from.is_file(),
            };
            if !present {
                return Err(SnapshotError::MissingSource {
                    path: from.into(),
                    kind,
                });
            }
        }

        let mut written = Vec::with_capacity(self.items.len());
        for item in &self.items {
            let (from, to, kind) = direction(item);
            remove_existing(to)?;
            match kind {
                ItemKind::Dir => copy_tree(from, to)?,
                ItemKind::File => copy_file(from, to)?,
            }
            info!("copied {:?} to {:?}", from.display(), to.display());
            written.push(to.to_path_buf());
        }

        Ok(written)
    }
}

fn remove_existing(path: &Path) -> Result<()> {
    let metadata = match symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(()),
        Err(err) => {
            return Err(SnapshotError::Remove {
                source: err,
                path: path.into(),
            })
        }
    };

    let result = if metadata.is_dir() {
        remove_dir_all(path)
    } else {
        remove_file(path)
    };
    result.map_err(|err| SnapshotError::Remove {
        source: err,
        path: path.into(),
    })
}

fn copy_file(from: &Path, to: &Path) -> Result<()> {
    copy(from, to).map_err(|err| SnapshotError::Copy {
        source: err,
        from: from.into(),
        to: to.into(),
    })?;

    Ok(())
}

fn create_dir(path: &Path) -> Result<()> {
    mkdirp::mkdirp(path).map_err(|err| SnapshotError::CreateDir {
        source: err,
        path: path.into(),
    })?;

    Ok(())
}

fn copy_tree(from: &Path, to: &Path) -> Result<()> {
    create_dir(to)?;
    let walker = WalkBuilder::new(from)
        .standard_filters(false)
        .follow_links(false)
        .build();

    for entry in walker {
        let entry = entry.map_err(|err| SnapshotError::Walk {
            source: err,
            path: from.into(),
        })?;

        // INVARIANT: Walker only yields paths below its root.
        let Ok(relative) = entry.path().strip_prefix(from) else {
            continue;
        };
        if relative.as_os_str().is_empty() {
            continue;
        }

        let target = to.join(relative);
        if entry.file_type().map(|kind| kind.is_dir()).unwrap_or(false) {
            create_dir(&target)?;
        } else {
            copy_file(entry.path(), &target)?;
        }
    }

    Ok(())
}

/// Snapshot error types.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// Source item does not exist.
    #[error("source {kind:?} {:?} does not exist", path.display())]
    MissingSource { path: PathBuf, kind: ItemKind },

    #[error("failed to remove {:?}", path.display())]
    Remove {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    #[error("failed to create directory {:?}", path.display())]
    CreateDir {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    #[error("failed to copy {:?} to {:?}", from.display(), to.display())]
    Copy {
        #[source]
        source: std::io::Error,
        from: PathBuf,
        to: PathBuf,
    },

    #[error("failed to walk {:?}", path.display())]
    Walk {
        #[source]
        source: ignore::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = SnapshotError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;
    use std::fs::{create_dir_all, read_to_string, write};

    fn seed() -> anyhow::Result<()> {
        create_dir_all("conf.d/servers")?;
        create_dir_all("certs")?;
        write("conf.d/http.conf", "http {}")?;
        write("conf.d/servers/base.conf", "server {}")?;
        write("certs/example.com.fullchain.pem", "chain")?;
        write("docker-compose.yml", "services: {}")?;

        Ok(())
    }

    fn snapshot() -> Snapshot {
        Snapshot::standard("conf.d", "certs", "docker-compose.yml")
    }

    #[test]
    fn saved_paths_get_bak_suffix() {
        let result = snapshot()
            .items()
            .iter()
            .map(|item| item.saved.clone())
            .collect::<Vec<_>>();
        let expect = vec![
            PathBuf::from("conf.d.bak"),
            PathBuf::from("certs.bak"),
            PathBuf::from("docker-compose.yml.bak"),
        ];
        assert_eq!(result, expect);
    }

    #[sealed_test]
    fn backup_copies_everything() -> anyhow::Result<()> {
        seed()?;
        write("conf.d.bak", "stale file in the way")?;

        let written = snapshot().backup()?;
        assert_eq!(written.len(), 3);
        assert_eq!(read_to_string("conf.d.bak/servers/base.conf")?, "server {}");
        assert_eq!(read_to_string("certs.bak/example.com.fullchain.pem")?, "chain");
        assert_eq!(read_to_string("docker-compose.yml.bak")?, "services: {}");

        Ok(())
    }

    #[sealed_test]
    fn restore_replaces_live_items() -> anyhow::Result<()> {
        seed()?;
        snapshot().backup()?;

        write("conf.d/servers/delphi.conf", "added after snapshot")?;
        write("conf.d/http.conf", "changed")?;
        write("docker-compose.yml", "changed")?;

        snapshot().restore()?;
        assert!(!Path::new("conf.d/servers/delphi.conf").exists());
        assert_eq!(read_to_string("conf.d/http.conf")?, "http {}");
        assert_eq!(read_to_string("docker-compose.yml")?, "services: {}");

        Ok(())
    }

    #[sealed_test]
    fn missing_source_has_no_side_effects() -> anyhow::Result<()> {
        seed()?;
        std::fs::remove_file("docker-compose.yml")?;

        let result = snapshot().backup();
        assert!(matches!(
            result,
            Err(SnapshotError::MissingSource {
                kind: ItemKind::File,
                ..
            })
        ));
        assert!(!Path::new("conf.d.bak").exists());
        assert!(!Path::new("certs.bak").exists());

        Ok(())
    }

    #[sealed_test]
    fn restore_without_snapshot_fails() -> anyhow::Result<()> {
        seed()?;
        assert!(matches!(
            snapshot().restore(),
            Err(SnapshotError::MissingSource { .. })
        ));
        assert_eq!(read_to_string("conf.d/http.conf")?, "http {}");

        Ok(())
    }

    #[sealed_test]
    fn blocked_directory_reports_create_failure() -> anyhow::Result<()> {
        write("blocker", "not a directory")?;

        let result = create_dir(Path::new("blocker/conf.d.bak"));
        match result {
            Err(SnapshotError::CreateDir { path, .. }) => {
                assert_eq!(path, PathBuf::from("blocker/conf.d.bak"));
            }
            other => panic!("expected create failure, got {other:?}"),
        }

        Ok(())
    }
}
