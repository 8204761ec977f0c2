// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Timestamped sibling backups.
//!
//! Before a file is rewritten in place, its original content is copied next
//! to it as `<timestamp>_<file name>.bak`. The timestamp has the form
//! `YYYYmmdd-HHMMSS`, so a plain directory listing sorts backups from oldest to
//! newest, including backups that share a timestamp. Backups are never pruned
//! automatically.

use chrono::Local;
use std::{
    fs::OpenOptions,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};
use tracing::info;

/// Format of the timestamp prefix.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Current local time formatted as backup timestamp.
pub fn timestamp() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Write timestamped backup of original content next to target file.
///
/// Uses the current local time as timestamp.
///
/// # Errors
///
/// - Return [`BackupError`] if backup file cannot be written.
pub fn write_backup(path: impl AsRef<Path>, original: impl AsRef<[u8]>) -> Result<PathBuf> {
    write_backup_stamped(path, original, timestamp())
}

/// Write backup of original content next to target file with given timestamp.
///
/// Never overwrites an existing backup. If the preferred backup name is
/// taken, a zero-padded counter is appended to the timestamp after `~`, which
/// sorts after the unsuffixed name.
///
/// # Errors
///
/// - Return [`BackupError`] if backup file cannot be written.
pub fn write_backup_stamped(
    path: impl AsRef<Path>,
    original: impl AsRef<[u8]>,
    stamp: impl AsRef<str>,
) -> Result<PathBuf> {
    let path = path.as_ref();
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let parent = path.parent().unwrap_or_else(|| Path::new(""));

    let mut attempt = 0usize;
    loop {
        let backup_name = match attempt {
            0 => format!("{}_{file_name}.bak", stamp.as_ref()),
            n => format!("{}~{n:03}_{file_name}.bak", stamp.as_ref()),
        };
        let backup_path = parent.join(backup_name);

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&backup_path);
        let mut file = match file {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                attempt += 1;
                continue;
            }
            Err(err) => {
                return Err(BackupError {
                    source: err,
                    backup_path,
                })
            }
        };

        file.write_all(original.as_ref())
            .map_err(|err| BackupError {
                source: err,
                backup_path: backup_path.clone(),
            })?;
        info!(
            "backup of {:?} created as {:?}",
            path.display(),
            backup_path.display()
        );

        return Ok(backup_path);
    }
}

/// Backup file cannot be written.
#[derive(Debug, thiserror::Error)]
#[error("failed to write backup {:?}", backup_path.display())]
pub struct BackupError {
    #[source]
    pub source: std::io::Error,
    pub backup_path: PathBuf,
}

/// Friendly result alias :3
pub type Result<T, E = BackupError> = std::result::Result<T, E>;
