// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine where configuration files live when the deploy root does not
//! provide one of its own.

use std::path::{Path, PathBuf};

/// Name of configuration file looked up at the deploy root.
pub const WORKSPACE_CONFIG_NAME: &str = "hecate.toml";

/// Determine default absolute path to user configuration file.
///
/// Uses XDG Base Directory path `$XDG_CONFIG_HOME/hecate/hecate.toml`. Does
/// not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoConfigHome`] if configuration directory cannot be determined.
///
/// # See Also
///
/// - [XDG Base Directory](https://wiki.archlinux.org/title/XDG_Base_Directory)
pub fn default_config_path() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|path| path.join("hecate").join(WORKSPACE_CONFIG_NAME))
        .ok_or(NoConfigHome)
}

/// Path to configuration file at deploy root.
pub fn workspace_config_path(root: impl AsRef<Path>) -> PathBuf {
    root.as_ref().join(WORKSPACE_CONFIG_NAME)
}

/// Resolve path against deploy root unless it is already absolute.
pub fn resolve(root: impl AsRef<Path>, path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.as_ref().join(path)
    }
}

/// No way to determine user's configuration directory.
///
/// # See Also
///
/// - [`dirs::config_dir`](https://docs.rs/dirs/latest/dirs/fn.config_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's configuration directory")]
pub struct NoConfigHome;

/// Friendly result alias :3
pub type Result<T, E = NoConfigHome> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    #[test]
    fn resolve_relative_and_absolute() {
        assert_eq!(resolve("/srv/hecate", "conf.d"), PathBuf::from("/srv/hecate/conf.d"));
        assert_eq!(resolve("/srv/hecate", "/etc/nginx"), PathBuf::from("/etc/nginx"));
    }

    #[cfg(target_os = "linux")]
    #[sealed_test(env = [("XDG_CONFIG_HOME", "/tmp/xdg-config")])]
    fn default_config_path_follows_xdg() -> anyhow::Result<()> {
        assert_eq!(
            default_config_path()?,
            PathBuf::from("/tmp/xdg-config/hecate/hecate.toml")
        );

        Ok(())
    }
}
