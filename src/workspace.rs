// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Deploy root workspace.
//!
//! A workspace is the deploy root directory together with its loaded
//! configuration. Every path Hecate touches is resolved through it.
//!
//! # Configuration Lookup
//!
//! Configuration is looked up in order, and the first hit wins:
//!
//! 1. Explicit configuration file given by the caller.
//! 2. `hecate.toml` at the deploy root.
//! 3. `$XDG_CONFIG_HOME/hecate/hecate.toml`.
//! 4. Builtin defaults.

use crate::{
    catalog::Catalog,
    certs::CertManager,
    compose::Compose,
    config::{ConfigError, HecateConfig},
    exec::CommandRunner,
    fragment::{FragmentError, FragmentFilter},
    path::{default_config_path, resolve, workspace_config_path},
    prune::Pruner,
    snapshot::Snapshot,
    state::{DeployState, StateError},
    substitute::Substituter,
};

use std::{
    fs::read_to_string,
    path::{Path, PathBuf},
};
use tracing::{debug, instrument};

/// Deploy root with loaded configuration.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    config: HecateConfig,
    config_path: Option<PathBuf>,
}

impl Workspace {
    /// Open workspace at deploy root.
    ///
    /// # Errors
    ///
    /// - Return [`WorkspaceError::MissingRoot`] if deploy root is not a
    ///   directory.
    /// - Return [`WorkspaceError::ReadConfig`] or [`WorkspaceError::Config`]
    ///   if a configuration file exists but cannot be loaded.
    #[instrument(skip(root), level = "debug")]
    pub fn open(root: impl Into<PathBuf>, config: Option<&Path>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(WorkspaceError::MissingRoot { root });
        }

        let config_path = match config {
            Some(path) => Some(path.to_path_buf()),
            None => lookup_config(&root),
        };

        let config = match &config_path {
            Some(path) => load_config(path)?,
            None => HecateConfig::default(),
        };
        debug!("workspace at {:?} using {config_path:?}", root.display());

        Ok(Self {
            root,
            config,
            config_path,
        })
    }

    /// Construct workspace with explicit configuration.
    pub fn with_config(root: impl Into<PathBuf>, config: HecateConfig) -> Self {
        Self {
            root: root.into(),
            config,
            config_path: None,
        }
    }

    pub fn root(&self) -> &Path {
        self.root.as_path()
    }

    pub fn config(&self) -> &HecateConfig {
        &self.config
    }

    /// Configuration file loaded, if any.
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    pub fn conf_dir(&self) -> PathBuf {
        resolve(&self.root, &self.config.layout.conf_dir)
    }

    pub fn certs_dir(&self) -> PathBuf {
        resolve(&self.root, &self.config.layout.certs_dir)
    }

    pub fn compose_file(&self) -> PathBuf {
        resolve(&self.root, &self.config.layout.compose_file)
    }

    pub fn state_file(&self) -> PathBuf {
        resolve(&self.root, &self.config.layout.state_file)
    }

    pub fn http_conf(&self) -> PathBuf {
        resolve(&self.root, &self.config.layout.http_conf)
    }

    /// Directory the compose file lives in.
    pub fn compose_dir(&self) -> PathBuf {
        self.compose_file()
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone())
    }

    /// Fragment filter of configured pattern.
    ///
    /// # Errors
    ///
    /// - Return [`WorkspaceError::Fragment`] if pattern is invalid.
    pub fn fragment_filter(&self) -> Result<FragmentFilter> {
        Ok(FragmentFilter::new(&self.config.layout.fragment_pattern)?)
    }

    /// Catalog with configured essential fragments.
    pub fn catalog(&self) -> Catalog {
        Catalog::with_essentials(self.config.prune.essential.iter().cloned())
    }

    /// Substitution engine over fragment directory.
    ///
    /// # Errors
    ///
    /// - Return [`WorkspaceError::Substitute`] if fragment directory is missing.
    pub fn substituter(&self) -> Result<Substituter> {
        Ok(Substituter::open(self.conf_dir(), self.fragment_filter()?)?)
    }

    /// Pruner over fragment directory.
    ///
    /// # Errors
    ///
    /// - Return [`WorkspaceError::Prune`] if fragment directory is missing.
    pub fn pruner(&self) -> Result<Pruner> {
        Ok(Pruner::open(
            self.conf_dir(),
            self.fragment_filter()?,
            self.catalog(),
        )?)
    }

    /// Snapshot of deployment items.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::standard(self.conf_dir(), self.certs_dir(), self.compose_file())
    }

    pub fn cert_manager(&self) -> CertManager {
        CertManager::new(self.config.certs.clone(), self.certs_dir())
    }

    pub fn compose<'run, R: CommandRunner>(&self, runner: &'run R) -> Compose<'run, R> {
        Compose::new(runner, self.config.compose.clone(), self.compose_dir())
    }

    /// Load last-values record.
    ///
    /// # Errors
    ///
    /// - Return [`WorkspaceError::State`] if record cannot be read.
    pub fn load_state(&self) -> Result<DeployState> {
        Ok(DeployState::load(self.state_file())?)
    }

    /// Save last-values record.
    ///
    /// # Errors
    ///
    /// - Return [`WorkspaceError::State`] if record cannot be written.
    pub fn save_state(&self, state: &DeployState) -> Result<()> {
        Ok(state.save(self.state_file())?)
    }
}

fn lookup_config(root: &Path) -> Option<PathBuf> {
    let local = workspace_config_path(root);
    if local.is_file() {
        return Some(local);
    }

    default_config_path().ok().filter(|path| path.is_file())
}

fn load_config(path: &Path) -> Result<HecateConfig> {
    let data = read_to_string(path).map_err(|err| WorkspaceError::ReadConfig {
        source: err,
        path: path.into(),
    })?;

    data.parse().map_err(|err| WorkspaceError::Config {
        source: err,
        path: path.into(),
    })
}

/// Workspace error types.
#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    /// Deploy root is not a directory.
    #[error("deploy root {:?} is not a directory", root.display())]
    MissingRoot { root: PathBuf },

    #[error("failed to read configuration {:?}", path.display())]
    ReadConfig {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    #[error("invalid configuration {:?}", path.display())]
    Config {
        #[source]
        source: ConfigError,
        path: PathBuf,
    },

    #[error(transparent)]
    Fragment(#[from] FragmentError),

    #[error(transparent)]
    Substitute(#[from] crate::substitute::SubstituteError),

    #[error(transparent)]
    Prune(#[from] crate::prune::PruneError),

    #[error(transparent)]
    State(#[from] StateError),
}

/// Friendly result alias :3
pub type Result<T, E = WorkspaceError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;
    use std::fs::{create_dir_all, write};

    #[sealed_test(env = [("XDG_CONFIG_HOME", "/nonexistent/hecate-xdg")])]
    fn defaults_without_config() -> anyhow::Result<()> {
        let workspace = Workspace::open(".", None)?;
        assert_eq!(workspace.config(), &HecateConfig::default());
        assert_eq!(workspace.config_path(), None);
        assert_eq!(workspace.conf_dir(), PathBuf::from("./conf.d"));
        assert_eq!(workspace.state_file(), PathBuf::from("./.hecate.conf"));
        assert_eq!(workspace.compose_dir(), PathBuf::from("."));

        Ok(())
    }

    #[sealed_test(env = [("XDG_CONFIG_HOME", "/nonexistent/hecate-xdg")])]
    fn root_config_wins() -> anyhow::Result<()> {
        create_dir_all("deploy")?;
        write(
            "deploy/hecate.toml",
            "[layout]\nconf_dir = \"nginx/conf.d\"\n\n[prune]\nessential = [\"http.conf\"]\n",
        )?;

        let workspace = Workspace::open("deploy", None)?;
        assert_eq!(workspace.conf_dir(), PathBuf::from("deploy/nginx/conf.d"));
        assert_eq!(workspace.catalog().essentials().len(), 1);
        assert_eq!(
            workspace.config_path(),
            Some(Path::new("deploy/hecate.toml"))
        );

        Ok(())
    }

    #[sealed_test]
    fn explicit_config_must_exist() {
        let result = Workspace::open(".", Some(Path::new("missing.toml")));
        assert!(matches!(result, Err(WorkspaceError::ReadConfig { .. })));
    }

    #[sealed_test]
    fn invalid_config_names_file() -> anyhow::Result<()> {
        write("bad.toml", "[layout\n")?;
        let result = Workspace::open(".", Some(Path::new("bad.toml")));
        assert!(matches!(result, Err(WorkspaceError::Config { .. })));

        Ok(())
    }

    #[sealed_test]
    fn missing_root() {
        assert!(matches!(
            Workspace::open("nowhere", None),
            Err(WorkspaceError::MissingRoot { .. })
        ));
    }

    #[sealed_test]
    fn state_round_trip_through_workspace() -> anyhow::Result<()> {
        let workspace = Workspace::with_config(".", HecateConfig::default());
        let mut state = workspace.load_state()?;
        state.set_email("ops@example.com");
        workspace.save_state(&state)?;
        assert_eq!(workspace.load_state()?.email(), Some("ops@example.com"));

        Ok(())
    }
}
