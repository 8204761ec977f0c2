// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the optional `hecate.toml` configuration file to
//! simplify the process of serialization and deserialization. Every field has
//! a default, so an empty file, or no file at all, describes the standard
//! deployment layout. File I/O is left to the caller to figure out.

use crate::{
    catalog::ESSENTIAL_FRAGMENTS,
    fragment::DEFAULT_FRAGMENT_PATTERN,
};

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    str::FromStr,
};

/// Hecate configuration layout.
///
/// # General Layout
///
/// Composed of four sections. The layout section names where each piece of
/// the deployment lives relative to the deploy root. The prune section lists
/// essential fragments. The certs section configures the ACME client, and the
/// compose section configures the container orchestrator.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HecateConfig {
    /// Deployment layout relative to deploy root.
    pub layout: LayoutSettings,

    /// Pruning settings.
    pub prune: PruneSettings,

    /// Certificate client settings.
    pub certs: CertSettings,

    /// Container orchestrator settings.
    pub compose: ComposeSettings,
}

impl FromStr for HecateConfig {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut config: HecateConfig = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on every path field.
        let layout = &mut config.layout;
        for path in [
            &mut layout.conf_dir,
            &mut layout.certs_dir,
            &mut layout.compose_file,
            &mut layout.state_file,
            &mut layout.http_conf,
            &mut config.certs.live_dir,
        ] {
            *path = expand_path(path)?;
        }

        Ok(config)
    }
}

impl Display for HecateConfig {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

fn expand_path(path: &Path) -> Result<PathBuf> {
    Ok(PathBuf::from(
        shellexpand::full(path.to_string_lossy().as_ref())
            .map_err(ConfigError::ShellExpansion)?
            .into_owned(),
    ))
}

/// Deployment layout.
///
/// Relative paths are resolved against the deploy root.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LayoutSettings {
    /// Fragment directory.
    pub conf_dir: PathBuf,

    /// Installed certificate directory.
    pub certs_dir: PathBuf,

    /// Compose file of the stack.
    pub compose_file: PathBuf,

    /// Last-values record file.
    pub state_file: PathBuf,

    /// Generated top-level HTTP block.
    pub http_conf: PathBuf,

    /// Glob pattern matching fragment file names.
    pub fragment_pattern: String,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            conf_dir: "conf.d".into(),
            certs_dir: "certs".into(),
            compose_file: "docker-compose.yml".into(),
            state_file: ".hecate.conf".into(),
            http_conf: "http.conf".into(),
            fragment_pattern: DEFAULT_FRAGMENT_PATTERN.into(),
        }
    }
}

/// Pruning settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PruneSettings {
    /// Fragment names that are never pruned.
    pub essential: Vec<String>,
}

impl Default for PruneSettings {
    fn default() -> Self {
        Self {
            essential: ESSENTIAL_FRAGMENTS.iter().map(|name| name.to_string()).collect(),
        }
    }
}

/// ACME client settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CertSettings {
    /// Program name of ACME client.
    pub client: String,

    /// Directory ACME client places issued certificates in.
    pub live_dir: PathBuf,

    /// Run ACME client through sudo.
    pub sudo: bool,
}

impl Default for CertSettings {
    fn default() -> Self {
        Self {
            client: "certbot".into(),
            live_dir: "/etc/letsencrypt/live".into(),
            sudo: true,
        }
    }
}

/// Container orchestrator settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ComposeSettings {
    /// Program name of orchestrator.
    pub program: String,

    /// Leading arguments placed before every orchestrator command.
    pub args: Vec<String>,
}

impl Default for ComposeSettings {
    fn default() -> Self {
        Self {
            program: "docker".into(),
            args: vec!["compose".into()],
        }
    }
}

/// Configuration error types.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
