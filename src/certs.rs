// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! TLS certificate acquisition and installation.
//!
//! Issuance itself belongs to an external ACME client run in standalone mode,
//! which places issued files at `<live_dir>/<domain>/{fullchain,privkey}.pem`.
//! Hecate then installs copies of those files into the stack's certificate
//! directory as `<name>.fullchain.pem` and `<name>.privkey.pem`.

use crate::{
    config::CertSettings,
    exec::{CommandRunner, ExternalCommand},
};

use std::{
    collections::BTreeSet,
    fs::{copy, read_dir},
    path::{Path, PathBuf},
};
use tracing::{info, instrument};

const FULLCHAIN_SUFFIX: &str = ".fullchain.pem";
const PRIVKEY_SUFFIX: &str = ".privkey.pem";

/// Request for one certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertRequest {
    pub base_domain: String,
    pub subdomain: Option<String>,
    pub email: String,
}

impl CertRequest {
    pub fn new(
        base_domain: impl Into<String>,
        subdomain: Option<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            base_domain: base_domain.into(),
            subdomain: subdomain.filter(|sub| !sub.trim().is_empty()),
            email: email.into(),
        }
    }

    /// Domain the certificate is issued for.
    pub fn full_domain(&self) -> String {
        match &self.subdomain {
            Some(sub) => format!("{sub}.{}", self.base_domain),
            None => self.base_domain.clone(),
        }
    }

    /// Default name of installed certificate files.
    pub fn default_name(&self) -> &str {
        self.subdomain.as_deref().unwrap_or(self.base_domain.as_str())
    }
}

/// Pair of installed certificate files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertPair {
    pub fullchain: PathBuf,
    pub privkey: PathBuf,
}

impl CertPair {
    /// Paths of certificate pair named `name` inside target directory.
    pub fn named(dir: impl AsRef<Path>, name: &str) -> Self {
        Self {
            fullchain: dir.as_ref().join(format!("{name}{FULLCHAIN_SUFFIX}")),
            privkey: dir.as_ref().join(format!("{name}{PRIVKEY_SUFFIX}")),
        }
    }
}

/// Issue and install certificates.
#[derive(Debug, Clone)]
pub struct CertManager {
    settings: CertSettings,
    certs_dir: PathBuf,
}

impl CertManager {
    pub fn new(settings: CertSettings, certs_dir: impl Into<PathBuf>) -> Self {
        Self {
            settings,
            certs_dir: certs_dir.into(),
        }
    }

    pub fn certs_dir(&self) -> &Path {
        self.certs_dir.as_path()
    }

    /// ACME client command issuing certificate for request.
    pub fn issue_command(&self, request: &CertRequest) -> ExternalCommand {
        let client_args = [
            "certonly".to_string(),
            "--standalone".into(),
            "-d".into(),
            request.full_domain(),
            "--email".into(),
            request.email.clone(),
            "--agree-tos".into(),
            "--non-interactive".into(),
        ];

        if self.settings.sudo {
            ExternalCommand::new("sudo")
                .arg(self.settings.client.as_str())
                .args(client_args)
        } else {
            ExternalCommand::new(self.settings.client.as_str()).args(client_args)
        }
    }

    /// Issue certificate through ACME client.
    ///
    /// The client may need to ask for a sudo password, so it runs attached to
    /// the operator's terminal.
    ///
    /// # Errors
    ///
    /// - Return [`CertError::Exec`] if ACME client fails.
    #[instrument(skip(self, runner), level = "debug")]
    pub fn issue(&self, runner: &impl CommandRunner, request: &CertRequest) -> Result<()> {
        runner.run_interactive(&self.issue_command(request))?;
        info!("certificate issued for {}", request.full_domain());

        Ok(())
    }

    /// Issued certificate pair of domain in live directory.
    pub fn live_pair(&self, domain: &str) -> CertPair {
        let dir = self.settings.live_dir.join(domain);
        CertPair {
            fullchain: dir.join("fullchain.pem"),
            privkey: dir.join("privkey.pem"),
        }
    }

    /// Install issued certificate of domain under name.
    ///
    /// # Errors
    ///
    /// - Return [`CertError::MissingLive`] if issued files do not exist.
    /// - Return [`CertError::CreateDir`] if certs directory cannot be created.
    /// - Return [`CertError::Copy`] or [`CertError::Permissions`] if installing
    ///   files fails.
    #[instrument(skip(self), level = "debug")]
    pub fn install(&self, domain: &str, name: &str) -> Result<CertPair> {
        let live = self.live_pair(domain);
        for path in [&live.fullchain, &live.privkey] {
            if !path.is_file() {
                return Err(CertError::MissingLive { path: path.clone() });
            }
        }

        mkdirp::mkdirp(&self.certs_dir).map_err(|err| CertError::CreateDir {
            source: err,
            path: self.certs_dir.clone(),
        })?;

        let installed = CertPair::named(&self.certs_dir, name);
        copy_with_mode(&live.fullchain, &installed.fullchain, 0o644)?;
        copy_with_mode(&live.privkey, &installed.privkey, 0o600)?;
        info!(
            "installed certificate for {domain} as {:?}",
            installed.fullchain.display()
        );

        Ok(installed)
    }

    /// Names of installed certificates with both files present.
    ///
    /// Missing certs directory means nothing is installed.
    pub fn installed(&self) -> BTreeSet<String> {
        let Ok(entries) = read_dir(&self.certs_dir) else {
            return BTreeSet::new();
        };

        entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .and_then(|name| name.strip_suffix(FULLCHAIN_SUFFIX))
                    .map(ToString::to_string)
            })
            .filter(|name| CertPair::named(&self.certs_dir, name).privkey.is_file())
            .collect()
    }
}

fn copy_with_mode(from: &Path, to: &Path, mode: u32) -> Result<()> {
    copy(from, to).map_err(|err| CertError::Copy {
        source: err,
        from: from.into(),
        to: to.into(),
    })?;
    set_mode(to, mode)
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::{fs::set_permissions, os::unix::fs::PermissionsExt};

    set_permissions(path, std::fs::Permissions::from_mode(mode)).map_err(|err| {
        CertError::Permissions {
            source: err,
            path: path.into(),
        }
    })
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

/// Certificate error types.
#[derive(Debug, thiserror::Error)]
pub enum CertError {
    /// Issued certificate file does not exist.
    #[error("issued certificate file {:?} not found", path.display())]
    MissingLive { path: PathBuf },

    #[error("failed to create certificate directory {:?}", path.display())]
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

    #[error("failed to set permissions of {:?}", path.display())]
    Permissions {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// ACME client failed.
    #[error(transparent)]
    Exec(#[from] crate::exec::ExecError),
}

/// Friendly result alias :3
pub type Result<T, E = CertError> = std::result::Result<T, E>;
