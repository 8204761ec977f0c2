// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Compose file port toggling and stack orchestration.
//!
//! The stack's compose file ships with the port mappings of every application
//! commented out as list items, e.g., `#  - "55000:55000"`. Enabling the ports
//! of the selected applications means uncommenting every such line that
//! mentions one of their port markers. Ports 80 and 443 are implied by any
//! selected application.
//!
//! The stack itself is driven through the container orchestrator CLI via the
//! [`CommandRunner`] interface.

use crate::{
    backup::write_backup,
    catalog::{App, DEFAULT_PORT_MARKERS},
    config::ComposeSettings,
    exec::{CommandRunner, ExternalCommand},
};

use regex::Regex;
use std::{
    collections::BTreeSet,
    fs::{read_to_string, write},
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument};

/// Port markers implied by a listing of applications.
///
/// Empty if no application is given.
pub fn port_markers(apps: &[App]) -> BTreeSet<&'static str> {
    if apps.is_empty() {
        return BTreeSet::new();
    }

    DEFAULT_PORT_MARKERS
        .into_iter()
        .chain(apps.iter().flat_map(|app| app.port_markers().iter().copied()))
        .collect()
}

/// Uncomment commented list items mentioning a port marker of target apps.
///
/// Indentation is kept. Markers only match when bounded by non-digits, so
/// marker `25` never enables a line mapping port `2525`.
///
/// # Errors
///
/// - Return [`ComposeError::Pattern`] if marker matcher cannot be built.
pub fn enable_ports(content: &str, apps: &[App]) -> Result<PortToggle> {
    let markers = port_markers(apps);
    if markers.is_empty() {
        return Ok(PortToggle {
            content: content.to_string(),
            enabled: 0,
        });
    }

    let commented = Regex::new(r"^(\s*)#\s*(-)")?;
    let alternatives = markers
        .iter()
        .map(|marker| regex::escape(marker))
        .collect::<Vec<_>>();
    let marker = Regex::new(format!(r"(?:^|\D)(?:{})(?:\D|$)", alternatives.join("|")).as_str())?;

    let mut toggle = PortToggle {
        content: String::with_capacity(content.len()),
        enabled: 0,
    };
    for line in content.split_inclusive('\n') {
        if commented.is_match(line) && marker.is_match(line) {
            toggle.content.push_str(commented.replace(line, "$1$2").as_ref());
            toggle.enabled += 1;
        } else {
            toggle.content.push_str(line);
        }
    }

    Ok(toggle)
}

/// Result of toggling ports in compose file content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortToggle {
    pub content: String,

    /// Number of lines uncommented.
    pub enabled: usize,
}

/// Enable ports of target apps in compose file.
///
/// The file is backed up and rewritten only if its content changes.
///
/// # Errors
///
/// - Return [`ComposeError::MissingFile`] if compose file does not exist.
/// - Return [`ComposeError::Read`] or [`ComposeError::Write`] for I/O
///   failures.
/// - Return [`ComposeError::Backup`] if backup cannot be written.
#[instrument(skip(path, apps), level = "debug")]
pub fn update_compose_file(path: impl AsRef<Path>, apps: &[App]) -> Result<ComposeUpdate> {
    let path = path.as_ref();
    let original = read_to_string(path).map_err(|err| match err.kind() {
        ErrorKind::NotFound => ComposeError::MissingFile { path: path.into() },
        _ => ComposeError::Read {
            source: err,
            path: path.into(),
        },
    })?;

    let toggle = enable_ports(&original, apps)?;
    if toggle.content == original {
        debug!("no port changes for {:?}", path.display());
        return Ok(ComposeUpdate {
            enabled: 0,
            backup: None,
        });
    }

    let backup = write_backup(path, original.as_bytes())?;
    write(path, toggle.content.as_bytes()).map_err(|err| ComposeError::Write {
        source: err,
        path: path.into(),
    })?;
    info!("enabled {} port lines in {:?}", toggle.enabled, path.display());

    Ok(ComposeUpdate {
        enabled: toggle.enabled,
        backup: Some(backup),
    })
}

/// Outcome of updating compose file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeUpdate {
    /// Number of lines uncommented.
    pub enabled: usize,

    /// Backup of previous content if file changed.
    pub backup: Option<PathBuf>,
}

/// Container orchestrator driver.
#[derive(Debug)]
pub struct Compose<'run, R: CommandRunner> {
    runner: &'run R,
    settings: ComposeSettings,
    project_dir: PathBuf,
}

impl<'run, R: CommandRunner> Compose<'run, R> {
    /// Construct new orchestrator driver running in project directory.
    pub fn new(runner: &'run R, settings: ComposeSettings, project_dir: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            settings,
            project_dir: project_dir.into(),
        }
    }

    /// Full orchestrator command for target arguments.
    pub fn command(&self, args: impl IntoIterator<Item = impl Into<String>>) -> ExternalCommand {
        ExternalCommand::new(self.settings.program.as_str())
            .args(self.settings.args.iter().cloned())
            .args(args)
            .working_dir(self.project_dir.as_path())
    }

    /// Bring stack down.
    ///
    /// # Errors
    ///
    /// - Return [`ComposeError::Exec`] if orchestrator fails.
    #[instrument(skip(self), level = "debug")]
    pub fn down(&self) -> Result<()> {
        self.runner.run(&self.command(["down"]))?;
        info!("stack is down");

        Ok(())
    }

    /// Bring stack up detached.
    ///
    /// # Errors
    ///
    /// - Return [`ComposeError::Exec`] if orchestrator fails.
    #[instrument(skip(self), level = "debug")]
    pub fn up_detached(&self) -> Result<()> {
        self.runner.run(&self.command(["up", "-d"]))?;
        info!("stack is up");

        Ok(())
    }

    /// Stream stack logs until the operator interrupts.
    ///
    /// # Errors
    ///
    /// - Return [`ComposeError::Exec`] if orchestrator fails.
    #[instrument(skip(self), level = "debug")]
    pub fn logs(&self) -> Result<()> {
        self.runner.run_interactive(&self.command(["logs", "-f"]))?;

        Ok(())
    }
}

/// Compose error types.
#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    /// Compose file does not exist.
    #[error("compose file {:?} not found", path.display())]
    MissingFile { path: PathBuf },

    /// Compose file cannot be read.
    #[error("failed to read compose file {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Compose file cannot be written.
    #[error("failed to write compose file {:?}", path.display())]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    #[error(transparent)]
    Backup(#[from] crate::backup::BackupError),

    #[error(transparent)]
    Pattern(#[from] regex::Error),

    /// Orchestrator command failed.
    #[error(transparent)]
    Exec(#[from] crate::exec::ExecError),
}

/// Friendly result alias :3
pub type Result<T, E = ComposeError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::fake::RecordingRunner;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    const COMPOSE: &str = indoc! {r#"
        services:
          nginx:
            image: nginx:latest
            ports:
            #  - "80:80"
            #  - "443:443"
            #  - "1515:1515"
            #  - "55000:55000"
            #  - "25:25"
            #  - "2525:2525"
            #  - "3478:3478/udp"
            # ports above are commented until enabled
    "#};

    #[test]
    fn enable_wazuh_ports() -> anyhow::Result<()> {
        let toggle = enable_ports(COMPOSE, &[App::Wazuh])?;
        let expect = indoc! {r#"
            services:
              nginx:
                image: nginx:latest
                ports:
                - "80:80"
                - "443:443"
                - "1515:1515"
                - "55000:55000"
                #  - "25:25"
                #  - "2525:2525"
                #  - "3478:3478/udp"
                # ports above are commented until enabled
        "#};
        assert_eq!(toggle.content, expect);
        assert_eq!(toggle.enabled, 4);

        Ok(())
    }

    #[test]
    fn marker_needs_digit_boundary() -> anyhow::Result<()> {
        let toggle = enable_ports(COMPOSE, &[App::Mailcow])?;
        assert!(toggle.content.contains("\n    - \"25:25\"\n"));
        assert!(toggle.content.contains("#  - \"2525:2525\""));

        Ok(())
    }

    #[test]
    fn no_apps_enable_nothing() -> anyhow::Result<()> {
        let toggle = enable_ports(COMPOSE, &[])?;
        assert_eq!(toggle.content, COMPOSE);
        assert_eq!(toggle.enabled, 0);

        Ok(())
    }

    #[sealed_test]
    fn update_backs_up_once() -> anyhow::Result<()> {
        write("docker-compose.yml", COMPOSE)?;

        let first = update_compose_file("docker-compose.yml", &[App::Nextcloud])?;
        assert_eq!(first.enabled, 3);
        let backup = first.backup.ok_or_else(|| anyhow::anyhow!("no backup"))?;
        assert_eq!(read_to_string(backup)?, COMPOSE);

        let second = update_compose_file("docker-compose.yml", &[App::Nextcloud])?;
        assert_eq!(second, ComposeUpdate { enabled: 0, backup: None });

        Ok(())
    }

    #[sealed_test]
    fn missing_compose_file_is_fatal() {
        assert!(matches!(
            update_compose_file("docker-compose.yml", &[App::Wazuh]),
            Err(ComposeError::MissingFile { .. })
        ));
    }

    #[test]
    fn orchestrator_commands() -> anyhow::Result<()> {
        let runner = RecordingRunner::default();
        let compose = Compose::new(&runner, ComposeSettings::default(), "/srv/hecate");
        compose.down()?;
        compose.up_detached()?;
        compose.logs()?;

        assert_eq!(
            *runner.calls.borrow(),
            vec![
                "docker compose down",
                "docker compose up -d",
                "docker compose logs -f"
            ]
        );
        assert_eq!(
            compose.command(["ps"]).dir(),
            Some(Path::new("/srv/hecate"))
        );

        Ok(())
    }

    #[test]
    fn orchestrator_failure_is_fatal() {
        let runner = RecordingRunner::failing_on("down");
        let compose = Compose::new(&runner, ComposeSettings::default(), ".");
        assert!(matches!(compose.down(), Err(ComposeError::Exec(_))));
    }
}
