// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration reconciliation pipeline.
//!
//! Reconciling the fragment directory with an operator's choices means
//! substituting placeholders first, and pruning unselected fragments second,
//! so every surviving fragment ends up with resolved values. Both stages are
//! opened before either runs, thus a missing fragment directory aborts the
//! pipeline before anything is modified.

use crate::{
    catalog::Selection,
    prune::PruneReport,
    substitute::{SubstitutionReport, SubstitutionTable},
    workspace::Workspace,
};

use tracing::{info, instrument};

/// Outcome of reconciliation.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub substitution: SubstitutionReport,
    pub prune: PruneReport,
}

impl ReconcileReport {
    /// Total number of per-file failures across both stages.
    pub fn failure_count(&self) -> usize {
        self.substitution.failures.len() + self.prune.failures.len()
    }
}

/// Substitute placeholders then prune fragments outside selection.
///
/// # Errors
///
/// - Return [`ReconcileError::Workspace`] if fragment directory is missing or
///   fragment pattern is invalid.
/// - Return [`ReconcileError::Substitute`] if substitution table cannot be
///   compiled.
#[instrument(skip(workspace, table), level = "debug")]
pub fn reconcile(
    workspace: &Workspace,
    table: &SubstitutionTable,
    selection: &Selection,
) -> Result<ReconcileReport> {
    let substituter = workspace.substituter()?;
    let pruner = workspace.pruner()?;

    let substitution = substituter.run(table)?;
    info!(
        "substituted placeholders in {} fragments",
        substitution.updated.len()
    );

    let prune = pruner.prune(selection);
    info!("pruned {} fragments", prune.removed.len());

    Ok(ReconcileReport {
        substitution,
        prune,
    })
}

/// Reconcile error types.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Workspace(#[from] crate::workspace::WorkspaceError),

    #[error(transparent)]
    Substitute(#[from] crate::substitute::SubstituteError),
}

/// Friendly result alias :3
pub type Result<T, E = ReconcileError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{catalog::App, config::HecateConfig, substitute::Placeholder};
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;
    use std::{
        fs::{create_dir_all, read_to_string, write},
        path::{Path, PathBuf},
    };

    #[sealed_test]
    fn substitute_then_prune() -> anyhow::Result<()> {
        create_dir_all("conf.d/servers")?;
        write("conf.d/http.conf", "include servers/*.conf;\n")?;
        write("conf.d/servers/base.conf", "server_name ${BASE_DOMAIN};\n")?;
        write("conf.d/servers/delphi.conf", "proxy_pass ${BACKEND_IP};\n")?;

        let workspace = Workspace::with_config(".", HecateConfig::default());
        let table = SubstitutionTable::new()
            .with_placeholder(Placeholder::BaseDomain, "example.com")
            .with_placeholder(Placeholder::BackendIp, "10.0.0.5");
        let report = reconcile(
            &workspace,
            &table,
            &Selection::from_apps([App::StaticWebsite]),
        )?;

        assert_eq!(report.substitution.updated.len(), 2);
        assert_eq!(
            report.prune.removed,
            vec![PathBuf::from("./conf.d/servers/delphi.conf")]
        );
        assert_eq!(report.failure_count(), 0);
        assert_eq!(
            read_to_string("conf.d/servers/base.conf")?,
            "server_name example.com;\n"
        );
        assert!(!Path::new("conf.d/servers/delphi.conf").exists());

        Ok(())
    }

    #[sealed_test]
    fn missing_conf_dir_aborts() {
        let workspace = Workspace::with_config(".", HecateConfig::default());
        let result = reconcile(&workspace, &SubstitutionTable::new(), &Selection::All);
        assert!(matches!(result, Err(ReconcileError::Workspace(_))));
    }
}
