// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Last-values record.
//!
//! Operators tend to deploy the same stack again and again with the same
//! backend address, domain, and contact email. Hecate remembers the values of
//! the last successful run in a small record file made of `key="value"`
//! lines, and offers them back as defaults on the next run.
//!
//! The record is never touched implicitly. Callers [`DeployState::load`] it at
//! the start of a run, pass it around, and [`DeployState::save`] it at the end
//! of a successful run. Saving overwrites the whole file.

use crate::{
    catalog::{CatalogError, Selection},
    substitute::{Placeholder, SubstitutionTable},
};

use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter, Result as FmtResult},
    fs::{read_to_string, write},
    io::ErrorKind,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::{debug, info, instrument};

/// Key of remembered application selection.
pub const APPS_SELECTION_KEY: &str = "APPS_SELECTION";

/// Key of remembered contact email.
pub const EMAIL_KEY: &str = "EMAIL";

/// Key of remembered certificate subdomain.
pub const SUBDOMAIN_KEY: &str = "SUBDOMAIN";

/// Remembered values of the last successful run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeployState {
    values: BTreeMap<String, String>,
}

impl DeployState {
    /// Construct new empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load state from record file.
    ///
    /// A missing record file yields empty state.
    ///
    /// # Errors
    ///
    /// - Return [`StateError::Read`] if record file exists but cannot be read.
    #[instrument(skip(path), level = "debug")]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match read_to_string(path) {
            Ok(data) => Ok(data.parse()?),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("no last values at {:?}", path.display());
                Ok(Self::default())
            }
            Err(err) => Err(StateError::Read {
                source: err,
                path: path.into(),
            }),
        }
    }

    /// Save state to record file, replacing previous content.
    ///
    /// # Errors
    ///
    /// - Return [`StateError::Write`] if record file cannot be written.
    #[instrument(skip(self, path), level = "debug")]
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        write(path, self.to_string()).map_err(|err| StateError::Write {
            source: err,
            path: path.into(),
        })?;
        info!("saved last values to {:?}", path.display());

        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.values.remove(key)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Remembered value of placeholder.
    pub fn placeholder(&self, placeholder: Placeholder) -> Option<&str> {
        self.get(placeholder.key())
    }

    pub fn set_placeholder(&mut self, placeholder: Placeholder, value: impl Into<String>) {
        self.set(placeholder.key(), value);
    }

    /// Remembered application selection.
    ///
    /// # Errors
    ///
    /// - Return [`StateError::Selection`] if remembered selection is invalid.
    pub fn selection(&self) -> Result<Option<Selection>> {
        self.get(APPS_SELECTION_KEY)
            .map(|data| data.parse::<Selection>().map_err(StateError::Selection))
            .transpose()
    }

    pub fn set_selection(&mut self, selection: &Selection) {
        self.set(APPS_SELECTION_KEY, selection.to_string());
    }

    pub fn email(&self) -> Option<&str> {
        self.get(EMAIL_KEY)
    }

    pub fn set_email(&mut self, email: impl Into<String>) {
        self.set(EMAIL_KEY, email);
    }

    pub fn subdomain(&self) -> Option<&str> {
        self.get(SUBDOMAIN_KEY)
    }

    pub fn set_subdomain(&mut self, subdomain: impl Into<String>) {
        self.set(SUBDOMAIN_KEY, subdomain);
    }

    /// Build substitution table out of every remembered placeholder value.
    pub fn substitution_table(&self) -> SubstitutionTable {
        let mut table = SubstitutionTable::new();
        for placeholder in Placeholder::ALL {
            if let Some(value) = self.placeholder(placeholder) {
                table.insert_placeholder(placeholder, value);
            }
        }

        table
    }
}

impl FromStr for DeployState {
    type Err = StateError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut state = Self::default();
        for line in data.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                continue;
            };

            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            state.set(key, strip_quotes(value.trim()));
        }

        Ok(state)
    }
}

fn strip_quotes(value: &str) -> &str {
    ['"', '\'']
        .into_iter()
        .find_map(|quote| {
            value
                .strip_prefix(quote)
                .and_then(|value| value.strip_suffix(quote))
        })
        .unwrap_or(value)
}

impl Display for DeployState {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        for (key, value) in &self.values {
            writeln!(fmt, "{key}=\"{value}\"")?;
        }

        Ok(())
    }
}

/// Last-values record error types.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// Record file cannot be read.
    #[error("failed to read last values from {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Record file cannot be written.
    #[error("failed to write last values to {:?}", path.display())]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Remembered application selection is invalid.
    #[error("invalid remembered application selection")]
    Selection(#[source] CatalogError),
}

/// Friendly result alias :3
pub type Result<T, E = StateError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::App;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    #[test]
    fn parse_record_lines() -> anyhow::Result<()> {
        let state: DeployState = indoc! {r#"
            BACKEND_IP="10.0.0.5"

            BASE_DOMAIN = example.com
            # comment
            not a pair
            EMAIL='ops@example.com'
            APPS_SELECTION="1,2,5"
        "#}
        .parse()?;

        assert_eq!(state.placeholder(Placeholder::BackendIp), Some("10.0.0.5"));
        assert_eq!(state.placeholder(Placeholder::BaseDomain), Some("example.com"));
        assert_eq!(state.email(), Some("ops@example.com"));
        assert_eq!(
            state.selection()?,
            Some(Selection::from_apps([App::StaticWebsite, App::Wazuh, App::Mailcow]))
        );
        assert_eq!(state.subdomain(), None);

        Ok(())
    }

    #[test]
    fn display_record_lines() {
        let mut state = DeployState::new();
        state.set_placeholder(Placeholder::BaseDomain, "example.com");
        state.set_selection(&Selection::All);
        state.set_email("ops@example.com");

        let expect = indoc! {r#"
            APPS_SELECTION="all"
            BASE_DOMAIN="example.com"
            EMAIL="ops@example.com"
        "#};
        assert_eq!(state.to_string(), expect);
    }

    #[test]
    fn invalid_remembered_selection() -> anyhow::Result<()> {
        let state: DeployState = "APPS_SELECTION=\"1,traefik\"".parse()?;
        assert!(matches!(state.selection(), Err(StateError::Selection(_))));

        Ok(())
    }

    #[test]
    fn substitution_table_from_remembered_values() -> anyhow::Result<()> {
        let mut state = DeployState::new();
        state.set_placeholder(Placeholder::BackendIp, "10.0.0.5");
        state.set(EMAIL_KEY, "ops@example.com");

        let table = state.substitution_table();
        assert_eq!(table.get("${backendIP}"), Some("10.0.0.5"));
        assert_eq!(table.get("$BACKEND_IP"), Some("10.0.0.5"));
        assert_eq!(table.get("${BASE_DOMAIN}"), None);

        Ok(())
    }

    #[sealed_test]
    fn load_missing_record_is_empty() -> anyhow::Result<()> {
        assert!(DeployState::load(".hecate.conf")?.is_empty());

        Ok(())
    }

    #[sealed_test]
    fn save_then_load() -> anyhow::Result<()> {
        let mut state = DeployState::new();
        state.set_placeholder(Placeholder::DelphiBackendIp, "10.0.0.9");
        state.set_subdomain("cloud");
        state.save(".hecate.conf")?;

        let mut other = DeployState::load(".hecate.conf")?;
        assert_eq!(other, state);

        // Last writer wins.
        other.set_subdomain("wiki");
        other.save(".hecate.conf")?;
        assert_eq!(DeployState::load(".hecate.conf")?.subdomain(), Some("wiki"));

        Ok(())
    }
}
