// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Application catalog.
//!
//! Hecate fronts a fixed set of self-hosted applications. Each application
//! contributes one or more __fragments__ to the reverse proxy configuration,
//! i.e., text files placed somewhere under the configuration directory. The
//! catalog maps every application to the fragment names it expects, so the
//! operator's selection of applications can be turned into the set of
//! fragments that should survive pruning.
//!
//! # Essential Fragments
//!
//! Some fragments hold the reverse proxy together no matter which
//! applications are deployed, e.g., the top-level `http.conf` block. These are
//! called __essential__ fragments. They are always part of the allowed set
//! computed for any selection, including the empty one.

use std::{
    collections::BTreeSet,
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};

/// Fragment names that are never pruned by default.
pub const ESSENTIAL_FRAGMENTS: [&str; 3] = ["http.conf", "stream.conf", "fallback.conf"];

/// Port markers implied by every selected application.
pub const DEFAULT_PORT_MARKERS: [&str; 2] = ["80", "443"];

/// Supported application.
///
/// Discriminants double as the option numbers shown in the selection menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum App {
    StaticWebsite = 1,
    Wazuh = 2,
    Mattermost = 3,
    Nextcloud = 4,
    Mailcow = 5,
    Jenkins = 6,
    Grafana = 7,
    Umami = 8,
    Minio = 9,
    WikiJs = 10,
    Erpnext = 11,
    Jellyfin = 12,
    Persephone = 13,
}

impl App {
    /// Every application in menu order.
    pub const ALL: [App; 13] = [
        App::StaticWebsite,
        App::Wazuh,
        App::Mattermost,
        App::Nextcloud,
        App::Mailcow,
        App::Jenkins,
        App::Grafana,
        App::Umami,
        App::Minio,
        App::WikiJs,
        App::Erpnext,
        App::Jellyfin,
        App::Persephone,
    ];

    /// Option number of application in the selection menu.
    pub fn option(self) -> u8 {
        self as u8
    }

    /// Lookup application by its option number.
    pub fn from_option(option: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|app| app.option() == option)
    }

    /// Human readable name.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::StaticWebsite => "Static website",
            Self::Wazuh => "Wazuh",
            Self::Mattermost => "Mattermost",
            Self::Nextcloud => "Nextcloud",
            Self::Mailcow => "Mailcow",
            Self::Jenkins => "Jenkins",
            Self::Grafana => "Grafana",
            Self::Umami => "Umami",
            Self::Minio => "MinIO",
            Self::WikiJs => "Wiki.js",
            Self::Erpnext => "ERPNext",
            Self::Jellyfin => "Jellyfin",
            Self::Persephone => "Persephone",
        }
    }

    /// Lower-case token accepted on the command line.
    pub fn keyword(self) -> &'static str {
        match self {
            Self::StaticWebsite => "static-website",
            Self::Wazuh => "wazuh",
            Self::Mattermost => "mattermost",
            Self::Nextcloud => "nextcloud",
            Self::Mailcow => "mailcow",
            Self::Jenkins => "jenkins",
            Self::Grafana => "grafana",
            Self::Umami => "umami",
            Self::Minio => "minio",
            Self::WikiJs => "wikijs",
            Self::Erpnext => "erpnext",
            Self::Jellyfin => "jellyfin",
            Self::Persephone => "persephone",
        }
    }

    /// Fragment file names the application expects under the conf directory.
    pub fn fragments(self) -> &'static [&'static str] {
        match self {
            Self::StaticWebsite => &["base.conf"],
            Self::Wazuh => &["delphi.conf"],
            Self::Mattermost => &["collaborate.conf"],
            Self::Nextcloud => &["cloud.conf"],
            Self::Mailcow => &["mailcow.conf"],
            Self::Jenkins => &["jenkins.conf"],
            Self::Grafana => &["observe.conf"],
            Self::Umami => &["analytics.conf"],
            Self::Minio => &["s3.conf"],
            Self::WikiJs => &["wiki.conf"],
            Self::Erpnext => &["erp.conf"],
            Self::Jellyfin => &["jellyfin.conf"],
            Self::Persephone => &["persephone.conf"],
        }
    }

    /// Extra compose port markers beyond [`DEFAULT_PORT_MARKERS`].
    pub fn port_markers(self) -> &'static [&'static str] {
        match self {
            Self::Wazuh => &["1515", "1514", "55000"],
            Self::Mailcow => &["25", "587", "465", "110", "995", "143", "993"],
            Self::Nextcloud => &["3478"],
            _ => &[],
        }
    }
}

impl Display for App {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.display_name())
    }
}

impl FromStr for App {
    type Err = CatalogError;

    /// Parse option number, keyword, or display name (case insensitive).
    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let token = token.trim();
        if let Ok(option) = token.parse::<u8>() {
            return Self::from_option(option).ok_or_else(|| CatalogError::UnknownApp(token.into()));
        }

        Self::ALL
            .into_iter()
            .find(|app| {
                app.keyword().eq_ignore_ascii_case(token)
                    || app.display_name().eq_ignore_ascii_case(token)
            })
            .ok_or_else(|| CatalogError::UnknownApp(token.into()))
    }
}

/// Operator's choice of applications for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Wildcard selecting the whole catalog.
    All,

    /// Explicit set of applications, possibly empty.
    Apps(BTreeSet<App>),
}

impl Selection {
    /// Selection of nothing at all.
    pub fn none() -> Self {
        Self::Apps(BTreeSet::new())
    }

    /// Construct selection from a listing of applications.
    pub fn from_apps(apps: impl IntoIterator<Item = App>) -> Self {
        Self::Apps(apps.into_iter().collect())
    }

    /// Check if selection chooses no application.
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Apps(apps) if apps.is_empty())
    }

    /// Check if selection includes target application.
    pub fn contains(&self, app: App) -> bool {
        match self {
            Self::All => true,
            Self::Apps(apps) => apps.contains(&app),
        }
    }

    /// Expand selection into concrete applications in menu order.
    pub fn apps(&self) -> Vec<App> {
        match self {
            Self::All => App::ALL.to_vec(),
            Self::Apps(apps) => apps.iter().copied().collect(),
        }
    }
}

impl Default for Selection {
    fn default() -> Self {
        Self::none()
    }
}

impl FromStr for Selection {
    type Err = CatalogError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let data = data.trim();
        if data.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }

        let mut apps = BTreeSet::new();
        for token in data.split(',').map(str::trim).filter(|token| !token.is_empty()) {
            apps.insert(token.parse::<App>()?);
        }

        Ok(Self::Apps(apps))
    }
}

impl Display for Selection {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::All => fmt.write_str("all"),
            Self::Apps(apps) => {
                let options = apps
                    .iter()
                    .map(|app| app.option().to_string())
                    .collect::<Vec<_>>();
                fmt.write_str(options.join(",").as_str())
            }
        }
    }
}

/// Catalog of applications with their essential fragments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    apps: Vec<App>,
    essentials: BTreeSet<String>,
}

impl Catalog {
    /// Construct builtin catalog with default essential fragments.
    pub fn builtin() -> Self {
        Self::with_essentials(ESSENTIAL_FRAGMENTS)
    }

    /// Construct builtin catalog with custom set of essential fragments.
    pub fn with_essentials(essentials: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            apps: App::ALL.to_vec(),
            essentials: essentials.into_iter().map(Into::into).collect(),
        }
    }

    /// Applications of catalog in menu order.
    pub fn apps(&self) -> &[App] {
        self.apps.as_slice()
    }

    /// Essential fragment names.
    pub fn essentials(&self) -> &BTreeSet<String> {
        &self.essentials
    }

    /// Check if fragment name is essential.
    pub fn is_essential(&self, name: &str) -> bool {
        self.essentials.contains(name)
    }

    /// Find application that owns fragment name.
    pub fn owner_of(&self, name: &str) -> Option<App> {
        self.apps
            .iter()
            .copied()
            .find(|app| app.fragments().contains(&name))
    }

    /// Compute allowed fragment set for a selection.
    ///
    /// Union of fragment names of every selected application plus the
    /// essential fragments.
    pub fn allowed_fragments(&self, selection: &Selection) -> AllowedFragments {
        let mut names = self.essentials.clone();
        for app in self.apps.iter().filter(|app| selection.contains(**app)) {
            names.extend(app.fragments().iter().map(|name| name.to_string()));
        }

        AllowedFragments {
            names,
            essentials: self.essentials.clone(),
        }
    }

    /// Numbered menu lines describing the catalog.
    pub fn menu_lines(&self) -> Vec<String> {
        self.apps
            .iter()
            .map(|app| {
                format!(
                    "{:>3}. {:<16} -> {}",
                    app.option(),
                    app.display_name(),
                    app.fragments().join(", ")
                )
            })
            .collect()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Set of fragment names allowed to survive pruning.
///
/// # Invariant
///
/// - Always a superset of the essential fragment set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowedFragments {
    names: BTreeSet<String>,
    essentials: BTreeSet<String>,
}

impl AllowedFragments {
    /// Check if fragment name is allowed.
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Check if fragment name is allowed because it is essential.
    pub fn is_essential(&self, name: &str) -> bool {
        self.essentials.contains(name)
    }

    /// Iterate through allowed fragment names in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Catalog error types.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    /// Token names no known application.
    #[error("invalid option {0:?}, expected an option number, app keyword, or \"all\"")]
    UnknownApp(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use simple_test_case::test_case;

    #[test_case("2", App::Wazuh; "option number")]
    #[test_case(" 13 ", App::Persephone; "padded option number")]
    #[test_case("mailcow", App::Mailcow; "keyword")]
    #[test_case("Wiki.js", App::WikiJs; "display name")]
    #[test_case("MINIO", App::Minio; "mixed case keyword")]
    #[test]
    fn parse_app(token: &str, expect: App) {
        assert_eq!(token.parse::<App>(), Ok(expect));
    }

    #[test_case("0"; "option zero")]
    #[test_case("14"; "option past end")]
    #[test_case("traefik"; "unknown keyword")]
    #[test]
    fn parse_app_rejects_unknown(token: &str) {
        assert_eq!(
            token.parse::<App>(),
            Err(CatalogError::UnknownApp(token.into()))
        );
    }

    #[test]
    fn option_numbers_are_unique() {
        let options = App::ALL.iter().map(|app| app.option()).collect::<BTreeSet<_>>();
        assert_eq!(options.len(), App::ALL.len());
        assert_eq!(App::from_option(12), Some(App::Jellyfin));
        assert_eq!(App::from_option(13), Some(App::Persephone));
    }

    #[test]
    fn parse_selection() -> anyhow::Result<()> {
        assert_eq!("ALL".parse::<Selection>()?, Selection::All);
        assert_eq!("".parse::<Selection>()?, Selection::none());
        assert_eq!(
            "5, 1,wazuh,,".parse::<Selection>()?,
            Selection::from_apps([App::StaticWebsite, App::Wazuh, App::Mailcow])
        );
        assert!("1,nope".parse::<Selection>().is_err());

        Ok(())
    }

    #[test]
    fn display_selection_uses_option_numbers() {
        let selection = Selection::from_apps([App::Mailcow, App::StaticWebsite, App::Wazuh]);
        assert_eq!(selection.to_string(), "1,2,5");
        assert_eq!(Selection::All.to_string(), "all");
        assert_eq!(Selection::none().to_string(), "");
    }

    #[test]
    fn allowed_fragments_for_single_app() {
        let catalog = Catalog::with_essentials(["http.conf", "stream.conf"]);
        let allowed = catalog.allowed_fragments(&Selection::from_apps([App::StaticWebsite]));
        let result = allowed.iter().collect::<Vec<_>>();
        assert_eq!(result, vec!["base.conf", "http.conf", "stream.conf"]);
        assert!(allowed.is_essential("http.conf"));
        assert!(!allowed.is_essential("base.conf"));
    }

    #[test]
    fn allowed_fragments_for_all_covers_catalog() {
        let catalog = Catalog::builtin();
        let allowed = catalog.allowed_fragments(&Selection::All);
        for app in App::ALL {
            for name in app.fragments() {
                assert!(allowed.contains(name), "{name} should be allowed");
            }
        }
        for name in ESSENTIAL_FRAGMENTS {
            assert!(allowed.contains(name));
        }
        assert_eq!(allowed.len(), App::ALL.len() + ESSENTIAL_FRAGMENTS.len());
    }

    #[test]
    fn allowed_fragments_for_empty_selection_is_essentials() {
        let catalog = Catalog::builtin();
        let allowed = catalog.allowed_fragments(&Selection::none());
        let result = allowed.iter().collect::<Vec<_>>();
        assert_eq!(result, vec!["fallback.conf", "http.conf", "stream.conf"]);
    }

    #[test]
    fn owner_of_fragment() {
        let catalog = Catalog::builtin();
        assert_eq!(catalog.owner_of("delphi.conf"), Some(App::Wazuh));
        assert_eq!(catalog.owner_of("http.conf"), None);
    }
}
