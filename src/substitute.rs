// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Placeholder substitution engine.
//!
//! Fragments are written with __placeholder tokens__ that stand in for values
//! only known at deploy time, e.g., the IP address of the backend host or the
//! base domain of every service. The substitution engine walks a fragment tree
//! and rewrites each fragment with the operator's values.
//!
//! # Placeholder Tokens
//!
//! Every [`Placeholder`] is recognized in two literal forms: bracketed
//! `${NAME}` and bare `$NAME`. Substitution is plain literal replacement with
//! no escaping rules. A token that starts or ends with an identifier
//! character only matches on an identifier boundary, so `$BACKEND_IP` never
//! matches inside `$BACKEND_IPV6`. All tokens are replaced in a single
//! left-to-right pass, thus replaced text is never scanned again.
//!
//! # Backups
//!
//! A fragment is only rewritten if substitution changed its content. The
//! original content is first persisted through [`crate::backup`]. Running the
//! engine twice with the same values is a no-op the second time around,
//! because no placeholder survives the first pass.

use crate::{
    backup::write_backup,
    fragment::{FileFailure, FragmentFilter, FragmentTree},
};

use regex::{Captures, Regex};
use std::{
    borrow::Cow,
    collections::{BTreeMap, BTreeSet, HashMap},
    fmt::{Display, Formatter, Result as FmtResult},
    fs::{read_to_string, write},
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::{debug, info, instrument, warn};

/// Known placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Placeholder {
    BackendIp,
    PersBackendIp,
    DelphiBackendIp,
    BaseDomain,
    IncludeStream,
}

impl Placeholder {
    pub const ALL: [Placeholder; 5] = [
        Placeholder::BackendIp,
        Placeholder::PersBackendIp,
        Placeholder::DelphiBackendIp,
        Placeholder::BaseDomain,
        Placeholder::IncludeStream,
    ];

    /// Canonical name, also used as key in the last-values record.
    pub fn key(self) -> &'static str {
        self.names()[0]
    }

    /// Every name placeholder is known by.
    pub fn names(self) -> &'static [&'static str] {
        match self {
            Self::BackendIp => &["BACKEND_IP", "backendIP"],
            Self::PersBackendIp => &["PERS_BACKEND_IP"],
            Self::DelphiBackendIp => &["DELPHI_BACKEND_IP"],
            Self::BaseDomain => &["BASE_DOMAIN"],
            Self::IncludeStream => &["INCLUDE_STREAM"],
        }
    }

    /// Literal tokens of placeholder in bracketed and bare form.
    pub fn tokens(self) -> Vec<String> {
        self.names()
            .iter()
            .flat_map(|name| [format!("${{{name}}}"), format!("${name}")])
            .collect()
    }

    /// Message shown when asking operator for a value.
    pub fn prompt(self) -> &'static str {
        match self {
            Self::BackendIp => "Enter the backend IP address",
            Self::PersBackendIp => "Enter the backend IP address for your Persephone backups",
            Self::DelphiBackendIp => "Enter the backend IP address for your Delphi install",
            Self::BaseDomain => "Enter the base domain for your services",
            Self::IncludeStream => "Enter the stream include directive",
        }
    }

    /// Check if placeholder must always be supplied.
    pub fn is_required(self) -> bool {
        matches!(self, Self::BackendIp | Self::BaseDomain)
    }

    /// Lookup placeholder owning a literal token.
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|placeholder| placeholder.tokens().iter().any(|known| known == token))
    }
}

impl Display for Placeholder {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.key())
    }
}

impl FromStr for Placeholder {
    type Err = SubstituteError;

    fn from_str(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|placeholder| placeholder.names().contains(&name))
            .ok_or_else(|| SubstituteError::UnknownPlaceholder(name.into()))
    }
}

/// Mapping of literal tokens to replacement values.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SubstitutionTable {
    entries: BTreeMap<String, String>,
}

impl SubstitutionTable {
    /// Construct new empty substitution table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a literal token to a replacement value.
    pub fn insert(&mut self, token: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(token.into(), value.into());
    }

    /// Map every token of a placeholder to a replacement value.
    pub fn insert_placeholder(&mut self, placeholder: Placeholder, value: impl Into<String>) {
        let value = value.into();
        for token in placeholder.tokens() {
            self.entries.insert(token, value.clone());
        }
    }

    /// Builder flavor of [`SubstitutionTable::insert_placeholder`].
    pub fn with_placeholder(mut self, placeholder: Placeholder, value: impl Into<String>) -> Self {
        self.insert_placeholder(placeholder, value);
        self
    }

    /// Replacement value of literal token.
    pub fn get(&self, token: &str) -> Option<&str> {
        self.entries.get(token).map(String::as_str)
    }

    /// Iterate through literal tokens in sorted order.
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Compile table into a single-pass matcher.
    ///
    /// # Errors
    ///
    /// - Return [`SubstituteError::Compile`] if the token matcher cannot be
    ///   built.
    pub fn compile(&self) -> Result<Substitution> {
        if self.entries.is_empty() {
            return Ok(Substitution {
                matcher: None,
                values: HashMap::new(),
            });
        }

        // INVARIANT: Longer tokens win when two tokens start at the same offset.
        let mut tokens = self.entries.keys().collect::<Vec<_>>();
        tokens.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        let alternatives = tokens
            .into_iter()
            .map(|token| bounded_pattern(token))
            .collect::<Vec<_>>();
        let matcher = Regex::new(alternatives.join("|").as_str())?;

        Ok(Substitution {
            matcher: Some(matcher),
            values: self
                .entries
                .iter()
                .map(|(token, value)| (token.clone(), value.clone()))
                .collect(),
        })
    }
}

fn is_ident_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

fn bounded_pattern(token: &str) -> String {
    let mut pattern = String::new();
    if token.chars().next().is_some_and(is_ident_char) {
        pattern.push_str(r"\b");
    }
    pattern.push_str(regex::escape(token).as_str());
    if token.chars().last().is_some_and(is_ident_char) {
        pattern.push_str(r"\b");
    }

    pattern
}

/// Compiled substitution table.
#[derive(Debug, Clone)]
pub struct Substitution {
    matcher: Option<Regex>,
    values: HashMap<String, String>,
}

impl Substitution {
    /// Replace every token occurrence in content.
    ///
    /// Borrows content back if nothing matched.
    pub fn apply<'a>(&self, content: &'a str) -> Cow<'a, str> {
        match &self.matcher {
            Some(matcher) => matcher.replace_all(content, |caps: &Captures<'_>| {
                self.values
                    .get(&caps[0])
                    .cloned()
                    .unwrap_or_else(|| caps[0].to_string())
            }),
            None => Cow::Borrowed(content),
        }
    }

    /// Check if content contains any token.
    pub fn is_match(&self, content: &str) -> bool {
        self.matcher
            .as_ref()
            .map(|matcher| matcher.is_match(content))
            .unwrap_or(false)
    }

    /// Distinct tokens found in content.
    pub fn find_tokens(&self, content: &str) -> BTreeSet<String> {
        self.matcher
            .as_ref()
            .map(|matcher| {
                matcher
                    .find_iter(content)
                    .map(|found| found.as_str().to_string())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Substitution engine over a fragment tree.
#[derive(Debug, Clone)]
pub struct Substituter {
    tree: FragmentTree,
}

impl Substituter {
    /// Construct new substitution engine rooted at target directory.
    ///
    /// # Errors
    ///
    /// - Return [`SubstituteError::Fragment`] if root directory does not exist.
    pub fn open(root: impl Into<PathBuf>, filter: FragmentFilter) -> Result<Self> {
        Ok(Self {
            tree: FragmentTree::open(root, filter)?,
        })
    }

    /// Root directory of substitution engine.
    pub fn root(&self) -> &Path {
        self.tree.root()
    }

    /// Find which known placeholders occur anywhere in the tree.
    ///
    /// Unreadable fragments are skipped.
    #[instrument(skip(self), level = "debug")]
    pub fn scan(&self) -> Result<BTreeSet<Placeholder>> {
        let mut scanner = SubstitutionTable::new();
        for placeholder in Placeholder::ALL {
            scanner.insert_placeholder(placeholder, placeholder.key());
        }
        let scanner = scanner.compile()?;

        let mut found = BTreeSet::new();
        for path in self.tree.walk().fragments {
            let content = match read_to_string(&path) {
                Ok(content) => content,
                Err(err) => {
                    debug!("skip scan of {:?}: {err}", path.display());
                    continue;
                }
            };
            found.extend(
                scanner
                    .find_tokens(&content)
                    .iter()
                    .filter_map(|token| Placeholder::from_token(token)),
            );
        }

        Ok(found)
    }

    /// Rewrite every fragment with substitution table.
    ///
    /// Fragments whose content does not change are left untouched and get no
    /// backup. Read and write failures are recorded in the report, and the
    /// remaining fragments are still processed.
    ///
    /// # Errors
    ///
    /// - Return [`SubstituteError::Compile`] if table cannot be compiled.
    #[instrument(skip(self, table), level = "debug")]
    pub fn run(&self, table: &SubstitutionTable) -> Result<SubstitutionReport> {
        let substitution = table.compile()?;
        let walk = self.tree.walk();
        let mut report = SubstitutionReport {
            failures: walk.failures,
            ..Default::default()
        };

        for path in walk.fragments {
            match update_fragment(&path, &substitution) {
                Ok(Some(backup)) => {
                    info!("updated {:?}", path.display());
                    report.updated.push(FragmentUpdate { path, backup });
                }
                Ok(None) => report.unchanged.push(path),
                Err(failure) => {
                    warn!("{failure}");
                    report.failures.push(failure);
                }
            }
        }

        Ok(report)
    }
}

fn update_fragment(
    path: &Path,
    substitution: &Substitution,
) -> std::result::Result<Option<PathBuf>, FileFailure> {
    let original = read_to_string(path)
        .map_err(|err| FileFailure::new(path, format!("failed to read: {err}")))?;

    let updated = match substitution.apply(&original) {
        Cow::Borrowed(_) => return Ok(None),
        Cow::Owned(updated) if updated == original => return Ok(None),
        Cow::Owned(updated) => updated,
    };

    // INVARIANT: Original content is persisted before fragment is overwritten.
    let backup = write_backup(path, original.as_bytes())
        .map_err(|err| FileFailure::new(path, format!("{err}: {}", err.source)))?;
    write(path, updated.as_bytes())
        .map_err(|err| FileFailure::new(path, format!("failed to write: {err}")))?;

    Ok(Some(backup))
}

/// Fragment that was rewritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentUpdate {
    pub path: PathBuf,
    pub backup: PathBuf,
}

/// Outcome of one substitution pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SubstitutionReport {
    /// Fragments rewritten along with their backups.
    pub updated: Vec<FragmentUpdate>,

    /// Fragments without any token.
    pub unchanged: Vec<PathBuf>,

    /// Fragments skipped because of errors.
    pub failures: Vec<FileFailure>,
}

/// Substitution error types.
#[derive(Debug, thiserror::Error)]
pub enum SubstituteError {
    /// Fragment tree cannot be opened.
    #[error(transparent)]
    Fragment(#[from] crate::fragment::FragmentError),

    /// Token matcher cannot be built.
    #[error(transparent)]
    Compile(#[from] regex::Error),

    /// Name does not belong to any placeholder.
    #[error("unknown placeholder {0:?}")]
    UnknownPlaceholder(String),
}

/// Friendly result alias :3
pub type Result<T, E = SubstituteError> = std::result::Result<T, E>;
