// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Operator prompts.
//!
//! Thin wrappers around [`inquire`] for the handful of prompt shapes Hecate
//! needs: free text with a remembered default, yes/no confirmation, and
//! application selection from the numbered catalog menu.

use crate::catalog::{Catalog, CatalogError, Selection};

use inquire::{validator::Validation, Confirm, Select, Text};
use std::fmt::Display;

/// Ask for a required value, offering a remembered default.
///
/// # Errors
///
/// - Return [`PromptError::Inquire`] if prompt fails or is canceled.
pub fn value(message: &str, default: Option<&str>) -> Result<String> {
    let mut prompt = Text::new(message).with_validator(|input: &str| {
        if input.trim().is_empty() {
            Ok(Validation::Invalid("a value is required".into()))
        } else {
            Ok(Validation::Valid)
        }
    });
    if let Some(default) = default.filter(|default| !default.is_empty()) {
        prompt = prompt.with_default(default);
    }

    Ok(prompt.prompt()?.trim().to_string())
}

/// Ask for an optional value, empty input means no value.
///
/// # Errors
///
/// - Return [`PromptError::Inquire`] if prompt fails or is canceled.
pub fn optional_value(message: &str, default: Option<&str>) -> Result<Option<String>> {
    let mut prompt = Text::new(message).with_help_message("leave empty to skip");
    if let Some(default) = default.filter(|default| !default.is_empty()) {
        prompt = prompt.with_default(default);
    }

    Ok(non_empty(prompt.prompt()?))
}

/// Ask yes/no question.
///
/// # Errors
///
/// - Return [`PromptError::Inquire`] if prompt fails or is canceled.
pub fn confirm(message: &str, default: bool) -> Result<bool> {
    Ok(Confirm::new(message).with_default(default).prompt()?)
}

/// Ask for application selection from catalog menu.
///
/// # Errors
///
/// - Return [`PromptError::Inquire`] if prompt fails or is canceled.
/// - Return [`PromptError::Selection`] if answer is not a valid selection.
pub fn selection(catalog: &Catalog, default: Option<&Selection>) -> Result<Selection> {
    for line in catalog.menu_lines() {
        println!("{line}");
    }

    let remembered = default.map(ToString::to_string);
    let mut prompt = Text::new("Select applications")
        .with_help_message("comma-separated option numbers or keywords, or \"all\"")
        .with_validator(|input: &str| match input.parse::<Selection>() {
            Ok(_) => Ok(Validation::Valid),
            Err(err) => Ok(Validation::Invalid(err.to_string().into())),
        });
    if let Some(remembered) = remembered.as_deref().filter(|data| !data.is_empty()) {
        prompt = prompt.with_default(remembered);
    }

    Ok(prompt.prompt()?.parse()?)
}

/// Ask operator to pick one option.
///
/// # Errors
///
/// - Return [`PromptError::Inquire`] if prompt fails or is canceled.
pub fn choose<T: Display>(message: &str, options: Vec<T>) -> Result<T> {
    Ok(Select::new(message, options).prompt()?)
}

fn non_empty(input: String) -> Option<String> {
    let input = input.trim();
    (!input.is_empty()).then(|| input.to_string())
}

/// Prompt error types.
#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    /// Prompt failed or was canceled by operator.
    #[error(transparent)]
    Inquire(#[from] inquire::InquireError),

    #[error(transparent)]
    Selection(#[from] CatalogError),
}

/// Friendly result alias :3
pub type Result<T, E = PromptError> = std::result::Result<T, E>;
