// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Reverse proxy deployment utilities.
//!
//! Hecate prepares the configuration of an nginx-style reverse proxy that
//! fronts a fixed catalog of self-hosted applications. The configuration is a
//! directory tree of text __fragments__, most of them owned by one
//! application of the catalog.
//!
//! # Reconciliation
//!
//! The heart of Hecate is reconciling the fragment tree with an operator's
//! choices:
//!
//! 1. [`substitute`] resolves placeholder tokens like `${BASE_DOMAIN}` in
//!    every fragment, backing up each fragment it modifies.
//! 2. [`prune`] removes fragments of applications the operator did not
//!    select, keeping essential fragments no matter what.
//!
//! # Surrounding Chores
//!
//! Everything else is a mechanical chore around the stack: [`snapshot`] saves
//! and restores the whole deployment, [`certs`] obtains TLS certificates
//! through an external ACME client, [`compose`] enables port mappings and
//! drives the container orchestrator, and [`http_conf`] renders the top-level
//! HTTP block. External tools are only ever run through [`exec`].

pub mod backup;
pub mod catalog;
pub mod certs;
pub mod compose;
pub mod config;
pub mod exec;
pub mod fragment;
pub mod http_conf;
pub mod path;
pub mod prompt;
pub mod prune;
pub mod reconcile;
pub mod snapshot;
pub mod state;
pub mod substitute;
pub mod workspace;
