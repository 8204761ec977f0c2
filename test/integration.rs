// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::{DeployFixture, FakeRunner};

use anyhow::Result;
use hecate::{
    catalog::{App, Selection},
    certs::{CertError, CertRequest},
    compose::update_compose_file,
    reconcile::reconcile,
    state::DeployState,
    substitute::{Placeholder, SubstitutionTable},
    workspace::Workspace,
};
use pretty_assertions::assert_eq;
use sealed_test::prelude::*;
use std::{
    collections::BTreeSet,
    fs::{read_dir, read_to_string, write},
    path::{Path, PathBuf},
};

fn table() -> SubstitutionTable {
    SubstitutionTable::new()
        .with_placeholder(Placeholder::BackendIp, "10.0.0.5")
        .with_placeholder(Placeholder::BaseDomain, "example.com")
        .with_placeholder(Placeholder::DelphiBackendIp, "10.0.0.9")
        .with_placeholder(Placeholder::IncludeStream, "include stream/*.conf;")
}

fn backups(dir: impl AsRef<Path>) -> Result<BTreeSet<String>> {
    let mut names = BTreeSet::new();
    for entry in read_dir(dir)? {
        let name = entry?.file_name().to_string_lossy().into_owned();
        if name.ends_with(".bak") {
            names.insert(name);
        }
    }

    Ok(names)
}

#[sealed_test(env = [("XDG_CONFIG_HOME", "/nonexistent/hecate-xdg")])]
fn reconcile_full_tree() -> Result<()> {
    let fixture = DeployFixture::new("deploy")?.standard()?;
    let workspace = Workspace::open(fixture.root(), None)?;

    let selection = Selection::from_apps([App::StaticWebsite, App::Wazuh]);
    let report = reconcile(&workspace, &table(), &selection)?;

    assert_eq!(report.substitution.updated.len(), 4);
    assert_eq!(report.failure_count(), 0);
    assert_eq!(
        report.prune.removed,
        vec![PathBuf::from("deploy/conf.d/servers/cloud.conf")]
    );
    assert_eq!(
        read_to_string("deploy/conf.d/servers/base.conf")?,
        "server { server_name example.com; proxy_pass http://10.0.0.5:8080; }\n"
    );
    assert_eq!(
        read_to_string("deploy/conf.d/stream.conf")?,
        "stream { include stream/*.conf; }\n"
    );
    assert_eq!(
        read_to_string("deploy/conf.d/servers/README.txt")?,
        "not a fragment ${BASE_DOMAIN}\n"
    );
    assert!(!Path::new("deploy/conf.d/servers/cloud.conf").exists());

    // Second pass finds nothing left to substitute.
    let before = backups("deploy/conf.d/servers")?;
    let again = reconcile(&workspace, &table(), &selection)?;
    assert!(again.substitution.updated.is_empty());
    assert!(again.prune.removed.is_empty());
    assert_eq!(backups("deploy/conf.d/servers")?, before);

    Ok(())
}

#[sealed_test(env = [("XDG_CONFIG_HOME", "/nonexistent/hecate-xdg")])]
fn reconcile_honors_workspace_config() -> Result<()> {
    let fixture = DeployFixture::new("deploy")?.standard()?;
    fixture.file(
        "hecate.toml",
        "[prune]\nessential = [\"http.conf\"]\n",
    )?;
    let workspace = Workspace::open(fixture.root(), None)?;

    let report = reconcile(&workspace, &table(), &Selection::none())?;
    let removed = report
        .prune
        .removed
        .iter()
        .filter_map(|path| path.file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .collect::<BTreeSet<_>>();
    let expect = BTreeSet::from([
        "base.conf".to_string(),
        "cloud.conf".to_string(),
        "delphi.conf".to_string(),
        "stream.conf".to_string(),
    ]);
    assert_eq!(removed, expect);
    assert!(Path::new("deploy/conf.d/http.conf").exists());

    Ok(())
}

#[sealed_test(env = [("XDG_CONFIG_HOME", "/nonexistent/hecate-xdg")])]
fn snapshot_round_trip() -> Result<()> {
    let fixture = DeployFixture::new("deploy")?.standard()?;
    let workspace = Workspace::open(fixture.root(), None)?;

    workspace.snapshot().backup()?;
    reconcile(&workspace, &table(), &Selection::none())?;
    update_compose_file(workspace.compose_file(), &[App::Nextcloud])?;
    assert!(!Path::new("deploy/conf.d/servers/base.conf").exists());

    workspace.snapshot().restore()?;
    assert_eq!(
        read_to_string("deploy/conf.d/servers/base.conf")?,
        "server { server_name ${BASE_DOMAIN}; proxy_pass http://${BACKEND_IP}:8080; }\n"
    );
    assert!(read_to_string("deploy/docker-compose.yml")?.contains("#  - \"3478:3478/udp\""));
    assert!(Path::new("deploy/certs/example.com.privkey.pem").exists());

    Ok(())
}

#[sealed_test(env = [("XDG_CONFIG_HOME", "/nonexistent/hecate-xdg")])]
fn compose_ports_for_selection() -> Result<()> {
    let fixture = DeployFixture::new("deploy")?.standard()?;
    let workspace = Workspace::open(fixture.root(), None)?;

    let update = update_compose_file(workspace.compose_file(), &Selection::All.apps())?;
    assert_eq!(update.enabled, 4);
    assert!(update.backup.is_some());
    assert!(!read_to_string("deploy/docker-compose.yml")?.contains('#'));

    Ok(())
}

#[sealed_test(env = [("XDG_CONFIG_HOME", "/nonexistent/hecate-xdg")])]
fn certificate_flow_with_fake_client() -> Result<()> {
    let fixture = DeployFixture::new("deploy")?.standard()?;
    fixture
        .file("live/wiki.example.com/fullchain.pem", "issued chain\n")?
        .file("live/wiki.example.com/privkey.pem", "issued key\n")?;
    let live_dir = std::env::current_dir()?.join("deploy/live");
    fixture.file(
        "hecate.toml",
        format!(
            "[certs]\nlive_dir = {:?}\nsudo = false\n",
            live_dir.to_string_lossy()
        ),
    )?;
    let workspace = Workspace::open(fixture.root(), None)?;

    let runner = FakeRunner::default();
    workspace.compose(&runner).down()?;
    let request = CertRequest::new("example.com", Some("wiki".into()), "ops@example.com");
    let manager = workspace.cert_manager();
    manager.issue(&runner, &request)?;
    manager.install(&request.full_domain(), request.default_name())?;

    assert_eq!(
        *runner.calls.borrow(),
        vec![
            "docker compose down",
            "certbot certonly --standalone -d wiki.example.com --email ops@example.com \
             --agree-tos --non-interactive",
        ]
    );
    assert_eq!(
        read_to_string("deploy/certs/wiki.fullchain.pem")?,
        "issued chain\n"
    );
    assert_eq!(
        manager.installed(),
        BTreeSet::from(["example.com".to_string(), "wiki".to_string()])
    );

    Ok(())
}

#[sealed_test(env = [("XDG_CONFIG_HOME", "/nonexistent/hecate-xdg")])]
fn failing_acme_client_aborts() -> Result<()> {
    let fixture = DeployFixture::new("deploy")?.standard()?;
    let workspace = Workspace::open(fixture.root(), None)?;

    let runner = FakeRunner {
        fail_on: Some("certonly".into()),
        ..Default::default()
    };
    let request = CertRequest::new("example.com", None, "ops@example.com");
    let result = workspace.cert_manager().issue(&runner, &request);
    assert!(matches!(result, Err(CertError::Exec(_))));

    Ok(())
}

#[sealed_test(env = [("XDG_CONFIG_HOME", "/nonexistent/hecate-xdg")])]
fn last_values_survive_runs() -> Result<()> {
    let fixture = DeployFixture::new("deploy")?;
    let workspace = Workspace::open(fixture.root(), None)?;

    let mut state = workspace.load_state()?;
    assert!(state.is_empty());
    state.set_placeholder(Placeholder::BackendIp, "10.0.0.5");
    state.set_selection(&Selection::from_apps([App::Jellyfin, App::Persephone]));
    workspace.save_state(&state)?;

    assert_eq!(
        read_to_string("deploy/.hecate.conf")?,
        "APPS_SELECTION=\"12,13\"\nBACKEND_IP=\"10.0.0.5\"\n"
    );

    write("deploy/.hecate.conf", "BACKEND_IP=\"10.0.0.6\"\n")?;
    let reloaded: DeployState = workspace.load_state()?;
    assert_eq!(reloaded.placeholder(Placeholder::BackendIp), Some("10.0.0.6"));
    assert_eq!(reloaded.selection()?, None);

    Ok(())
}
