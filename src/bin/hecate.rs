// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use hecate::{
    catalog::{App, Catalog, Selection},
    certs::CertRequest,
    compose::update_compose_file,
    exec::SystemRunner,
    fragment::FileFailure,
    http_conf::{HttpBlock, HttpSetting},
    prompt,
    prune::PruneReport,
    reconcile::reconcile,
    state::DeployState,
    substitute::{Placeholder, SubstitutionReport, SubstitutionTable},
    workspace::Workspace,
};

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::PathBuf,
    process::exit,
};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "hecate [options] <command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    #[command(flatten)]
    pub global: GlobalOptions,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    fn run(self) -> Result<()> {
        let workspace = Workspace::open(&self.global.root, self.global.config.as_deref())?;
        match self.command {
            Command::Backup => run_backup(&workspace),
            Command::Restore => run_restore(&workspace),
            Command::Certs => run_certs(&workspace),
            Command::HttpConf(opts) => run_http_conf(&workspace, opts),
            Command::Substitute => run_substitute(&workspace),
            Command::Prune(opts) => run_prune(&workspace, opts),
            Command::Reconcile(opts) => run_reconcile(&workspace, opts),
            Command::Compose(opts) => run_compose(&workspace, opts),
            Command::Apps => run_apps(&workspace),
            Command::Menu => run_menu(&workspace),
        }
    }
}

#[derive(Args, Clone, Debug)]
struct GlobalOptions {
    /// Deploy root directory.
    #[arg(short, long, global = true, default_value = ".", value_name = "dir")]
    pub root: PathBuf,

    /// Configuration file to use instead of the usual lookup.
    #[arg(short, long, global = true, value_name = "file")]
    pub config: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Snapshot fragment directory, certs directory, and compose file.
    #[command(override_usage = "hecate backup [options]")]
    Backup,

    /// Restore fragment directory, certs directory, and compose file from snapshot.
    #[command(override_usage = "hecate restore [options]")]
    Restore,

    /// Obtain and install a TLS certificate.
    #[command(override_usage = "hecate certs [options]")]
    Certs,

    /// Generate top-level HTTP block.
    #[command(override_usage = "hecate http-conf [options]")]
    HttpConf(HttpConfOptions),

    /// Substitute placeholders in every fragment.
    #[command(override_usage = "hecate substitute [options]")]
    Substitute,

    /// Remove fragments of unselected applications.
    #[command(override_usage = "hecate prune [options] [<app>]...")]
    Prune(PruneOptions),

    /// Substitute placeholders, then prune fragments.
    #[command(override_usage = "hecate reconcile [options] [<app>]...")]
    Reconcile(PruneOptions),

    /// Enable compose ports or drive the stack.
    #[command(subcommand)]
    Compose(ComposeCommand),

    /// List application catalog.
    #[command(override_usage = "hecate apps [options]")]
    Apps,

    /// Pick utilities from a numbered menu.
    #[command(override_usage = "hecate menu [options]")]
    Menu,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct HttpConfOptions {
    /// Use default settings without prompting.
    #[arg(short, long)]
    pub defaults: bool,
}

#[derive(Parser, Clone, Debug, Default)]
#[command(author, about, long_about)]
struct PruneOptions {
    /// Applications to keep by option number or keyword.
    #[arg(group = "selection", value_name = "app")]
    pub apps: Vec<String>,

    /// Keep fragments of every application.
    #[arg(short, long, group = "selection")]
    pub all: bool,

    /// Show what would be removed without removing anything.
    #[arg(short = 'n', long)]
    pub dry_run: bool,
}

#[derive(Subcommand, Clone, Debug)]
enum ComposeCommand {
    /// Uncomment port mappings of selected applications.
    #[command(override_usage = "hecate compose ports [options] [<app>]...")]
    Ports(PortsOptions),

    /// Bring stack up detached.
    Up,

    /// Bring stack down.
    Down,

    /// Stream stack logs.
    Logs,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct PortsOptions {
    /// Applications to enable ports for by option number or keyword.
    #[arg(group = "selection", value_name = "app")]
    pub apps: Vec<String>,

    /// Enable ports of every application.
    #[arg(short, long, group = "selection")]
    pub all: bool,
}

fn main() {
    let cli = Cli::parse();

    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_timer(false)
        .without_time();
    let default_level = if cli.global.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = cli.run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn run_backup(workspace: &Workspace) -> Result<()> {
    let written = workspace.snapshot().backup()?;
    info!("snapshot complete: {} items saved", written.len());

    Ok(())
}

fn run_restore(workspace: &Workspace) -> Result<()> {
    if !prompt::confirm("Replace live configuration with snapshot?", false)? {
        info!("restore canceled");
        return Ok(());
    }

    let written = workspace.snapshot().restore()?;
    info!("restore complete: {} items restored", written.len());

    Ok(())
}

fn run_certs(workspace: &Workspace) -> Result<()> {
    let mut state = workspace.load_state()?;
    let runner = SystemRunner::new();

    // INVARIANT: Standalone issuance needs ports 80/443 free.
    workspace.compose(&runner).down()?;

    let base_domain = prompt::value(
        Placeholder::BaseDomain.prompt(),
        state.placeholder(Placeholder::BaseDomain),
    )?;
    let subdomain = prompt::optional_value(
        "Enter the subdomain to certify (empty for the base domain)",
        state.subdomain(),
    )?;
    let email = prompt::value("Enter the contact email", state.email())?;

    let request = CertRequest::new(base_domain, subdomain, email);
    let manager = workspace.cert_manager();
    manager.issue(&runner, &request)?;

    let name = prompt::value(
        "Enter the name of the installed certificate",
        Some(request.default_name()),
    )?;
    let installed = manager.install(&request.full_domain(), &name)?;
    info!(
        "certificate installed as {:?} and {:?}",
        installed.fullchain.display(),
        installed.privkey.display()
    );

    state.set_placeholder(Placeholder::BaseDomain, request.base_domain.as_str());
    state.set_email(request.email.as_str());
    match &request.subdomain {
        Some(sub) => state.set_subdomain(sub.as_str()),
        None => {
            state.remove(hecate::state::SUBDOMAIN_KEY);
        }
    }
    workspace.save_state(&state)?;

    Ok(())
}

fn run_http_conf(workspace: &Workspace, opts: HttpConfOptions) -> Result<()> {
    let mut block = HttpBlock::default();
    if !opts.defaults {
        for setting in HttpSetting::ALL {
            println!("{}", setting.description());
            let value = prompt::value(setting.prompt(), Some(block.get(setting)))?;
            block.set(setting, value);
        }
    }

    let written = block.write(workspace.http_conf())?;
    if let Some(backup) = written.backup {
        info!("previous HTTP block kept as {:?}", backup.display());
    }

    Ok(())
}

fn run_substitute(workspace: &Workspace) -> Result<()> {
    let mut state = workspace.load_state()?;
    let substituter = workspace.substituter()?;
    let table = ask_substitution_table(&mut state, &substituter.scan()?)?;

    let report = substituter.run(&table)?;
    log_substitution(&report);
    workspace.save_state(&state)?;

    Ok(())
}

fn run_prune(workspace: &Workspace, opts: PruneOptions) -> Result<()> {
    let mut state = workspace.load_state()?;
    let catalog = workspace.catalog();
    let selection = resolve_selection(&catalog, &state, &opts.apps, opts.all)?;
    let pruner = workspace.pruner()?;

    if opts.dry_run {
        print_plan(&catalog, &pruner.plan(&selection));
        return Ok(());
    }

    if !confirm_selection(&selection)? {
        info!("prune canceled");
        return Ok(());
    }

    let report = pruner.prune(&selection);
    log_prune(&report);
    state.set_selection(&selection);
    workspace.save_state(&state)?;

    Ok(())
}

fn run_reconcile(workspace: &Workspace, opts: PruneOptions) -> Result<()> {
    let mut state = workspace.load_state()?;
    let catalog = workspace.catalog();
    let selection = resolve_selection(&catalog, &state, &opts.apps, opts.all)?;
    if opts.dry_run {
        print_plan(&catalog, &workspace.pruner()?.plan(&selection));
        return Ok(());
    }

    let substituter = workspace.substituter()?;
    let table = ask_substitution_table(&mut state, &substituter.scan()?)?;
    if !confirm_selection(&selection)? {
        info!("reconcile canceled");
        return Ok(());
    }

    let report = reconcile(workspace, &table, &selection)?;
    log_substitution(&report.substitution);
    log_prune(&report.prune);
    state.set_selection(&selection);
    workspace.save_state(&state)?;

    Ok(())
}

fn run_compose(workspace: &Workspace, command: ComposeCommand) -> Result<()> {
    let runner = SystemRunner::new();
    let compose = workspace.compose(&runner);
    match command {
        ComposeCommand::Ports(opts) => {
            let mut state = workspace.load_state()?;
            let selection =
                resolve_selection(&workspace.catalog(), &state, &opts.apps, opts.all)?;
            let update = update_compose_file(workspace.compose_file(), &selection.apps())?;
            info!("enabled {} port lines", update.enabled);
            state.set_selection(&selection);
            workspace.save_state(&state)?;
        }
        ComposeCommand::Up => compose.up_detached()?,
        ComposeCommand::Down => compose.down()?,
        ComposeCommand::Logs => compose.logs()?,
    }

    Ok(())
}

fn run_apps(workspace: &Workspace) -> Result<()> {
    let catalog = workspace.catalog();
    for line in catalog.menu_lines() {
        println!("{line}");
    }
    println!(
        "essential: {}",
        catalog.essentials().iter().cloned().collect::<Vec<_>>().join(", ")
    );

    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuEntry {
    Backup,
    Restore,
    Certs,
    HttpConf,
    Substitute,
    Prune,
    Reconcile,
    ComposePorts,
    ComposeUp,
    ComposeDown,
    ComposeLogs,
    Quit,
}

impl MenuEntry {
    const ALL: [MenuEntry; 12] = [
        MenuEntry::Backup,
        MenuEntry::Restore,
        MenuEntry::Certs,
        MenuEntry::HttpConf,
        MenuEntry::Substitute,
        MenuEntry::Prune,
        MenuEntry::Reconcile,
        MenuEntry::ComposePorts,
        MenuEntry::ComposeUp,
        MenuEntry::ComposeDown,
        MenuEntry::ComposeLogs,
        MenuEntry::Quit,
    ];

    fn label(self) -> &'static str {
        match self {
            Self::Backup => "Backup configuration",
            Self::Restore => "Restore configuration",
            Self::Certs => "Obtain TLS certificate",
            Self::HttpConf => "Generate HTTP block",
            Self::Substitute => "Substitute placeholders",
            Self::Prune => "Prune unselected fragments",
            Self::Reconcile => "Substitute and prune",
            Self::ComposePorts => "Enable compose ports",
            Self::ComposeUp => "Bring stack up",
            Self::ComposeDown => "Bring stack down",
            Self::ComposeLogs => "Stream stack logs",
            Self::Quit => "Quit",
        }
    }
}

impl Display for MenuEntry {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let number = MenuEntry::ALL
            .iter()
            .position(|entry| entry == self)
            .map(|index| index + 1)
            .unwrap_or_default();
        write!(fmt, "{number:>2}. {}", self.label())
    }
}

fn run_menu(workspace: &Workspace) -> Result<()> {
    loop {
        let entry = prompt::choose("Select a utility", MenuEntry::ALL.to_vec())?;
        let result = match entry {
            MenuEntry::Backup => run_backup(workspace),
            MenuEntry::Restore => run_restore(workspace),
            MenuEntry::Certs => run_certs(workspace),
            MenuEntry::HttpConf => run_http_conf(workspace, HttpConfOptions { defaults: false }),
            MenuEntry::Substitute => run_substitute(workspace),
            MenuEntry::Prune => run_prune(workspace, PruneOptions::default()),
            MenuEntry::Reconcile => run_reconcile(workspace, PruneOptions::default()),
            MenuEntry::ComposePorts => run_compose(
                workspace,
                ComposeCommand::Ports(PortsOptions {
                    apps: Vec::new(),
                    all: false,
                }),
            ),
            MenuEntry::ComposeUp => run_compose(workspace, ComposeCommand::Up),
            MenuEntry::ComposeDown => run_compose(workspace, ComposeCommand::Down),
            MenuEntry::ComposeLogs => run_compose(workspace, ComposeCommand::Logs),
            MenuEntry::Quit => return Ok(()),
        };

        // INVARIANT: A failed utility returns to the menu.
        if let Err(error) = result {
            error!("{error:?}");
        }
    }
}

/// Determine selection from arguments, or ask operator if none given.
fn resolve_selection(
    catalog: &Catalog,
    state: &DeployState,
    apps: &[String],
    all: bool,
) -> Result<Selection> {
    if all {
        return Ok(Selection::All);
    }

    if !apps.is_empty() {
        let apps = apps
            .iter()
            .map(|token| token.parse::<App>())
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Selection::from_apps(apps));
    }

    let remembered = match state.selection() {
        Ok(selection) => selection,
        Err(err) => {
            warn!("ignoring remembered selection: {err}");
            None
        }
    };
    Ok(prompt::selection(catalog, remembered.as_ref())?)
}

/// Empty selection removes every non-essential fragment, so ask first.
fn confirm_selection(selection: &Selection) -> Result<bool> {
    if !selection.is_empty() {
        return Ok(true);
    }

    Ok(prompt::confirm(
        "No application selected, remove every non-essential fragment?",
        false,
    )?)
}

/// Ask values for required placeholders and optional placeholders in use.
fn ask_substitution_table(
    state: &mut DeployState,
    in_use: &std::collections::BTreeSet<Placeholder>,
) -> Result<SubstitutionTable> {
    let mut table = SubstitutionTable::new();
    for placeholder in Placeholder::ALL {
        if !placeholder.is_required() && !in_use.contains(&placeholder) {
            continue;
        }

        let value = prompt::value(placeholder.prompt(), state.placeholder(placeholder))?;

        // INVARIANT: Values never reintroduce tokens, so a second pass is a no-op.
        let mut tokens = Placeholder::ALL.iter().flat_map(|known| known.tokens());
        if tokens.any(|token| value.contains(token.as_str())) {
            bail!("value for {placeholder} must not contain a placeholder token");
        }
        table.insert_placeholder(placeholder, value.as_str());
        state.set_placeholder(placeholder, value);
    }

    Ok(table)
}

fn log_failures(failures: &[FileFailure]) {
    for failure in failures {
        warn!("skipped {failure}");
    }
}

fn print_plan(catalog: &Catalog, plan: &PruneReport) {
    for path in &plan.removed {
        let owner = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| catalog.owner_of(name));
        match owner {
            Some(app) => println!("would remove {} ({app})", path.display()),
            None => println!("would remove {}", path.display()),
        }
    }
}

fn log_substitution(report: &SubstitutionReport) {
    info!(
        "substitution: {} updated, {} unchanged, {} failed",
        report.updated.len(),
        report.unchanged.len(),
        report.failures.len()
    );
    log_failures(&report.failures);
}

fn log_prune(report: &PruneReport) {
    for path in &report.removed {
        info!("removed {}", path.display());
    }
    for path in &report.kept_essential {
        info!("kept essential {}", path.display());
    }
    info!(
        "prune: {} removed, {} kept, {} failed",
        report.removed.len(),
        report.kept_essential.len() + report.kept_selected.len(),
        report.failures.len()
    );
    log_failures(&report.failures);
}
