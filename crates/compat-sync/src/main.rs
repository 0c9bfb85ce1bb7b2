//! `compat-sync` command line: hash, diff, sync and show for registry snapshots.

use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use compat_migration::MigrationStore;
use compat_schema::{diff_registries, schema_hashes, DiffResult, RegistrySnapshot};
use compat_sync::{plan_sync, SyncConfig};
use serde_json::json;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Exit status when `diff` reports breaking changes
const EXIT_BREAKING: u8 = 2;

fn cli() -> Command {
    let connector = Arg::new("connector")
        .long("connector")
        .short('c')
        .action(ArgAction::Append)
        .help("Restrict to this connector (repeatable)");
    let old = Arg::new("old")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Previously seen registry snapshot (JSON)");
    let new = Arg::new("new")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Current registry snapshot (JSON)");
    let store = Arg::new("store")
        .long("store")
        .value_parser(value_parser!(PathBuf))
        .help("Migration store file (overrides the config file)");

    Command::new("compat-sync")
        .version(compat_sync::VERSION)
        .about("Connector schema diffing and migration sync")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML config file"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Output as JSON"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::Count)
                .help("Increase log verbosity"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(
            Command::new("hash")
                .about("Print per-connector schema fingerprints")
                .arg(
                    Arg::new("snapshot")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Registry snapshot (JSON)"),
                )
                .arg(connector.clone()),
        )
        .subcommand(
            Command::new("diff")
                .about("Show schema changes between two snapshots")
                .arg(old.clone())
                .arg(new.clone())
                .arg(connector.clone()),
        )
        .subcommand(
            Command::new("sync")
                .about("Record migrations for breaking changes in the store")
                .arg(old)
                .arg(new)
                .arg(connector)
                .arg(store.clone())
                .arg(
                    Arg::new("yes")
                        .long("yes")
                        .short('y')
                        .action(ArgAction::SetTrue)
                        .help("Apply without asking for confirmation"),
                ),
        )
        .subcommand(
            Command::new("show")
                .about("Print the stored migration set")
                .arg(store),
        )
}

fn init_tracing(verbosity: u8, json: bool) {
    let default = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn load_config(matches: &ArgMatches) -> anyhow::Result<SyncConfig> {
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => SyncConfig::from_path(path)?,
        None => SyncConfig::default(),
    };
    if let Some(store) = matches.try_get_one::<PathBuf>("store").ok().flatten() {
        config = config.with_store(store.clone());
    }
    if let Some(connectors) = matches.try_get_many::<String>("connector").ok().flatten() {
        config = config.with_connectors(connectors.cloned());
    }
    Ok(config)
}

fn load_snapshot(matches: &ArgMatches, id: &str) -> anyhow::Result<RegistrySnapshot> {
    let path = matches
        .get_one::<PathBuf>(id)
        .with_context(|| format!("missing <{id}> argument"))?;
    RegistrySnapshot::from_path(path).with_context(|| format!("loading {}", path.display()))
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn confirm_on_stdin(diff: &DiffResult) -> bool {
    let breaking = diff.breaking_changes().count();
    eprint!("Record migrations for {breaking} breaking change(s)? [y/N] ");
    let _ = std::io::stderr().flush();
    let mut answer = String::new();
    match std::io::stdin().lock().read_line(&mut answer) {
        Ok(_) => matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
        Err(_) => false,
    }
}

fn run_hash(matches: &ArgMatches, config: &SyncConfig, json_out: bool) -> anyhow::Result<ExitCode> {
    let snapshot = load_snapshot(matches, "snapshot")?;
    let mut hashes = schema_hashes(&snapshot);
    if let Some(only) = config.connector_filter() {
        hashes.retain(|name, _| only.contains(&name.as_str()));
    }

    if json_out {
        print_json(&hashes)?;
    } else {
        for (connector, hash) in &hashes {
            println!("{hash}  {connector}");
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn run_diff(matches: &ArgMatches, config: &SyncConfig, json_out: bool) -> anyhow::Result<ExitCode> {
    let old = load_snapshot(matches, "old")?;
    let new = load_snapshot(matches, "new")?;
    let diff = diff_registries(&old, &new, config.connector_filter().as_deref());

    if json_out {
        print_json(&json!({"changes": diff, "summary": diff.summary()}))?;
    } else {
        println!("{diff}");
    }

    Ok(if diff.has_breaking() {
        ExitCode::from(EXIT_BREAKING)
    } else {
        ExitCode::SUCCESS
    })
}

fn run_sync(matches: &ArgMatches, config: &SyncConfig, json_out: bool) -> anyhow::Result<ExitCode> {
    let old = load_snapshot(matches, "old")?;
    let new = load_snapshot(matches, "new")?;
    let assume_yes = matches.get_flag("yes");

    let plan = plan_sync(&old, &new, config.connector_filter().as_deref());
    if !json_out {
        for connector in plan.unchanged() {
            println!("unchanged  {connector}");
        }
        for connector in plan.added_connectors() {
            println!("added      {connector}");
        }
        for connector in plan.removed_connectors() {
            println!("removed    {connector}");
        }
        if !plan.diff().is_empty() {
            println!("{}", plan.diff());
        }
    }

    let store = MigrationStore::new(&config.store);
    let report = plan
        .apply(&store, |diff| assume_yes || confirm_on_stdin(diff))
        .with_context(|| format!("syncing into {}", config.store.display()))?;

    if json_out {
        print_json(&report)?;
    } else {
        match report.stored {
            Some(counts) => println!(
                "stored {} connector(s): {} removed tool(s), {} ignored param(s), {} default(s), {} type change(s)",
                counts.connectors,
                counts.deprecated_tools,
                counts.deprecated_params,
                counts.param_defaults,
                counts.type_coercions
            ),
            None => println!("store untouched ({:?})", report.outcome),
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn run_show(config: &SyncConfig, json_out: bool) -> anyhow::Result<ExitCode> {
    let store = MigrationStore::new(&config.store);
    let Some(stored) = store.load()? else {
        println!("no migrations stored at {}", config.store.display());
        return Ok(ExitCode::SUCCESS);
    };

    if json_out {
        print_json(&stored.set)?;
        return Ok(ExitCode::SUCCESS);
    }

    println!("{} ({})", config.store.display(), stored.fingerprint);
    for (name, connector) in &stored.set.connectors {
        println!("{name}");
        for (tool, record) in &connector.deprecated_tools {
            println!("  {tool}: removed -> {}", record.action_id);
        }
        for (tool, shims) in &connector.tools {
            for param in shims.deprecated_params.keys() {
                println!("  {tool}.{param}: ignored");
            }
            for (param, default) in &shims.param_defaults {
                println!("  {tool}.{param}: default {}", default.default);
            }
            for (param, coercion) in &shims.type_coercions {
                println!("  {tool}.{param}: {} -> {}", coercion.from, coercion.to);
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn run(matches: &ArgMatches) -> anyhow::Result<ExitCode> {
    let Some((command, sub)) = matches.subcommand() else {
        anyhow::bail!("no command given");
    };
    let config = load_config(sub)?;
    let json_out = sub.get_flag("json");
    tracing::debug!(command, store = %config.store.display(), "starting");

    match command {
        "hash" => run_hash(sub, &config, json_out),
        "diff" => run_diff(sub, &config, json_out),
        "sync" => run_sync(sub, &config, json_out),
        "show" => run_show(&config, json_out),
        other => anyhow::bail!("unknown command {other}"),
    }
}

/// The single stderr line a failed run ends with
fn error_line(err: &anyhow::Error) -> String {
    format!("error: {err:#}")
}

fn main() -> ExitCode {
    let matches = cli().get_matches();
    let (verbosity, log_json) = match matches.subcommand() {
        Some((_, sub)) => (sub.get_count("verbose"), sub.get_flag("log-json")),
        None => (matches.get_count("verbose"), matches.get_flag("log-json")),
    };
    init_tracing(verbosity, log_json);

    match run(&matches) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{}", error_line(&err));
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        cli().debug_assert();
    }

    #[test]
    fn error_line_carries_the_context_chain_once() {
        let err = anyhow::anyhow!("store locked").context("syncing into migrations.json");
        let line = error_line(&err);
        assert_eq!(line, "error: syncing into migrations.json: store locked");
        assert_eq!(line.matches("store locked").count(), 1);
    }

    #[test]
    fn global_flags_reach_subcommands() {
        let matches = cli()
            .try_get_matches_from(["compat-sync", "show", "--json", "-vv", "--store", "m.json"])
            .unwrap();
        let (command, sub) = matches.subcommand().unwrap();
        assert_eq!(command, "show");
        assert!(sub.get_flag("json"));
        assert_eq!(sub.get_count("verbose"), 2);
        let config = load_config(sub).unwrap();
        assert_eq!(config.store, PathBuf::from("m.json"));
    }
}
