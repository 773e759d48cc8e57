//! CLI command handling
//!
//! Loads collections, wires the cancel token to Ctrl-C, and formats output.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use colored::Colorize;

use crate::commands::{Commands, PluginCommands};
use crate::common::{Config, Error, Result};
use crate::discovery::{self, installer, resolver};
use crate::model::{Collection, TestResult};
use crate::plugin::builtin::EnvValueProvider;
use crate::plugin::{DispatchOptions, PluginRegistry};
use crate::runner::predictor::INDETERMINATE;
use crate::runner::{count_tests, RunReport, Runner};

/// Dispatch a CLI command
pub async fn dispatch(command: Commands) -> Result<()> {
    let config = Config::load()?;

    match command {
        Commands::Run {
            collection,
            vars,
            json,
        } => run_collection(&config, &collection, &vars, json).await,

        Commands::Count { collection } => {
            let collection = load_collection(&collection)?;
            let registry = base_registry();
            match count_tests(&collection, &registry) {
                INDETERMINATE => println!("indeterminate"),
                n => println!("{n}"),
            }
            Ok(())
        }

        Commands::Plugins(plugin_command) => match plugin_command {
            PluginCommands::List { json } => list_plugins(&config, json),
            PluginCommands::Resolve { collection } => resolve_plugins(&config, &collection),
            PluginCommands::Install { collection } => {
                install_plugins(&config, &collection).await
            }
        },
    }
}

async fn run_collection(
    config: &Config,
    path: &Path,
    var_args: &[String],
    json: bool,
) -> Result<()> {
    let collection = load_collection(path)?;
    let globals = parse_vars(var_args)?;
    let registry = Arc::new(base_registry());
    ensure_protocol_registered(&registry, &collection.protocol)?;

    let predicted = count_tests(&collection, &registry);
    if predicted == INDETERMINATE {
        tracing::warn!(target: "quiver::cli", "expected test count is indeterminate");
    }

    println!(
        "\n{} {}",
        "Running:".blue().bold(),
        collection.name.white().bold()
    );

    let options = DispatchOptions {
        timeout_secs: Some(config.timeouts.request_secs),
    };
    let mut runner = Runner::new(Arc::clone(&registry)).with_options(options);
    if !json {
        runner = runner.with_on_result(Arc::new(print_result));
    }

    // Ctrl-C triggers cooperative cancellation; in-flight work finishes,
    // remaining tests are recorded as skipped.
    let cancel = runner.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let report = runner.run(&collection, &globals).await?;

    if json {
        print_json_report(&report, predicted)?;
    } else {
        print_report(&report, predicted);
    }

    let failed = report.failed();
    if failed > 0 {
        return Err(Error::TestsFailed(failed));
    }
    Ok(())
}

fn list_plugins(config: &Config, json: bool) -> Result<()> {
    let workspace = std::env::current_dir()?;
    let sources = discovery::enumerate_sources(config, &workspace);
    let discovered = discovery::discover(&sources);

    if json {
        let entries: Vec<serde_json::Value> = discovered
            .iter()
            .map(|p| {
                serde_json::json!({
                    "name": p.name,
                    "version": p.version.to_string(),
                    "source": p.source.to_string(),
                    "path": p.path,
                    "capabilities": p.capability_keys(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if discovered.is_empty() {
        println!("No plugins discovered");
        return Ok(());
    }
    for plugin in &discovered {
        println!(
            "  {:24} {:10} [{}] {}",
            plugin.name.white().bold(),
            plugin.version.to_string(),
            plugin.source,
            plugin.capability_keys().join(", ").dimmed()
        );
    }
    Ok(())
}

fn resolve_plugins(config: &Config, path: &Path) -> Result<()> {
    let collection = load_collection(path)?;
    let workspace = std::env::current_dir()?;
    let sources = discovery::enumerate_sources(config, &workspace);
    let discovered = discovery::discover(&sources);
    let winners = resolver::resolve(&discovered);

    for capability in resolver::collection_capabilities(&collection) {
        let key = capability.key();
        match winners.get(&key) {
            Some(&index) => {
                let plugin = &discovered[index];
                println!(
                    "  {} {key} -> {} {} [{}]",
                    "✓".green(),
                    plugin.name,
                    plugin.version,
                    plugin.source
                );
            }
            None => {
                println!(
                    "  {} {key} -> missing (install {})",
                    "✗".red(),
                    capability.package_name()
                );
            }
        }
    }
    Ok(())
}

async fn install_plugins(config: &Config, path: &Path) -> Result<()> {
    let collection = load_collection(path)?;
    let workspace = std::env::current_dir()?;
    let sources = discovery::enumerate_sources(config, &workspace);
    let discovered = discovery::discover(&sources);
    let winners = resolver::resolve(&discovered);
    let satisfied: Vec<String> = winners.keys().cloned().collect();

    let required = resolver::collection_capabilities(&collection);
    let missing = resolver::missing_capabilities(&required, &satisfied);
    let packages = resolver::missing_packages(&missing);

    if packages.is_empty() {
        println!("All capabilities satisfied, nothing to install");
        return Ok(());
    }

    let plugin_dir = crate::common::paths::user_plugin_dir();
    std::fs::create_dir_all(&plugin_dir)?;
    let outcome = installer::install_missing(&packages, &config.install, &plugin_dir).await;

    for package in &outcome.installed {
        println!("  {} {}", "✓".green(), package);
    }
    for package in &outcome.skipped {
        println!("  {} {} (already present)", "-".dimmed(), package);
    }
    for (package, reason) in &outcome.failed {
        println!("  {} {}: {}", "✗".red(), package, reason);
    }
    Ok(())
}

/// Build the registry of plugins that ship with the runner itself
fn base_registry() -> PluginRegistry {
    let mut registry = PluginRegistry::new();
    registry.register_value_provider(Arc::new(EnvValueProvider));
    registry
}

/// Fail early with a pointer at the library API when no protocol plugin
/// serves the collection's protocol. The binary ships only built-in value
/// providers; protocol plugins are registered by embedders.
fn ensure_protocol_registered(registry: &PluginRegistry, protocol: &str) -> Result<()> {
    if registry.protocol(protocol).is_none() {
        return Err(Error::Config(format!(
            "no protocol plugin registered for '{protocol}'. The quiver binary ships \
             only built-in value providers; register a protocol plugin through the \
             library API (quiver::PluginRegistry) to execute collections"
        )));
    }
    Ok(())
}

fn load_collection(path: &Path) -> Result<Collection> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
        path: path.display().to_string(),
        error: e.to_string(),
    })?;

    if path.extension().map(|e| e == "json").unwrap_or(false) {
        Ok(serde_json::from_str(&content)?)
    } else {
        Ok(serde_yaml::from_str(&content)?)
    }
}

fn parse_vars(var_args: &[String]) -> Result<HashMap<String, String>> {
    let mut vars = HashMap::new();
    for arg in var_args {
        let (name, value) = arg.split_once('=').ok_or_else(|| {
            Error::Config(format!("Invalid --var '{arg}', expected NAME=VALUE"))
        })?;
        vars.insert(name.to_string(), value.to_string());
    }
    Ok(vars)
}

fn print_result(result: &TestResult) {
    if result.passed {
        println!("  {} {}", "✓".green(), result.name);
    } else if result.skipped {
        println!(
            "  {} {} ({})",
            "-".yellow(),
            result.name.dimmed(),
            result.error.as_deref().unwrap_or("skipped").dimmed()
        );
    } else {
        println!(
            "  {} {}: {}",
            "✗".red(),
            result.name,
            result.error.as_deref().unwrap_or("failed")
        );
    }
}

fn print_report(report: &RunReport, predicted: i64) {
    println!();
    println!(
        "{} {} passed, {} failed, {} skipped ({} requests in {:.1?})",
        status_mark(report),
        report.passed(),
        report.failed(),
        report.skipped(),
        report.requests_executed,
        report.duration
    );
    if predicted >= 0 && predicted as usize != report.results.len() {
        println!(
            "{} expected {} test(s), recorded {}",
            "warning:".yellow().bold(),
            predicted,
            report.results.len()
        );
    }
    println!("Run {}", report.state.to_string().bold());
}

fn status_mark(report: &RunReport) -> String {
    if report.failed() == 0 {
        "✓".green().bold().to_string()
    } else {
        "✗".red().bold().to_string()
    }
}

fn print_json_report(report: &RunReport, predicted: i64) -> Result<()> {
    let value = serde_json::json!({
        "state": report.state.to_string(),
        "predicted": predicted,
        "passed": report.passed(),
        "failed": report.failed(),
        "skipped": report.skipped(),
        "requests_executed": report.requests_executed,
        "duration_ms": report.duration.as_millis() as u64,
        "results": report.results,
    });
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
