//! CLI command handling
//!
//! Loads configuration, wires the executor and notifier, and formats output.

use colored::Colorize;

use crate::commands::{Commands, ConfigArgs};
use crate::common::paths::{resolve_config_file, DEFAULT_ENVIRONMENTS_FILE, DEFAULT_SUITES_FILE};
use crate::common::{Error, Result, Settings};
use crate::config::{ConfigStore, EnvironmentConfig, SuiteConfig};
use crate::executor::{CommandFramework, SuiteExecutor};
use crate::notify::{is_pager_relay_address, ChannelStatus, Notifier};
use crate::orchestrator::{Orchestrator, RunReport, Selection};

/// Dispatch a CLI command
pub async fn dispatch(command: Commands) -> Result<()> {
    match command {
        Commands::Run {
            environments,
            suites,
            verbose,
            config,
        } => {
            let (settings, store) = load(&config)?;
            let executor = SuiteExecutor::from_settings(&settings.framework);
            let notifier = Notifier::from_settings(&settings.mail, &settings.pagerduty)?;
            let orchestrator = Orchestrator::new(store, executor, notifier);

            let selection = Selection::new(environments, suites);
            let report = orchestrator.run(&selection, verbose).await?;
            print_report(&report);

            Ok(())
        }

        Commands::List { config } => {
            let (_, store) = load(&config)?;

            println!("{}", "Environments:".cyan());
            for env in store.environments() {
                print_environment(env);
            }

            println!("\n{}", "Suites:".cyan());
            for suite in store.suites() {
                print_suite(suite);
            }

            Ok(())
        }

        Commands::Check { config } => {
            let (settings, store) = load(&config)?;
            let problems = check(&settings, &store);
            if problems == 0 {
                println!("\n{} {}", "✓".green().bold(), "Configuration OK".green().bold());
                Ok(())
            } else {
                Err(Error::Config(format!("{} problem(s) found", problems)))
            }
        }
    }
}

/// Load runner settings and environment/suite definitions
fn load(args: &ConfigArgs) -> Result<(Settings, ConfigStore)> {
    let settings = Settings::load(args.config.as_deref())?;

    let environments = resolve_config_file(
        args.environments.clone(),
        "SCOUT_ENVIRONMENTS",
        DEFAULT_ENVIRONMENTS_FILE,
    );
    let suites = resolve_config_file(args.suites.clone(), "SCOUT_SUITES", DEFAULT_SUITES_FILE);

    tracing::debug!(
        environments = %environments.display(),
        suites = %suites.display(),
        "Loading configuration"
    );
    let store = ConfigStore::load(&environments, &suites)?;

    Ok((settings, store))
}

/// Report everything that would make a run fail for configuration reasons
fn check(settings: &Settings, store: &ConfigStore) -> usize {
    let mut problems = 0;

    println!("{}", "Framework:".cyan());
    match CommandFramework::from_settings(&settings.framework).program() {
        Ok(path) => println!("  {} {}", "✓".green(), path.display()),
        Err(e) => {
            problems += 1;
            println!("  {} {}", "✗".red(), e);
        }
    }

    println!("\n{}", "Suites:".cyan());
    let executor = SuiteExecutor::from_settings(&settings.framework);
    for suite in store.suites() {
        match executor.resolve_files(suite) {
            Ok(files) => println!(
                "  {} {} ({} files)",
                "✓".green(),
                suite.name,
                files.len()
            ),
            Err(e) => {
                problems += 1;
                println!("  {} {}: {}", "✗".red(), suite.name, e);
            }
        }
    }

    println!("\n{}", "Alerting:".cyan());
    if needs_smtp(store) && settings.mail.smtp_host.is_none() {
        problems += 1;
        println!(
            "  {} email alerts are enabled but no SMTP host is configured",
            "✗".red()
        );
    } else {
        println!("  {} email transport", "✓".green());
    }

    for env in store.environments().iter().filter(|e| e.pagerduty_enabled) {
        let unkeyed: Vec<&str> = store
            .suites()
            .iter()
            .filter(|s| s.paging_key(env).is_none())
            .map(|s| s.name.as_str())
            .collect();
        if !unkeyed.is_empty() {
            // Not an error: those suites simply never page
            println!(
                "  {} {} pages, but these suites have no paging key: {}",
                "!".yellow(),
                env.name,
                unkeyed.join(", ")
            );
        }
    }

    problems
}

/// Whether any environment/suite pair can alert by email
///
/// Counts alert emails and relay pages, including relay addresses a suite
/// inherits from its environment's paging key.
fn needs_smtp(store: &ConfigStore) -> bool {
    store.environments().iter().any(|env| {
        env.email_enabled
            || (env.pagerduty_enabled
                && store
                    .suites()
                    .iter()
                    .any(|s| s.paging_key(env).is_some_and(is_pager_relay_address)))
    })
}

fn flag(enabled: bool) -> colored::ColoredString {
    if enabled {
        "on".green()
    } else {
        "off".dimmed()
    }
}

fn print_environment(env: &EnvironmentConfig) {
    println!(
        "  {}  email {}  paging {}",
        env.name.white().bold(),
        flag(env.email_enabled),
        flag(env.pagerduty_enabled)
    );
    if !env.extra.is_empty() {
        let keys: Vec<&str> = env.extra.keys().map(String::as_str).collect();
        println!("    {}", keys.join(", ").dimmed());
    }
}

fn print_suite(suite: &SuiteConfig) {
    println!("  {}", suite.name.white().bold());
    if let Some(email) = &suite.email {
        println!("    email: {}", email);
    }
    if let Some(key) = &suite.pagerduty_service_key {
        let mode = if is_pager_relay_address(key) {
            "email relay"
        } else {
            "api"
        };
        println!("    paging: {} ({})", key, mode.dimmed());
    }
    if let Some(dir) = &suite.dir {
        println!("    dir: {}", dir.display());
    }
}

fn print_report(report: &RunReport) {
    println!("\n{}", "Summary:".cyan());

    if report.results.is_empty() {
        println!("  Nothing to run");
        return;
    }

    for result in &report.results {
        let mark = if result.failed {
            "FAIL".red().bold()
        } else {
            "PASS".green().bold()
        };
        let detail = result
            .error
            .clone()
            .or_else(|| result.summary_line.clone())
            .unwrap_or_default();
        println!(
            "  {}  {} / {}  {}",
            mark,
            result.environment,
            result.suite,
            detail.dimmed()
        );

        if let Some(delivery) = &result.delivery {
            for (channel, status) in [("email", &delivery.email), ("paging", &delivery.paging)] {
                match status {
                    ChannelStatus::Skipped => {}
                    ChannelStatus::Sent => println!("        {} {} sent", "→".dimmed(), channel),
                    ChannelStatus::Failed(e) => {
                        println!("        {} {} failed: {}", "✗".red(), channel, e)
                    }
                }
            }
        }
    }

    let failed = report.failed().count();
    if failed == 0 {
        println!("\n{} {}\n", "✓".green().bold(), "All suites passed".green().bold());
    } else {
        println!(
            "\n{} {}\n",
            "✗".red().bold(),
            format!("{} of {} runs failed", failed, report.results.len())
                .red()
                .bold()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_needs_smtp_for_email_alerts() {
        let store =
            ConfigStore::from_yaml("staging:\n  email_enabled: true\n", "smoke: {}\n").unwrap();
        assert!(needs_smtp(&store));
    }

    #[test]
    fn test_needs_smtp_for_inherited_relay_key() {
        let store = ConfigStore::from_yaml(
            "prod:\n  pagerduty_enabled: true\n  pagerduty_service_key: ops@acme.pagerduty.com\n",
            "api: {}\n",
        )
        .unwrap();
        assert!(needs_smtp(&store));
    }

    #[test]
    fn test_api_keys_and_disabled_paging_need_no_smtp() {
        let store = ConfigStore::from_yaml(
            "prod:\n  pagerduty_enabled: true\n  pagerduty_service_key: XYZ123\n\
             qa:\n  pagerduty_service_key: ops@acme.pagerduty.com\n",
            "api: {}\n",
        )
        .unwrap();
        assert!(!needs_smtp(&store));
    }

    #[test]
    fn test_needs_smtp_for_suite_relay_key() {
        let store = ConfigStore::from_yaml(
            "prod:\n  pagerduty_enabled: true\n  pagerduty_service_key: XYZ123\n",
            "api: {}\nsmoke:\n  pagerduty_service_key: ops@acme.pagerduty.com\n",
        )
        .unwrap();
        assert!(needs_smtp(&store));
    }
}
