//! The environment x suite run matrix
//!
//! Runs are strictly sequential: environments in configured order on the
//! outside, suites in configured order inside. Only configuration and
//! selection problems stop a run, and they are detected before any suite
//! executes.

use colored::Colorize;

use crate::common::Result;
use crate::config::{lookup, ConfigStore, EnvironmentConfig, Named, SuiteConfig};
use crate::executor::SuiteExecutor;
use crate::notify::{Delivery, Notifier};

/// Which environments and suites to run; `None` or empty means all
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub environments: Option<Vec<String>>,
    pub suites: Option<Vec<String>>,
}

impl Selection {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new(environments: Vec<String>, suites: Vec<String>) -> Self {
        Self {
            environments: (!environments.is_empty()).then_some(environments),
            suites: (!suites.is_empty()).then_some(suites),
        }
    }
}

/// Outcome of one (environment, suite) run
#[derive(Debug, Clone)]
pub struct SuiteResult {
    pub environment: String,
    pub suite: String,
    pub failed: bool,
    pub failure_count: u64,
    /// Summary line reported by the framework
    pub summary_line: Option<String>,
    pub error: Option<String>,
    /// Present only for failed runs
    pub delivery: Option<Delivery>,
}

/// Outcome of a whole matrix run
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub results: Vec<SuiteResult>,
}

impl RunReport {
    pub fn failed(&self) -> impl Iterator<Item = &SuiteResult> {
        self.results.iter().filter(|r| r.failed)
    }

    pub fn all_passed(&self) -> bool {
        self.failed().next().is_none()
    }
}

/// Drives the executor and notifier over the configured matrix
pub struct Orchestrator {
    store: ConfigStore,
    executor: SuiteExecutor,
    notifier: Notifier,
}

impl Orchestrator {
    pub fn new(store: ConfigStore, executor: SuiteExecutor, notifier: Notifier) -> Self {
        Self {
            store,
            executor,
            notifier,
        }
    }

    /// Resolve a selection against the configuration, in configured order
    ///
    /// Fails on the first unknown name.
    pub fn resolve(
        &self,
        selection: &Selection,
    ) -> Result<(Vec<&EnvironmentConfig>, Vec<&SuiteConfig>)> {
        let environments = select(
            self.store.environments(),
            "environment",
            selection.environments.as_deref(),
        )?;
        let suites = select(self.store.suites(), "suite", selection.suites.as_deref())?;
        Ok((environments, suites))
    }

    /// Run every selected suite against every selected environment
    pub async fn run(&self, selection: &Selection, verbose: bool) -> Result<RunReport> {
        let (environments, suites) = self.resolve(selection)?;

        tracing::info!(
            environments = environments.len(),
            suites = suites.len(),
            "Starting run"
        );

        let mut report = RunReport::default();
        for environment in &environments {
            for suite in &suites {
                report
                    .results
                    .push(self.run_one(environment, suite, verbose).await);
            }
        }

        tracing::info!(
            runs = report.results.len(),
            failed = report.failed().count(),
            "Run complete"
        );
        Ok(report)
    }

    async fn run_one(
        &self,
        environment: &EnvironmentConfig,
        suite: &SuiteConfig,
        verbose: bool,
    ) -> SuiteResult {
        println!(
            "{} {} {}",
            environment.name.white().bold(),
            "..".dimmed(),
            suite.name.white().bold()
        );

        let output = self.executor.run_suite(environment, suite, verbose).await;
        let failed = output.failed();

        let delivery = if failed {
            println!("  {} {}", "✗".red(), "Tests failed.".red());
            Some(self.notifier.notify(environment, suite, &output).await)
        } else {
            println!("  {} {}", "✓".green(), "Tests passed.".green());
            None
        };

        SuiteResult {
            environment: environment.name.clone(),
            suite: suite.name.clone(),
            failed,
            failure_count: output.failure_count(),
            summary_line: output
                .results
                .as_ref()
                .and_then(|r| r.summary_line.clone()),
            error: output.error.as_ref().map(|e| e.message.clone()),
            delivery,
        }
    }
}

fn select<'a, T: Named>(
    items: &'a [T],
    kind: &'static str,
    names: Option<&[String]>,
) -> Result<Vec<&'a T>> {
    let Some(names) = names else {
        return Ok(items.iter().collect());
    };

    for name in names {
        lookup(items, kind, name)?;
    }

    Ok(items
        .iter()
        .filter(|item| names.iter().any(|n| n == item.name()))
        .collect())
}
