//! Suite execution
//!
//! Runs one suite against one environment and turns whatever happens into a
//! [`RunOutput`]. Execution errors never escape [`SuiteExecutor::run_suite`]:
//! a suite that cannot load is reported the same way as a suite with failing
//! examples, so the caller's loop over the matrix keeps going.

mod framework;
mod report;

pub use framework::{CommandFramework, Invocation, TestFramework};
pub use report::{ReportFormat, ReportSink, ReportSinks, Reports, RunSummary, SummaryCounts};

use globset::{Glob, GlobMatcher};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;

use crate::capture::{capture_output, Console};
use crate::common::error::error_chain;
use crate::common::settings::FrameworkSettings;
use crate::common::{Error, Result};
use crate::config::{EnvironmentConfig, SuiteConfig};

/// Diagnostic payload of a run that errored
#[derive(Debug, Clone, PartialEq)]
pub struct RunError {
    pub message: String,
    /// The error followed by its causes, one per line
    pub backtrace: Vec<String>,
}

impl RunError {
    pub fn from_error(error: &Error) -> Self {
        let mut backtrace = vec![error.to_string()];
        backtrace.extend(error_chain(error));
        Self {
            message: error.to_string(),
            backtrace,
        }
    }
}

/// Everything captured from one (environment, suite) run
#[derive(Debug, Clone, Default)]
pub struct RunOutput {
    /// Framework stdout, when it was captured rather than streamed
    pub stdout: Option<String>,
    /// Plain-text report
    pub text: String,
    /// HTML report
    pub html: String,
    /// Structured summary, if the framework produced a readable one
    pub results: Option<RunSummary>,
    pub error: Option<RunError>,
}

impl RunOutput {
    /// A run failed if it errored, has no summary, or the summary has failures
    pub fn failed(&self) -> bool {
        if self.error.is_some() {
            return true;
        }
        self.results.as_ref().map_or(true, RunSummary::failed)
    }

    pub fn failure_count(&self) -> u64 {
        self.results.as_ref().map_or(0, RunSummary::failure_count)
    }

    /// Alert body: the text report followed by the stack trace
    pub fn alert_body(&self) -> String {
        let backtrace = self
            .error
            .as_ref()
            .map(|e| e.backtrace.join("\n"))
            .unwrap_or_default();
        [self.text.as_str(), backtrace.as_str()].join("\n")
    }
}

/// Runs suites through a test framework
pub struct SuiteExecutor {
    framework: Arc<dyn TestFramework>,
    suite_root: PathBuf,
    default_pattern: String,
}

impl SuiteExecutor {
    pub fn new(
        framework: Arc<dyn TestFramework>,
        suite_root: impl Into<PathBuf>,
        default_pattern: impl Into<String>,
    ) -> Self {
        Self {
            framework,
            suite_root: suite_root.into(),
            default_pattern: default_pattern.into(),
        }
    }

    /// Executor invoking the configured framework command
    pub fn from_settings(settings: &FrameworkSettings) -> Self {
        Self::new(
            Arc::new(CommandFramework::from_settings(settings)),
            settings.suite_dir.clone(),
            settings.pattern.clone(),
        )
    }

    /// Test files for a suite: the directory's files matching the glob, sorted
    pub fn resolve_files(&self, suite: &SuiteConfig) -> Result<Vec<PathBuf>> {
        let dir = suite.test_dir(&self.suite_root);
        let pattern = suite.pattern.as_deref().unwrap_or(&self.default_pattern);
        let matcher = compile_pattern(pattern)?;

        let entries = std::fs::read_dir(&dir).map_err(|e| {
            Error::SuiteExecution(format!(
                "Cannot read test directory '{}': {}",
                dir.display(),
                e
            ))
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let matches = path
                .file_name()
                .is_some_and(|name| matcher.is_match(Path::new(name)));
            if matches && path.is_file() {
                files.push(path);
            }
        }
        files.sort();

        if files.is_empty() {
            return Err(Error::SuiteExecution(format!(
                "No test files matching '{}' in '{}'",
                pattern,
                dir.display()
            )));
        }
        Ok(files)
    }

    /// Run one suite against one environment
    ///
    /// With `verbose`, framework output streams to stdout; otherwise it is
    /// captured into [`RunOutput::stdout`]. All report sinks are closed
    /// before this returns.
    pub async fn run_suite(
        &self,
        environment: &EnvironmentConfig,
        suite: &SuiteConfig,
        verbose: bool,
    ) -> RunOutput {
        let sinks = match ReportSinks::create() {
            Ok(sinks) => sinks,
            Err(e) => return errored(&environment.name, &suite.name, e, None, Reports::default()),
        };
        let console = Console::new();

        let (result, stdout) = if verbose {
            (self.execute(environment, suite, &sinks, &console).await, None)
        } else {
            let sinks = &sinks;
            let (result, captured) = capture_output(&console, |out| async move {
                self.execute(environment, suite, sinks, &out).await
            })
            .await;
            (result, Some(captured))
        };

        let reports = sinks.close_all();

        match result.and_then(|()| RunSummary::parse(&reports.json)) {
            Ok(summary) => {
                tracing::debug!(
                    env = %environment.name,
                    suite = %suite.name,
                    examples = summary.counts.example_count,
                    failures = summary.failure_count(),
                    "Suite finished"
                );
                RunOutput {
                    stdout,
                    text: reports.text,
                    html: reports.html,
                    results: Some(summary),
                    error: None,
                }
            }
            Err(e) => errored(&environment.name, &suite.name, e, stdout, reports),
        }
    }

    async fn execute(
        &self,
        environment: &EnvironmentConfig,
        suite: &SuiteConfig,
        sinks: &ReportSinks,
        console: &Console,
    ) -> Result<()> {
        let files = self.resolve_files(suite)?;
        tracing::debug!(suite = %suite.name, files = files.len(), "Resolved test files");

        for command in &suite.setup {
            run_setup(command, environment, suite, console).await?;
        }

        self.framework
            .run(Invocation {
                environment,
                suite,
                files: &files,
                reports: sinks,
                console,
            })
            .await
    }
}

fn errored(
    environment: &str,
    suite: &str,
    error: Error,
    stdout: Option<String>,
    reports: Reports,
) -> RunOutput {
    tracing::error!(env = environment, suite, error = %error, "Exception while running suite");
    RunOutput {
        stdout,
        results: RunSummary::parse(&reports.json).ok(),
        text: reports.text,
        html: reports.html,
        error: Some(RunError::from_error(&error)),
    }
}

fn compile_pattern(pattern: &str) -> Result<GlobMatcher> {
    Glob::new(pattern)
        .map(|glob| glob.compile_matcher())
        .map_err(|e| Error::Config(format!("Invalid test file pattern '{}': {}", pattern, e)))
}

async fn run_setup(
    command: &str,
    environment: &EnvironmentConfig,
    suite: &SuiteConfig,
    console: &Console,
) -> Result<()> {
    tracing::debug!(command, "Running setup command");

    let mut child = Command::new("sh")
        .arg("-c")
        .arg(command)
        .env("SCOUT_ENVIRONMENT", &environment.name)
        .env("SCOUT_SUITE", &suite.name)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| Error::SuiteExecution(format!("Setup command failed to execute: {}", e)))?;

    let status = framework::forward_child(&mut child, console).await?;
    if !status.success() {
        return Err(Error::SuiteExecution(format!(
            "Setup command '{}' failed with exit code {:?}",
            command,
            status.code()
        )));
    }
    Ok(())
}
