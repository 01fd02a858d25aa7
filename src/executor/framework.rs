//! Test framework invocation
//!
//! The framework is reached through the [`TestFramework`] trait. Everything a
//! run needs (target environment, report sinks, stdout) is passed in the
//! [`Invocation`], so no process-wide state is touched.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

use super::report::{ReportSink, ReportSinks};
use crate::capture::Console;
use crate::common::settings::FrameworkSettings;
use crate::common::{Error, Result};
use crate::config::{EnvironmentConfig, SuiteConfig};

/// Everything one framework run needs
pub struct Invocation<'a> {
    pub environment: &'a EnvironmentConfig,
    pub suite: &'a SuiteConfig,
    /// Resolved test files, sorted
    pub files: &'a [PathBuf],
    pub reports: &'a ReportSinks,
    /// Where the framework's stdout goes
    pub console: &'a Console,
}

/// An external test framework
#[async_trait]
pub trait TestFramework: Send + Sync {
    /// Run the given files, writing reports into the invocation's sinks
    ///
    /// Returning `Ok` only means the framework ran to completion; whether
    /// tests failed is read from the JSON report.
    async fn run(&self, invocation: Invocation<'_>) -> Result<()>;
}

/// A framework invoked as a child process
#[derive(Debug, Clone)]
pub struct CommandFramework {
    command: String,
    args: Vec<String>,
}

impl CommandFramework {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }

    pub fn from_settings(settings: &FrameworkSettings) -> Self {
        Self::new(settings.command.clone(), settings.args.clone())
    }

    /// Expand the argument template for one run
    pub fn expand_args(&self, files: &[PathBuf], reports: &ReportSinks) -> Vec<String> {
        let mut args = Vec::with_capacity(self.args.len() + files.len());
        for arg in &self.args {
            if arg == "{files}" {
                args.extend(files.iter().map(|f| f.display().to_string()));
                continue;
            }
            let expanded = reports
                .iter()
                .fold(arg.clone(), |acc, sink| substitute(acc, sink));
            args.push(expanded);
        }
        args
    }

    /// Resolve the framework executable, searching PATH for bare names
    pub fn program(&self) -> Result<PathBuf> {
        let path = Path::new(&self.command);
        if path.components().count() > 1 {
            return Ok(path.to_path_buf());
        }
        which::which(&self.command).map_err(|_| Error::FrameworkNotFound(self.command.clone()))
    }
}

fn substitute(arg: String, sink: &ReportSink) -> String {
    let placeholder = sink.format().placeholder();
    if !arg.contains(placeholder) {
        return arg;
    }
    match sink.path() {
        Some(path) => arg.replace(placeholder, &path.display().to_string()),
        None => arg,
    }
}

#[async_trait]
impl TestFramework for CommandFramework {
    async fn run(&self, invocation: Invocation<'_>) -> Result<()> {
        let program = self.program()?;
        let args = self.expand_args(invocation.files, invocation.reports);
        let environment_json = serde_json::to_string(invocation.environment)?;

        tracing::debug!(
            program = %program.display(),
            args = ?args,
            "Invoking test framework"
        );

        let mut child = Command::new(&program)
            .args(&args)
            .env("SCOUT_ENVIRONMENT", &invocation.environment.name)
            .env("SCOUT_SUITE", &invocation.suite.name)
            .env("SCOUT_ENVIRONMENT_CONFIG", environment_json)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::SuiteExecution(format!(
                    "Failed to start '{}': {}",
                    program.display(),
                    e
                ))
            })?;

        let status = forward_child(&mut child, invocation.console).await?;
        tracing::debug!(status = %status, "Test framework exited");

        // Frameworks exit nonzero when examples fail; that is reported through
        // the JSON summary. Only a missing summary makes the exit code matter.
        if !status.success() && invocation.reports.json.path().is_some_and(|p| is_empty_file(&p)) {
            return Err(Error::SuiteExecution(format!(
                "'{}' exited with {} without writing a summary",
                self.command, status
            )));
        }

        Ok(())
    }
}

fn is_empty_file(path: &Path) -> bool {
    std::fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true)
}

/// Forward a child's stdout and stderr into the console until it exits
pub(crate) async fn forward_child(
    child: &mut tokio::process::Child,
    console: &Console,
) -> Result<std::process::ExitStatus> {
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| Error::Internal("child stdout not piped".to_string()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| Error::Internal("child stderr not piped".to_string()))?;

    let (out, err, status) = tokio::join!(
        forward_lines(stdout, console),
        forward_lines(stderr, console),
        child.wait()
    );
    out?;
    err?;
    Ok(status?)
}

/// Forward raw lines; output need not be valid UTF-8
async fn forward_lines<R>(reader: R, console: &Console) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            return Ok(());
        }
        if !line.ends_with(b"\n") {
            line.push(b'\n');
        }
        console.write(&line);
    }
}
