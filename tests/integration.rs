//! End-to-end tests for the scout run loop
//!
//! These tests drive the orchestrator with a scripted test framework and
//! recording alert channels, plus a few runs of the `scout` binary itself.

use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex};

use scout::executor::{CommandFramework, Invocation, RunSummary, TestFramework};
use scout::notify::{AlertEmail, EmailError, IncidentTrigger, Mailer, Pager, PagerError};
use scout::{ConfigStore, Error, Notifier, Orchestrator, Selection, SuiteExecutor};

const ENVIRONMENTS: &str = "\
staging:
  email_enabled: true
  pagerduty_enabled: false
prod:
  email_enabled: false
  pagerduty_enabled: true
";

const SUITES: &str = "\
smoke:
  email: team@example.com
api:
  pagerduty_service_key: XYZ123
";

/// Failure counts per (environment, suite); pairs not listed pass
struct ScriptedFramework {
    failures: Vec<(&'static str, &'static str, u64)>,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedFramework {
    fn new(failures: Vec<(&'static str, &'static str, u64)>) -> Arc<Self> {
        Arc::new(Self {
            failures,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TestFramework for ScriptedFramework {
    async fn run(&self, invocation: Invocation<'_>) -> scout::Result<()> {
        let env = invocation.environment.name.as_str();
        let suite = invocation.suite.name.as_str();
        self.calls
            .lock()
            .unwrap()
            .push((env.to_string(), suite.to_string()));

        let failures = self
            .failures
            .iter()
            .find(|(e, s, _)| *e == env && *s == suite)
            .map_or(0, |(_, _, n)| *n);

        invocation.console.write_line("Randomized with seed 1234");
        invocation
            .reports
            .text
            .write(format!("{} failures in {}", failures, suite).as_bytes())?;
        invocation.reports.html.write(b"<html>report</html>")?;
        invocation
            .reports
            .json
            .write(RunSummary::from_counts(5, failures).raw.to_string().as_bytes())
    }
}

#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<AlertEmail>>,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &AlertEmail) -> Result<(), EmailError> {
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

#[derive(Default)]
struct RecordingPager {
    triggered: Mutex<Vec<IncidentTrigger>>,
}

#[async_trait]
impl Pager for RecordingPager {
    async fn trigger(&self, incident: &IncidentTrigger) -> Result<(), PagerError> {
        self.triggered.lock().unwrap().push(incident.clone());
        Ok(())
    }
}

/// Test context with a suite tree and recording channels
struct TestContext {
    _dir: tempfile::TempDir,
    root: PathBuf,
    mailer: Arc<RecordingMailer>,
    pager: Arc<RecordingPager>,
}

impl TestContext {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let root = dir.path().join("suites");
        for suite in ["smoke", "api"] {
            fs::create_dir_all(root.join(suite)).unwrap();
            fs::write(root.join(suite).join("health_spec.rb"), "").unwrap();
            fs::write(root.join(suite).join("README.md"), "").unwrap();
        }

        Self {
            _dir: dir,
            root,
            mailer: Arc::new(RecordingMailer::default()),
            pager: Arc::new(RecordingPager::default()),
        }
    }

    fn orchestrator(&self, framework: Arc<dyn TestFramework>) -> Orchestrator {
        let store = ConfigStore::from_yaml(ENVIRONMENTS, SUITES).unwrap();
        let executor = SuiteExecutor::new(framework, &self.root, "*.rb");
        let notifier = Notifier::new(
            self.mailer.clone(),
            self.pager.clone(),
            "Scout <scout@example.com>",
            "Scout <pager@example.com>",
        );
        Orchestrator::new(store, executor, notifier)
    }

    fn emails(&self) -> Vec<AlertEmail> {
        self.mailer.sent.lock().unwrap().clone()
    }

    fn incidents(&self) -> Vec<IncidentTrigger> {
        self.pager.triggered.lock().unwrap().clone()
    }
}

fn select(environment: &str, suite: &str) -> Selection {
    Selection::new(vec![environment.to_string()], vec![suite.to_string()])
}

#[tokio::test]
async fn test_failing_suite_sends_one_email() {
    let ctx = TestContext::new();
    let framework = ScriptedFramework::new(vec![("staging", "smoke", 2)]);
    let orchestrator = ctx.orchestrator(framework.clone());

    let report = orchestrator
        .run(&select("staging", "smoke"), false)
        .await
        .unwrap();

    assert_eq!(report.results.len(), 1);
    assert!(report.results[0].failed);
    assert_eq!(report.results[0].failure_count, 2);

    let emails = ctx.emails();
    assert_eq!(emails.len(), 1);
    assert_eq!(emails[0].to, "team@example.com");
    assert_eq!(
        emails[0].subject,
        "Scout Alert: Tests failing on Smoke (Staging)"
    );
    assert_eq!(emails[0].body, "2 failures in smoke\n");
    let attachment = emails[0].attachment.as_ref().unwrap();
    assert_eq!(attachment.content, "<html>report</html>");

    assert!(ctx.incidents().is_empty());
}

#[tokio::test]
async fn test_failing_suite_in_paging_environment_triggers_incident() {
    let ctx = TestContext::new();
    let framework = ScriptedFramework::new(vec![("prod", "api", 1)]);
    let orchestrator = ctx.orchestrator(framework.clone());

    orchestrator.run(&select("prod", "api"), false).await.unwrap();

    let incidents = ctx.incidents();
    assert_eq!(incidents.len(), 1);
    assert_eq!(incidents[0].service_key, "XYZ123");
    assert_eq!(incidents[0].incident_key, "scout_prod");
    assert_eq!(incidents[0].details["summary"]["failure_count"], 1);

    // prod has email disabled
    assert!(ctx.emails().is_empty());
}

#[tokio::test]
async fn test_passing_matrix_sends_nothing() {
    let ctx = TestContext::new();
    let framework = ScriptedFramework::new(vec![]);
    let orchestrator = ctx.orchestrator(framework.clone());

    let report = orchestrator.run(&Selection::all(), false).await.unwrap();

    assert_eq!(framework.calls().len(), 4);
    assert!(report.all_passed());
    assert!(ctx.emails().is_empty());
    assert!(ctx.incidents().is_empty());
}

#[tokio::test]
async fn test_unknown_environment_runs_nothing() {
    let ctx = TestContext::new();
    let framework = ScriptedFramework::new(vec![]);
    let orchestrator = ctx.orchestrator(framework.clone());

    let err = orchestrator
        .run(&select("qa", "smoke"), false)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::UnknownName { kind: "environment", .. }));
    assert!(err.to_string().contains("qa"));
    assert!(framework.calls().is_empty());
    assert!(ctx.emails().is_empty());
}

#[tokio::test]
async fn test_missing_suite_directory_is_reported_as_failure() {
    let ctx = TestContext::new();
    fs::remove_dir_all(ctx.root.join("smoke")).unwrap();
    let framework = ScriptedFramework::new(vec![]);
    let orchestrator = ctx.orchestrator(framework.clone());

    let report = orchestrator
        .run(&select("staging", "smoke"), false)
        .await
        .unwrap();

    assert!(report.results[0].failed);
    assert!(report.results[0].error.is_some());
    assert!(framework.calls().is_empty());

    let emails = ctx.emails();
    assert_eq!(emails.len(), 1);
    assert!(emails[0].body.contains("Cannot read test directory"));
}

/// A framework script taking `{json} {txt} {html} {files}`
#[cfg(unix)]
fn script_framework(failure_count: u64) -> CommandFramework {
    let script = format!(
        r#"json="$1"; txt="$2"; html="$3"; shift 3
echo "running $# file(s) for $SCOUT_SUITE on $SCOUT_ENVIRONMENT"
for f in "$@"; do echo "$(basename "$f")"; done > "$txt"
echo "<p>$SCOUT_SUITE</p>" > "$html"
printf '{{"summary":{{"example_count":3,"failure_count":{0}}},"summary_line":"3 examples, {0} failures"}}' > "$json"
exit {1}"#,
        failure_count,
        u8::from(failure_count > 0)
    );
    CommandFramework::new(
        "sh",
        vec![
            "-c".into(),
            script,
            "sh".into(),
            "{json}".into(),
            "{txt}".into(),
            "{html}".into(),
            "{files}".into(),
        ],
    )
}

#[cfg(unix)]
#[tokio::test]
async fn test_command_framework_end_to_end() {
    let ctx = TestContext::new();
    fs::write(ctx.root.join("smoke").join("login_spec.rb"), "").unwrap();
    let orchestrator = ctx.orchestrator(Arc::new(script_framework(2)));

    let report = orchestrator
        .run(&select("staging", "smoke"), false)
        .await
        .unwrap();

    let result = &report.results[0];
    assert!(result.failed);
    assert_eq!(result.failure_count, 2);
    assert_eq!(result.summary_line.as_deref(), Some("3 examples, 2 failures"));

    let emails = ctx.emails();
    assert_eq!(emails.len(), 1);
    // Text report lists the files the framework received, in sorted order
    assert_eq!(emails[0].body, "health_spec.rb\nlogin_spec.rb\n\n");
    assert_eq!(
        emails[0].attachment.as_ref().unwrap().content,
        "<p>smoke</p>\n"
    );
}

#[cfg(unix)]
#[tokio::test]
async fn test_command_framework_passing_run() {
    let ctx = TestContext::new();
    let orchestrator = ctx.orchestrator(Arc::new(script_framework(0)));

    let report = orchestrator.run(&Selection::all(), false).await.unwrap();

    assert!(report.all_passed());
    assert!(ctx.emails().is_empty());
    assert!(ctx.incidents().is_empty());
}

// ---------------------------------------------------------------------------
// Binary
// ---------------------------------------------------------------------------

/// Write environment, suite and settings files into `dir`
fn write_config(dir: &Path) -> Vec<String> {
    let environments = dir.join("environments.yml");
    let suites = dir.join("suites.yml");
    let settings = dir.join("config.toml");
    fs::write(&environments, ENVIRONMENTS).unwrap();
    fs::write(&suites, SUITES).unwrap();
    fs::write(
        &settings,
        format!(
            "[framework]\nsuite_dir = \"{}\"\n",
            dir.join("suites").display()
        ),
    )
    .unwrap();

    vec![
        "--environments".into(),
        environments.display().to_string(),
        "--suites".into(),
        suites.display().to_string(),
        "--config".into(),
        settings.display().to_string(),
    ]
}

fn scout(dir: &Path, args: &[String]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_scout"))
        .args(args)
        .current_dir(dir)
        .env("NO_COLOR", "1")
        .env_remove("SCOUT_SUITE_DIR")
        .output()
        .expect("Failed to run scout")
}

#[test]
fn test_binary_lists_configuration() {
    let dir = tempfile::tempdir().unwrap();
    let mut args = vec!["list".to_string()];
    args.extend(write_config(dir.path()));

    let output = scout(dir.path(), &args);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout.contains("staging"));
    assert!(stdout.contains("prod"));
    assert!(stdout.contains("team@example.com"));
    assert!(stdout.contains("XYZ123"));
}

#[test]
fn test_binary_exits_nonzero_on_unknown_suite() {
    let dir = tempfile::tempdir().unwrap();
    let mut args = vec![
        "run".to_string(),
        "--env".to_string(),
        "staging".to_string(),
        "--suite".to_string(),
        "nightly".to_string(),
    ];
    args.extend(write_config(dir.path()));

    let output = scout(dir.path(), &args);

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("nightly"));
}

#[test]
fn test_binary_exits_nonzero_on_missing_config() {
    let dir = tempfile::tempdir().unwrap();
    let args: Vec<String> = [
        "list",
        "--environments",
        "missing.yml",
        "--suites",
        "missing.yml",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    let output = scout(dir.path(), &args);

    assert_eq!(output.status.code(), Some(1));
}
