//! Run driver step definitions.

use std::io::Write;
use std::sync::{Arc, Mutex};

use clap::Parser;
use cucumber::gherkin::Step;
use cucumber::{given, then, when, World};
use dbfunc::config::{Cli, EnvironmentSettings, RunConfiguration};
use dbfunc::environment::{BackendVersion, EnvironmentContext, SharedEnvironment};
use dbfunc::orchestrator::{Orchestrator, OrchestratorError};
use dbfunc::runner::{RunnerOptions, SuiteOutcome};
use dbfunc::test_utils::{Call, RecordingProvisioner};
use tempfile::TempDir;

use super::{format_calls, parse_call};

/// Captured suite output.
#[derive(Debug, Clone, Default)]
struct Output(Arc<Mutex<Vec<u8>>>);

impl Write for Output {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Output {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

/// Test context for whole-run scenarios.
#[derive(Debug, World)]
#[world(init = Self::new)]
pub struct RunWorld {
    features: TempDir,
    args: Vec<String>,
    failures: Vec<Call>,
    provisioner: Option<RecordingProvisioner>,
    env: Option<SharedEnvironment>,
    output: Output,
    outcome: Option<SuiteOutcome>,
    error: Option<OrchestratorError>,
}

impl RunWorld {
    fn new() -> Self {
        Self {
            features: TempDir::new().expect("temp dir"),
            args: vec!["dbfunc".to_string()],
            failures: Vec::new(),
            provisioner: None,
            env: None,
            output: Output::default(),
            outcome: None,
            error: None,
        }
    }

    fn settings(&self) -> EnvironmentSettings {
        EnvironmentSettings {
            features_dir: self.features.path().to_path_buf(),
            ..EnvironmentSettings::default()
        }
    }

    /// Resolve flags the way the binary does.
    fn resolve(&self) -> Result<(RunConfiguration, RunnerOptions), OrchestratorError> {
        let cli = Cli::try_parse_from(&self.args).expect("valid command line");
        let config = cli.resolve()?;
        Ok((config, cli.runner))
    }
}

// --- Given steps ---

#[given(expr = "a {word} feature file {string} with:")]
async fn given_feature_file(world: &mut RunWorld, step: &Step, backend: String, name: String) {
    let dir = world.features.path().join(&backend);
    std::fs::create_dir_all(&dir).expect("create feature dir");
    let source = step.docstring.as_ref().expect("feature docstring");
    std::fs::write(dir.join(name), source.trim_start()).expect("write feature file");
}

#[given(expr = "the command line {string}")]
async fn given_command_line(world: &mut RunWorld, line: String) {
    world
        .args
        .extend(line.split_whitespace().map(str::to_string));
}

#[given(expr = "the provisioner fails to {word}")]
async fn given_provisioner_fails(world: &mut RunWorld, call: String) {
    world.failures.push(parse_call(&call));
}

// --- When steps ---

#[when("I run dbfunc")]
async fn when_run(world: &mut RunWorld) {
    let (config, options) = match world.resolve() {
        Ok(resolved) => resolved,
        Err(err) => {
            world.error = Some(err);
            return;
        }
    };

    let backend = config.backend;
    let settings = world.settings();
    let provisioner = RecordingProvisioner::new(backend);
    for call in &world.failures {
        provisioner.fail_on(*call);
    }
    world.provisioner = Some(provisioner.clone());

    let env = EnvironmentContext::new(backend, BackendVersion::new("7"), Box::new(provisioner))
        .into_shared();
    let orchestrator = Orchestrator::new(config, options, &settings);
    match orchestrator.run(env.clone(), Box::new(world.output.clone())).await {
        Ok(outcome) => world.outcome = Some(outcome),
        Err(err) => world.error = Some(err),
    }
    world.env = Some(env);
}

// --- Then steps ---

#[then(expr = "the suite {word}")]
async fn then_suite(world: &mut RunWorld, expected: String) {
    if let Some(err) = &world.error {
        panic!("Run failed: {}", err);
    }
    let outcome = world.outcome.expect("run finished");
    assert_eq!(outcome.to_string(), expected);
}

#[then(expr = "the exit code is {int}")]
async fn then_exit_code(world: &mut RunWorld, expected: u8) {
    let code = match (&world.outcome, &world.error) {
        (_, Some(err)) => err.exit_code(),
        (Some(outcome), None) => outcome.exit_code(),
        (None, None) => panic!("dbfunc has not run"),
    };
    assert_eq!(code, expected);
}

#[then(expr = "the provisioner saw {string}")]
async fn then_provisioner_saw(world: &mut RunWorld, expected: String) {
    let calls = world
        .provisioner
        .as_ref()
        .map(RecordingProvisioner::calls)
        .unwrap_or_default();
    assert_eq!(format_calls(&calls), expected);
}

#[then("the provisioner was never called")]
async fn then_provisioner_untouched(world: &mut RunWorld) {
    let calls = world
        .provisioner
        .as_ref()
        .map(RecordingProvisioner::calls)
        .unwrap_or_default();
    assert!(calls.is_empty(), "Provisioner saw {}", format_calls(&calls));
}

#[then(expr = "the output contains {string}")]
async fn then_output_contains(world: &mut RunWorld, expected: String) {
    let text = world.output.text();
    assert!(text.contains(&expected), "Output was:\n{}", text);
}

#[then(expr = "the error mentions {string}")]
async fn then_error_mentions(world: &mut RunWorld, expected: String) {
    let err = world.error.as_ref().expect("run failed");
    assert!(
        err.to_string().contains(&expected),
        "Error was: {}",
        err
    );
}

#[then(expr = "the environment ends {word}")]
async fn then_environment_ends(world: &mut RunWorld, expected: String) {
    let env = world.env.as_ref().expect("dbfunc has run");
    assert_eq!(env.lock().await.state().to_string(), expected);
}
