//! Suite runner.
//!
//! Runs parsed features with cucumber against [`DbWorld`], one scenario at a
//! time. A before hook loads the environment when the first scenario starts
//! and attaches every scenario's world to it, so a run that selects no
//! scenarios never provisions anything.
//!
//! Run policy maps onto cucumber:
//! - stop on failure: `fail_fast`; under strict mode a scenario with an
//!   undefined step fails in the before hook so the run halts there too
//! - strict: undefined steps are turned into failures by `fail_on_skipped`
//! - colors: the writer's coloring

use std::fmt;
use std::io::Write;
use std::sync::Arc;

use clap::{ArgAction, Args, ValueEnum};
use cucumber::gherkin::{self, Feature};
use cucumber::writer::{self, Coloring, Verbosity};
use cucumber::{cli, parser, runner, step, World as _, WriterExt as _};
use futures::{stream, FutureExt};
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::environment::{EnvironmentError, EnvironmentState, SharedEnvironment};
use crate::steps::{Attachment, DbWorld};

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Every step of every scenario.
    #[default]
    Pretty,
    /// Pretty, plus the scenario state on failures and step doc strings.
    Verbose,
}

impl OutputFormat {
    fn verbosity(self) -> Verbosity {
        match self {
            OutputFormat::Pretty => Verbosity::Default,
            OutputFormat::Verbose => Verbosity::ShowWorldAndDocString,
        }
    }
}

/// Options under the `runner.` namespace.
#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct RunnerOptions {
    /// Output format.
    #[arg(long = "runner.format", value_enum, default_value_t = OutputFormat::Pretty)]
    pub format: OutputFormat,

    /// Stop at the first failing scenario.
    #[arg(
        long = "runner.stop-on-failure",
        value_name = "BOOL",
        default_value_t = true,
        action = ArgAction::Set,
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    pub stop_on_failure: bool,

    /// Fail the suite on undefined steps.
    #[arg(
        long = "runner.strict",
        value_name = "BOOL",
        default_value_t = true,
        action = ArgAction::Set,
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    pub strict: bool,

    /// Colorize output.
    #[arg(
        long = "runner.colors",
        value_name = "BOOL",
        default_value_t = true,
        action = ArgAction::Set,
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    pub colors: bool,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            format: OutputFormat::Pretty,
            stop_on_failure: true,
            strict: true,
            colors: true,
        }
    }
}

impl RunnerOptions {
    fn coloring(&self) -> Coloring {
        if self.colors {
            Coloring::Always
        } else {
            Coloring::Never
        }
    }
}

/// Overall verdict of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuiteOutcome {
    Passed,
    Failed,
}

impl SuiteOutcome {
    pub fn exit_code(&self) -> u8 {
        match self {
            SuiteOutcome::Passed => 0,
            SuiteOutcome::Failed => 1,
        }
    }
}

impl fmt::Display for SuiteOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SuiteOutcome::Passed => "passed",
            SuiteOutcome::Failed => "failed",
        })
    }
}

/// Hands features parsed up front to the cucumber runner.
struct ParsedFeatures;

impl cucumber::Parser<Vec<Feature>> for ParsedFeatures {
    type Cli = cli::Empty;
    type Output = stream::Iter<std::vec::IntoIter<parser::Result<Feature>>>;

    fn parse(self, features: Vec<Feature>, _: cli::Empty) -> Self::Output {
        stream::iter(features.into_iter().map(Ok).collect::<Vec<_>>())
    }
}

/// State behind the before hook.
///
/// Loads the environment once. A failed load is kept and every later scenario
/// fails against it without another attempt.
#[derive(Clone)]
struct EnvironmentHook {
    env: SharedEnvironment,
    load_failure: Arc<Mutex<Option<EnvironmentError>>>,
    steps: Arc<step::Collection<DbWorld>>,
    reject_undefined: bool,
}

impl EnvironmentHook {
    async fn prepare(
        &self,
        feature: &Feature,
        rule: Option<&gherkin::Rule>,
        scenario: &gherkin::Scenario,
        world: &mut DbWorld,
    ) {
        info!(feature = %feature.name, scenario = %scenario.name, "Running scenario");

        if self.reject_undefined {
            if let Some(step) = self.first_undefined(feature, rule, scenario) {
                panic!("Step is undefined: {}{}", step.keyword, step.value);
            }
        }

        match self.attach().await {
            Ok(attachment) => world.attach(attachment),
            Err(message) => panic!("{}", message),
        }
    }

    async fn attach(&self) -> Result<Attachment, String> {
        let mut load_failure = self.load_failure.lock().await;
        if let Some(err) = load_failure.as_ref() {
            return Err(format!("Environment is unavailable: {}", err));
        }

        let mut env = self.env.lock().await;
        if env.state() == EnvironmentState::Uninitialized {
            if let Err(err) = env.load().await {
                error!(error = %err, "Environment load failed");
                let message = err.to_string();
                *load_failure = Some(err);
                return Err(message);
            }
        }
        Ok(Attachment::of(&env))
    }

    fn first_undefined<'s>(
        &self,
        feature: &'s Feature,
        rule: Option<&'s gherkin::Rule>,
        scenario: &'s gherkin::Scenario,
    ) -> Option<&'s gherkin::Step> {
        feature
            .background
            .iter()
            .chain(rule.and_then(|r| r.background.as_ref()))
            .flat_map(|background| &background.steps)
            .chain(&scenario.steps)
            .find(|step| matches!(self.steps.find(step), Ok(None)))
    }
}

/// Runs features against one environment.
pub struct SuiteRunner {
    options: RunnerOptions,
    out: Box<dyn Write + Send>,
}

impl SuiteRunner {
    pub fn new(options: RunnerOptions, out: Box<dyn Write + Send>) -> Self {
        Self { options, out }
    }

    /// Run every scenario of `features` in order.
    ///
    /// Scenario failures decide the outcome; only a failed environment load
    /// is returned as an error.
    pub async fn run(
        self,
        features: Vec<Feature>,
        env: SharedEnvironment,
    ) -> Result<SuiteOutcome, EnvironmentError> {
        let Self { options, out } = self;
        let strict = options.strict;

        let hook = EnvironmentHook {
            env,
            load_failure: Arc::new(Mutex::new(None)),
            steps: Arc::new(DbWorld::collection()),
            reject_undefined: options.stop_on_failure && strict,
        };
        let before = hook.clone();

        let opts = cli::Opts {
            re_filter: None,
            tags_filter: None,
            parser: cli::Empty,
            runner: runner::basic::Cli {
                concurrency: Some(1),
                fail_fast: options.stop_on_failure,
                ..runner::basic::Cli::default()
            },
            writer: writer::basic::Cli {
                verbose: 0,
                color: options.coloring(),
            },
            custom: cli::Empty,
        };

        let mut cucumber = DbWorld::cucumber::<&str>()
            .with_parser(ParsedFeatures)
            .with_writer(
                writer::Basic::new(out, options.coloring(), options.format.verbosity())
                    .summarized(),
            )
            .fail_on_skipped_with(move |_, _, _| strict)
            .max_concurrent_scenarios(1)
            .before(move |feature, rule, scenario, world| {
                let hook = before.clone();
                async move { hook.prepare(feature, rule, scenario, world).await }.boxed_local()
            });
        if options.stop_on_failure {
            cucumber = cucumber.fail_fast();
        }

        let writer = cucumber.with_cli(opts).run(features).await;

        if let Some(err) = hook.load_failure.lock().await.take() {
            return Err(err);
        }
        Ok(outcome_of(&writer))
    }
}

fn outcome_of<Wr: writer::Stats<DbWorld>>(writer: &Wr) -> SuiteOutcome {
    let outcome = if writer.execution_has_failed() {
        SuiteOutcome::Failed
    } else {
        SuiteOutcome::Passed
    };
    info!(
        outcome = %outcome,
        passed_steps = writer.passed_steps(),
        failed_steps = writer.failed_steps(),
        skipped_steps = writer.skipped_steps(),
        hook_errors = writer.hook_errors(),
        "Suite finished"
    );
    outcome
}
