//! dbfunc: behavior scenarios against a disposable database environment.
//!
//! ## Flow
//! ```text
//! flags -> RunConfiguration -> EnvironmentContext
//!       -> feature files -> SuiteRunner (load before first scenario)
//!       -> stop -> clean (or release) -> exit code
//! ```
//!
//! ## Exit codes
//! - 0: suite passed
//! - 1: suite failed
//! - 2: invalid configuration or feature files
//! - 3: environment error
//!
//! ## Configuration
//! - `--tf.*` run-mode flags and `--runner.*` suite options (see `--help`)
//! - `dbfunc.yaml`, `--config <path>` or `DBFUNC_CONFIG`: environment settings
//! - `DBFUNC__*`: settings overrides, e.g. `DBFUNC__REDIS__TAG=7.4`
//! - `DBFUNC_LOG`: tracing filter

use std::process::ExitCode;

use clap::Parser;
use tracing::error;

use dbfunc::config::{Cli, EnvironmentSettings};
use dbfunc::environment::EnvironmentContext;
use dbfunc::orchestrator::{Orchestrator, OrchestratorError};
use dbfunc::utils::bootstrap::init_tracing;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    match run(cli).await {
        Ok(outcome) => ExitCode::from(outcome.exit_code()),
        Err(err) => {
            error!(error = %err, "dbfunc run failed");
            ExitCode::from(err.exit_code())
        }
    }
}

async fn run(cli: Cli) -> Result<dbfunc::runner::SuiteOutcome, OrchestratorError> {
    let config = cli.resolve()?;
    let settings = EnvironmentSettings::load(cli.config.as_deref())?;

    let env = EnvironmentContext::for_backend(config.backend, &settings).into_shared();
    let orchestrator = Orchestrator::new(config, cli.runner, &settings);
    orchestrator.run(env, Box::new(std::io::stdout())).await
}
