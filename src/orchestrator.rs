//! Run driver.
//!
//! Ties the pieces together for one invocation: locate and parse feature
//! files, execute the suite, then stop and clean the environment as
//! configured. An environment that is not cleaned is released and stays up. Every failure is returned as an
//! [`OrchestratorError`]; only `main` turns it into a process exit.

use std::io::Write;
use std::path::PathBuf;

use tracing::{error, info};

use crate::config::{ConfigurationError, EnvironmentSettings, RunConfiguration};
use crate::environment::{
    EnvironmentContext, EnvironmentError, EnvironmentState, SharedEnvironment,
};
use crate::features::{self, LocationError};
use crate::runner::{RunnerOptions, SuiteOutcome, SuiteRunner};

/// Exit code for configuration and feature location errors.
pub const EXIT_CONFIGURATION: u8 = 2;
/// Exit code for environment errors.
pub const EXIT_ENVIRONMENT: u8 = 3;

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Location(#[from] LocationError),

    #[error(transparent)]
    Environment(#[from] EnvironmentError),

    /// Teardown failed after the suite finished.
    #[error("Suite {outcome}, then teardown failed: {source}")]
    Teardown {
        outcome: SuiteOutcome,
        #[source]
        source: EnvironmentError,
    },
}

impl OrchestratorError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            OrchestratorError::Configuration(_) | OrchestratorError::Location(_) => {
                EXIT_CONFIGURATION
            }
            OrchestratorError::Environment(_) | OrchestratorError::Teardown { .. } => {
                EXIT_ENVIRONMENT
            }
        }
    }
}

/// Drives one run against one environment.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    config: RunConfiguration,
    options: RunnerOptions,
    features_dir: PathBuf,
}

impl Orchestrator {
    pub fn new(
        config: RunConfiguration,
        options: RunnerOptions,
        settings: &EnvironmentSettings,
    ) -> Self {
        Self {
            config,
            options,
            features_dir: settings.features_dir.clone(),
        }
    }

    /// Run the suite (when enabled) and tear the environment down.
    ///
    /// Suite output goes to `out`. A teardown failure keeps the suite outcome
    /// in [`OrchestratorError::Teardown`].
    pub async fn run(
        &self,
        env: SharedEnvironment,
        out: Box<dyn Write + Send>,
    ) -> Result<SuiteOutcome, OrchestratorError> {
        let outcome = if self.config.run_tests {
            self.run_suite(env.clone(), out).await?
        } else {
            info!("Skipping tests");
            SuiteOutcome::Passed
        };

        let mut env = env.lock().await;
        self.teardown(&mut env)
            .await
            .map_err(|source| OrchestratorError::Teardown { outcome, source })?;

        info!(outcome = %outcome, "Run finished");
        Ok(outcome)
    }

    async fn run_suite(
        &self,
        env: SharedEnvironment,
        out: Box<dyn Write + Send>,
    ) -> Result<SuiteOutcome, OrchestratorError> {
        let backend = self.config.backend;
        let paths =
            features::find_feature_paths(&self.features_dir, backend, &self.config.feature_prefix)?;

        info!(
            "Starting testing environment: {} {} with features: {:?}",
            backend,
            env.lock().await.version(),
            paths
        );

        let features = features::load_features(&paths)?;

        let outcome = SuiteRunner::new(self.options.clone(), out)
            .run(features, env)
            .await?;
        Ok(outcome)
    }

    async fn teardown(&self, env: &mut EnvironmentContext) -> Result<(), EnvironmentError> {
        if !env.state().was_loaded() {
            info!(backend = %env.backend(), "Environment was never loaded, skipping teardown");
            return Ok(());
        }

        if self.config.stop_after && env.state() == EnvironmentState::Loaded {
            env.stop().await.inspect_err(|err| error!(error = %err, "Stop failed"))?;
        }

        if self.config.clean_after {
            env.clean().await.inspect_err(|err| error!(error = %err, "Clean failed"))?;
        } else {
            env.release().inspect_err(|err| error!(error = %err, "Release failed"))?;
        }
        Ok(())
    }
}
