//! Command-line flags.
//!
//! Run-mode flags live under the `tf.` namespace; options under `runner.` are
//! handed to the suite runner untouched.

use std::path::PathBuf;

use clap::{ArgAction, Parser};

use super::{ConfigurationError, RunConfiguration};
use crate::runner::RunnerOptions;

/// dbfunc command line.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "dbfunc",
    version,
    about = "Run behavior scenarios against a disposable database environment"
)]
pub struct Cli {
    /// Run tests.
    #[arg(
        long = "tf.test",
        value_name = "BOOL",
        default_value_t = true,
        action = ArgAction::Set,
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    pub test: bool,

    /// Shut down the test environment after the run.
    #[arg(
        long = "tf.stop",
        value_name = "BOOL",
        default_value_t = true,
        action = ArgAction::Set,
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    pub stop: bool,

    /// Delete the test environment after the run.
    #[arg(
        long = "tf.clean",
        value_name = "BOOL",
        default_value_t = true,
        action = ArgAction::Set,
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    pub clean: bool,

    /// Enable debug logging.
    #[arg(
        long = "tf.debug",
        value_name = "BOOL",
        default_value_t = false,
        action = ArgAction::Set,
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    pub debug: bool,

    /// Features prefix.
    #[arg(long = "tf.featurePrefix", value_name = "PREFIX", default_value = "")]
    pub feature_prefix: String,

    /// Database name [mongodb|redis].
    #[arg(long = "tf.database", value_name = "NAME", default_value = "")]
    pub database: String,

    /// Settings file (YAML).
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub runner: RunnerOptions,
}

impl Cli {
    /// Validate flags into a [`RunConfiguration`].
    pub fn resolve(&self) -> Result<RunConfiguration, ConfigurationError> {
        let backend = self.database.parse()?;

        Ok(RunConfiguration {
            run_tests: self.test,
            stop_after: self.stop,
            clean_after: self.clean,
            debug: self.debug,
            feature_prefix: self.feature_prefix.clone(),
            backend,
        })
    }
}
