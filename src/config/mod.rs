//! Run configuration.
//!
//! Two layers feed a run:
//! - command-line flags (`cli`), resolved once into an immutable
//!   [`RunConfiguration`];
//! - environment settings (features directory, container images, timeouts)
//!   loaded from YAML files and environment variables.

mod cli;

pub use cli::Cli;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::backend::Backend;
use crate::environment::container::ContainerImage;

/// Default settings file name.
pub const DEFAULT_CONFIG_FILE: &str = "dbfunc.yaml";
/// Environment variable for the settings file path.
pub const CONFIG_ENV_VAR: &str = "DBFUNC_CONFIG";
/// Prefix for settings environment variables.
pub const CONFIG_ENV_PREFIX: &str = "DBFUNC";
/// Environment variable for the logging filter.
pub const LOG_ENV_VAR: &str = "DBFUNC_LOG";

/// Default directory holding `<backend>/*.feature` files.
pub const DEFAULT_FEATURES_DIR: &str = "features";
/// Default container startup timeout.
pub const DEFAULT_STARTUP_TIMEOUT_SECS: u64 = 60;

/// Errors raised while resolving configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("Database '{name}' is not valid, please provide test database --tf.database=[{choices}]")]
    UnsupportedBackend { name: String, choices: String },

    #[error("Failed to load settings: {0}")]
    Settings(#[from] ::config::ConfigError),
}

/// Validated run-mode configuration.
///
/// Built once at startup by [`Cli::resolve`] and only read afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfiguration {
    /// Execute the scenario suite.
    pub run_tests: bool,
    /// Stop the environment after the run.
    pub stop_after: bool,
    /// Remove the environment after the run.
    pub clean_after: bool,
    /// Debug-level logging.
    pub debug: bool,
    /// Only run feature files whose name starts with this prefix.
    pub feature_prefix: String,
    /// Backend under test.
    pub backend: Backend,
}

impl RunConfiguration {
    /// Configuration with every flag at its default for `backend`.
    pub fn for_backend(backend: Backend) -> Self {
        Self {
            run_tests: true,
            stop_after: true,
            clean_after: true,
            debug: false,
            feature_prefix: String::new(),
            backend,
        }
    }
}

/// Image override for one backend. Unset fields fall back to the backend default.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ImageSettings {
    pub image: Option<String>,
    pub tag: Option<String>,
}

/// Environment settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EnvironmentSettings {
    /// Root directory holding one feature directory per backend.
    pub features_dir: PathBuf,
    /// Seconds to wait for a container to report readiness.
    pub startup_timeout_secs: u64,
    /// MongoDB image override.
    pub mongodb: ImageSettings,
    /// Redis image override.
    pub redis: ImageSettings,
}

impl Default for EnvironmentSettings {
    fn default() -> Self {
        Self {
            features_dir: PathBuf::from(DEFAULT_FEATURES_DIR),
            startup_timeout_secs: DEFAULT_STARTUP_TIMEOUT_SECS,
            mongodb: ImageSettings::default(),
            redis: ImageSettings::default(),
        }
    }
}

impl EnvironmentSettings {
    /// Load settings from file and environment.
    ///
    /// Sources, later overriding earlier:
    /// 1. `dbfunc.yaml` in the current directory (if present)
    /// 2. File given by `path` (if provided)
    /// 3. File named by `DBFUNC_CONFIG` (if set)
    /// 4. `DBFUNC__*` environment variables (`DBFUNC__REDIS__TAG=7.4`)
    ///
    /// Environment values stay strings until deserialized, so a tag such as
    /// `7.10` is kept as written.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigurationError> {
        Self::load_with(path, environment_source())
    }

    fn load_with(
        path: Option<&Path>,
        environment: ::config::Environment,
    ) -> Result<Self, ConfigurationError> {
        use ::config::{Config as ConfigLib, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::from(config_path).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let settings = builder.add_source(environment).build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Container image for `backend`, with overrides applied.
    pub fn image_for(&self, backend: Backend) -> ContainerImage {
        let overrides = match backend {
            Backend::Mongodb => &self.mongodb,
            Backend::Redis => &self.redis,
        };
        let default = backend.default_image();
        ContainerImage::new(
            overrides.image.as_deref().unwrap_or(&default.name),
            overrides.tag.as_deref().unwrap_or(&default.tag),
        )
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }
}

fn environment_source() -> ::config::Environment {
    ::config::Environment::with_prefix(CONFIG_ENV_PREFIX).separator("__")
}
