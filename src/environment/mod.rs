//! Test environment lifecycle.
//!
//! An [`EnvironmentContext`] owns one provisioned backend instance for the
//! whole run and walks it through a fixed state machine:
//!
//! ```text
//! Uninitialized --load--> Loaded --stop--> Stopped --clean--> Cleaned
//!                            \______________clean______________/
//! ```
//!
//! `clean` from `Loaded` removes the running environment without a graceful
//! stop. No transition is retried; a failed transition leaves the state as it
//! was and the caller decides whether the run is over.
//!
//! `release` hands a loaded or stopped environment over to the host: the
//! context stops managing it and nothing removes it when the process exits.

pub mod container;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::backend::Backend;
use crate::config::EnvironmentSettings;

/// Lifecycle state of an environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvironmentState {
    Uninitialized,
    Loaded,
    Stopped,
    Cleaned,
}

impl EnvironmentState {
    /// Whether `load` has ever succeeded.
    pub fn was_loaded(&self) -> bool {
        !matches!(self, EnvironmentState::Uninitialized)
    }
}

impl fmt::Display for EnvironmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EnvironmentState::Uninitialized => "uninitialized",
            EnvironmentState::Loaded => "loaded",
            EnvironmentState::Stopped => "stopped",
            EnvironmentState::Cleaned => "cleaned",
        })
    }
}

/// Errors raised by a provisioner.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("container runtime: {0}")]
    Container(#[from] testcontainers::TestcontainersError),

    #[error("redis: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("mongodb: {0}")]
    Mongodb(#[from] ::mongodb::error::Error),

    #[error("environment is not running")]
    NotRunning,

    #[error("{0}")]
    Other(String),
}

/// Errors raised by environment lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum EnvironmentError {
    #[error("Cannot {operation} {backend} environment in state {state}")]
    InvalidTransition {
        backend: Backend,
        operation: &'static str,
        state: EnvironmentState,
    },

    #[error("Failed to load {backend} environment: {source}")]
    Load {
        backend: Backend,
        #[source]
        source: ProvisionError,
    },

    #[error("Failed to stop {backend} environment: {source}")]
    Stop {
        backend: Backend,
        #[source]
        source: ProvisionError,
    },

    #[error("Failed to clean {backend} environment: {source}")]
    Clean {
        backend: Backend,
        #[source]
        source: ProvisionError,
    },

    #[error("Failed to release {backend} environment: {source}")]
    Release {
        backend: Backend,
        #[source]
        source: ProvisionError,
    },
}

/// Backend version, e.g. `7.2.4`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendVersion {
    full: String,
}

impl BackendVersion {
    pub fn new(full: impl Into<String>) -> Self {
        Self { full: full.into() }
    }

    pub fn full(&self) -> &str {
        &self.full
    }

    /// Leading numeric component, if any.
    pub fn major(&self) -> Option<u32> {
        self.component(0)
    }

    pub fn minor(&self) -> Option<u32> {
        self.component(1)
    }

    fn component(&self, index: usize) -> Option<u32> {
        self.full.split(['.', '-']).nth(index)?.parse().ok()
    }
}

impl fmt::Display for BackendVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full)
    }
}

/// Where a loaded environment can be reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    /// Client connection URI (`redis://host:port`, `mongodb://host:port`).
    pub uri: String,
}

/// Result of a successful provision.
#[derive(Debug, Clone)]
pub struct Provisioned {
    pub endpoint: Endpoint,
    /// Version reported by the running server, when the provisioner can tell.
    pub version: Option<BackendVersion>,
}

/// Starts, stops and removes the processes behind an environment.
///
/// Implementations:
/// - `ContainerProvisioner`: one Docker container per backend
/// - `RecordingProvisioner` (`test-utils`): in-memory fake for tests
#[async_trait]
pub trait Provisioner: Send {
    /// Start the environment and wait until it accepts connections.
    async fn start(&mut self) -> Result<Provisioned, ProvisionError>;

    /// Halt the environment, keeping its artifacts.
    async fn stop(&mut self) -> Result<(), ProvisionError>;

    /// Remove the environment and everything it persisted.
    async fn clean(&mut self) -> Result<(), ProvisionError>;

    /// Give up control of the environment without removing it.
    fn release(&mut self) -> Result<(), ProvisionError>;
}

/// Environment shared between the suite runner and the run driver.
pub type SharedEnvironment = Arc<Mutex<EnvironmentContext>>;

/// Process-scoped handle to the backend under test.
pub struct EnvironmentContext {
    backend: Backend,
    version: BackendVersion,
    state: EnvironmentState,
    endpoint: Option<Endpoint>,
    provisioner: Box<dyn Provisioner>,
}

impl fmt::Debug for EnvironmentContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvironmentContext")
            .field("backend", &self.backend)
            .field("version", &self.version)
            .field("state", &self.state)
            .field("endpoint", &self.endpoint)
            .field("provisioner", &"<dyn Provisioner>")
            .finish()
    }
}

impl EnvironmentContext {
    /// Create an uninitialized context around `provisioner`.
    ///
    /// `version` is what is known before the environment runs (usually the
    /// image tag); `load` replaces it with the server-reported version.
    pub fn new(
        backend: Backend,
        version: BackendVersion,
        provisioner: Box<dyn Provisioner>,
    ) -> Self {
        Self {
            backend,
            version,
            state: EnvironmentState::Uninitialized,
            endpoint: None,
            provisioner,
        }
    }

    /// Create the container-backed context for `backend`.
    pub fn for_backend(backend: Backend, settings: &EnvironmentSettings) -> Self {
        let image = settings.image_for(backend);
        Self::new(
            backend,
            BackendVersion::new(image.tag),
            backend.provisioner(settings),
        )
    }

    pub fn into_shared(self) -> SharedEnvironment {
        Arc::new(Mutex::new(self))
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    pub fn version(&self) -> &BackendVersion {
        &self.version
    }

    pub fn state(&self) -> EnvironmentState {
        self.state
    }

    /// Connection data, available while the environment is loaded.
    pub fn endpoint(&self) -> Option<&Endpoint> {
        match self.state {
            EnvironmentState::Loaded => self.endpoint.as_ref(),
            _ => None,
        }
    }

    /// Provision and start the environment.
    ///
    /// Loading an already loaded environment does nothing.
    pub async fn load(&mut self) -> Result<(), EnvironmentError> {
        match self.state {
            EnvironmentState::Uninitialized => {}
            EnvironmentState::Loaded => {
                debug!(backend = %self.backend, "Environment already loaded");
                return Ok(());
            }
            state => return Err(self.invalid("load", state)),
        }

        info!(backend = %self.backend, version = %self.version, "Loading test environment");

        let provisioned = self
            .provisioner
            .start()
            .await
            .map_err(|source| EnvironmentError::Load {
                backend: self.backend,
                source,
            })?;

        if let Some(version) = provisioned.version {
            self.version = version;
        }
        info!(
            backend = %self.backend,
            version = %self.version,
            uri = %provisioned.endpoint.uri,
            "Test environment loaded"
        );
        self.endpoint = Some(provisioned.endpoint);
        self.state = EnvironmentState::Loaded;
        Ok(())
    }

    /// Gracefully halt the environment.
    pub async fn stop(&mut self) -> Result<(), EnvironmentError> {
        if self.state != EnvironmentState::Loaded {
            return Err(self.invalid("stop", self.state));
        }

        info!(backend = %self.backend, "Stopping test environment");
        self.provisioner
            .stop()
            .await
            .map_err(|source| EnvironmentError::Stop {
                backend: self.backend,
                source,
            })?;

        self.state = EnvironmentState::Stopped;
        Ok(())
    }

    /// Remove the environment and its artifacts.
    pub async fn clean(&mut self) -> Result<(), EnvironmentError> {
        match self.state {
            EnvironmentState::Loaded | EnvironmentState::Stopped => {}
            state => return Err(self.invalid("clean", state)),
        }

        info!(backend = %self.backend, state = %self.state, "Cleaning test environment");
        self.provisioner
            .clean()
            .await
            .map_err(|source| EnvironmentError::Clean {
                backend: self.backend,
                source,
            })?;

        self.endpoint = None;
        self.state = EnvironmentState::Cleaned;
        Ok(())
    }

    /// Leave the environment in place for the host to inspect.
    ///
    /// The state is kept; the provisioner no longer holds the environment, so
    /// a later `clean` has nothing to remove.
    pub fn release(&mut self) -> Result<(), EnvironmentError> {
        match self.state {
            EnvironmentState::Loaded | EnvironmentState::Stopped => {}
            state => return Err(self.invalid("release", state)),
        }

        info!(backend = %self.backend, state = %self.state, "Releasing test environment");
        self.provisioner
            .release()
            .map_err(|source| EnvironmentError::Release {
                backend: self.backend,
                source,
            })
    }

    fn invalid(&self, operation: &'static str, state: EnvironmentState) -> EnvironmentError {
        EnvironmentError::InvalidTransition {
            backend: self.backend,
            operation,
            state,
        }
    }
}
