//! Supported backends.
//!
//! The backend set is closed: every variant supplies its own container
//! provisioner, selected once at startup.

use std::fmt;
use std::str::FromStr;

use crate::config::{ConfigurationError, EnvironmentSettings};
use crate::environment::container::{ContainerImage, ContainerProvisioner};
use crate::environment::Provisioner;

/// Database backend under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    Mongodb,
    Redis,
}

impl Backend {
    /// Every supported backend, in the order they are listed to users.
    pub const ALL: [Backend; 2] = [Backend::Mongodb, Backend::Redis];

    pub fn name(&self) -> &'static str {
        match self {
            Backend::Mongodb => "mongodb",
            Backend::Redis => "redis",
        }
    }

    /// Valid backend names joined with `|`, for error messages.
    pub fn choices() -> String {
        Self::ALL
            .iter()
            .map(Backend::name)
            .collect::<Vec<_>>()
            .join("|")
    }

    /// Container image used when the settings do not override it.
    pub fn default_image(&self) -> ContainerImage {
        match self {
            Backend::Mongodb => ContainerImage::new("mongo", "7.0"),
            Backend::Redis => ContainerImage::new("redis", "7.2"),
        }
    }

    /// Port the backend listens on inside its container.
    pub fn container_port(&self) -> u16 {
        match self {
            Backend::Mongodb => 27017,
            Backend::Redis => 6379,
        }
    }

    /// Log line the backend prints once it accepts connections.
    pub fn ready_message(&self) -> &'static str {
        match self {
            Backend::Mongodb => "Waiting for connections",
            Backend::Redis => "Ready to accept connections",
        }
    }

    /// Connection URI for a backend reachable at `host:port`.
    pub fn connection_uri(&self, host: &str, port: u16) -> String {
        match self {
            Backend::Mongodb => format!("mongodb://{}:{}", host, port),
            Backend::Redis => format!("redis://{}:{}", host, port),
        }
    }

    /// Build the container provisioner for this backend.
    pub fn provisioner(&self, settings: &EnvironmentSettings) -> Box<dyn Provisioner> {
        Box::new(ContainerProvisioner::new(
            *self,
            settings.image_for(*self),
            settings.startup_timeout(),
        ))
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Backend {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|backend| backend.name() == s)
            .ok_or_else(|| ConfigurationError::UnsupportedBackend {
                name: s.to_string(),
                choices: Self::choices(),
            })
    }
}
