//! Docker-backed provisioner.
//!
//! Starts one container per backend with testcontainers, waits for the
//! backend's readiness log line, then checks the server until it answers and
//! reports its version.

use std::time::Duration;

use async_trait::async_trait;
use backon::Retryable;
use testcontainers::{
    core::{IntoContainerPort, WaitFor},
    runners::AsyncRunner,
    ContainerAsync, GenericImage, ImageExt,
};
use tracing::{debug, info, warn};

use super::{BackendVersion, Endpoint, ProvisionError, Provisioned, Provisioner};
use crate::backend::Backend;
use crate::utils::retry::readiness_backoff;

/// Container image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerImage {
    pub name: String,
    pub tag: String,
}

impl ContainerImage {
    pub fn new(name: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag: tag.into(),
        }
    }
}

impl std::fmt::Display for ContainerImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.name, self.tag)
    }
}

/// Provisions a backend as a single container.
pub struct ContainerProvisioner {
    backend: Backend,
    image: ContainerImage,
    startup_timeout: Duration,
    container: Option<ContainerAsync<GenericImage>>,
}

impl ContainerProvisioner {
    pub fn new(backend: Backend, image: ContainerImage, startup_timeout: Duration) -> Self {
        Self {
            backend,
            image,
            startup_timeout,
            container: None,
        }
    }

    fn running(&self) -> Result<&ContainerAsync<GenericImage>, ProvisionError> {
        self.container.as_ref().ok_or(ProvisionError::NotRunning)
    }
}

#[async_trait]
impl Provisioner for ContainerProvisioner {
    async fn start(&mut self) -> Result<Provisioned, ProvisionError> {
        let port = self.backend.container_port();

        info!(backend = %self.backend, image = %self.image, "Starting container");

        let container = GenericImage::new(self.image.name.as_str(), self.image.tag.as_str())
            .with_exposed_port(port.tcp())
            .with_wait_for(WaitFor::message_on_stdout(self.backend.ready_message()))
            .with_startup_timeout(self.startup_timeout)
            .start()
            .await?;

        let host = container.get_host().await?.to_string();
        let host_port = container.get_host_port_ipv4(port.tcp()).await?;
        // Held before checking so a failed check still removes the container on drop.
        self.container = Some(container);

        let uri = self.backend.connection_uri(&host, host_port);
        debug!(backend = %self.backend, uri = %uri, "Container started, probing server");

        let backend = self.backend;
        let version = (|| check_server(backend, &uri))
            .retry(readiness_backoff())
            .notify(|err: &ProvisionError, delay: Duration| {
                warn!(backend = %backend, error = %err, delay = ?delay, "Server not ready, retrying");
            })
            .await?;

        Ok(Provisioned {
            endpoint: Endpoint {
                host,
                port: host_port,
                uri,
            },
            version: Some(version),
        })
    }

    async fn stop(&mut self) -> Result<(), ProvisionError> {
        let container = self.running()?;
        info!(backend = %self.backend, id = %container.id(), "Stopping container");
        container.stop().await?;
        Ok(())
    }

    async fn clean(&mut self) -> Result<(), ProvisionError> {
        let container = self.container.take().ok_or(ProvisionError::NotRunning)?;
        info!(backend = %self.backend, id = %container.id(), "Removing container");
        container.rm().await?;
        Ok(())
    }

    fn release(&mut self) -> Result<(), ProvisionError> {
        let container = self.container.take().ok_or(ProvisionError::NotRunning)?;
        info!(
            backend = %self.backend,
            id = %container.id(),
            "Leaving container in place, remove it with `docker rm -f {}`",
            container.id()
        );
        // Dropping the handle would remove the container.
        std::mem::forget(container);
        Ok(())
    }
}

/// Ping the server and read its version.
async fn check_server(backend: Backend, uri: &str) -> Result<BackendVersion, ProvisionError> {
    match backend {
        Backend::Mongodb => check_mongodb(uri).await,
        Backend::Redis => check_redis(uri).await,
    }
}

async fn check_mongodb(uri: &str) -> Result<BackendVersion, ProvisionError> {
    use ::mongodb::bson::doc;

    let client = ::mongodb::Client::with_uri_str(uri).await?;
    let admin = client.database("admin");
    admin.run_command(doc! { "ping": 1 }).await?;

    let info = admin.run_command(doc! { "buildInfo": 1 }).await?;
    let version = info
        .get_str("version")
        .map_err(|e| ProvisionError::Other(format!("buildInfo has no version: {}", e)))?;
    Ok(BackendVersion::new(version))
}

async fn check_redis(uri: &str) -> Result<BackendVersion, ProvisionError> {
    let client = ::redis::Client::open(uri)?;
    let mut conn = client.get_multiplexed_async_connection().await?;

    let _: String = ::redis::cmd("PING").query_async(&mut conn).await?;
    let info: String = ::redis::cmd("INFO").arg("server").query_async(&mut conn).await?;

    parse_redis_version(&info)
        .map(BackendVersion::new)
        .ok_or_else(|| ProvisionError::Other("INFO server has no redis_version".to_string()))
}

/// Extract `redis_version` from an `INFO server` reply.
fn parse_redis_version(info: &str) -> Option<&str> {
    info.lines()
        .find_map(|line| line.strip_prefix("redis_version:"))
        .map(str::trim)
}
