//! Per-scenario state.

use std::collections::HashMap;

use ::redis::aio::MultiplexedConnection;
use cucumber::World;

use super::StepError;
use crate::backend::Backend;
use crate::environment::{BackendVersion, Endpoint, EnvironmentContext};

/// Database used by MongoDB steps.
pub const MONGODB_TEST_DATABASE: &str = "dbfunc";

/// What a scenario knows about the environment it runs against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub backend: Backend,
    pub version: BackendVersion,
    pub endpoint: Option<Endpoint>,
}

impl Attachment {
    pub fn of(env: &EnvironmentContext) -> Self {
        Self {
            backend: env.backend(),
            version: env.version().clone(),
            endpoint: env.endpoint().cloned(),
        }
    }
}

/// State shared by the steps of one scenario.
///
/// Created empty for every scenario; the suite's before hook attaches the
/// loaded environment. Backend clients are opened on first use and dropped
/// with the world.
#[derive(World)]
#[world(init = Self::new)]
pub struct DbWorld {
    attachment: Option<Attachment>,
    redis: Option<MultiplexedConnection>,
    mongodb: Option<::mongodb::Client>,
    vars: HashMap<String, String>,
}

impl std::fmt::Debug for DbWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbWorld")
            .field("attachment", &self.attachment)
            .field("vars", &self.vars)
            .finish()
    }
}

impl DbWorld {
    pub fn new() -> Self {
        Self {
            attachment: None,
            redis: None,
            mongodb: None,
            vars: HashMap::new(),
        }
    }

    /// World already attached to `attachment`.
    pub fn attached(attachment: Attachment) -> Self {
        let mut world = Self::new();
        world.attach(attachment);
        world
    }

    pub fn attach(&mut self, attachment: Attachment) {
        self.attachment = Some(attachment);
    }

    fn attachment(&self) -> Result<&Attachment, StepError> {
        self.attachment.as_ref().ok_or(StepError::Detached)
    }

    pub fn backend(&self) -> Result<Backend, StepError> {
        Ok(self.attachment()?.backend)
    }

    pub fn version(&self) -> Result<&BackendVersion, StepError> {
        Ok(&self.attachment()?.version)
    }

    pub fn endpoint(&self) -> Result<&Endpoint, StepError> {
        let attachment = self.attachment()?;
        attachment
            .endpoint
            .as_ref()
            .ok_or_else(|| StepError::failed(format!("{} environment is not loaded", attachment.backend)))
    }

    /// Fail unless the run targets `required`.
    pub fn require(&self, required: Backend) -> Result<(), StepError> {
        let actual = self.backend()?;
        if actual == required {
            Ok(())
        } else {
            Err(StepError::WrongBackend { required, actual })
        }
    }

    /// Redis connection, opened on first use.
    pub async fn redis(&mut self) -> Result<MultiplexedConnection, StepError> {
        self.require(Backend::Redis)?;
        if let Some(conn) = &self.redis {
            return Ok(conn.clone());
        }

        let client = ::redis::Client::open(self.endpoint()?.uri.as_str())?;
        let conn = client.get_multiplexed_async_connection().await?;
        self.redis = Some(conn.clone());
        Ok(conn)
    }

    /// Test database on the MongoDB server, client opened on first use.
    pub async fn mongodb(&mut self) -> Result<::mongodb::Database, StepError> {
        self.require(Backend::Mongodb)?;
        if let Some(client) = &self.mongodb {
            return Ok(client.database(MONGODB_TEST_DATABASE));
        }

        let client = ::mongodb::Client::with_uri_str(&self.endpoint()?.uri).await?;
        let database = client.database(MONGODB_TEST_DATABASE);
        self.mongodb = Some(client);
        Ok(database)
    }

    pub fn remember(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    pub fn recall(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// Replace `${name}` references with remembered values.
    ///
    /// Unknown names are left as written.
    pub fn interpolate(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let tail = &rest[start..];
            match tail.find('}') {
                Some(end) => {
                    let name = &tail[2..end];
                    match self.vars.get(name) {
                        Some(value) => out.push_str(value),
                        None => out.push_str(&tail[..=end]),
                    }
                    rest = &tail[end + 1..];
                }
                None => {
                    out.push_str(tail);
                    rest = "";
                }
            }
        }
        out.push_str(rest);
        out
    }
}

impl Default for DbWorld {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn attached(backend: Backend, uri: Option<&str>) -> DbWorld {
        DbWorld::attached(Attachment {
            backend,
            version: BackendVersion::new("7.2.4"),
            endpoint: uri.map(|uri| Endpoint {
                host: "localhost".to_string(),
                port: backend.container_port(),
                uri: uri.to_string(),
            }),
        })
    }

    #[test]
    fn test_interpolate() {
        let mut world = attached(Backend::Redis, None);
        world.remember("key", "user:1");

        assert_eq!(world.interpolate("get ${key} now"), "get user:1 now");
        assert_eq!(world.interpolate("${key}${key}"), "user:1user:1");
        assert_eq!(world.interpolate("keep ${missing}"), "keep ${missing}");
        assert_eq!(world.interpolate("dangling ${key"), "dangling ${key");
        assert_eq!(world.interpolate("plain text"), "plain text");
    }

    #[test]
    fn test_require_backend() {
        let world = attached(Backend::Redis, None);
        assert!(world.require(Backend::Redis).is_ok());
        assert!(matches!(
            world.require(Backend::Mongodb),
            Err(StepError::WrongBackend {
                required: Backend::Mongodb,
                actual: Backend::Redis
            })
        ));
    }

    #[test]
    fn test_detached_world_fails_every_lookup() {
        let world = DbWorld::new();
        assert!(matches!(world.backend(), Err(StepError::Detached)));
        assert!(matches!(world.require(Backend::Redis), Err(StepError::Detached)));
    }

    #[test]
    fn test_endpoint_missing_before_load() {
        let world = attached(Backend::Mongodb, None);
        assert!(world.endpoint().is_err());
    }

    #[tokio::test]
    async fn test_client_for_other_backend_fails() {
        let mut world = attached(Backend::Mongodb, None);
        assert!(matches!(
            world.redis().await,
            Err(StepError::WrongBackend { .. })
        ));
    }
}
