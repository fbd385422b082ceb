//! Steps shared by every backend.

use std::time::Duration;

use cucumber::{given, then, when};
use tracing::debug;

use super::{DbWorld, StepError};

#[given(expr = "a working {word} environment")]
async fn working_environment(world: &mut DbWorld, name: String) -> Result<(), StepError> {
    let backend = world.backend()?;
    if backend.name() != name {
        return Err(StepError::failed(format!(
            "scenario expects a {} environment, the run targets {}",
            name, backend
        )));
    }
    let endpoint = world.endpoint()?;
    debug!(backend = %name, uri = %endpoint.uri, "Environment is up");
    Ok(())
}

#[given(expr = "I remember {string} as {word}")]
async fn remember(world: &mut DbWorld, value: String, name: String) {
    let value = world.interpolate(&value);
    world.remember(name, value);
}

#[when(expr = "I wait for {int} milliseconds")]
async fn wait(_world: &mut DbWorld, millis: u64) {
    tokio::time::sleep(Duration::from_millis(millis)).await;
}

#[then(expr = "the server version starts with {string}")]
async fn version_starts_with(world: &mut DbWorld, prefix: String) -> Result<(), StepError> {
    let version = world.version()?;
    if version.full().starts_with(&prefix) {
        Ok(())
    } else {
        Err(StepError::failed(format!(
            "server version {} does not start with '{}'",
            version, prefix
        )))
    }
}

#[then(expr = "the server version is at least {int}.{int}")]
async fn version_at_least(world: &mut DbWorld, major: u32, minor: u32) -> Result<(), StepError> {
    let version = world.version()?;
    let actual = version
        .major()
        .map(|actual_major| (actual_major, version.minor().unwrap_or(0)));
    match actual {
        Some(actual) if actual >= (major, minor) => Ok(()),
        Some(_) => Err(StepError::failed(format!(
            "server version {} is older than {}.{}",
            version, major, minor
        ))),
        None => Err(StepError::failed(format!(
            "server version {} is not numeric",
            version
        ))),
    }
}
