//! Test utilities and fake implementations.
//!
//! Provides a provisioner that records lifecycle calls in memory, for testing
//! the environment state machine and the run driver without a container
//! runtime.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::backend::Backend;
use crate::environment::{BackendVersion, Endpoint, ProvisionError, Provisioned, Provisioner};

/// Version reported by [`RecordingProvisioner`] on start.
pub const REPORTED_VERSION: &str = "7.2.4";

/// A provisioner lifecycle call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Start,
    Stop,
    Clean,
    Release,
}

#[derive(Debug, Default)]
struct Recording {
    calls: Vec<Call>,
    failing: Vec<Call>,
}

/// Fake provisioner that records every call.
///
/// Clones share one recording, so a test can keep a handle after boxing a
/// clone into an `EnvironmentContext`.
#[derive(Debug, Clone)]
pub struct RecordingProvisioner {
    backend: Backend,
    recording: Arc<Mutex<Recording>>,
}

impl RecordingProvisioner {
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            recording: Arc::new(Mutex::new(Recording::default())),
        }
    }

    /// Make every later `call` fail.
    pub fn fail_on(&self, call: Call) {
        self.lock().failing.push(call);
    }

    /// Calls made so far, in order. Failed calls are included.
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn reported_version(&self) -> &'static str {
        REPORTED_VERSION
    }

    fn lock(&self) -> MutexGuard<'_, Recording> {
        self.recording.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: Call) -> Result<(), ProvisionError> {
        let mut recording = self.lock();
        recording.calls.push(call);
        if recording.failing.contains(&call) {
            return Err(ProvisionError::Other(format!("{:?} failed on request", call)));
        }
        Ok(())
    }
}

#[async_trait]
impl Provisioner for RecordingProvisioner {
    async fn start(&mut self) -> Result<Provisioned, ProvisionError> {
        self.record(Call::Start)?;
        let port = self.backend.container_port();
        Ok(Provisioned {
            endpoint: Endpoint {
                host: "localhost".to_string(),
                port,
                uri: self.backend.connection_uri("localhost", port),
            },
            version: Some(BackendVersion::new(REPORTED_VERSION)),
        })
    }

    async fn stop(&mut self) -> Result<(), ProvisionError> {
        self.record(Call::Stop)
    }

    async fn clean(&mut self) -> Result<(), ProvisionError> {
        self.record(Call::Clean)
    }

    fn release(&mut self) -> Result<(), ProvisionError> {
        self.record(Call::Release)
    }
}
