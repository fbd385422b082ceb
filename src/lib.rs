//! dbfunc - database functional test driver
//!
//! Runs Gherkin scenarios against a disposable MongoDB or Redis environment
//! started in a container, then stops and removes it.

pub mod backend;
pub mod config;
pub mod environment;
pub mod features;
pub mod orchestrator;
pub mod runner;
pub mod steps;
pub mod utils;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
