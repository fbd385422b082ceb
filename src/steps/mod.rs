//! Step vocabulary.
//!
//! Steps are cucumber step functions over the per-scenario [`DbWorld`],
//! written with cucumber expressions:
//!
//! ```ignore
//! #[when(expr = "I delete redis key {string}")]
//! async fn delete_key(world: &mut DbWorld, key: String) -> Result<(), StepError> {
//!     ...
//! }
//! ```
//!
//! A step returning `Err` fails its scenario with the error's message. Every
//! backend's vocabulary is registered in every run; a phrase of a backend other
//! than the one under test fails with [`StepError::WrongBackend`] when it runs.

pub mod common;
pub mod mongodb;
pub mod redis;
mod world;

pub use world::{Attachment, DbWorld, MONGODB_TEST_DATABASE};

use cucumber::gherkin;

use crate::backend::Backend;

/// Errors raised by steps.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("{0}")]
    Failed(String),

    #[error("scenario is not attached to an environment")]
    Detached,

    #[error("step requires a {required} environment, the run targets {actual}")]
    WrongBackend { required: Backend, actual: Backend },

    #[error("step needs a data table with a header row")]
    MissingTable,

    #[error("redis: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("mongodb: {0}")]
    Mongodb(#[from] ::mongodb::error::Error),
}

impl StepError {
    pub fn failed(message: impl Into<String>) -> Self {
        StepError::Failed(message.into())
    }
}

/// Data table rows keyed by the header row.
///
/// Cell values go through `${name}` interpolation.
pub fn table_records(
    world: &DbWorld,
    step: &gherkin::Step,
) -> Result<Vec<Vec<(String, String)>>, StepError> {
    let table = step.table.as_ref().ok_or(StepError::MissingTable)?;
    let (header, rows) = table.rows.split_first().ok_or(StepError::MissingTable)?;
    Ok(rows
        .iter()
        .map(|row| {
            header
                .iter()
                .zip(row)
                .map(|(name, value)| (name.clone(), world.interpolate(value)))
                .collect()
        })
        .collect())
}
