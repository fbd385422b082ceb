//! Shared helpers for the binary and the environment layer.

pub mod bootstrap;
pub mod retry;
