//! Cucumber step definitions for lifecycle tests.

pub mod environment;
pub mod run;

use dbfunc::test_utils::Call;

/// Parse a provisioner call name as written in feature files.
pub fn parse_call(name: &str) -> Call {
    match name {
        "start" => Call::Start,
        "stop" => Call::Stop,
        "clean" => Call::Clean,
        "release" => Call::Release,
        other => panic!("Unknown provisioner call: {}", other),
    }
}

/// Render recorded calls as `start, stop, release`.
pub fn format_calls(calls: &[Call]) -> String {
    calls
        .iter()
        .map(|call| match call {
            Call::Start => "start",
            Call::Stop => "stop",
            Call::Clean => "clean",
            Call::Release => "release",
        })
        .collect::<Vec<_>>()
        .join(", ")
}
