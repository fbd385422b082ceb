//! Lifecycle tests for the run driver using Cucumber.
//!
//! Scenarios run against a recording provisioner, so no container runtime is
//! needed:
//!
//! ```bash
//! cargo test --test lifecycle --features test-utils
//! ```

mod steps;

use cucumber::World;
use steps::environment::EnvironmentWorld;
use steps::run::RunWorld;

#[tokio::main]
async fn main() {
    println!("\n=== Running Environment Lifecycle Tests ===\n");
    EnvironmentWorld::cucumber()
        .fail_on_skipped()
        .run_and_exit("tests/lifecycle/features/environment.feature")
        .await;

    println!("\n=== Running Suite Run Tests ===\n");
    RunWorld::cucumber()
        .fail_on_skipped()
        .run_and_exit("tests/lifecycle/features/run.feature")
        .await;
}
