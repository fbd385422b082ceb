//! Environment state machine step definitions.

use cucumber::{given, then, when, World};
use dbfunc::backend::Backend;
use dbfunc::environment::{
    BackendVersion, EnvironmentContext, EnvironmentError, EnvironmentState,
};
use dbfunc::test_utils::RecordingProvisioner;

use super::{format_calls, parse_call};

/// Test context for environment lifecycle scenarios.
#[derive(Debug, World)]
#[world(init = Self::new)]
pub struct EnvironmentWorld {
    provisioner: RecordingProvisioner,
    context: Option<EnvironmentContext>,
    last_error: Option<EnvironmentError>,
}

impl EnvironmentWorld {
    fn new() -> Self {
        Self {
            provisioner: RecordingProvisioner::new(Backend::Redis),
            context: None,
            last_error: None,
        }
    }

    fn context(&mut self) -> &mut EnvironmentContext {
        self.context
            .as_mut()
            .expect("Environment context not initialized")
    }
}

fn parse_state(name: &str) -> EnvironmentState {
    match name {
        "uninitialized" => EnvironmentState::Uninitialized,
        "loaded" => EnvironmentState::Loaded,
        "stopped" => EnvironmentState::Stopped,
        "cleaned" => EnvironmentState::Cleaned,
        other => panic!("Unknown environment state: {}", other),
    }
}

// --- Given steps ---

#[given(expr = "a {word} environment context")]
async fn given_context(world: &mut EnvironmentWorld, backend: String) {
    let backend: Backend = backend.parse().expect("valid backend");
    world.provisioner = RecordingProvisioner::new(backend);
    world.context = Some(EnvironmentContext::new(
        backend,
        BackendVersion::new("7"),
        Box::new(world.provisioner.clone()),
    ));
}

#[given(expr = "the provisioner fails to {word}")]
async fn given_provisioner_fails(world: &mut EnvironmentWorld, call: String) {
    world.provisioner.fail_on(parse_call(&call));
}

#[given(expr = "the environment has been {word}")]
async fn given_environment_has_been(world: &mut EnvironmentWorld, state: String) {
    let ctx = world.context();
    match parse_state(&state) {
        EnvironmentState::Uninitialized => {}
        EnvironmentState::Loaded => ctx.load().await.expect("load succeeds"),
        EnvironmentState::Stopped => {
            ctx.load().await.expect("load succeeds");
            ctx.stop().await.expect("stop succeeds");
        }
        EnvironmentState::Cleaned => {
            ctx.load().await.expect("load succeeds");
            ctx.clean().await.expect("clean succeeds");
        }
    }
}

// --- When steps ---

#[when(expr = "I {word} the environment")]
async fn when_transition(world: &mut EnvironmentWorld, operation: String) {
    let ctx = world.context();
    let result = match operation.as_str() {
        "load" => ctx.load().await,
        "stop" => ctx.stop().await,
        "clean" => ctx.clean().await,
        "release" => ctx.release(),
        other => panic!("Unknown operation: {}", other),
    };
    world.last_error = result.err();
}

// --- Then steps ---

#[then(expr = "the environment is {word}")]
async fn then_environment_is(world: &mut EnvironmentWorld, state: String) {
    assert_eq!(world.context().state(), parse_state(&state));
}

#[then("the transition succeeds")]
async fn then_transition_succeeds(world: &mut EnvironmentWorld) {
    if let Some(err) = &world.last_error {
        panic!("Expected success, got: {}", err);
    }
}

#[then("the transition is rejected")]
async fn then_transition_rejected(world: &mut EnvironmentWorld) {
    assert!(
        matches!(
            world.last_error,
            Some(EnvironmentError::InvalidTransition { .. })
        ),
        "Expected invalid transition, got {:?}",
        world.last_error
    );
}

#[then("the transition fails")]
async fn then_transition_fails(world: &mut EnvironmentWorld) {
    assert!(world.last_error.is_some(), "Expected the transition to fail");
}

#[then(expr = "the provisioner saw {string}")]
async fn then_provisioner_saw(world: &mut EnvironmentWorld, expected: String) {
    assert_eq!(format_calls(&world.provisioner.calls()), expected);
}

#[then("the environment has an endpoint")]
async fn then_has_endpoint(world: &mut EnvironmentWorld) {
    assert!(world.context().endpoint().is_some());
}

#[then("the environment has no endpoint")]
async fn then_has_no_endpoint(world: &mut EnvironmentWorld) {
    assert!(world.context().endpoint().is_none());
}

#[then(expr = "the environment version is {string}")]
async fn then_version_is(world: &mut EnvironmentWorld, expected: String) {
    assert_eq!(world.context().version().full(), expected);
}
