//! Shared fixtures for coordinator BDD scenarios.
//!
//! The context is cloned into every step, so its mutable parts live behind
//! shared locks.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rstest::fixture;
use stackpilot::stack::DISABLED_TIMEOUT_SENTINEL;
use stackpilot::test_support::{MemorySink, MemoryWorkspace, ScriptedClient, description};
use stackpilot::{
    Capability, Environment, MultiStackCoordinator, Region, RunReport, SharedSink,
    StackConfig, StackLifecycle, StackStatus,
};
use tokio::runtime::{Builder, Runtime};

pub const TEMPLATE: &str = "stack.json";

#[derive(Clone, Debug)]
pub struct CoordinatorContext {
    pub client: ScriptedClient,
    pub sink: MemorySink,
    configs: Arc<Mutex<Vec<StackConfig>>>,
    report: Arc<Mutex<Option<RunReport>>>,
    step_env: Arc<Mutex<Option<Environment>>>,
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl CoordinatorContext {
    fn new() -> Self {
        Self {
            client: ScriptedClient::new(),
            sink: MemorySink::new(),
            configs: Arc::new(Mutex::new(Vec::new())),
            report: Arc::new(Mutex::new(None)),
            step_env: Arc::new(Mutex::new(None)),
        }
    }

    pub fn add(&self, config: StackConfig) {
        locked(&self.configs).push(config);
    }

    pub fn configs(&self) -> Vec<StackConfig> {
        locked(&self.configs).clone()
    }

    pub fn coordinator(&self) -> MultiStackCoordinator<ScriptedClient, MemoryWorkspace> {
        let sink: SharedSink = Arc::new(self.sink.clone());
        MultiStackCoordinator::new(
            StackLifecycle::new(self.client.clone(), sink),
            MemoryWorkspace::new().with_file(TEMPLATE, "{}"),
            Region::default(),
        )
    }

    /// Runs the job with a build step that captures its environment.
    pub fn run(&self) {
        let runtime = paused_runtime();
        let configs = self.configs();
        let coordinator = self.coordinator();
        let (report, step_env) = runtime.block_on(async {
            coordinator
                .run_with(&configs, Environment::new(), |env| async move { env })
                .await
        });
        *locked(&self.report) = Some(report);
        *locked(&self.step_env) = step_env;
    }

    pub fn report(&self) -> Option<RunReport> {
        locked(&self.report).clone()
    }

    pub fn step_env(&self) -> Option<Environment> {
        locked(&self.step_env).clone()
    }

    pub fn script_success(&self, name: &str, outputs: &[(&str, &str)]) {
        self.client
            .script_create(name, &[StackStatus::CreateComplete], outputs);
    }

    pub fn script_failure(&self, name: &str) {
        self.client.push_missing(name);
        let mut failed = description(name, StackStatus::CreateFailed);
        failed.status_reason = Some(String::from("Resource creation cancelled"));
        self.client.push_describe(name, Ok(vec![failed]));
    }

    pub fn script_stuck(&self, name: &str) {
        self.client.push_missing(name);
        self.client.push_status(name, StackStatus::CreateInProgress);
    }
}

/// Stack config with polling limits disabled and auto-delete on.
pub fn stack_config(name: &str) -> StackConfig {
    StackConfig {
        name: name.to_owned(),
        description: None,
        template: String::from(TEMPLATE),
        parameters: None,
        parameters_file: None,
        region: None,
        capability: Capability::default(),
        timeout_secs: DISABLED_TIMEOUT_SENTINEL,
        quiescence_secs: 0,
        auto_delete: true,
        fail_cascade: false,
        select_by_prefix: false,
    }
}

/// Current-thread runtime with a paused clock so poll sleeps and timeouts
/// complete instantly.
fn paused_runtime() -> Runtime {
    Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap_or_else(|err| panic!("tokio runtime should build: {err}"))
}

#[fixture]
pub fn coordinator_context() -> CoordinatorContext {
    CoordinatorContext::new()
}
