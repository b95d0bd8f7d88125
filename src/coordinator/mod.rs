//! Ordered provisioning of every stack in a job, with reverse teardown.
//!
//! Stacks are created strictly one after another because later stacks may
//! reference earlier stacks' outputs. Each per-stack failure is turned into
//! a log line and a [`StackOutcome::Failed`] record; nothing here returns an
//! error. Teardown is best effort and always walks the records backwards.

use std::future::Future;

use tracing::{info, warn};

use crate::client::RemoteStackClient;
use crate::env::Environment;
use crate::job::StackConfig;
use crate::lifecycle::StackLifecycle;
use crate::publish::OutputPublisher;
use crate::stack::{OutputSet, Region, StackHandle, StackSpec};
use crate::workspace::WorkspaceReader;

/// What happened to one configured stack.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StackOutcome {
    /// Reached a successful terminal state.
    Created,
    /// Could not be built or provisioned.
    Failed {
        /// Operator-facing reason.
        reason: String,
    },
    /// Not attempted because an earlier stack failed.
    Skipped,
}

/// One configured stack and its fate within a run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StackRecord {
    /// Stack name, expanded against the environment at its turn.
    pub name: String,
    /// Spec the stack was provisioned from, when it could be built.
    pub spec: Option<StackSpec>,
    /// Present only when the stack was created successfully.
    pub handle: Option<StackHandle>,
    /// Outcome of the attempt.
    pub outcome: StackOutcome,
}

impl StackRecord {
    fn skipped(name: String) -> Self {
        Self {
            name,
            spec: None,
            handle: None,
            outcome: StackOutcome::Skipped,
        }
    }

    fn failed(name: String, spec: Option<StackSpec>, reason: String) -> Self {
        Self {
            name,
            spec,
            handle: None,
            outcome: StackOutcome::Failed { reason },
        }
    }
}

/// Records and environment produced by [`MultiStackCoordinator::provision`].
#[derive(Clone, Debug, Default)]
pub struct CoordinatorRun {
    records: Vec<StackRecord>,
    env: Environment,
    outputs: OutputSet,
}

impl CoordinatorRun {
    /// Returns `true` when every configured stack was created.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.records
            .iter()
            .all(|record| record.outcome == StackOutcome::Created)
    }

    /// Records in configuration order.
    #[must_use]
    pub fn records(&self) -> &[StackRecord] {
        &self.records
    }

    /// Environment including every published output.
    #[must_use]
    pub const fn env(&self) -> &Environment {
        &self.env
    }

    /// Outputs of every created stack.
    #[must_use]
    pub const fn outputs(&self) -> &OutputSet {
        &self.outputs
    }

    /// Handles that are still live, in creation order.
    pub fn live_handles(&self) -> impl Iterator<Item = &StackHandle> {
        self.records
            .iter()
            .filter_map(|record| record.handle.as_ref())
            .filter(|handle| !handle.is_deleted())
    }
}

/// Result of a teardown pass.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TeardownSummary {
    /// Stacks deleted, in deletion order.
    pub deleted: Vec<String>,
    /// Stacks whose deletion failed, with the reason.
    pub failed: Vec<(String, String)>,
    /// Created stacks kept because auto-delete is off.
    pub retained: Vec<String>,
}

impl TeardownSummary {
    /// Returns `true` when no deletion failed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Overall outcome of a provision-then-teardown run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RunReport {
    /// Every stack was created.
    pub succeeded: bool,
    /// Outputs of every created stack.
    pub outputs: OutputSet,
    /// What teardown did.
    pub teardown: TeardownSummary,
}

/// Sequences stack lifecycles for one job.
pub struct MultiStackCoordinator<C, W> {
    lifecycle: StackLifecycle<C>,
    workspace: W,
    default_region: Region,
}

impl<C, W> MultiStackCoordinator<C, W>
where
    C: RemoteStackClient,
    W: WorkspaceReader,
{
    /// Creates a coordinator over `lifecycle`, reading templates and
    /// parameter files from `workspace`.
    #[must_use]
    pub const fn new(lifecycle: StackLifecycle<C>, workspace: W, default_region: Region) -> Self {
        Self {
            lifecycle,
            workspace,
            default_region,
        }
    }

    /// Borrows the lifecycle engine.
    #[must_use]
    pub const fn lifecycle(&self) -> &StackLifecycle<C> {
        &self.lifecycle
    }

    fn say(&self, message: &str) {
        self.lifecycle.sink().line(message);
    }

    /// Provisions `configs` in order, publishing each stack's outputs into
    /// the environment before the next stack is built.
    ///
    /// A failure marks the run failed. When the failing stack has
    /// `fail_cascade` set, or the failure was a timeout or an interrupt,
    /// every later stack is skipped. Once the interrupt signal has fired no
    /// further stack is submitted, even if the current one still finished.
    pub async fn provision(&self, configs: &[StackConfig], env: Environment) -> CoordinatorRun {
        let mut run = CoordinatorRun {
            env,
            ..CoordinatorRun::default()
        };
        let mut skip_rest = false;

        for config in configs {
            let name = run.env.expand(&config.name);
            if skip_rest {
                self.say(&format!(
                    "Unable to build stack '{name}' due to previous failed stacks"
                ));
                run.records.push(StackRecord::skipped(name));
                continue;
            }
            if self.lifecycle.is_interrupted() {
                self.say(&format!(
                    "Unable to build stack '{name}' because the run was interrupted"
                ));
                skip_rest = true;
                run.records.push(StackRecord::skipped(name));
                continue;
            }

            let spec = match config.to_spec(&run.env, &self.workspace, &self.default_region) {
                Ok(spec) => spec,
                Err(err) => {
                    self.say(&format!("Failed to build stack '{name}': {err}"));
                    skip_rest = config.fail_cascade;
                    run.records
                        .push(StackRecord::failed(name, None, err.to_string()));
                    continue;
                }
            };
            if let Some(description) = &spec.description {
                self.say(&format!("Provisioning stack '{name}': {description}"));
            }

            match self.lifecycle.create(&spec, &run.env).await {
                Ok(handle) => {
                    self.publish(&mut run, &handle.outputs);
                    info!(stack = %handle.name, outputs = handle.outputs.len(), "stack created");
                    run.records.push(StackRecord {
                        name,
                        spec: Some(spec),
                        handle: Some(handle),
                        outcome: StackOutcome::Created,
                    });
                }
                Err(err) => {
                    let reason = err.reason();
                    self.say(&format!("Stack '{name}' failed: {reason}"));
                    skip_rest = spec.fail_cascade || err.halts_run();
                    run.records
                        .push(StackRecord::failed(name, Some(spec), reason));
                }
            }
        }

        run
    }

    fn publish(&self, run: &mut CoordinatorRun, outputs: &OutputSet) {
        for (key, value) in outputs {
            self.say(&format!("New environment variable: {key}={value}"));
        }
        if let Err(err) = run.env.publish(outputs) {
            warn!(error = %err, "failed to publish stack outputs");
        }
        run.outputs
            .extend(outputs.iter().map(|(key, value)| (key.clone(), value.clone())));
    }

    /// Deletes every live auto-delete stack in reverse creation order.
    ///
    /// Failures are logged and collected; they never stop the remaining
    /// deletions.
    pub async fn teardown(&self, run: &mut CoordinatorRun) -> TeardownSummary {
        let mut summary = TeardownSummary::default();
        for record in run.records.iter_mut().rev() {
            let (Some(spec), Some(handle)) = (&record.spec, &mut record.handle) else {
                continue;
            };
            if handle.is_deleted() {
                continue;
            }
            if !spec.auto_delete {
                self.say(&format!("Keeping stack {} (auto-delete disabled).", handle.name));
                summary.retained.push(handle.name.clone());
                continue;
            }
            match self.lifecycle.teardown(handle, spec.poll.backoff).await {
                Ok(()) => summary.deleted.push(handle.name.clone()),
                Err(err) => {
                    let reason = err.reason();
                    warn!(stack = %handle.name, error = %err, "teardown failed");
                    self.say(&format!("Failed to tear down stack {}: {reason}", handle.name));
                    summary.failed.push((handle.name.clone(), reason));
                }
            }
        }
        summary
    }

    /// Provisions `configs`, then always tears down.
    pub async fn run(&self, configs: &[StackConfig], env: Environment) -> RunReport {
        let (report, _) = self
            .run_with(configs, env, |_| async {})
            .await;
        report
    }

    /// Provisions `configs`, runs `step` with the populated environment when
    /// every stack was created and no interrupt arrived, then always tears
    /// down.
    ///
    /// Returns the report and the step's result, which is `None` when the
    /// step was skipped.
    pub async fn run_with<F, Fut, T>(
        &self,
        configs: &[StackConfig],
        env: Environment,
        step: F,
    ) -> (RunReport, Option<T>)
    where
        F: FnOnce(Environment) -> Fut,
        Fut: Future<Output = T>,
    {
        let mut run = self.provision(configs, env).await;
        let outcome = if !run.succeeded() {
            self.say("Skipping build step because stack provisioning failed.");
            None
        } else if self.lifecycle.is_interrupted() {
            self.say("Skipping build step because the run was interrupted.");
            None
        } else {
            Some(step(run.env.clone()).await)
        };
        let teardown = self.teardown(&mut run).await;
        let report = RunReport {
            succeeded: run.succeeded(),
            outputs: run.outputs,
            teardown,
        };
        (report, outcome)
    }
}
