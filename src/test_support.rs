//! Test support utilities shared across unit and integration tests.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::env;
use std::ffi::OsString;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};

use crate::client::{ClientError, ClientFuture, RemoteStackClient, StackRequest};
use crate::command::{CommandError, CommandOutput, CommandRunner};
use crate::lifecycle::{CancelSignal, cancel_pair};
use crate::log::LogSink;
use crate::stack::{Region, StackDescription, StackEvent, StackOutput, StackStatus, StackSummary};
use crate::workspace::{WorkspaceError, WorkspaceReader};

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Scripted command runner that returns pre-seeded outputs in FIFO order.
///
/// Used to drive deterministic command outcomes without spawning processes.
#[derive(Clone, Debug, Default)]
pub struct ScriptedRunner {
    responses: Arc<Mutex<VecDeque<CommandOutput>>>,
    invocations: Arc<Mutex<Vec<CommandInvocation>>>,
}

/// Records a single invocation made through [`ScriptedRunner`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandInvocation {
    /// Program name as passed to the runner.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<OsString>,
    /// Extra environment passed to the program.
    pub envs: BTreeMap<String, String>,
}

impl CommandInvocation {
    /// Returns a shell-like command string for assertions.
    #[must_use]
    pub fn command_string(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        parts.extend(
            self.args
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned()),
        );
        parts.join(" ")
    }

    /// Returns the value following `flag`, if present.
    #[must_use]
    pub fn flag_value(&self, flag: &str) -> Option<String> {
        self.args
            .iter()
            .skip_while(|arg| arg.to_string_lossy() != flag)
            .nth(1)
            .map(|arg| arg.to_string_lossy().into_owned())
    }
}

impl ScriptedRunner {
    /// Creates a new runner with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all invocations recorded so far.
    #[must_use]
    pub fn invocations(&self) -> Vec<CommandInvocation> {
        locked(&self.invocations).clone()
    }

    /// Pushes a successful exit status with empty output.
    pub fn push_success(&self) {
        self.push_output(Some(0), "", "");
    }

    /// Pushes a failing exit code with stderr text.
    pub fn push_failure(&self, code: i32, stderr: impl Into<String>) {
        self.push_output(Some(code), "", stderr);
    }

    /// Pushes an explicit command output response.
    pub fn push_output(
        &self,
        code: Option<i32>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) {
        locked(&self.responses).push_back(CommandOutput {
            code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        });
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(
        &self,
        program: &str,
        args: &[OsString],
        envs: &BTreeMap<String, String>,
    ) -> Result<CommandOutput, CommandError> {
        locked(&self.invocations).push(CommandInvocation {
            program: program.to_owned(),
            args: args.to_vec(),
            envs: envs.clone(),
        });
        locked(&self.responses)
            .pop_front()
            .ok_or_else(|| CommandError::Spawn {
                program: program.to_owned(),
                message: String::from("no scripted response available"),
            })
    }
}

/// Call observed by [`ScriptedClient`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ClientCall {
    /// `create_stack` for the named stack.
    Create(String),
    /// `update_stack` for the named stack.
    Update(String),
    /// `describe_stacks`, by name or for every stack.
    Describe(Option<String>),
    /// `delete_stack` for the named stack.
    Delete(String),
    /// `describe_stack_events` for the named stack.
    Events(String),
    /// `list_stacks`.
    List,
}

type Scripted<T> = Result<T, ClientError>;

#[derive(Debug, Default)]
struct ClientState {
    describe: BTreeMap<String, VecDeque<Scripted<Vec<StackDescription>>>>,
    describe_all: VecDeque<Scripted<Vec<StackDescription>>>,
    create: VecDeque<Scripted<String>>,
    update: VecDeque<Scripted<String>>,
    delete: VecDeque<Scripted<()>>,
    events: BTreeMap<String, Scripted<Vec<StackEvent>>>,
    running: Vec<StackSummary>,
    calls: Vec<ClientCall>,
}

/// Pops the next scripted response, repeating the last one once the queue
/// is down to a single entry.
fn next_sticky<T: Clone>(queue: &mut VecDeque<Scripted<T>>) -> Option<Scripted<T>> {
    if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    }
}

/// Scripted [`RemoteStackClient`] for lifecycle and coordinator tests.
///
/// Clones share state, so a test can keep one copy for assertions while the
/// lifecycle owns another. Unscripted calls succeed: describing an
/// unscripted stack reports it missing, describe-all returns no stacks, and
/// create, update, and delete are accepted.
#[derive(Clone, Debug, Default)]
pub struct ScriptedClient {
    state: Arc<Mutex<ClientState>>,
}

impl ScriptedClient {
    /// Creates a client with nothing scripted.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, ClientState> {
        locked(&self.state)
    }

    /// Queues a describe response for `name`.
    pub fn push_describe(&self, name: &str, response: Scripted<Vec<StackDescription>>) {
        self.state()
            .describe
            .entry(name.to_owned())
            .or_default()
            .push_back(response);
    }

    /// Queues a describe response reporting `status`.
    pub fn push_status(&self, name: &str, status: StackStatus) {
        self.push_describe(name, Ok(vec![description(name, status)]));
    }

    /// Queues a describe response reporting the stack as missing.
    pub fn push_missing(&self, name: &str) {
        self.push_describe(
            name,
            Err(ClientError::NotFound {
                message: format!("Stack with id {name} does not exist"),
            }),
        );
    }

    /// Scripts a fresh create: not found, then each status in turn, with the
    /// outputs attached to the last one.
    pub fn script_create(&self, name: &str, statuses: &[StackStatus], outputs: &[(&str, &str)]) {
        self.push_missing(name);
        let last = statuses.len().saturating_sub(1);
        for (index, status) in statuses.iter().enumerate() {
            let mut desc = description(name, status.clone());
            if index == last {
                desc.outputs = outputs
                    .iter()
                    .map(|(key, value)| output(key, value))
                    .collect();
            }
            self.push_describe(name, Ok(vec![desc]));
        }
    }

    /// Queues a describe-all response.
    pub fn push_describe_all(&self, response: Scripted<Vec<StackDescription>>) {
        self.state().describe_all.push_back(response);
    }

    /// Queues a create response.
    pub fn push_create(&self, response: Scripted<String>) {
        self.state().create.push_back(response);
    }

    /// Queues an update response.
    pub fn push_update(&self, response: Scripted<String>) {
        self.state().update.push_back(response);
    }

    /// Queues a delete response.
    pub fn push_delete(&self, response: Scripted<()>) {
        self.state().delete.push_back(response);
    }

    /// Sets the event history returned for `name`, newest first.
    pub fn set_events(&self, name: &str, response: Scripted<Vec<StackEvent>>) {
        self.state().events.insert(name.to_owned(), response);
    }

    /// Sets the stacks returned by `list_stacks` before filtering.
    pub fn set_running(&self, stacks: Vec<StackSummary>) {
        self.state().running = stacks;
    }

    /// Returns every call observed so far.
    #[must_use]
    pub fn calls(&self) -> Vec<ClientCall> {
        self.state().calls.clone()
    }

    /// Counts describe calls made for `name`.
    #[must_use]
    pub fn describe_count(&self, name: &str) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|call| matches!(call, ClientCall::Describe(Some(target)) if target == name))
            .count()
    }

    /// Counts describe-all calls.
    #[must_use]
    pub fn describe_all_count(&self) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|call| matches!(call, ClientCall::Describe(None)))
            .count()
    }

    /// Names passed to create or update, in call order.
    #[must_use]
    pub fn provisioned(&self) -> Vec<String> {
        self.state()
            .calls
            .iter()
            .filter_map(|call| match call {
                ClientCall::Create(name) | ClientCall::Update(name) => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    /// Names passed to delete, in call order.
    #[must_use]
    pub fn deleted(&self) -> Vec<String> {
        self.state()
            .calls
            .iter()
            .filter_map(|call| match call {
                ClientCall::Delete(name) => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: ClientCall) {
        self.state().calls.push(call);
    }
}

fn stack_arn(name: &str) -> String {
    format!("arn:aws:cloudformation:us-east-1:123456789012:stack/{name}/0000")
}

impl RemoteStackClient for ScriptedClient {
    fn create_stack<'a>(&'a self, request: &'a StackRequest) -> ClientFuture<'a, String> {
        self.record(ClientCall::Create(request.name.clone()));
        let response = self
            .state()
            .create
            .pop_front()
            .unwrap_or_else(|| Ok(stack_arn(&request.name)));
        Box::pin(async move { response })
    }

    fn update_stack<'a>(&'a self, request: &'a StackRequest) -> ClientFuture<'a, String> {
        self.record(ClientCall::Update(request.name.clone()));
        let response = self
            .state()
            .update
            .pop_front()
            .unwrap_or_else(|| Ok(stack_arn(&request.name)));
        Box::pin(async move { response })
    }

    fn describe_stacks<'a>(
        &'a self,
        _region: &'a Region,
        name: Option<&'a str>,
    ) -> ClientFuture<'a, Vec<StackDescription>> {
        self.record(ClientCall::Describe(name.map(str::to_owned)));
        let response = {
            let mut state = self.state();
            match name {
                Some(stack) => state
                    .describe
                    .get_mut(stack)
                    .and_then(next_sticky)
                    .unwrap_or_else(|| {
                        Err(ClientError::NotFound {
                            message: format!("Stack with id {stack} does not exist"),
                        })
                    }),
                None => next_sticky(&mut state.describe_all).unwrap_or_else(|| Ok(Vec::new())),
            }
        };
        Box::pin(async move { response })
    }

    fn delete_stack<'a>(&'a self, _region: &'a Region, name: &'a str) -> ClientFuture<'a, ()> {
        self.record(ClientCall::Delete(name.to_owned()));
        let response = self.state().delete.pop_front().unwrap_or(Ok(()));
        Box::pin(async move { response })
    }

    fn describe_stack_events<'a>(
        &'a self,
        _region: &'a Region,
        name: &'a str,
    ) -> ClientFuture<'a, Vec<StackEvent>> {
        self.record(ClientCall::Events(name.to_owned()));
        let response = self
            .state()
            .events
            .get(name)
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()));
        Box::pin(async move { response })
    }

    fn list_stacks<'a>(
        &'a self,
        _region: &'a Region,
        filter: &'a [StackStatus],
    ) -> ClientFuture<'a, Vec<StackSummary>> {
        self.record(ClientCall::List);
        let response = self
            .state()
            .running
            .iter()
            .filter(|summary| filter.is_empty() || filter.contains(&summary.status))
            .cloned()
            .collect();
        Box::pin(async move { Ok(response) })
    }
}

/// Builds a description with no outputs.
#[must_use]
pub fn description(name: &str, status: StackStatus) -> StackDescription {
    StackDescription {
        name: name.to_owned(),
        id: stack_arn(name),
        status,
        status_reason: None,
        creation_time: None,
        outputs: Vec::new(),
        parameters: Vec::new(),
    }
}

/// Builds a stack output.
#[must_use]
pub fn output(key: &str, value: &str) -> StackOutput {
    StackOutput {
        key: key.to_owned(),
        value: value.to_owned(),
        description: None,
    }
}

/// Builds an event with the given id and status.
#[must_use]
pub fn event(id: &str, status: &str, reason: Option<&str>) -> StackEvent {
    StackEvent {
        id: id.to_owned(),
        resource_type: String::from("AWS::CloudFormation::Stack"),
        status: status.to_owned(),
        reason: reason.map(str::to_owned),
        timestamp: None,
    }
}

/// Returns a UTC timestamp `seconds` after the epoch.
///
/// # Panics
///
/// Panics when `seconds` is outside chrono's representable range.
#[must_use]
pub fn timestamp(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(seconds, 0)
        .single()
        .unwrap_or_else(|| panic!("timestamp {seconds} should be representable"))
}

/// Builds a running stack summary.
#[must_use]
pub fn summary(name: &str, status: StackStatus, created: i64) -> StackSummary {
    StackSummary {
        name: name.to_owned(),
        status,
        creation_time: timestamp(created),
    }
}

/// [`LogSink`] that keeps every line in memory.
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every line written so far.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        locked(&self.lines).clone()
    }

    /// Returns `true` when any line contains `needle`.
    #[must_use]
    pub fn contains(&self, needle: &str) -> bool {
        locked(&self.lines).iter().any(|line| line.contains(needle))
    }

    /// Index of the first line containing `needle`.
    #[must_use]
    pub fn position(&self, needle: &str) -> Option<usize> {
        locked(&self.lines)
            .iter()
            .position(|line| line.contains(needle))
    }
}

impl LogSink for MemorySink {
    fn line(&self, message: &str) {
        locked(&self.lines).push(message.to_owned());
    }
}

/// [`WorkspaceReader`] over an in-memory file map.
#[derive(Clone, Debug, Default)]
pub struct MemoryWorkspace {
    files: BTreeMap<String, String>,
}

impl MemoryWorkspace {
    /// Creates an empty workspace.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file.
    #[must_use]
    pub fn with_file(mut self, path: &str, contents: &str) -> Self {
        self.files.insert(path.to_owned(), contents.to_owned());
        self
    }
}

impl WorkspaceReader for MemoryWorkspace {
    fn read_to_string(&self, path: &str) -> Result<String, WorkspaceError> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| WorkspaceError::Read {
                path: path.to_owned(),
                message: String::from("file not found"),
            })
    }
}

/// Returns a signal that fires the first time the current task yields.
///
/// [`ScriptedClient`] calls complete without yielding, so the interrupt
/// lands during the first backoff or quiescence sleep rather than before
/// anything is submitted. Must be called inside a Tokio runtime.
#[must_use]
pub fn cancel_on_first_yield() -> CancelSignal {
    let (trigger, signal) = cancel_pair();
    tokio::spawn(async move { trigger.cancel() });
    signal
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: AsyncMutex<()> = AsyncMutex::const_new(());

/// Guard that holds the env mutex and restores variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: AsyncMutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets multiple environment variables while holding a global mutex.
    ///
    /// A value of `None` removes the variable for the guard's lifetime.
    pub async fn set_vars(pairs: &[(&str, Option<&str>)]) -> Self {
        debug_assert!(
            {
                let mut seen = BTreeSet::new();
                pairs.iter().all(|(key, _)| seen.insert(*key))
            },
            "duplicate environment variable keys passed to EnvGuard::set_vars"
        );

        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let old = env::var_os(key);
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe {
                match value {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
            previous.push(((*key).to_owned(), old));
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in &self.previous {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}
