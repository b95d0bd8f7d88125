//! Binary entry point for the Stackpilot CLI.

mod cli;

use std::ffi::OsString;
use std::io::{self, Write};
use std::process;

use camino::Utf8PathBuf;
use clap::Parser;
use thiserror::Error;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use stackpilot::{
    AwsCliClient, AwsConfig, CancelSignal, CommandError, CommandOutput, CommandRunner,
    ConfigError, DeleteTarget, DirWorkspace, EnvFilePublisher, Environment, JobError, JobFile,
    MultiStackCoordinator, OutputPublisher, ProcessCommandRunner, PublishError, Region,
    StackLifecycle, StreamingCommandRunner, WorkspaceError, WriterSink, cancel_pair,
};

use cli::{Cli, DownCommand, JobArgs, RunCommand, UpCommand};

const LOG_ENV: &str = "STACKPILOT_LOG";
const DEFAULT_LOG_FILTER: &str = "warn";

type CliLifecycle = StackLifecycle<AwsCliClient<ProcessCommandRunner>>;

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Job(#[from] JobError),
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
    #[error(transparent)]
    Publish(#[from] PublishError),
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error("command task failed: {0}")]
    Join(String),
    #[error("no command given")]
    MissingCommand,
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    let (provision_trigger, cancel) = cancel_pair();
    let (teardown_trigger, teardown_cancel) = cancel_pair();
    tokio::spawn(async move {
        // First Ctrl-C stops provisioning; a second one abandons teardown.
        for trigger in [provision_trigger, teardown_trigger] {
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
            trigger.cancel();
        }
    });

    let signals = Signals {
        cancel,
        teardown_cancel,
    };
    let exit_code = match dispatch(cli, signals).await {
        Ok(code) => code,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Interrupt signals handed to each lifecycle.
struct Signals {
    cancel: CancelSignal,
    teardown_cancel: CancelSignal,
}

async fn dispatch(cli: Cli, signals: Signals) -> Result<i32, CliError> {
    match cli {
        Cli::Run(command) => run_command(command, signals).await,
        Cli::Up(command) => up_command(command, signals).await,
        Cli::Down(command) => down_command(command, signals).await,
    }
}

fn load_config() -> Result<AwsConfig, CliError> {
    let config = AwsConfig::load_without_cli_args()?;
    config.validate()?;
    Ok(config)
}

fn lifecycle(config: &AwsConfig, signals: Signals) -> CliLifecycle {
    let client = AwsCliClient::with_process_runner(
        config.cli_bin.trim(),
        config.credentials().as_ref(),
    );
    StackLifecycle::new(client, WriterSink::shared(io::stdout()))
        .with_cancel(signals.cancel)
        .with_teardown_cancel(signals.teardown_cancel)
}

fn prepare(
    args: &JobArgs,
    signals: Signals,
) -> Result<(MultiStackCoordinator<AwsCliClient<ProcessCommandRunner>, DirWorkspace>, JobFile), CliError>
{
    let job = JobFile::load(&Utf8PathBuf::from(args.job.as_str()))?;
    let workspace = DirWorkspace::open(args.workspace.as_deref().unwrap_or("."))?;
    let config = load_config()?;
    let coordinator =
        MultiStackCoordinator::new(lifecycle(&config, signals), workspace, config.region());
    Ok((coordinator, job))
}

async fn run_command(args: RunCommand, signals: Signals) -> Result<i32, CliError> {
    let (program, rest) = args
        .command
        .split_first()
        .ok_or(CliError::MissingCommand)?;
    let (coordinator, job) = prepare(&args.job, signals)?;

    let step_program = program.clone();
    let step_args: Vec<OsString> = rest.iter().map(OsString::from).collect();
    let (report, outcome) = coordinator
        .run_with(&job.stacks, Environment::from_process(), |env| {
            run_step(step_program, step_args, env)
        })
        .await;

    if !report.teardown.is_clean() {
        warn!(failed = report.teardown.failed.len(), "some stacks could not be deleted");
    }
    step_exit_code(outcome)
}

async fn run_step(
    program: String,
    args: Vec<OsString>,
    env: Environment,
) -> Result<CommandOutput, CliError> {
    tokio::task::spawn_blocking(move || StreamingCommandRunner.run(&program, &args, env.as_map()))
        .await
        .map_err(|err| CliError::Join(err.to_string()))?
        .map_err(CliError::from)
}

/// Exit status for `run`: the command's own status, or 1 when the command
/// was skipped or died without one.
fn step_exit_code(outcome: Option<Result<CommandOutput, CliError>>) -> Result<i32, CliError> {
    match outcome {
        None => Ok(1),
        Some(Ok(output)) => Ok(output.code.unwrap_or(1)),
        Some(Err(err)) => Err(err),
    }
}

async fn up_command(args: UpCommand, signals: Signals) -> Result<i32, CliError> {
    let (coordinator, job) = prepare(&args.job, signals)?;
    let run = coordinator
        .provision(&job.stacks, Environment::from_process())
        .await;

    if let Some(path) = args.env_file {
        let mut publisher = EnvFilePublisher::create(Utf8PathBuf::from(path))?;
        publisher.publish(run.outputs())?;
    }
    Ok(exit_status(run.succeeded()))
}

async fn down_command(args: DownCommand, signals: Signals) -> Result<i32, CliError> {
    let config = load_config()?;
    let region = target_region(args.region.as_deref(), &config);
    let targets = down_targets(&args, &region)?;
    let lifecycle = lifecycle(&config, signals);

    let mut all_deleted = true;
    for target in &targets {
        if let Err(err) = lifecycle.delete(target).await {
            warn!(stack = %target.name, error = %err, "delete failed");
            all_deleted = false;
            if err.halts_run() {
                break;
            }
        }
    }
    Ok(exit_status(all_deleted))
}

fn down_targets(args: &DownCommand, region: &Region) -> Result<Vec<DeleteTarget>, CliError> {
    if let Some(path) = &args.job {
        let job = JobFile::load(&Utf8PathBuf::from(path.as_str()))?;
        return Ok(job.delete_targets(&Environment::from_process(), region));
    }
    Ok(args
        .names
        .iter()
        .map(|name| {
            if args.prefix {
                DeleteTarget::oldest_with_prefix(name.as_str(), region.clone())
            } else {
                DeleteTarget::exact(name.as_str(), region.clone())
            }
        })
        .collect())
}

fn target_region(flag: Option<&str>, config: &AwsConfig) -> Region {
    flag.map(str::trim)
        .filter(|region| !region.is_empty())
        .map_or_else(|| config.region(), Region::from)
}

const fn exit_status(succeeded: bool) -> i32 {
    if succeeded { 0 } else { 1 }
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}
