//! Command-line interface definitions for the `stackpilot` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::Parser;

/// Top-level CLI for the `stackpilot` binary.
#[derive(Debug, Parser)]
#[command(
    name = "stackpilot",
    about = "Provision CloudFormation stacks around a build step and tear them down afterwards",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// Provision the job's stacks, run a command, and always tear down.
    #[command(
        name = "run",
        about = "Provision the job's stacks, run a command, and always tear down"
    )]
    Run(RunCommand),
    /// Provision the job's stacks and publish their outputs without teardown.
    #[command(
        name = "up",
        about = "Provision the job's stacks and publish their outputs"
    )]
    Up(UpCommand),
    /// Delete stacks by name, by prefix, or as listed in a job file.
    #[command(
        name = "down",
        about = "Delete stacks by name, by prefix, or as listed in a job file"
    )]
    Down(DownCommand),
}

/// Job file and workspace shared by `run` and `up`.
#[derive(Debug, Parser)]
pub(crate) struct JobArgs {
    /// TOML job file listing the stacks to provision.
    #[arg(long, value_name = "PATH")]
    pub(crate) job: String,
    /// Directory that template and parameter file paths are relative to.
    ///
    /// Defaults to the current directory.
    #[arg(long, value_name = "DIR")]
    pub(crate) workspace: Option<String>,
}

/// Arguments for the `stackpilot run` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct RunCommand {
    /// Job selection.
    #[command(flatten)]
    pub(crate) job: JobArgs,
    /// Command to execute once every stack is up (use -- to separate flags).
    ///
    /// Stack outputs are exported to the command as `<stack>_<output>`
    /// environment variables.
    #[arg(required = true, trailing_var_arg = true)]
    pub(crate) command: Vec<String>,
}

/// Arguments for the `stackpilot up` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct UpCommand {
    /// Job selection.
    #[command(flatten)]
    pub(crate) job: JobArgs,
    /// Write published outputs to this file as `KEY=VALUE` lines.
    #[arg(long, value_name = "PATH")]
    pub(crate) env_file: Option<String>,
}

/// Arguments for the `stackpilot down` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct DownCommand {
    /// Treat each name as a prefix and delete the oldest running match.
    #[arg(long)]
    pub(crate) prefix: bool,
    /// Region the stacks live in. Defaults to the configured region.
    #[arg(long, value_name = "REGION")]
    pub(crate) region: Option<String>,
    /// Delete the job file's stacks, last first, honouring each stack's
    /// region and `select_by_prefix` setting.
    #[arg(long, value_name = "PATH", conflicts_with_all = ["prefix", "names"])]
    pub(crate) job: Option<String>,
    /// Stack names (or prefixes) to delete, in order.
    #[arg(required_unless_present = "job", value_name = "NAME")]
    pub(crate) names: Vec<String>,
}
