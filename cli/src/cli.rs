//! CLI argument parsing with clap derive

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::app::{AppContext, AppFlags, BehaviourFlags, OutputFlags};
use crate::commands;

/// Declarative single-instance development infrastructure
#[derive(Parser)]
#[command(
    name = "vagrantp",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Configuration file (default: ./.env)
    #[arg(long, global = true, env = "VAGRANTP_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output (a non-empty NO_COLOR does the same)
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Show debug logs on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Answer yes to prompts
    #[arg(short, long, global = true)]
    pub yes: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create or start the instance, then provision it
    Up(commands::up::UpArgs),

    /// Open a shell in the instance, or run one command
    Ssh(commands::ssh::SshArgs),

    /// Stop the instance
    Stop(commands::stop::StopArgs),

    /// Remove the instance and its provisioning record
    Rm(commands::rm::RmArgs),

    /// Show instance state
    Status,

    /// Run the configured playbook against the running instance
    Provision(commands::provision::ProvisionArgs),

    /// Show version
    Version,
}

impl Cli {
    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn run(self) -> Result<ExitCode> {
        let Cli {
            config,
            quiet,
            no_color,
            yes,
            command,
            ..
        } = self;

        let app = || {
            AppContext::new(AppFlags {
                output: OutputFlags { no_color, quiet },
                behaviour: BehaviourFlags {
                    yes,
                    config: config.clone(),
                },
            })
        };

        match command {
            Command::Version => {
                commands::version::run();
                Ok(ExitCode::SUCCESS)
            }
            Command::Up(args) => commands::up::run(&app()?, &args).await,
            Command::Ssh(args) => commands::ssh::run(&app()?, &args).await,
            Command::Stop(args) => commands::stop::run(&app()?, &args).await,
            Command::Rm(args) => commands::rm::run(&app()?, &args).await,
            Command::Status => commands::status::run(&app()?).await,
            Command::Provision(args) => commands::provision::run(&app()?, &args).await,
        }
    }
}
