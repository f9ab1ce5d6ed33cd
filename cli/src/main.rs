//! Vagrantp - declarative single-instance development infrastructure

use std::process::ExitCode;

use clap::Parser;
use owo_colors::OwoColorize as _;
use tracing_subscriber::EnvFilter;

use vagrantp_cli::cli::Cli;
use vagrantp_cli::domain::VagrantpError;
use vagrantp_cli::domain::error::EXIT_GENERAL_ERROR;
use vagrantp_cli::output::{Styles, no_color_env};

fn init_tracing(verbose: bool) {
    let default = if verbose { "vagrantp_cli=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let use_color = !cli.no_color && !no_color_env() && console::Term::stderr().is_term();

    match cli.run().await {
        Ok(code) => code,
        Err(e) => {
            let label = "Error:".style(Styles::for_terminal(use_color).error);
            let typed = e.downcast_ref::<VagrantpError>();
            match typed {
                Some(err) => eprintln!("{label} {err}"),
                None => eprintln!("{label} {e:#}"),
            }
            if let Some(suggestion) = typed.and_then(VagrantpError::suggestion) {
                eprintln!("  → {suggestion}");
            }
            ExitCode::from(typed.map_or(EXIT_GENERAL_ERROR, VagrantpError::exit_code))
        }
    }
}
