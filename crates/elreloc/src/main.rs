//! elreloc command-line entry point
//!
//! - **relocate**: move EL images to the share location recorded for their serial
//! - **serials**: list the serials found in a file or directory
//! - **config**: show the resolved configuration

use clap::{Parser, Subcommand};
use elreloc::CancelToken;
use elreloc_logging::{init_logging, init_stderr_logging, LogConfig};
use std::process::ExitCode;
use tracing::{info, warn};

mod cli;

/// Exit code for setup failures reported before any file is processed
const EXIT_FATAL: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "elreloc", version, about = "Relocate EL inspection images by serial")]
struct Cli {
    /// Enable verbose logging (debug to stderr)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Only log warnings and errors to stderr
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Move images to the location recorded for their serial
    Relocate(cli::relocate::RelocateArgs),

    /// List the unique serials in an image file or directory
    Serials(cli::serials::SerialsArgs),

    /// Show the resolved configuration
    Config(cli::config::ConfigArgs),
}

fn install_signal_handlers(cancel: &CancelToken) {
    #[cfg(unix)]
    {
        use signal_hook::consts::{SIGINT, SIGTERM};
        use signal_hook::iterator::Signals;

        match Signals::new([SIGINT, SIGTERM]) {
            Ok(mut signals) => {
                let cancel = cancel.clone();
                std::thread::spawn(move || {
                    if let Some(sig) = signals.forever().next() {
                        info!("Received signal {}, finishing the current file...", sig);
                        cancel.cancel();
                    }
                });
            }
            Err(err) => warn!("Failed to install signal handlers: {}", err),
        }
    }

    #[cfg(windows)]
    {
        let cancel = cancel.clone();
        if let Err(err) = ctrlc::set_handler(move || {
            info!("Received Ctrl+C, finishing the current file...");
            cancel.cancel();
        }) {
            warn!("Failed to install Ctrl+C handler: {}", err);
        }
    }
}

fn run_command(command: Commands, quiet: bool) -> anyhow::Result<u8> {
    match command {
        Commands::Relocate(args) => {
            let cancel = CancelToken::new();
            install_signal_handlers(&cancel);
            let status = cli::relocate::run(args, cancel)?;
            Ok(status.exit_code())
        }
        Commands::Serials(args) => cli::serials::run(args, quiet).map(|()| 0),
        Commands::Config(args) => cli::config::run(args).map(|()| 0),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_config = LogConfig {
        app_name: "elreloc",
        verbose: cli.verbose,
        quiet: cli.quiet,
    };
    if let Err(err) = init_logging(log_config) {
        eprintln!("Warning: file logging unavailable ({:#}), logging to stderr only", err);
        let fallback = LogConfig {
            app_name: "elreloc",
            verbose: cli.verbose,
            quiet: cli.quiet,
        };
        if let Err(err) = init_stderr_logging(fallback) {
            eprintln!("Warning: failed to initialize logging: {:#}", err);
        }
    }

    match run_command(cli.command, cli.quiet) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("{:?}", err);
            ExitCode::from(EXIT_FATAL)
        }
    }
}
