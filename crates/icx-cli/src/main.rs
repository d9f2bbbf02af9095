//! # icx CLI entry point
//!
//! Parses command-line arguments, installs logging and dispatches to the
//! subcommand handlers in `icx_cli`.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use icx_cli::history::{run_history, run_import, HistoryArgs, ImportArgs};
use icx_cli::run::{run_batch, RunArgs};
use icx_cli::DEFAULT_DATABASE_URL;

/// Invoice compliance decision engine.
///
/// Evaluates normalised invoices against tax-authority data and purchasing
/// policy, and decides APPROVE, APPROVE_WITH_REVIEW or ESCALATE for each.
#[derive(Parser, Debug)]
#[command(name = "icx", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    log_json: bool,

    /// Decision store location.
    #[arg(long, global = true, env = "ICX_DATABASE_URL", default_value = DEFAULT_DATABASE_URL)]
    db: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Evaluate a batch of invoices and print the decisions.
    Run(RunArgs),

    /// Show recorded decisions.
    History(HistoryArgs),

    /// Seed the decision store from a JSON-lines file.
    ImportHistory(ImportArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "icx starting");

    let result = match &cli.command {
        Commands::Run(args) => run_batch(args, &cli.db).await,
        Commands::History(args) => run_history(args, &cli.db).await,
        Commands::ImportHistory(args) => run_import(args, &cli.db).await,
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

/// `RUST_LOG` wins when set; otherwise `-v` counts pick the level.
fn init_tracing(verbose: u8, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_for(verbose)));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn level_for(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}
