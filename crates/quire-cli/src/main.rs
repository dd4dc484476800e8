//! Quire command line
//!
//! Builds walls and agreements block by block, then drives them through
//! draft → published → sent → signed against a local SQLite database and
//! upload directory.
//!
//! ## Usage
//!
//! ```bash
//! quire new wall "Launch notes" --description "For the team"
//! quire add 0193 heading --text Welcome
//! quire add 0193 image
//! quire attach 0193 5f2a ./hero.png
//! quire publish 0193 --protect
//! quire send 0193 --to guest@example.com
//! ```

mod app;
mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use quire_kernel::QuireConfig;
use quire_kernel::config::default_data_dir;

use crate::app::App;
use crate::commands::Command;

#[derive(Debug, Parser)]
#[command(name = "quire", version, about = "Build, publish, and send documents")]
struct Cli {
    /// Config file (default: ~/.config/quire/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory holding the database and uploads
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match QuireConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("quire: {e}");
            return ExitCode::FAILURE;
        }
    };

    let _telemetry = match quire_telemetry::init("quire", &config.logging.filter) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("quire: {e}");
            return ExitCode::FAILURE;
        }
    };

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!(error = ?e, "command failed");
            eprintln!("quire: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, config: QuireConfig) -> anyhow::Result<()> {
    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };
    let app = App::open(&config, &data_dir)?;
    let mut stdout = std::io::stdout().lock();
    commands::run(&app, cli.command, &mut stdout).await
}
