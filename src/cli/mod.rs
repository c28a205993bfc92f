pub mod process;
pub mod report;

use std::{env, path::PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use process::{kill_previous_daemons, restart_daemon};
use report::{process_report_command, process_today_command, ReportCommand, TodayCommand};
use tracing::level_filters::LevelFilter;

use crate::{
    daemon::{start_daemon, Cadence},
    utils::{
        dir::create_application_default_path,
        logging::{enable_logging, CLI_PREFIX},
    },
};

#[derive(Parser, Debug)]
#[command(name = "Daytally", version, long_about = None)]
#[command(about = "Tracks how much active time you spend at the computer each day", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, help = "Enable logging")]
    log: bool,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Starts the tracking daemon in the background")]
    Init {},
    #[command(about = "Show today's recorded usage")]
    Today {
        #[command(flatten)]
        command: TodayCommand,
    },
    #[command(about = "Show recorded usage for a range of days")]
    Report {
        #[command(flatten)]
        command: ReportCommand,
    },
    #[command(
        about = "Run the daemon directly in current console. Used for creating a daemon internally and for debugging"
    )]
    Serve {
        #[arg(
            long,
            help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
        )]
        dir: Option<PathBuf>,
    },
    #[command(about = "Stop a currently running daemon")]
    Stop {},
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    enable_logging(
        CLI_PREFIX,
        &create_application_default_path()?,
        logging_level,
        args.log,
    )?;

    match args.commands {
        Commands::Init {} => restart_daemon(),
        Commands::Today { command } => process_today_command(command).await,
        Commands::Report { command } => process_report_command(command).await,
        Commands::Serve { dir } => {
            let dir = dir.map_or_else(create_application_default_path, Ok)?;
            start_daemon(dir, Cadence::default()).await
        }
        Commands::Stop {} => {
            let process_name = env::current_exe().expect("Can't operate without an executable");
            kill_previous_daemons(&process_name);
            Ok(())
        }
    }
}
