use std::process::ExitCode;

use clap::Parser;

mod commands;
mod printer;

use commands::Command;
use recsync_runtime::logging;

#[derive(Debug, Parser)]
#[command(
    name = "recsync",
    version,
    about = "Batch record synchronization client",
    propagate_version = true
)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_with_verbosity(cli.verbose).ok();

    match cli.command {
        Command::Sync(args) => commands::sync::run(args),
        Command::History(args) => commands::history::run(args),
    }
}
