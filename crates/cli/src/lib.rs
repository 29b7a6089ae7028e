pub mod artifacts;
pub mod commands;
pub mod logging;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

use commands::recommend::RecommendArgs;

#[derive(Debug, Parser)]
#[command(
    name = "flatwise",
    about = "FlatWise resale flat recommender",
    long_about = "Filter, rank and explain HDB resale listings against buyer constraints using pre-built \
                  listing, Bayesian network, category and criteria artifacts.",
    after_help = "Examples:\n  flatwise recommend --max-price 500000 --town BEDOK --priority lease\n  flatwise recommend --request request.json --json\n  flatwise doctor --json\n  flatwise config"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Rank listings that satisfy the constraints and attach an insight to each row")]
    Recommend(RecommendArgs),
    #[command(
        about = "Inspect effective configuration values with source attribution"
    )]
    Config,
    #[command(about = "Validate config and every pipeline artifact")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Recommend(args) => commands::recommend::run(args),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
