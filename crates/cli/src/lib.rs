pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "carely",
    about = "Carely operator CLI",
    long_about = "Operate the Carely recommendation service: migrations, demo data, config inspection, readiness checks and one-off recommendations.",
    after_help = "Examples:\n  carely doctor --json\n  carely seed\n  carely recommend --member 1 --anchor 1001 --limit 5"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load and verify the demo catalog fixture")]
    Seed,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Validate config, DB connectivity, schema and catalog readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Compute recommendations for one anchor item")]
    Recommend {
        #[arg(long, help = "Member id that owns the anchor")]
        member: i64,
        #[arg(long, help = "Anchor item id")]
        anchor: i64,
        #[arg(long, help = "Result size (defaults to recommendation.final_limit)")]
        limit: Option<u32>,
        #[arg(long = "top-k", help = "Neighbor fan-out (defaults to recommendation.top_k_per_base)")]
        top_k: Option<u32>,
        #[arg(long, help = "Fix the sampling seed for reproducible output")]
        seed: Option<u64>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Recommend { member, anchor, limit, top_k, seed } => {
            commands::recommend::run(commands::recommend::RecommendArgs {
                member_id: member,
                anchor_id: anchor,
                limit,
                top_k,
                seed,
            })
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
