use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use roster::presentation::cli::commands::{
    AssignCommand, CalendarCommand, DemoCommand, RotateTokenCommand, SeedCommand, SolveCommand,
    UnassignCommand, ValidateCommand,
};
use roster::presentation::cli::{Cli, Commands};

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("roster=debug,info")
    } else {
        EnvFilter::new("roster=info")
    };

    fmt().with_env_filter(filter).with_target(false).init();

    match cli.command {
        Commands::Demo { scenario } => DemoCommand::run(&scenario),
        Commands::Seed { input, database } => SeedCommand::run(&input, &database),
        Commands::Solve { database, org, events, seed } => SolveCommand::run(&database, &org, &events, seed),
        Commands::Validate { database, event } => ValidateCommand::run(&database, &event),
        Commands::Assign { database, event, person, role } => AssignCommand::run(&database, &event, &person, &role),
        Commands::Unassign { database, assignment } => UnassignCommand::run(&database, &assignment),
        Commands::Calendar { database, token } => CalendarCommand::run(&database, &token),
        Commands::RotateToken { database, person } => RotateTokenCommand::run(&database, &person),
    }
}
