pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "roster-cli")]
#[command(author = "Roster Team")]
#[command(version = "0.1.0")]
#[command(about = "Volunteer assignment scheduling core", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(about = "Run one of the documented scenarios against an in-memory store")]
    Demo {
        #[arg(value_enum, default_value = "all")]
        scenario: Scenario,
    },

    #[command(about = "Seed organizations, people, events, and blackouts from a JSON file")]
    Seed {
        #[arg(short, long, value_name = "FILE", help = "Seed data JSON file")]
        input: PathBuf,

        #[arg(short, long, value_name = "FILE", default_value = "roster.db", help = "SQLite database file")]
        database: PathBuf,
    },

    #[command(about = "Run the solver over one or more events and publish the resulting solution")]
    Solve {
        #[arg(short, long, value_name = "FILE", default_value = "roster.db")]
        database: PathBuf,

        #[arg(long, help = "Organization id")]
        org: String,

        #[arg(long, value_delimiter = ',', help = "Comma-separated event ids; defaults to every event in range")]
        events: Vec<String>,

        #[arg(long, help = "Fixed solver seed for deterministic output")]
        seed: Option<u64>,
    },

    #[command(about = "Validate an event's current assignments")]
    Validate {
        #[arg(short, long, value_name = "FILE", default_value = "roster.db")]
        database: PathBuf,

        #[arg(long)]
        event: String,
    },

    #[command(about = "Manually assign a person to a role on an event")]
    Assign {
        #[arg(short, long, value_name = "FILE", default_value = "roster.db")]
        database: PathBuf,

        #[arg(long)]
        event: String,

        #[arg(long)]
        person: String,

        #[arg(long)]
        role: String,
    },

    #[command(about = "Remove a manual or solver-generated assignment")]
    Unassign {
        #[arg(short, long, value_name = "FILE", default_value = "roster.db")]
        database: PathBuf,

        #[arg(long)]
        assignment: String,
    },

    #[command(about = "Fetch a person's ICS calendar feed by their token")]
    Calendar {
        #[arg(short, long, value_name = "FILE", default_value = "roster.db")]
        database: PathBuf,

        #[arg(long)]
        token: String,
    },

    #[command(about = "Issue or rotate a person's calendar token")]
    RotateToken {
        #[arg(short, long, value_name = "FILE", default_value = "roster.db")]
        database: PathBuf,

        #[arg(long)]
        person: String,
    },
}

#[derive(Debug, Clone, ValueEnum)]
pub enum Scenario {
    A,
    B,
    C,
    D,
    E,
    F,
    All,
}
