// src/cli/mod.rs
use clap::Parser;

pub mod commands;
pub mod handlers;

pub use commands::CliCommand;

#[derive(Parser, Debug)]
#[command(author, version, about = "Store and page through password records", long_about = None)]
pub struct Args {
    /// Print results as JSON
    #[arg(long)]
    pub json: bool,

    /// Database URL (sqlite:, postgres:// or postgresql://)
    #[arg(long, short, env = "DATABASE_URL", hide_env_values = true)]
    pub db: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub command: CliCommand,
}
