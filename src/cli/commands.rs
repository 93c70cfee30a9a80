// src/cli/commands.rs
use clap::{Args as ClapArgs, Subcommand};

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Add a password record
    Add {
        #[arg(long)]
        category: String,

        #[arg(long)]
        project: String,

        /// The password details to store
        #[arg(long)]
        details: String,
    },

    /// List one page of password records
    List {
        /// Page number, starting at 1
        #[arg(long, default_value_t = 1)]
        page: u32,

        /// Records per page (defaults to DEFAULT_PAGE_SIZE)
        #[arg(long)]
        limit: Option<u32>,

        #[command(flatten)]
        filter: FilterArgs,

        /// Show the most recent records first
        #[arg(long)]
        newest: bool,
    },

    /// Show a single record
    Get {
        /// Record ID
        #[arg(required = true)]
        id: String,
    },

    /// Change fields of a record
    Update {
        /// Record ID
        #[arg(required = true)]
        id: String,

        #[arg(long)]
        category: Option<String>,

        #[arg(long)]
        project: Option<String>,

        #[arg(long)]
        details: Option<String>,
    },

    /// Delete a record
    Delete {
        /// Record ID
        #[arg(required = true)]
        id: String,
    },

    /// Count records
    Count {
        #[command(flatten)]
        filter: FilterArgs,
    },
}

#[derive(ClapArgs, Debug, Default)]
pub struct FilterArgs {
    /// Only records in this category
    #[arg(long)]
    pub category: Option<String>,

    /// Only records whose project name contains this text
    #[arg(long)]
    pub project: Option<String>,
}
