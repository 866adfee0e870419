use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "cosmo")]
#[command(about = "Inspect and manage Cosmo Studio projects", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// User whose projects to operate on
    #[arg(short, long, global = true, env = "COSMO_USER", default_value = "local")]
    pub user: String,

    /// Configuration file
    #[arg(short, long, global = true, env = "COSMO_CONFIG")]
    pub config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List projects, newest first
    #[command(alias = "ls")]
    List {
        /// Include every user's projects
        #[arg(long)]
        all: bool,
    },

    /// Create an empty project
    #[command(alias = "new")]
    Create {
        /// Project title
        #[arg(short, long)]
        title: Option<String>,
    },

    /// Show a project's summary and contents
    Show {
        /// Project id
        id: String,
    },

    /// Delete a project and its assets
    #[command(alias = "rm")]
    Delete {
        /// Project id
        id: String,
    },

    /// Delete every project of the user
    DeleteAll {
        /// Do not ask for confirmation
        #[arg(long)]
        yes: bool,
    },

    /// Export a project as a single JSON document
    Export {
        /// Project id
        id: String,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import an exported document as a new project
    Import {
        /// Exported document
        file: PathBuf,
    },

    /// Clear both stores for every user
    Reset {
        /// Do not ask for confirmation
        #[arg(long)]
        yes: bool,
    },
}
