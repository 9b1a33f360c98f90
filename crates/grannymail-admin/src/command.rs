use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Maintenance commands against the hosted GrannyMail project
#[derive(Parser, Debug)]
#[command(name = "grannymail-admin")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Replace the system messages table with the messages sheet
    RefreshSystemMessages {
        /// Read a JSON sheet export instead of the Google sheet
        #[arg(long, value_name = "PATH")]
        from_file: Option<PathBuf>,
    },

    /// Print one system message
    SystemMessage {
        /// Value of full_message_name
        name: String,

        /// Column to read instead of the configured message column
        column: Option<String>,
    },
}
