//! GrannyMail admin tool
//!
//! One-shot maintenance against the hosted database:
//! - Refresh the system messages table from the messages spreadsheet
//! - Print a single system message

mod command;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use grannymail_config::AppConfig;
use grannymail_core::TabularSource;
use grannymail_db::{DataAccessClient, RemoteStoreBuilder};
use grannymail_sheets::google::GoogleSheetSource;
use grannymail_sheets::JsonFileSheet;

use crate::command::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load().context("Failed to load configuration")?;
    grannymail_obs::init("grannymail-admin", config.log_format());

    let store = RemoteStoreBuilder::new(config.supabase_url()?, config.supabase_key()?)
        .bucket(config.bucket())
        .timeout(config.request_timeout())
        .build()
        .context("Failed to build database client")?;
    let client = DataAccessClient::remote(store).with_message_column(config.message_column());
    info!(bucket = config.bucket(), "Connected to hosted project");

    match cli.command {
        Command::RefreshSystemMessages { from_file } => {
            let source: Box<dyn TabularSource> = match from_file {
                Some(path) => Box::new(JsonFileSheet::new(path)),
                None => Box::new(GoogleSheetSource::new(
                    config.sheets_api_key()?.to_string(),
                    config.sheet_id()?.to_string(),
                    config.sheet_range().to_string(),
                )?),
            };
            let count = client
                .update_system_messages(source.as_ref())
                .await
                .context("System message refresh failed")?;
            info!(count, "System messages refreshed");
        }
        Command::SystemMessage { name, column } => {
            let text = match column {
                Some(column) => client.get_system_message_in(&name, &column).await,
                None => client.get_system_message(&name).await,
            }
            .with_context(|| format!("Failed to read system message {}", name))?;
            println!("{}", text);
        }
    }

    Ok(())
}
