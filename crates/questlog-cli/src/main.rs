//! Questlog CLI - plan tasks and track progress from the terminal
//!
//! Everything is written to the local store first; `sync` and `watch` push
//! queued changes to the configured remote.

mod cli;
mod commands;
mod error;
#[cfg(test)]
mod tests;

use clap::Parser;
use questlog_core::SyncConfig;

use crate::cli::{Cli, Commands};
use crate::commands::add::run_add;
use crate::commands::common::{open_store, resolve_db_path, store_config};
use crate::commands::delete::run_delete;
use crate::commands::edit::{run_done, run_rename, run_reopen, run_reschedule};
use crate::commands::list::run_list;
use crate::commands::outbox::run_outbox;
use crate::commands::player::{run_award, run_claim, run_player, run_spend, run_unlock};
use crate::commands::sync::{run_reauth, run_status, run_sync, run_watch};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("questlog=info,questlog_core=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);
    let store = open_store(&db_path, &store_config(cli.device_id))?;

    match cli.command {
        Commands::Add { title, due } => run_add(&title, due.as_deref(), &store).await?,
        Commands::List {
            due,
            status,
            limit,
            json,
        } => {
            run_list(due.as_deref(), status.map(Into::into), limit, json, &store).await?;
        }
        Commands::Done { id } => run_done(&id, &store).await?,
        Commands::Reopen { id } => run_reopen(&id, &store).await?,
        Commands::Rename { id, title } => run_rename(&id, &title, &store).await?,
        Commands::Reschedule { id, day } => run_reschedule(&id, &day, &store).await?,
        Commands::Delete { id } => run_delete(&id, &store).await?,
        Commands::Player { json } => run_player(json, &store).await?,
        Commands::Award { currency, xp } => run_award(currency, xp, &store).await?,
        Commands::Spend { amount } => run_spend(amount, &store).await?,
        Commands::Unlock { item, cost } => run_unlock(&item, cost, &store).await?,
        Commands::Claim { reward, currency } => run_claim(&reward, currency, &store).await?,
        Commands::Outbox { limit, json } => run_outbox(limit, json, &store).await?,
        Commands::Sync => run_sync(&store, &SyncConfig::from_env()?).await?,
        Commands::Status { json } => run_status(json, &store).await?,
        Commands::Watch => run_watch(&store, &SyncConfig::from_env()?).await?,
        Commands::Reauth => run_reauth(&store).await?,
    }

    Ok(())
}
