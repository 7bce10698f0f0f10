//! Tally CLI - record income and expenses from the terminal
//!
//! Works fully offline; queued changes sync to the remote store when
//! connectivity and a session are available.

mod cli;
mod commands;
mod error;

use std::env;
use std::path::PathBuf;

use clap::{CommandFactory, Parser};

use crate::cli::{CategoryCommands, Cli, Commands, GoalCommands};
use crate::commands::common::open_context;
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

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tally=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let data_dir = resolve_data_dir(cli.data_dir);

    match cli.command {
        Some(Commands::Add {
            amount,
            description,
            category,
            income,
            date,
        }) => {
            let context = open_context(&data_dir).await?;
            commands::add::run_add(
                &context,
                &amount,
                &description,
                &category,
                income,
                date.as_deref(),
            )
            .await?;
        }
        Some(Commands::List { limit, json }) => {
            let context = open_context(&data_dir).await?;
            commands::list::run_list(&context, limit, json).await?;
        }
        Some(Commands::Category { command }) => {
            let context = open_context(&data_dir).await?;
            match command {
                CategoryCommands::Add { name, income } => {
                    commands::category::run_category_add(&context, &name, income).await?;
                }
                CategoryCommands::List { json } => {
                    commands::category::run_category_list(&context, json).await?;
                }
            }
        }
        Some(Commands::Goal { command }) => {
            let context = open_context(&data_dir).await?;
            match command {
                GoalCommands::Add {
                    name,
                    target,
                    deadline,
                } => {
                    commands::goal::run_goal_add(&context, &name, &target, deadline.as_deref())
                        .await?;
                }
                GoalCommands::List { json } => {
                    commands::goal::run_goal_list(&context, json).await?;
                }
                GoalCommands::Deposit { goal, amount } => {
                    commands::goal::run_goal_deposit(&context, &goal, &amount).await?;
                }
            }
        }
        Some(Commands::Sync) => {
            let context = open_context(&data_dir).await?;
            commands::sync::run_sync(&context).await?;
        }
        Some(Commands::Status { json }) => {
            let context = open_context(&data_dir).await?;
            commands::status::run_status(&context, json)?;
        }
        Some(Commands::Completions { shell, output }) => {
            commands::completions::run_completions(shell, output.as_deref())?;
        }
        None => {
            // Quick capture mode: tally 12.50 coffee with friends
            if let Some((amount, description)) = cli.entry.split_first() {
                let context = open_context(&data_dir).await?;
                commands::add::run_add(
                    &context,
                    amount,
                    description,
                    "Uncategorized",
                    false,
                    None,
                )
                .await?;
            } else {
                Cli::command().print_help().map_err(CliError::Io)?;
                println!();
            }
        }
    }

    Ok(())
}

fn resolve_data_dir(cli_data_dir: Option<PathBuf>) -> PathBuf {
    cli_data_dir
        .or_else(|| env::var_os("TALLY_DATA_DIR").map(PathBuf::from))
        .unwrap_or_else(default_data_dir)
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tally")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_data_dir_prefers_explicit_path() {
        let explicit = resolve_data_dir(Some(PathBuf::from("/tmp/tally-test")));
        assert_eq!(explicit, PathBuf::from("/tmp/tally-test"));
    }

    #[test]
    fn default_data_dir_is_not_empty() {
        assert!(!default_data_dir().as_os_str().is_empty());
    }
}
