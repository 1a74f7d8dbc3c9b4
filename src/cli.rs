//! CLI interface for ai-esti.

use anyhow::Result;
use clap::{Parser, Subcommand};

pub mod chat;
pub mod config;
pub mod estimate;
pub mod history;
pub mod ping;
pub mod prompts;
pub mod render;

/// ai-esti: chat with an AI consultant to get a project estimate.
#[derive(Parser)]
#[command(name = "ai-esti")]
#[command(about = "Chat-driven AI project estimate consultant", long_about = None)]
#[command(version)]
pub struct Cli {
    /// The main command to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Main command categories.
#[derive(Subcommand)]
pub enum Commands {
    /// Interactive estimate consultation.
    Chat(chat::ChatCommand),
    /// Checks that the configured model answers.
    Ping(ping::PingCommand),
    /// Prompt template inspection.
    Prompts(prompts::PromptsCommand),
    /// Offline estimate extraction and discounting.
    Estimate(estimate::EstimateCommand),
    /// Saved conversation management.
    History(history::HistoryCommand),
    /// Configuration and model pricing.
    Config(config::ConfigCommand),
}

impl Cli {
    /// Executes the CLI command.
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Chat(cmd) => cmd.execute().await,
            Commands::Ping(cmd) => cmd.execute().await,
            Commands::Prompts(cmd) => cmd.execute(),
            Commands::Estimate(cmd) => cmd.execute(),
            Commands::History(cmd) => cmd.execute(),
            Commands::Config(cmd) => cmd.execute(),
        }
    }
}
