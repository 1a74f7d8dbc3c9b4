//! Conversation history commands.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::cli::chat::open_persistence;
use crate::cli::render::{render_estimate, render_message};
use crate::store::conversation::{ConversationStore, CHAT_STORAGE_KEY};
use crate::store::estimate::{EstimateStore, ESTIMATE_STORAGE_KEY};
use crate::store::persist::Persistence;

/// Persisted conversation operations.
#[derive(Parser)]
pub struct HistoryCommand {
    /// Directory for conversation state (default: ~/.ai-esti/state).
    #[arg(long, global = true)]
    pub state_dir: Option<PathBuf>,

    /// History subcommand to execute.
    #[command(subcommand)]
    pub command: HistorySubcommands,
}

/// History subcommands.
#[derive(Subcommand)]
pub enum HistorySubcommands {
    /// Prints the saved conversation and current estimate.
    Show,
    /// Deletes the saved conversation and estimate.
    Clear,
}

impl HistoryCommand {
    /// Executes the history command.
    pub fn execute(self) -> Result<()> {
        let persistence = open_persistence(self.state_dir)?;

        match self.command {
            HistorySubcommands::Show => {
                let conversation = ConversationStore::load(persistence.clone());
                let estimates = EstimateStore::load(persistence);
                if conversation.messages().is_empty() {
                    println!("No saved conversation.");
                }
                for message in conversation.messages() {
                    println!("{}\n", render_message(message));
                }
                if let Some(estimate) = estimates.current() {
                    println!("Current estimate:\n{}", render_estimate(estimate, estimates.period_weeks()));
                }
            }
            HistorySubcommands::Clear => {
                for key in [CHAT_STORAGE_KEY, ESTIMATE_STORAGE_KEY] {
                    Persistence::remove(persistence.as_ref(), key)
                        .with_context(|| format!("Failed to delete saved state: {key}"))?;
                }
                println!("Conversation and estimate cleared.");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::sync::Arc;

    use tempfile::TempDir;

    use super::*;
    use crate::estimate::model::tests::sample_estimate;
    use crate::store::persist::{FilePersistence, SharedPersistence};

    #[test]
    fn clear_deletes_state_files() {
        let dir = TempDir::new().unwrap();
        let persistence: SharedPersistence = Arc::new(FilePersistence::new(dir.path()));
        let mut conversation = ConversationStore::load(persistence.clone());
        conversation.begin_turn("견적");
        conversation.update_last_message("네");
        EstimateStore::load(persistence.clone()).replace(sample_estimate());
        assert!(dir.path().join("ai-chat-storage.json").exists());
        assert!(dir.path().join("ai-estimate-storage.json").exists());

        HistoryCommand {
            state_dir: Some(dir.path().to_path_buf()),
            command: HistorySubcommands::Clear,
        }
        .execute()
        .unwrap();

        assert!(!dir.path().join("ai-chat-storage.json").exists());
        assert!(!dir.path().join("ai-estimate-storage.json").exists());
        assert!(ConversationStore::load(persistence.clone()).messages().is_empty());
        assert!(EstimateStore::load(persistence).current().is_none());

        // Clearing again with nothing saved succeeds.
        HistoryCommand {
            state_dir: Some(dir.path().to_path_buf()),
            command: HistorySubcommands::Clear,
        }
        .execute()
        .unwrap();
    }
}
