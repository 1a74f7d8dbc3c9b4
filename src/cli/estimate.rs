//! Offline estimate commands.

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::cli::render::{render_discount, render_estimate};
use crate::estimate::extract::{parse_estimate, parse_estimate_json, parse_reply};
use crate::estimate::model::ProjectEstimate;

/// Estimate operations that do not call the model.
#[derive(Parser)]
pub struct EstimateCommand {
    /// Estimate subcommand to execute.
    #[command(subcommand)]
    pub command: EstimateSubcommands,
}

/// Estimate subcommands.
#[derive(Subcommand)]
pub enum EstimateSubcommands {
    /// Extracts the estimate from an AI reply.
    Extract {
        /// Reply file (stdin when omitted).
        file: Option<PathBuf>,
        /// Prints the estimate as JSON instead of a card.
        #[arg(long)]
        json: bool,
    },
    /// Applies the 8-week extension and 20% discount.
    Discount {
        /// Estimate JSON or an AI reply containing one.
        file: PathBuf,
        /// Prints the discounted estimate as JSON instead of a card.
        #[arg(long)]
        json: bool,
    },
}

impl EstimateCommand {
    /// Executes the estimate command.
    pub fn execute(self) -> Result<()> {
        match self.command {
            EstimateSubcommands::Extract { file, json } => {
                let text = read_input(file.as_deref())?;
                let reply = parse_reply(&text);
                let Some(estimate) = reply.estimate else {
                    // Plain text reply: the extractor found nothing usable.
                    println!("{}", reply.prose);
                    anyhow::bail!("No valid estimate found in input");
                };
                if json {
                    println!("{}", serde_json::to_string_pretty(&estimate)?);
                } else {
                    if !reply.prose.is_empty() {
                        println!("{}\n", reply.prose);
                    }
                    println!("{}", render_estimate(&estimate, None));
                    if !reply.trailing.is_empty() {
                        println!("\n{}", reply.trailing);
                    }
                }
            }
            EstimateSubcommands::Discount { file, json } => {
                let text = read_input(Some(file.as_path()))?;
                let estimate = load_estimate(&text)?;
                let (discounted, outcome) = estimate
                    .with_extension_discount()
                    .context("Failed to apply the extension discount")?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&discounted)?);
                } else {
                    println!("{}\n", render_discount(&outcome));
                    println!("{}", render_estimate(&discounted, None));
                }
            }
        }
        Ok(())
    }
}

fn read_input(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read file: {}", path.display())),
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read stdin")?;
            Ok(text)
        }
    }
}

/// Reads bare estimate JSON, falling back to an embedded block.
fn load_estimate(text: &str) -> Result<ProjectEstimate> {
    if text.trim_start().starts_with('{') {
        return parse_estimate_json(text).context("Failed to parse estimate JSON");
    }
    parse_estimate(text).context("Failed to extract estimate")
}
