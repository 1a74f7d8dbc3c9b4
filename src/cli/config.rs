//! Configuration-related CLI commands.

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::ai::model_config::{get_model_registry, MODELS_YAML};
use crate::ai::usage::CostSettings;

/// Configuration operations.
#[derive(Parser)]
pub struct ConfigCommand {
    /// Configuration subcommand to execute.
    #[command(subcommand)]
    pub command: ConfigSubcommands,
}

/// Configuration subcommands.
#[derive(Subcommand)]
pub enum ConfigSubcommands {
    /// Model pricing configuration.
    Models(ModelsCommand),
}

/// Models operations.
#[derive(Parser)]
pub struct ModelsCommand {
    /// Models subcommand to execute.
    #[command(subcommand)]
    pub command: ModelsSubcommands,
}

/// Models subcommands.
#[derive(Subcommand)]
pub enum ModelsSubcommands {
    /// Shows the embedded models.yaml configuration.
    Show(ShowCommand),
}

/// Show command options.
#[derive(Parser)]
pub struct ShowCommand {
    /// Prints the effective rates (with env overrides) instead of the raw YAML.
    #[arg(long)]
    pub effective: bool,
}

impl ConfigCommand {
    /// Executes the config command.
    pub fn execute(self) -> Result<()> {
        match self.command {
            ConfigSubcommands::Models(models_cmd) => models_cmd.execute(),
        }
    }
}

impl ModelsCommand {
    /// Executes the models command.
    pub fn execute(self) -> Result<()> {
        match self.command {
            ModelsSubcommands::Show(show_cmd) => show_cmd.execute(),
        }
    }
}

impl ShowCommand {
    /// Executes the show command.
    pub fn execute(self) -> Result<()> {
        if !self.effective {
            println!("{MODELS_YAML}");
            return Ok(());
        }

        let costs = CostSettings::from_env();
        println!("USD/KRW: {}", costs.usd_krw());
        for spec in get_model_registry().get_all_models() {
            let pricing = costs.pricing_for(&spec.api_identifier);
            println!(
                "{:<24} input ${:.2}/Mtok  output ${:.2}/Mtok{}",
                spec.api_identifier,
                pricing.input_per_mtok_usd,
                pricing.output_per_mtok_usd,
                if spec.legacy { "  (legacy)" } else { "" }
            );
        }
        Ok(())
    }
}
