//! Prompt template commands.

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::prompts::templates::TemplateRegistry;

/// Prompt template operations.
#[derive(Parser)]
pub struct PromptsCommand {
    /// Prompts subcommand to execute.
    #[command(subcommand)]
    pub command: PromptsSubcommands,
}

/// Prompts subcommands.
#[derive(Subcommand)]
pub enum PromptsSubcommands {
    /// Lists the built-in templates.
    List,
    /// Prints a template's content.
    Show {
        /// Template id.
        id: String,
    },
    /// Prints the prompt a template produces for some input.
    Combine {
        /// Template id. Unknown ids pass the input through unchanged.
        id: String,
        /// User input.
        input: String,
    },
}

impl PromptsCommand {
    /// Executes the prompts command.
    pub fn execute(self) -> Result<()> {
        let registry = TemplateRegistry::builtin();
        match self.command {
            PromptsSubcommands::List => {
                for template in registry.list() {
                    match &template.description {
                        Some(description) => {
                            println!("{:<10} {} - {}", template.id, template.title, description);
                        }
                        None => println!("{:<10} {}", template.id, template.title),
                    }
                }
            }
            PromptsSubcommands::Show { id } => {
                let template = registry
                    .get(&id)
                    .ok_or_else(|| anyhow::anyhow!("Unknown template: {id}"))?;
                println!("{}", template.content);
            }
            PromptsSubcommands::Combine { id, input } => {
                println!("{}", registry.combine(&id, &input));
            }
        }
        Ok(())
    }
}
