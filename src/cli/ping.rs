//! Model health check.

use anyhow::Result;
use clap::Parser;

use crate::ai::gemini::backend_from_credentials;
use crate::ai::transport::ChatTransport;
use crate::ai::usage::CostSettings;

/// Sends a one-shot "ping" to the model.
#[derive(Parser)]
pub struct PingCommand {
    /// Gemini model to check (overrides GEMINI_MODEL).
    #[arg(long)]
    pub model: Option<String>,
}

impl PingCommand {
    /// Executes the ping command.
    pub async fn execute(self) -> Result<()> {
        let credentials = crate::utils::preflight::check_ai_credentials(self.model.as_deref())?;
        let backend = backend_from_credentials(&credentials)?;
        let transport = ChatTransport::new(Box::new(backend), credentials.model.clone())
            .with_cost_settings(CostSettings::from_env());

        let check = transport.test_model().await;
        if check.ok {
            println!("✓ {}: {}", credentials.model, check.message);
            Ok(())
        } else {
            println!("✗ {}: {}", credentials.model, check.message);
            anyhow::bail!("Model health check failed for {}", credentials.model)
        }
    }
}
