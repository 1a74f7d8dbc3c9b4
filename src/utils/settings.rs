//! User settings file at `~/.ai-esti/settings.json`.
//!
//! The file carries an `env` map that backs up the process environment, so
//! `GEMINI_API_KEY` and the pricing overrides can live there instead of in a
//! shell profile:
//!
//! ```json
//! { "env": { "GEMINI_API_KEY": "...", "USD_KRW": "1380" } }
//! ```

use std::collections::HashMap;
use std::env;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::warn;

const CONFIG_DIR_NAME: &str = ".ai-esti";
const SETTINGS_FILE_NAME: &str = "settings.json";
const STATE_DIR_NAME: &str = "state";

/// Parsed settings file.
#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    /// Values used when a variable is missing from the environment.
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl Settings {
    /// Reads the settings file under the user's config directory.
    pub fn load() -> Result<Self> {
        Self::read(&settings_path()?)
    }

    /// Reads a settings file. A missing file is empty settings.
    pub fn read(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read settings file: {}", path.display()))
            }
        };
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse settings file: {}", path.display()))
    }

    /// The environment value of `key`, else the file's.
    pub fn lookup(&self, key: &str) -> Option<String> {
        env::var(key).ok().or_else(|| self.env.get(key).cloned())
    }
}

/// `~/.ai-esti`.
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Failed to determine home directory")?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// `~/.ai-esti/settings.json`.
pub fn settings_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(SETTINGS_FILE_NAME))
}

/// `~/.ai-esti/state`, where conversation and estimate state is kept.
pub fn state_dir() -> Result<PathBuf> {
    Ok(config_dir()?.join(STATE_DIR_NAME))
}

/// Returns a key lookup over the environment and the settings file.
///
/// The file is read once. If it cannot be read the lookup falls back to the
/// environment alone.
pub fn env_lookup() -> impl Fn(&str) -> Option<String> {
    let settings = Settings::load().unwrap_or_else(|e| {
        warn!(error = %e, "Ignoring settings file");
        Settings::default()
    });
    move |key| settings.lookup(key)
}
