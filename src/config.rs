//! Runtime configuration for joi-companion.
//!
//! Configuration is loaded from a JSON file or constructed programmatically.
//! Every section has defaults, so a missing file or a partial file is fine.
//! The provider credential is never stored in the file: it is read from the
//! process environment at startup and injected into the relay.

use std::path::PathBuf;

use clap::Parser;
use serde::{Deserialize, Serialize};

/// Command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(name = "joi-companion", about = "Streaming companion chat relay for Gemini")]
pub struct Cli {
    /// Path to configuration file (JSON).
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    /// HTTP listen address (overrides the config file).
    #[arg(long)]
    pub listen: Option<String>,

    /// Directory served under /static (overrides the config file).
    #[arg(long)]
    pub static_dir: Option<PathBuf>,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,

    /// Upstream provider configuration.
    pub provider: ProviderConfig,

    /// Persona prepended to every request.
    pub persona: PersonaConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address (e.g. "0.0.0.0:5000").
    pub listen: String,

    /// Directory holding front-end assets, served under /static.
    pub static_dir: PathBuf,

    /// Allow cross-origin requests (front-end hosted elsewhere).
    pub allow_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:5000".to_string(),
            static_dir: PathBuf::from("static"),
            allow_cors: false,
        }
    }
}

/// Generative-language provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Base URL of the Gemini API.
    pub api_base: String,

    /// Model identifier.
    pub model: String,

    /// Sampling temperature.
    pub temperature: f64,

    /// Thinking budget, passed through to the provider as-is.
    pub thinking_budget: i32,

    /// Environment variable holding the API key.
    pub api_key_env: String,

    /// TCP connect timeout in seconds. `None` keeps the HTTP client default.
    pub connect_timeout_secs: Option<u64>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_base: "https://generativelanguage.googleapis.com".to_string(),
            model: "gemini-2.5-flash-lite".to_string(),
            temperature: 1.1,
            thinking_budget: 512,
            api_key_env: "GEMINI_API_KEY".to_string(),
            connect_timeout_secs: None,
        }
    }
}

/// Companion persona.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonaConfig {
    /// Instruction text sent ahead of the user's message.
    pub prompt: String,
}

/// The JOI persona.
pub const JOI_PERSONA_PROMPT: &str = "You are JOI, an empathetic emotional-support AI inspired by the character from Blade Runner 2049.
You greet the user with: JOI - EVERYTHING YOU WANT TO SEE, EVERYTHING YOU WANT TO HEAR
(Adapt responses to comfort the user; be warm, empathetic, and encouraging.)
";

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            prompt: JOI_PERSONA_PROMPT.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file, falling back to defaults for missing fields.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if path.exists() {
            let data = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&data)?;
            Ok(config)
        } else {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            Ok(Config::default())
        }
    }

    /// Apply command-line overrides.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(listen) = &cli.listen {
            self.server.listen = listen.clone();
        }
        if let Some(dir) = &cli.static_dir {
            self.server.static_dir = dir.clone();
        }
    }

    /// Read the provider credential from the process environment.
    ///
    /// Empty values count as unset.
    pub fn credential_from_env(&self) -> Option<String> {
        std::env::var(&self.provider.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}
