use crate::llm::GenerationParams;
use crate::{AppError, Result};
use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// The `HarvestConfig` struct holds the settings of one harvesting run.
/// Defaults can be overridden by `HARVEST_*` environment variables and then by
/// positional command line arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestConfig {
    /// The résumé search query.
    pub query: String,
    /// The hh.ru region code.
    pub area: u32,
    /// The number of search pages to crawl.
    pub pages: u32,
    /// The site root used for search requests and relative result links.
    pub base_url: String,
    /// The directory the dataset is written to.
    pub output_dir: PathBuf,
    /// The timeout for every HTTP request, in seconds.
    pub timeout_secs: u64,
}

impl Default for HarvestConfig {
    /// Provides default values for the `HarvestConfig` struct.
    ///
    /// # Returns
    ///
    /// A `HarvestConfig` instance with default settings.
    fn default() -> Self {
        Self {
            query: String::from("C# Разработчик"),
            area: 1,
            pages: 1,
            base_url: String::from("https://hh.ru"),
            output_dir: PathBuf::from("../datasets"),
            timeout_secs: crate::DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

impl HarvestConfig {
    /// Loads the configuration from the defaults layered with `HARVEST_*` environment variables.
    pub fn load() -> Result<Self> {
        Self::from_environment(Environment::with_prefix("HARVEST"))
    }

    /// Loads the configuration from the defaults layered with the given environment source.
    ///
    /// # Arguments
    ///
    /// * `env` - The environment source, usually `Environment::with_prefix("HARVEST")`.
    ///
    /// # Returns
    ///
    /// A `Result` containing the merged configuration.
    pub fn from_environment(env: Environment) -> Result<Self> {
        let settings = Config::builder()
            .add_source(Config::try_from(&Self::default())?)
            .add_source(env.try_parsing(true))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Overrides the query, the region and the page count with positional arguments,
    /// in that order. Missing arguments leave the current value untouched.
    pub fn with_args(mut self, args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut args = args.into_iter();

        if let Some(query) = args.next() {
            self.query = query;
        }
        if let Some(area) = args.next() {
            self.area = parse_arg("area", &area)?;
        }
        if let Some(pages) = args.next() {
            self.pages = parse_arg("pages", &pages)?;
        }

        Ok(self)
    }

    /// The per-request HTTP timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn parse_arg(name: &str, value: &str) -> Result<u32> {
    value.parse().map_err(|_| {
        AppError::Config(ConfigError::Message(format!(
            "{name} must be a non-negative integer, got {value:?}"
        )))
    })
}

/// The `LLMConfig` struct holds the configuration settings for the local Language Model (LLM).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    /// The base URL of the Ollama server.
    pub endpoint: String,
    /// The model to generate with.
    pub model_id: String,
    /// The sampling parameters of every generation.
    pub params: GenerationParams,
    /// The timeout for a single HTTP call to the model server.
    pub timeout: Duration,
}

/// Settings of the reply bot, read once at startup from the environment and an
/// optional `.env` file. Keys are case-insensitive.
#[derive(Debug, Clone, Deserialize)]
pub struct BotSettings {
    pub bot_token: String,
    pub log_level: String,
    pub model_id: String,
    pub llm_endpoint: String,
    pub llm_max_new_tokens: u32,
    pub llm_temperature: f32,
    pub llm_top_p: f32,
    pub system_prompt: String,
    pub telegram_api_url: String,
    pub queue_capacity: usize,
    pub inference_workers: usize,
    pub generation_timeout_secs: u64,
    pub poll_timeout_secs: u64,
}

const DEFAULT_SYSTEM_PROMPT: &str =
    "Ты - вайбовый собеседователь. Шутишь так, что пятки сверкают. Отвечай кратко и на русском языке.";

impl BotSettings {
    /// Reads `.env` if present, then the process environment.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_environment(Environment::default())
    }

    /// Loads the settings from the defaults layered with the given environment source.
    ///
    /// # Arguments
    ///
    /// * `env` - The environment source, usually `Environment::default()`.
    ///
    /// # Returns
    ///
    /// A `Result` containing the settings, or an error if `BOT_TOKEN` is missing or a
    /// value does not parse.
    pub fn from_environment(env: Environment) -> Result<Self> {
        let settings = Config::builder()
            .set_default("log_level", "INFO")?
            .set_default("model_id", "qwen2:0.5b-instruct")?
            .set_default("llm_endpoint", "http://localhost:11434")?
            .set_default("llm_max_new_tokens", 256)?
            .set_default("llm_temperature", 0.7)?
            .set_default("llm_top_p", 0.95)?
            .set_default("system_prompt", DEFAULT_SYSTEM_PROMPT)?
            .set_default("telegram_api_url", "https://api.telegram.org")?
            .set_default("queue_capacity", 32)?
            .set_default("inference_workers", 1)?
            .set_default("generation_timeout_secs", 120)?
            .set_default("poll_timeout_secs", 30)?
            .add_source(env.try_parsing(true))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Builds the model client settings from the `LLM_*` and `MODEL_ID` values.
    pub fn llm_config(&self) -> LLMConfig {
        LLMConfig {
            endpoint: self.llm_endpoint.clone(),
            model_id: self.model_id.clone(),
            params: GenerationParams {
                max_new_tokens: self.llm_max_new_tokens,
                temperature: self.llm_temperature,
                top_p: self.llm_top_p,
            },
            timeout: self.generation_timeout(),
        }
    }

    /// How long a chat waits for its reply.
    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }
}
