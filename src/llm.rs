use crate::config::LLMConfig;
use crate::{AppError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

/// Sampling parameters passed to every generation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub max_new_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

/// A loaded text-generation model.
///
/// Implementations receive a fully formatted prompt and return the continuation only,
/// without echoing the prompt back.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    raw: bool,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    num_predict: u32,
    temperature: f32,
    top_p: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// The `OllamaEngine` runs generations on a local Ollama server.
///
/// Prompts are sent in raw mode, so the chat template built by the caller reaches
/// the model untouched.
pub struct OllamaEngine {
    /// The HTTP client used for making requests.
    client: Client,
    /// The `/api/generate` URL of the server.
    generate_url: String,
    /// The model every request runs on.
    model: String,
}

impl OllamaEngine {
    /// Creates a new `OllamaEngine` from the given configuration.
    ///
    /// # Arguments
    ///
    /// * `config` - The LLM settings: server address, model and timeout.
    ///
    /// # Returns
    ///
    /// A `Result` containing the engine, or an error if the HTTP client could not be created.
    pub fn new(config: &LLMConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            generate_url: format!("{}/api/generate", config.endpoint.trim_end_matches('/')),
            model: config.model_id.clone(),
        })
    }

    /// The name of the model generations run on.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Loads the model into the server's memory so the first chat does not pay for it.
    /// An empty prompt makes Ollama load the model without generating anything.
    pub async fn warm_up(&self) -> Result<()> {
        info!("Loading model {}", self.model);
        let body = serde_json::json!({ "model": self.model });
        let response = self.client.post(&self.generate_url).json(&body).send().await?;
        check_status(response).await?;
        info!("Model {} is ready", self.model);
        Ok(())
    }
}

#[async_trait]
impl TextGenerator for OllamaEngine {
    #[instrument(skip(self, prompt, params), fields(prompt_length = prompt.len()))]
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            raw: true,
            stream: false,
            options: GenerateOptions {
                num_predict: params.max_new_tokens,
                temperature: params.temperature,
                top_p: params.top_p,
            },
        };

        let response = self.client.post(&self.generate_url).json(&request).send().await?;
        let response = check_status(response).await?;

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| AppError::LLMError(format!("invalid generate response: {e}")))?;

        debug!("{} generated {} characters", self.model, body.response.chars().count());
        Ok(body.response)
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response.text().await.unwrap_or_default();
    Err(AppError::LLMError(format!("status {status}: {message}")))
}
