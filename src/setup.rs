use anyhow::{Context, Result};
use log::{debug, warn};

use crate::config::Config;
use crate::error::CredentialError;
use crate::llm::LlmClient;
use crate::llm::anthropic::AnthropicClient;
use crate::llm::gemini::GeminiClient;
use crate::llm::ollama::OllamaClient;
use crate::llm::openai::OpenAiClient;
use crate::llm::BackendKind;

/// Build the LLM client for the configured backend.
///
/// A missing API key fails here, before anything touches the network.
pub fn build_llm_client(cfg: &Config) -> Result<Box<dyn LlmClient>> {
    let backend = cfg.backend;

    if !backend.supported_models().contains(&cfg.model.as_str()) {
        warn!(
            "Model {:?} is not in the known {backend} model list; sending it anyway",
            cfg.model
        );
    }

    debug!("Using {backend} with model: {}", cfg.model);

    let settings = cfg.settings();
    let base_url = cfg.base_url.clone();

    let client: Box<dyn LlmClient> = match backend {
        BackendKind::OpenAi => Box::new(
            OpenAiClient::new(required_key(cfg)?, settings, base_url)
                .context("failed to build HTTP client")?,
        ),
        BackendKind::Anthropic => Box::new(
            AnthropicClient::new(required_key(cfg)?, settings, base_url)
                .context("failed to build HTTP client")?,
        ),
        BackendKind::Gemini => Box::new(
            GeminiClient::new(required_key(cfg)?, settings, base_url)
                .context("failed to build HTTP client")?,
        ),
        BackendKind::Ollama => Box::new(
            OllamaClient::new(settings, base_url).context("failed to build HTTP client")?,
        ),
    };

    Ok(client)
}

fn required_key(cfg: &Config) -> Result<String, CredentialError> {
    let env_var = cfg.backend.api_key_env().unwrap_or("--api-key");
    cfg.api_key.clone().ok_or(CredentialError::Missing {
        backend: cfg.backend,
        env_var,
    })
}
