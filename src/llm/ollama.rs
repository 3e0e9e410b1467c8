use musli::json;
use musli::{Decode, Encode};
use reqwest::blocking::Client;
use std::time::Duration;

use super::prompt_builder::PromptPair;
use super::{BackendKind, GenerationSettings, LlmClient};
use crate::error::BackendError;
use crate::report::Reporter;

pub const DEFAULT_MODEL: &str = "llama3.2";
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Models we have prompts tuned against. Anything pulled locally still works.
const SUPPORTED_MODELS: &[&str] = &[
    "llama3.1",
    "llama3.2",
    "qwen2.5-coder",
    "mistral",
    "gemma2",
    "phi3",
];

const BACKEND: BackendKind = BackendKind::Ollama;

#[derive(Debug, Encode, Decode)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Debug, Encode)]
struct ChatOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Encode)]
struct ChatRequest {
    model: String,
    stream: bool,
    messages: Vec<OllamaMessage>,
    options: ChatOptions,
}

#[derive(Debug, Decode)]
struct OllamaChatResponse {
    message: OllamaMessage,
    #[musli(default)]
    done_reason: Option<String>,
    #[musli(default)]
    prompt_eval_count: Option<u32>,
    #[musli(default)]
    eval_count: Option<u32>,
}

#[derive(Debug, Decode)]
struct OllamaErrorResponse {
    error: String,
}

/// Synchronous Ollama client using /api/chat.
pub struct OllamaClient {
    http: Client,
    base_url: String,
    settings: GenerationSettings,
}

impl OllamaClient {
    pub fn new(settings: GenerationSettings, base_url: Option<String>) -> reqwest::Result<Self> {
        // Local models can take a while to load on first use.
        let http = Client::builder().timeout(Duration::from_secs(300)).build()?;
        let base = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Ok(Self {
            http,
            base_url: base.trim_end_matches('/').to_string(),
            settings,
        })
    }

    pub fn supported_models() -> &'static [&'static str] {
        SUPPORTED_MODELS
    }

    fn encode_request(&self, prompts: &PromptPair) -> Result<String, BackendError> {
        let req_body = ChatRequest {
            model: self.settings.model.clone(),
            stream: false,
            messages: vec![
                OllamaMessage {
                    role: "system".to_string(),
                    content: prompts.system.clone(),
                },
                OllamaMessage {
                    role: "user".to_string(),
                    content: prompts.user.clone(),
                },
            ],
            options: ChatOptions {
                temperature: self.settings.temperature,
                num_predict: self.settings.max_tokens,
            },
        };

        json::to_string(&req_body).map_err(|e| BackendError::Unknown {
            backend: BACKEND,
            message: format!("Failed to encode Ollama JSON request: {e}"),
        })
    }
}

/// Ollama reports failures as `{"error": "..."}` with a plain status code.
pub fn classify_error(status: u16, body: &str, model: &str) -> BackendError {
    let message = json::from_str::<OllamaErrorResponse>(body)
        .map(|e| e.error)
        .unwrap_or_else(|_| body.trim().to_string());

    if status == 404 || message.contains("not found") {
        return BackendError::ModelNotFound {
            backend: BACKEND,
            model: model.to_string(),
        };
    }

    BackendError::Unknown {
        backend: BACKEND,
        message: format!("HTTP {status} - {message}"),
    }
}

/// Pull the generated text out of a successful response body.
pub fn extract_text(body: &str, reporter: &dyn Reporter) -> Result<String, BackendError> {
    let parsed: OllamaChatResponse = json::from_str(body).map_err(|e| BackendError::Unknown {
        backend: BACKEND,
        message: format!("Failed to decode Ollama JSON: {e}"),
    })?;

    if let (Some(prompt), Some(eval)) = (parsed.prompt_eval_count, parsed.eval_count) {
        reporter.debug(&format!("Token usage: prompt={prompt}, completion={eval}"));
    }

    if parsed.done_reason.as_deref() == Some("length") {
        reporter.warn("Ollama stopped at the max token limit; the message may be truncated");
    }

    Ok(parsed.message.content)
}

impl LlmClient for OllamaClient {
    fn kind(&self) -> BackendKind {
        BACKEND
    }

    fn model(&self) -> &str {
        &self.settings.model
    }

    /// Ollama runs locally without authentication.
    fn validate_credential(&self) -> bool {
        true
    }

    fn complete(
        &self,
        prompts: &PromptPair,
        reporter: &dyn Reporter,
    ) -> Result<String, BackendError> {
        let body_str = self.encode_request(prompts)?;

        reporter.trace(&format!("Ollama request body: {}", super::truncate(&body_str, 3000)));

        let url = format!("{}/api/chat", self.base_url);

        reporter.info(&format!("Calling Ollama model {:?} at {url}", self.settings.model));

        let resp = self
            .http
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body_str)
            .send()
            .map_err(|e| BackendError::Unknown {
                backend: BACKEND,
                message: format!("Error calling Ollama at {url}: {e}"),
            })?;

        let status = resp.status();
        let resp_text = resp.text().map_err(|e| BackendError::Unknown {
            backend: BACKEND,
            message: format!("Failed to read Ollama response body: {e}"),
        })?;

        reporter.trace(&format!("Ollama raw JSON response: {resp_text}"));

        if !status.is_success() {
            return Err(classify_error(
                status.as_u16(),
                &resp_text,
                &self.settings.model,
            ));
        }

        extract_text(&resp_text, reporter)
    }
}
