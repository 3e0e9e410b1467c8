use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::prompt_builder::PromptPair;
use super::{BackendKind, GenerationSettings, LlmClient};
use crate::error::BackendError;
use crate::report::Reporter;

pub const DEFAULT_MODEL: &str = "claude-3-5-haiku-latest";
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

const SUPPORTED_MODELS: &[&str] = &[
    "claude-3-5-haiku-latest",
    "claude-3-5-sonnet-latest",
    "claude-3-7-sonnet-latest",
    "claude-sonnet-4-0",
    "claude-opus-4-0",
    "claude-haiku-4-5",
    "claude-sonnet-4-5",
];

const BACKEND: BackendKind = BackendKind::Anthropic;

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Deserialize)]
struct ApiError {
    #[serde(rename = "type")]
    kind: String,
    message: String,
}

/// Client for the Anthropic Messages API.
pub struct AnthropicClient {
    client: Client,
    api_key: String,
    settings: GenerationSettings,
    base_url: String,
}

impl AnthropicClient {
    pub fn new(
        api_key: String,
        settings: GenerationSettings,
        base_url: Option<String>,
    ) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(90)).build()?;
        let base = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Ok(Self {
            client,
            api_key,
            settings,
            base_url: base.trim_end_matches('/').to_string(),
        })
    }

    pub fn supported_models() -> &'static [&'static str] {
        SUPPORTED_MODELS
    }
}

/// Anthropic reports the failure kind in `error.type`; the status code is a fallback.
pub fn classify_error(status: u16, body: &str, model: &str) -> BackendError {
    let parsed = serde_json::from_str::<ErrorEnvelope>(body).ok().map(|e| e.error);
    let (kind, message) = match parsed {
        Some(err) => (err.kind, err.message),
        None => (String::new(), body.trim().to_string()),
    };

    match (kind.as_str(), status) {
        ("authentication_error" | "permission_error", _) | (_, 401 | 403) => {
            BackendError::InvalidCredential {
                backend: BACKEND,
                detail: message,
            }
        }
        ("billing_error", _) | (_, 402) => BackendError::QuotaExceeded {
            backend: BACKEND,
            detail: message,
        },
        ("invalid_request_error", _) if message.to_lowercase().contains("credit balance") => {
            BackendError::QuotaExceeded {
                backend: BACKEND,
                detail: message,
            }
        }
        ("not_found_error", _) | (_, 404) => BackendError::ModelNotFound {
            backend: BACKEND,
            model: model.to_string(),
        },
        ("rate_limit_error" | "overloaded_error", _) | (_, 429 | 529) => {
            BackendError::RateLimited {
                backend: BACKEND,
                detail: message,
            }
        }
        _ => BackendError::Unknown {
            backend: BACKEND,
            message: format!("HTTP {status} - {message}"),
        },
    }
}

/// Concatenate the text blocks of a successful response.
pub fn extract_text(body: &str, reporter: &dyn Reporter) -> Result<String, BackendError> {
    let resp: MessagesResponse = serde_json::from_str(body).map_err(|e| BackendError::Unknown {
        backend: BACKEND,
        message: format!("failed to parse Anthropic response: {e}"),
    })?;

    if let Some(usage) = &resp.usage {
        reporter.debug(&format!(
            "Token usage: input={}, output={}",
            usage.input_tokens,
            usage.output_tokens
        ));
    }

    match resp.stop_reason.as_deref() {
        Some("refusal") => {
            return Err(BackendError::ContentBlocked {
                backend: BACKEND,
                reason: "the model declined to respond".into(),
            });
        }
        Some("max_tokens") => {
            reporter.warn("Anthropic stopped at the max token limit; the message may be truncated");
        }
        _ => {}
    }

    Ok(resp
        .content
        .into_iter()
        .filter(|block| block.kind == "text")
        .map(|block| block.text)
        .collect::<Vec<_>>()
        .join(""))
}

impl LlmClient for AnthropicClient {
    fn kind(&self) -> BackendKind {
        BACKEND
    }

    fn model(&self) -> &str {
        &self.settings.model
    }

    fn validate_credential(&self) -> bool {
        let key = self.api_key.trim();
        key.starts_with("sk-ant-") && key.len() > 20
    }

    fn complete(
        &self,
        prompts: &PromptPair,
        reporter: &dyn Reporter,
    ) -> Result<String, BackendError> {
        let url = format!("{}/v1/messages", self.base_url);
        let req = MessagesRequest {
            model: &self.settings.model,
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
            system: &prompts.system,
            messages: vec![Message {
                role: "user",
                content: &prompts.user,
            }],
        };

        reporter.info(&format!("Calling Anthropic model {:?}", req.model));

        let resp = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&req)
            .send()
            .map_err(|e| BackendError::Unknown {
                backend: BACKEND,
                message: format!("failed to send request to {url}: {e}"),
            })?;

        let status = resp.status();
        let text = resp.text().map_err(|e| BackendError::Unknown {
            backend: BACKEND,
            message: format!("failed to read Anthropic response body: {e}"),
        })?;

        reporter.trace(&format!("Anthropic raw response ({}): {text}", status.as_u16()));

        if !status.is_success() {
            return Err(classify_error(status.as_u16(), &text, &self.settings.model));
        }

        extract_text(&text, reporter)
    }
}
